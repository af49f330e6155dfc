//! In-memory [`ConfigBackend`] implementation.
//!
//! Holds the running configuration as an ordered map of leaf paths to values.
//! Each transaction works on a private snapshot taken when it was opened;
//! a commit applies the transaction's own changes (not the whole snapshot) to
//! the running configuration, so concurrent transactions touching different
//! nodes do not overwrite each other.
//!
//! Device configuration lives under `/devices/device/<name>/...`. Dry-runs
//! render those changes per device, and only device changes create a
//! commit-queue item. Queue completion is simulated through
//! [`QueueBehavior`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use wrapper_core::Value;

use super::{
    CommitFlags, ConfigBackend, ConfigPath, DryRunOutput, QueueResult, QueueStatus, Transaction,
    TransactionMode,
};
use crate::template::{RenderedEdit, TemplateEngine, TemplateVariables};

type ConfigTree = BTreeMap<ConfigPath, Value>;

/// How the simulated commit queue settles queued items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueBehavior {
    /// Items complete immediately.
    #[default]
    Complete,
    /// The queue reports that nothing was queued.
    NothingQueued,
    /// Items never settle; waits end only when their bound expires.
    Stall,
    /// Items settle with the given status.
    Finish(QueueStatus),
}

/// Counters describing what the backend has been asked to do.
#[derive(Debug, Default)]
pub struct BackendStats {
    opened: AtomicU64,
    commits: AtomicU64,
    queued_commits: AtomicU64,
    queue_waits: AtomicU64,
    dry_runs: AtomicU64,
    aborts: AtomicU64,
    released: AtomicU64,
}

impl BackendStats {
    #[must_use]
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Plain (non-queued) commits.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Commits issued with the sync-commit-queue flag.
    #[must_use]
    pub fn queued_commits(&self) -> u64 {
        self.queued_commits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn queue_waits(&self) -> u64 {
        self.queue_waits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn dry_runs(&self) -> u64 {
        self.dry_runs.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

struct Shared {
    running: RwLock<ConfigTree>,
    templates: Arc<dyn TemplateEngine>,
    queue_behavior: Mutex<QueueBehavior>,
    available: AtomicBool,
    next_txn_id: AtomicU64,
    next_queue_id: AtomicU64,
    stats: BackendStats,
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// In-process configuration datastore. Cloning shares the same datastore.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// Creates an empty, available backend rendering templates with `templates`.
    #[must_use]
    pub fn new(templates: Arc<dyn TemplateEngine>) -> Self {
        Self {
            shared: Arc::new(Shared {
                running: RwLock::new(ConfigTree::new()),
                templates,
                queue_behavior: Mutex::new(QueueBehavior::default()),
                available: AtomicBool::new(true),
                next_txn_id: AtomicU64::new(1),
                next_queue_id: AtomicU64::new(1),
                stats: BackendStats::default(),
            }),
        }
    }

    /// Builder-style [`set_queue_behavior`](Self::set_queue_behavior).
    #[must_use]
    pub fn with_queue_behavior(self, behavior: QueueBehavior) -> Self {
        self.set_queue_behavior(behavior);
        self
    }

    pub fn set_queue_behavior(&self, behavior: QueueBehavior) {
        *self.shared.queue_behavior.lock() = behavior;
    }

    /// When unavailable, `open_transaction` fails.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn stats(&self) -> &BackendStats {
        &self.shared.stats
    }

    /// Reads a leaf from the running configuration.
    #[must_use]
    pub fn get(&self, path: &ConfigPath) -> Option<Value> {
        self.shared.running.read().get(path).cloned()
    }

    /// Whether the node or any descendant exists in the running configuration.
    #[must_use]
    pub fn exists(&self, path: &ConfigPath) -> bool {
        subtree_exists(&self.shared.running.read(), path)
    }

    /// Writes directly to the running configuration, bypassing transactions.
    pub fn seed(&self, path: &ConfigPath, value: impl Into<Value>) {
        self.shared.running.write().insert(path.clone(), value.into());
    }

    /// Number of leaves in the running configuration.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.running.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.running.read().is_empty()
    }
}

#[async_trait]
impl ConfigBackend for MemoryBackend {
    async fn open_transaction(
        &self,
        identity: &str,
        context: &str,
        mode: TransactionMode,
    ) -> anyhow::Result<Box<dyn Transaction>> {
        if !self.shared.available.load(Ordering::SeqCst) {
            bail!("datastore is not accepting transactions");
        }

        let id = self.shared.next_txn_id.fetch_add(1, Ordering::SeqCst);
        self.shared.stats.opened.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.shared.running.read().clone();

        debug!(txn = id, identity, context, ?mode, "opened transaction");

        Ok(Box::new(MemoryTransaction {
            id,
            mode,
            shared: Arc::clone(&self.shared),
            working: snapshot.clone(),
            base: snapshot,
            state: TxnState::Open,
            queue_item: None,
            released: false,
        }))
    }
}

// ---------------------------------------------------------------------------
// MemoryTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    Aborted,
}

struct MemoryTransaction {
    id: u64,
    mode: TransactionMode,
    shared: Arc<Shared>,
    base: ConfigTree,
    working: ConfigTree,
    state: TxnState,
    queue_item: Option<u64>,
    released: bool,
}

/// A single leaf-level difference between two trees.
enum Change<'a> {
    Set(&'a ConfigPath, &'a Value),
    Remove(&'a ConfigPath),
}

impl MemoryTransaction {
    fn ensure_writable(&self) -> anyhow::Result<()> {
        if self.state != TxnState::Open {
            bail!("transaction {} is no longer open", self.id);
        }
        if self.mode != TransactionMode::ReadWrite {
            bail!("transaction {} is read-only", self.id);
        }
        Ok(())
    }

    fn changes(&self) -> Vec<Change<'_>> {
        let mut changes: Vec<Change<'_>> = self
            .working
            .iter()
            .filter(|(path, value)| self.base.get(*path) != Some(*value))
            .map(|(path, value)| Change::Set(path, value))
            .collect();
        changes.extend(
            self.base
                .keys()
                .filter(|path| !self.working.contains_key(*path))
                .map(Change::Remove),
        );
        changes
    }

    fn apply_edit(&mut self, edit: RenderedEdit) {
        match edit {
            RenderedEdit::Set { path, value } => {
                self.working.insert(path, value);
            }
            RenderedEdit::Create { path } => {
                if !subtree_exists(&self.working, &path) {
                    self.working.insert(path, Value::Null);
                }
            }
            RenderedEdit::Delete { path } => {
                self.working.retain(|p, _| !p.starts_with(&path));
            }
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn id(&self) -> u64 {
        self.id
    }

    async fn get(&self, path: &ConfigPath) -> anyhow::Result<Option<Value>> {
        Ok(self.working.get(path).cloned())
    }

    async fn exists(&self, path: &ConfigPath) -> anyhow::Result<bool> {
        Ok(subtree_exists(&self.working, path))
    }

    async fn set(&mut self, path: &ConfigPath, value: Value) -> anyhow::Result<()> {
        self.ensure_writable()?;
        self.apply_edit(RenderedEdit::Set {
            path: path.clone(),
            value,
        });
        Ok(())
    }

    async fn create(&mut self, path: &ConfigPath) -> anyhow::Result<()> {
        self.ensure_writable()?;
        self.apply_edit(RenderedEdit::Create { path: path.clone() });
        Ok(())
    }

    async fn delete(&mut self, path: &ConfigPath) -> anyhow::Result<()> {
        self.ensure_writable()?;
        self.apply_edit(RenderedEdit::Delete { path: path.clone() });
        Ok(())
    }

    async fn apply_template(
        &mut self,
        name: &str,
        context: &ConfigPath,
        vars: &TemplateVariables,
    ) -> anyhow::Result<()> {
        self.ensure_writable()?;
        let edits = self.shared.templates.render(name, context, vars)?;
        debug!(txn = self.id, template = name, edits = edits.len(), "applying template");
        for edit in edits {
            self.apply_edit(edit);
        }
        Ok(())
    }

    async fn commit(&mut self, flags: CommitFlags) -> anyhow::Result<Option<u64>> {
        self.ensure_writable()?;

        let mut touches_devices = false;
        {
            let mut running = self.shared.running.write();
            for change in self.changes() {
                match change {
                    Change::Set(path, value) => {
                        touches_devices |= device_of(path).is_some();
                        running.insert(path.clone(), value.clone());
                    }
                    Change::Remove(path) => {
                        touches_devices |= device_of(path).is_some();
                        running.remove(path);
                    }
                }
            }
        }
        self.state = TxnState::Committed;

        if flags.sync_commit_queue {
            self.shared.stats.queued_commits.fetch_add(1, Ordering::SeqCst);
            if touches_devices {
                self.queue_item = Some(self.shared.next_queue_id.fetch_add(1, Ordering::SeqCst));
            }
        } else {
            self.shared.stats.commits.fetch_add(1, Ordering::SeqCst);
        }

        debug!(txn = self.id, queue_item = ?self.queue_item, "committed transaction");
        Ok(self.queue_item)
    }

    async fn commit_dry_run(&mut self) -> anyhow::Result<DryRunOutput> {
        if self.state != TxnState::Open {
            bail!("transaction {} is no longer open", self.id);
        }
        self.shared.stats.dry_runs.fetch_add(1, Ordering::SeqCst);

        let mut lines: BTreeMap<String, Vec<(ConfigPath, String)>> = BTreeMap::new();
        for change in self.changes() {
            let (path, text) = match change {
                Change::Set(path, Value::Null) => (path, format!("+ {}", path_text(path))),
                Change::Set(path, value) => (path, format!("+ {} {value}", path_text(path))),
                Change::Remove(path) => (path, format!("- {}", path_text(path))),
            };
            let Some((device, _)) = device_of(path) else {
                continue;
            };
            lines
                .entry(device.to_string())
                .or_default()
                .push((path.clone(), text));
        }

        Ok(lines
            .into_iter()
            .map(|(device, mut entries)| {
                entries.sort();
                let text = entries
                    .into_iter()
                    .map(|(_, line)| line)
                    .collect::<Vec<_>>()
                    .join("\n");
                (device, text)
            })
            .collect())
    }

    async fn commit_queue_result(
        &mut self,
        timeout: Option<Duration>,
    ) -> anyhow::Result<QueueResult> {
        if self.state != TxnState::Committed {
            bail!("transaction {} has not been committed", self.id);
        }
        self.shared.stats.queue_waits.fetch_add(1, Ordering::SeqCst);

        let Some(queue_id) = self.queue_item else {
            return Ok(QueueResult {
                queue_id: 0,
                status: QueueStatus::None,
            });
        };

        let behavior = *self.shared.queue_behavior.lock();
        let status = match behavior {
            QueueBehavior::Complete => QueueStatus::Completed,
            QueueBehavior::NothingQueued => {
                return Ok(QueueResult {
                    queue_id: 0,
                    status: QueueStatus::None,
                })
            }
            QueueBehavior::Finish(status) => status,
            QueueBehavior::Stall => {
                match timeout {
                    Some(bound) => tokio::time::sleep(bound).await,
                    None => std::future::pending::<()>().await,
                }
                QueueStatus::Timeout
            }
        };

        Ok(QueueResult { queue_id, status })
    }

    async fn abort(&mut self) -> anyhow::Result<()> {
        if self.state == TxnState::Open {
            self.working.clone_from(&self.base);
            self.state = TxnState::Aborted;
            self.shared.stats.aborts.fetch_add(1, Ordering::SeqCst);
            debug!(txn = self.id, "aborted transaction");
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.released {
            warn!(txn = self.id, "transaction dropped without release");
        }
    }
}

fn subtree_exists(tree: &ConfigTree, path: &ConfigPath) -> bool {
    tree.range(path.clone()..)
        .next()
        .is_some_and(|(p, _)| p.starts_with(path))
}

/// Splits `/devices/device/<name>/...` into the device name and the rest.
fn device_of(path: &ConfigPath) -> Option<(&str, &[String])> {
    match path.segments() {
        [devices, device, name, rest @ ..] if devices == "devices" && device == "device" => {
            Some((name.as_str(), rest))
        }
        _ => None,
    }
}

/// Device-relative text of a path, without the `config` container.
fn path_text(path: &ConfigPath) -> String {
    match device_of(path) {
        Some((_, [config, tail @ ..])) if config == "config" && !tail.is_empty() => tail.join("/"),
        Some((device, [])) => device.to_string(),
        Some((_, rest)) => rest.join("/"),
        None => path.to_string(),
    }
}
