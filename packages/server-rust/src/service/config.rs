use std::time::Duration;

/// Commit-queue policy. Static for the process; not selectable per request.
#[derive(Debug, Clone)]
pub struct CommitQueueConfig {
    /// Commit through the commit queue and wait for the queue item.
    pub enabled: bool,
    /// Bound on the wait for the queue item. `None` waits without bound,
    /// relying on the action timeout to cap the whole call.
    pub timeout: Option<Duration>,
}

impl Default for CommitQueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Configuration of the service operation pipeline.
#[derive(Debug, Clone)]
pub struct WrapperConfig {
    /// Name reported for the inbound action in logs and request contexts.
    pub action_name: String,
    /// Ceiling for a whole invocation, from parameter load to transaction release.
    pub action_timeout: Duration,
    pub commit_queue: CommitQueueConfig,
    /// Text substituted for null template variables.
    pub none_placeholder: String,
    /// User context transactions are opened in.
    pub transaction_context: String,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            action_name: "wrapper-action".to_string(),
            action_timeout: Duration::from_secs(240),
            commit_queue: CommitQueueConfig::default(),
            none_placeholder: String::new(),
            transaction_context: "system".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_config_defaults() {
        let config = WrapperConfig::default();
        assert_eq!(config.action_name, "wrapper-action");
        assert_eq!(config.action_timeout, Duration::from_secs(240));
        assert_eq!(config.none_placeholder, "");
        assert_eq!(config.transaction_context, "system");
    }

    #[test]
    fn commit_queue_defaults_to_disabled_with_bound() {
        let config = CommitQueueConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
    }
}
