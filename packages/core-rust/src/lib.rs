//! Service wrapper core: scalar values, caller context, operation types and
//! validated service arguments.

pub mod args;
pub mod context;
pub mod types;

pub use args::{
    parameter_key, ArgsError, OperationType, ParamRecord, ServiceArguments, OPERATION_TYPE_FIELD,
    RESERVED_PREFIX, VALIDATE_FIELD,
};
pub use context::RequestContext;
pub use types::{Principal, Value};
