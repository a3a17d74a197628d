use thiserror::Error;

use crate::fetch::FetchError;
use crate::runner::ds::error::JErrorType;

/// Errors surfaced by sandboxes and the runtime loader.
///
/// `Clone` so one failed shared load can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SandboxError {
    #[error("the host does not support global interception")]
    HostPrimitiveUnavailable,
    #[error("failed to fetch asset: {0}")]
    AssetFetch(#[from] FetchError),
    #[error("error occurs when executing script in sandbox `{module}`: {source}")]
    Execution { module: String, source: JErrorType },
    #[error("malformed runtime descriptor: {0}")]
    MalformedDescriptor(String),
    #[error("runtime `{0}` failed to load earlier")]
    RuntimeUnavailable(String),
}

impl SandboxError {
    /// The script error behind an execution failure.
    pub fn script_error(&self) -> Option<&JErrorType> {
        match self {
            SandboxError::Execution { source, .. } => Some(source),
            _ => None,
        }
    }
}
