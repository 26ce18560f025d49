//! Replaying remembered requests.

use tracing::debug;

use crate::error::FetchError;
use crate::executor::{Failure, RequestExecutor, Success};

/// What to do with a stored request after replaying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Keep it.
    #[default]
    Never = 0,
    /// Delete it only if the replay succeeded.
    OnSuccess = 1,
    /// Delete it whatever the outcome.
    Always = 2,
}

impl TryFrom<u8> for DeletePolicy {
    type Error = FetchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Never),
            1 => Ok(Self::OnSuccess),
            2 => Ok(Self::Always),
            other => Err(FetchError::Config(format!(
                "Invalid delete policy {} (expected 0, 1 or 2)",
                other
            ))),
        }
    }
}

/// Re-issue the request stored under `key`, then apply `policy`.
///
/// Returns `None` when nothing is stored under `key`.
pub async fn resolve(
    executor: &RequestExecutor,
    key: &str,
    policy: DeletePolicy,
) -> Option<Result<Success, Failure>> {
    let stored = executor.get_request(key)?;
    debug!(key = %key, policy = ?policy, "Replaying stored request");

    // A replay never re-stores, whatever the executor's remember default.
    let result = executor.request(stored.to_payload().remember(false)).await;

    let delete = match policy {
        DeletePolicy::Never => false,
        DeletePolicy::OnSuccess => result.is_ok(),
        DeletePolicy::Always => true,
    };
    if delete {
        executor.delete_request(key);
    }

    Some(result)
}
