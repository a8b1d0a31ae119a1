//! Timeout and caller cancellation around one in-flight call.

use crate::{ApiError, Result};
use std::future::{pending, Future};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Race `call` against an optional deadline and an optional caller token.
///
/// Either signal drops `call` and yields `ECONNABORTED`. The timer lives
/// inside this future, so it is dropped on every exit path.
pub(crate) async fn run_with_deadline<F, T>(
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => pending::<()>().await,
        }
    };
    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(ApiError::aborted()),
        _ = deadline => Err(ApiError::aborted()),
        result = call => result,
    }
}
