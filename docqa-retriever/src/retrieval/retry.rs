use docqa_embed::{EmbedError, Result};
use std::future::Future;
use tracing::warn;

/// Run an embedding call, retrying exactly once on a transient failure.
pub(crate) async fn retry_once<T, F, Fut>(operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match call().await {
        Err(e) if e.is_transient() => {
            warn!("{} failed ({}), retrying once", operation, e);
            call().await
        }
        other => other,
    }
}
