use crate::manager::ResilienceManager;
use crewguard_errors::FailureContext;
use std::error::Error;
use std::future::Future;

/// Awaits `operation`, handing any error to the manager before returning
/// it unchanged.
///
/// The error is recorded under `component` with a `function` context entry
/// naming `function`, and any registered recovery runs before this returns.
///
/// # Examples
///
/// ```rust
/// use crewguard::{with_error_handling, ResilienceManager};
///
/// # async fn example() {
/// let manager = ResilienceManager::new();
/// let parsed = with_error_handling(&manager, "importer", "parse_row", async {
///     "x1".parse::<u32>()
/// })
/// .await;
///
/// assert!(parsed.is_err());
/// assert_eq!(manager.error_statistics().total_errors, 1);
/// # }
/// ```
pub async fn with_error_handling<Fut, T, E>(
    manager: &ResilienceManager,
    component: &str,
    function: &str,
    operation: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Error + Send + Sync + 'static,
{
    match operation.await {
        Ok(value) => Ok(value),
        Err(err) => {
            manager
                .handle_error(&err, FailureContext::new(component).with("function", function))
                .await;
            Err(err)
        }
    }
}
