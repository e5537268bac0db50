//! Uniform handling of optional enrichment steps.

use std::future::Future;

use crate::services::metrics;

/// Await an optional step. On failure the step's empty value is used, the
/// error is logged with the step name and `profile_step_degraded_total`
/// is incremented.
pub async fn best_effort<T, F>(step: &'static str, user_id: &str, fut: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, anyhow::Error>>,
{
    match fut.await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(step, user_id = %user_id, error = %e, "Profile step degraded");
            metrics::record_degraded(step);
            T::default()
        }
    }
}
