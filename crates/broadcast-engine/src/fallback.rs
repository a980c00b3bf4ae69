//! Ordered fallback over a list of candidates (sources, query variants, ...).

use std::future::Future;

/// Runs `attempt` over `candidates` in order and returns the first success.
///
/// Candidates after the first success are never attempted. When every
/// candidate fails, the collected errors are returned in candidate order.
pub async fn first_success<C, T, E, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Result<T, Vec<E>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = vec![];

    for candidate in candidates {
        match attempt(candidate).await {
            Ok(value) => return Ok(value),
            Err(error) => failures.push(error),
        }
    }

    Err(failures)
}
