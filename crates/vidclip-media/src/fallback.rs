//! Ordered-list, first-success-wins fallback policy.

use std::future::Future;

use tracing::debug;

/// Every candidate failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Number of candidates attempted
    pub attempts: usize,
    /// Error from the final attempt; `None` when the list was empty
    pub last: Option<E>,
}

/// Try `candidates` in order and return the first success with its index.
///
/// Candidates after the first success are never attempted. Failures are
/// passed to `on_failure` before moving on.
pub async fn first_success<'a, C, T, E, F, Fut, L>(
    candidates: &'a [C],
    mut attempt: F,
    mut on_failure: L,
) -> Result<(usize, T), Exhausted<E>>
where
    F: FnMut(usize, &'a C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    L: FnMut(usize, &'a C, &E),
{
    let mut last = None;

    for (index, candidate) in candidates.iter().enumerate() {
        debug!(attempt = index + 1, total = candidates.len(), "Trying fallback candidate");
        match attempt(index, candidate).await {
            Ok(value) => return Ok((index, value)),
            Err(e) => {
                on_failure(index, candidate, &e);
                last = Some(e);
            }
        }
    }

    Err(Exhausted {
        attempts: candidates.len(),
        last,
    })
}
