use std::{fmt::Display, time::Duration};

use futures::Future;
use tracing::debug;

/// Runs `op` until it succeeds or has been attempted `times` times, waiting
/// `spacing` between attempts. Returns the result of the last attempt.
pub async fn retry_async<F, Fut, T, E>(
    times: usize,
    spacing: Option<Duration>,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    if times < 1 {
        panic!("retry_async called with times < 1");
    }

    let mut result = op().await;
    let mut tries = 1;

    while tries < times {
        match &result {
            Ok(_) => break,
            Err(err) => debug!("attempt {tries}/{times} failed ({err}), retrying"),
        }

        if let Some(spacing) = spacing {
            tokio::time::sleep(spacing).await;
        }

        result = op().await;
        tries += 1;
    }

    result
}
