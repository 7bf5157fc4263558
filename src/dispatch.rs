//! Parallel execution of independent units of work.
//!
//! The orchestration code only depends on [`ParallelMap`]; [`LocalDispatcher`]
//! is the in-process backend that runs each unit on its own tokio task.

use crate::error::DispatchError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

/// Run a function over many independent inputs with bounded concurrency.
///
/// Implementations must return outputs in input order, regardless of the
/// order in which units finish. Any unit failure fails the whole call.
#[async_trait]
pub trait ParallelMap: Send + Sync {
    async fn map<I, O, F, Fut>(&self, units: Vec<I>, f: F) -> Result<Vec<O>, DispatchError>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static;
}

/// Tokio-task backend with a concurrency ceiling and a per-unit timeout
#[derive(Debug, Clone)]
pub struct LocalDispatcher {
    max_concurrency: usize,
    unit_timeout: Duration,
}

impl LocalDispatcher {
    pub fn new(max_concurrency: usize, unit_timeout: Duration) -> Result<Self, DispatchError> {
        if max_concurrency == 0 {
            return Err(DispatchError::InvalidConcurrency);
        }
        Ok(Self {
            max_concurrency,
            unit_timeout,
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn unit_timeout(&self) -> Duration {
        self.unit_timeout
    }
}

#[async_trait]
impl ParallelMap for LocalDispatcher {
    async fn map<I, O, F, Fut>(&self, units: Vec<I>, f: F) -> Result<Vec<O>, DispatchError>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let f = Arc::new(f);
        let timeout = self.unit_timeout;
        let total = units.len();

        debug!(
            "Dispatching {} units (max {} concurrent, timeout {:?})",
            total, self.max_concurrency, timeout
        );

        // Units start as soon as a slot frees up and finish in any order
        let mut outputs: Vec<(usize, O)> = stream::iter(units.into_iter().enumerate())
            .map(|(unit, input)| {
                let f = Arc::clone(&f);
                async move {
                    let handle = AbortOnDrop(tokio::spawn(async move {
                        tokio::time::timeout(timeout, f(input)).await
                    }));

                    match handle.await {
                        Ok(Ok(output)) => {
                            debug!("Unit {}/{} completed", unit + 1, total);
                            Ok((unit, output))
                        }
                        Ok(Err(_)) => {
                            error!("Unit {} timed out after {:?}", unit, timeout);
                            Err(DispatchError::Timeout { unit, timeout })
                        }
                        Err(e) => {
                            error!("Unit {} failed: {}", unit, e);
                            Err(DispatchError::UnitFailed {
                                unit,
                                reason: e.to_string(),
                            })
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await?;

        outputs.sort_unstable_by_key(|(unit, _)| *unit);
        Ok(outputs.into_iter().map(|(_, output)| output).collect())
    }
}

/// Spawned unit that is aborted when dropped.
///
/// A failed map drops the in-flight units, which stops their remote calls.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}
