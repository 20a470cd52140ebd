//! Parallel request execution
//!
//! Fires a batch of GETs at one endpoint through a bounded worker pool.

#![allow(dead_code)]

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::benchmark::{Metrics, MetricsCollector};
use crate::http::{HttpClient, HttpError, HttpRequest};
use crate::results::ResultAggregator;

/// Result of one request in a batch
#[derive(Clone, Debug, Serialize)]
pub struct RequestOutcome {
    pub index: usize,
    pub status_code: Option<u16>,
    /// Seconds from send to full body, or to the error
    pub elapsed: f64,
    pub error: Option<String>,
    pub timed_out: bool,
    pub connection_failed: bool,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.status_code == Some(200)
    }
}

/// Bounded worker pool for concurrent requests
pub struct ParallelExecutor {
    max_workers: usize,
}

impl ParallelExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Fire `count` GETs at `path`, at most `max_workers` in flight.
    ///
    /// Every outcome is recorded in `results` when given. Outcomes come back
    /// in request order.
    pub async fn fire(
        &self,
        client: &HttpClient,
        path: &str,
        token: Option<&str>,
        count: usize,
        results: Option<&ResultAggregator>,
    ) -> Vec<RequestOutcome> {
        info!(
            "Firing {} requests at {} ({} workers)",
            count, path, self.max_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut handles = Vec::with_capacity(count);

        for index in 0..count {
            let semaphore = semaphore.clone();
            let client = client.clone();
            let path = path.to_string();
            let token = token.map(str::to_string);
            let results = results.cloned();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return RequestOutcome {
                        index,
                        status_code: None,
                        elapsed: 0.0,
                        error: Some("worker pool closed".to_string()),
                        timed_out: false,
                        connection_failed: false,
                    };
                };

                let mut request = HttpRequest::get(path.as_str());
                if let Some(token) = &token {
                    request = request.bearer(token);
                }

                let start = Instant::now();
                let outcome = match client.send(request).await {
                    Ok(response) => RequestOutcome {
                        index,
                        status_code: Some(response.status_code),
                        elapsed: response.elapsed_secs(),
                        error: None,
                        timed_out: false,
                        connection_failed: false,
                    },
                    Err(e) => RequestOutcome {
                        index,
                        status_code: None,
                        elapsed: start.elapsed().as_secs_f64(),
                        timed_out: HttpError::is_timeout(&e),
                        connection_failed: HttpError::is_connection(&e),
                        error: Some(e.to_string()),
                    },
                };

                if let Some(results) = &results {
                    match outcome.status_code {
                        Some(status) => results.record_response(&path, status, outcome.elapsed),
                        None => results.record_error(&path),
                    }
                }

                debug!(
                    "Request #{} to {}: {:?} ({:.3}s)",
                    index + 1,
                    path,
                    outcome.status_code,
                    outcome.elapsed
                );
                outcome
            });

            handles.push(handle);
        }

        collect_outcomes(join_all(handles).await, path, results)
    }

    /// Fold a batch into metrics; latency samples come from 200s only
    pub fn metrics(outcomes: &[RequestOutcome]) -> Metrics {
        let mut collector = MetricsCollector::new();
        for outcome in outcomes {
            match outcome.status_code {
                Some(status) => collector.record_response(status, outcome.elapsed),
                None => collector.record_error(outcome.timed_out, outcome.connection_failed),
            }
        }
        collector.finalize()
    }
}

/// Joined tasks in request order; a task that died becomes an error outcome
fn collect_outcomes(
    joined: Vec<Result<RequestOutcome, JoinError>>,
    path: &str,
    results: Option<&ResultAggregator>,
) -> Vec<RequestOutcome> {
    let mut outcomes: Vec<RequestOutcome> = joined
        .into_iter()
        .enumerate()
        .map(|(index, joined)| match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Request #{} to {} did not complete: {}", index + 1, path, e);
                if let Some(results) = results {
                    results.record_error(path);
                }
                RequestOutcome {
                    index,
                    status_code: None,
                    elapsed: 0.0,
                    error: Some(format!("request task failed: {e}")),
                    timed_out: false,
                    connection_failed: false,
                }
            }
        })
        .collect();
    outcomes.sort_by_key(|o| o.index);
    outcomes
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(5)
    }
}
