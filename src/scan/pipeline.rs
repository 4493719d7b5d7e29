//! Scan orchestration.
//!
//! ```text
//! request body
//!     → admission.rs (take a slot, wait if all are busy)
//!     → multipart.rs (locate the `file` part, unread)
//!     → engine.rs (drain into pooled buffer, run engine under deadline)
//!     → result.rs (verdict → ScanResult)
//!     → slot released when the token drops
//! ```
//!
//! Every stage draws on one request budget (`timeouts.request_secs`), so a
//! slow request fails here with a typed error and never outlives the server's
//! own request timeout.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::Stream;

use crate::config::ScanConfig;
use crate::observability::metrics;
use crate::scan::admission::{AdmissionLimiter, CapacityToken};
use crate::scan::engine::InspectionEngine;
use crate::scan::error::{BoxError, ScanError};
use crate::scan::multipart;
use crate::scan::pool::BufferPools;
use crate::scan::result::ScanResult;
use crate::scan::verdict::ScanVerdict;

/// Shared scan service. One instance serves every request.
#[derive(Debug)]
pub struct Scanner {
    limiter: AdmissionLimiter,
    engine: InspectionEngine,
    pools: BufferPools,
    scan_deadline: Duration,
    admission_wait: Option<Duration>,
    request_budget: Duration,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            limiter: AdmissionLimiter::new(config.limits.effective_concurrency()),
            engine: InspectionEngine::from_config(&config.engine),
            pools: BufferPools::new(&config.buffers),
            scan_deadline: Duration::from_secs(config.timeouts.scan_secs),
            admission_wait: config.limits.admission_timeout_secs.map(Duration::from_secs),
            request_budget: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    /// Override the engine deadline.
    pub fn with_scan_deadline(mut self, deadline: Duration) -> Self {
        self.scan_deadline = deadline;
        self
    }

    /// Scan the `file` part of a multipart body.
    pub async fn scan_multipart<S, O, E>(&self, payload: S, boundary: String) -> Result<ScanResult, ScanError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        let started = Instant::now();
        let outcome = async {
            let _token = self.admit(started).await?;
            let wait = self.remaining(started);
            let part = tokio::time::timeout(wait, multipart::extract(payload, boundary))
                .await
                .map_err(|_| ScanError::read_timeout(wait))??;
            let verdict = self.inspect(part.content, started).await;
            Ok::<_, ScanError>((part.filename, verdict?))
        }
        .await;

        self.finish(outcome, started)
    }

    /// Scan an already separated file stream.
    pub async fn scan_stream<S, E>(&self, filename: String, content: S) -> Result<ScanResult, ScanError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let started = Instant::now();
        let outcome = async {
            let _token = self.admit(started).await?;
            let verdict = self.inspect(content, started).await?;
            Ok::<_, ScanError>((filename, verdict))
        }
        .await;

        self.finish(outcome, started)
    }

    /// Serialize a result using the scratch pool.
    pub fn render(&self, result: &ScanResult) -> Bytes {
        result.to_json(&self.pools.scratch)
    }

    /// Time left of the request budget.
    fn remaining(&self, started: Instant) -> Duration {
        self.request_budget.saturating_sub(started.elapsed())
    }

    /// Wait for a slot, no longer than the admission limit or the budget left.
    async fn admit(&self, started: Instant) -> Result<CapacityToken, ScanError> {
        let budget = self.remaining(started);
        let wait = self.admission_wait.map_or(budget, |limit| limit.min(budget));
        Ok(self.limiter.acquire_within(wait).await?)
    }

    async fn inspect<S, E>(&self, content: S, started: Instant) -> Result<ScanVerdict, ScanError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let deadline = self.scan_deadline.min(self.remaining(started));
        self.engine
            .inspect(content, deadline, &self.pools.content)
            .await
    }

    fn finish(
        &self,
        outcome: Result<(String, ScanVerdict), ScanError>,
        started: Instant,
    ) -> Result<ScanResult, ScanError> {
        let elapsed = started.elapsed();
        match outcome {
            Ok((filename, verdict)) => {
                let result = ScanResult::new(&filename, &verdict, self.engine.label(), chrono::Utc::now());
                tracing::info!(
                    filename = %result.filename,
                    status = %result.status,
                    threat = %result.threat,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Scan completed"
                );
                metrics::record_scan(result.status.as_str(), elapsed);
                Ok(result)
            }
            Err(e) => {
                let kind = e.kind();
                if kind.is_client_error() {
                    tracing::warn!(error = %e, kind = kind.as_str(), "Scan rejected");
                } else {
                    tracing::error!(error = %e, kind = kind.as_str(), "Scan failed");
                }
                metrics::record_scan(kind.as_str(), elapsed);
                Err(e)
            }
        }
    }

    /// Engine label reported in results.
    pub fn engine_label(&self) -> &str {
        self.engine.label()
    }

    /// The admission gate, for status reporting.
    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }
}
