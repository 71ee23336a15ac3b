//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `points_earned_total` - Points issued through `earn`
//! - `points_spent_total` - Points consumed through `spend`
//! - `points_locked_total` - Points moved into collateral
//! - `points_unlocked_total` - Points released from collateral
//! - `points_operations_rejected_total{operation}` - Failed mutations
//! - `points_total_supply` - Cumulative issuance
//! - `points_accounts` - Number of balance entries
//!
//! [`Metrics::serve`] exposes the registry as `GET /metrics` in the Prometheus
//! text format.

use crate::types::{Operation, Points};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Metrics collector
///
/// Each instance owns its registry, so several ledgers (or tests) can
/// coexist in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Points issued
    pub earned_total: IntCounter,

    /// Points spent
    pub spent_total: IntCounter,

    /// Points locked
    pub locked_total: IntCounter,

    /// Points unlocked
    pub unlocked_total: IntCounter,

    /// Rejected mutations by operation
    pub rejected_total: IntCounterVec,

    /// Cumulative issuance
    pub total_supply: IntGauge,

    /// Balance entries
    pub accounts: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("earned_total", &self.earned_total.get())
            .field("total_supply", &self.total_supply.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let earned_total = IntCounter::new("points_earned_total", "Points issued through earn")?;
        registry.register(Box::new(earned_total.clone()))?;

        let spent_total = IntCounter::new("points_spent_total", "Points consumed through spend")?;
        registry.register(Box::new(spent_total.clone()))?;

        let locked_total = IntCounter::new("points_locked_total", "Points moved into collateral")?;
        registry.register(Box::new(locked_total.clone()))?;

        let unlocked_total =
            IntCounter::new("points_unlocked_total", "Points released from collateral")?;
        registry.register(Box::new(unlocked_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new(
                "points_operations_rejected_total",
                "Mutations rejected by the ledger",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let total_supply = IntGauge::new("points_total_supply", "Cumulative points issued")?;
        registry.register(Box::new(total_supply.clone()))?;

        let accounts = IntGauge::new("points_accounts", "Number of balance entries")?;
        registry.register(Box::new(accounts.clone()))?;

        Ok(Self {
            earned_total,
            spent_total,
            locked_total,
            unlocked_total,
            rejected_total,
            total_supply,
            accounts,
            registry,
        })
    }

    /// Record a committed mutation
    pub fn record_commit(&self, operation: Operation, amount: Points) {
        let counter = match operation {
            Operation::Earn => &self.earned_total,
            Operation::Spend => &self.spent_total,
            Operation::Lock => &self.locked_total,
            Operation::Unlock => &self.unlocked_total,
        };
        counter.inc_by(amount);
    }

    /// Record a rejected mutation
    pub fn record_rejection(&self, operation: Operation) {
        self.rejected_total
            .with_label_values(&[operation.as_str()])
            .inc();
    }

    /// Update ledger-wide gauges
    pub fn update_gauges(&self, total_supply: Points, accounts: usize) {
        self.total_supply
            .set(i64::try_from(total_supply).unwrap_or(i64::MAX));
        self.accounts.set(accounts as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the text exposition format
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Answer scrape requests on `listener` until accepting fails
    pub async fn serve(self, listener: TcpListener) -> crate::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Metrics exporter listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let metrics = self.clone();
            tokio::spawn(async move {
                if let Err(e) = metrics.respond(stream).await {
                    tracing::debug!(%peer, "Metrics request failed: {}", e);
                }
            });
        }
    }

    async fn respond(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let mut request = [0u8; 1024];
        let read = stream.read(&mut request).await?;
        let head = String::from_utf8_lossy(&request[..read]);

        let response = if head.starts_with("GET /metrics ") {
            match self.gather_text() {
                Ok(body) => http_response("200 OK", TEXT_CONTENT_TYPE, &body),
                Err(e) => {
                    http_response("500 Internal Server Error", "text/plain", &e.to_string())
                }
            }
        } else {
            http_response("404 Not Found", "text/plain", "not found\n")
        };

        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.earned_total.get(), 0);
        assert_eq!(metrics.total_supply.get(), 0);

        // Separate registries, no duplicate-registration error
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_record_commit() {
        let metrics = Metrics::new().unwrap();
        metrics.record_commit(Operation::Earn, 1000);
        metrics.record_commit(Operation::Spend, 400);
        metrics.record_commit(Operation::Earn, 1);

        assert_eq!(metrics.earned_total.get(), 1001);
        assert_eq!(metrics.spent_total.get(), 400);
        assert_eq!(metrics.locked_total.get(), 0);
    }

    #[test]
    fn test_record_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection(Operation::Spend);
        metrics.record_rejection(Operation::Spend);

        assert_eq!(
            metrics.rejected_total.with_label_values(&["spend"]).get(),
            2
        );
        assert_eq!(metrics.rejected_total.with_label_values(&["lock"]).get(), 0);
    }

    #[test]
    fn test_gather_text() {
        let metrics = Metrics::new().unwrap();
        metrics.update_gauges(u64::MAX, 3);
        assert_eq!(metrics.total_supply.get(), i64::MAX);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("points_accounts 3"));
    }

    async fn scrape(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serve_exposes_registry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_commit(Operation::Earn, 7);
        metrics.update_gauges(7, 1);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(metrics.clone().serve(listener));

        let response = scrape(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("points_earned_total 7"));
        assert!(response.contains("points_accounts 1"));

        // Counters recorded later show up on the next scrape
        metrics.record_commit(Operation::Earn, 3);
        assert!(scrape(addr, "/metrics").await.contains("points_earned_total 10"));

        let response = scrape(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));

        server.abort();
    }
}
