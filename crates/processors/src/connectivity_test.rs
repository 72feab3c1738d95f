//! Connectivity test: bare TCP reachability with a bounded timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;

use netops_queue::{JobContext, JobPayload, Processor, ProcessorError, queue_names};

/// Upper bound regardless of what the payload asks for.
const MAX_TIMEOUT_MS: u64 = 30_000;

pub struct ConnectivityTestProcessor;

#[async_trait]
impl Processor for ConnectivityTestProcessor {
    fn queue(&self) -> &'static str {
        queue_names::CONNECTIVITY_TEST
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::ConnectivityTest {
            host,
            port,
            timeout_ms,
            ..
        } = payload
        else {
            return Err(ProcessorError::validation("expected connectivity-test payload"));
        };
        if host.is_empty() {
            return Err(ProcessorError::validation("host must not be empty"));
        }

        let timeout = Duration::from_millis((*timeout_ms).clamp(1, MAX_TIMEOUT_MS));
        ctx.log(format!("connecting to {host}:{port}"));

        let started = Instant::now();
        let attempt = tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), *port))).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match attempt {
            Ok(Ok(_stream)) => Ok(serde_json::json!({
                "reachable": true,
                "latency_ms": latency_ms,
            })),
            Ok(Err(err)) => Err(ProcessorError::transient(format!(
                "connect to {host}:{port} failed: {err}"
            ))),
            Err(_) => Err(ProcessorError::transient(format!(
                "connect to {host}:{port} timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ctx_for;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reports_latency_for_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let payload = JobPayload::ConnectivityTest {
            device_id: None,
            host: "127.0.0.1".into(),
            port,
            timeout_ms: 1_000,
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = ConnectivityTestProcessor.process(&ctx, &payload).await.unwrap();
        assert_eq!(result["reachable"], true);
        assert!(result["latency_ms"].is_u64());
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        // Bind then drop to get a port that refuses.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let payload = JobPayload::ConnectivityTest {
            device_id: None,
            host: "127.0.0.1".into(),
            port,
            timeout_ms: 1_000,
        };
        let (ctx, _service) = ctx_for(&payload);
        let err = ConnectivityTestProcessor.process(&ctx, &payload).await.unwrap_err();
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn empty_host_is_a_validation_error() {
        let payload = JobPayload::ConnectivityTest {
            device_id: None,
            host: String::new(),
            port: 22,
            timeout_ms: 1_000,
        };
        let (ctx, _service) = ctx_for(&payload);
        let err = ConnectivityTestProcessor.process(&ctx, &payload).await.unwrap_err();
        assert!(!err.is_retriable());
    }
}
