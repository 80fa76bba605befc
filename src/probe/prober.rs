// Package probe provides the HTTP prober.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::{Method, Request, Uri};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::http::client::HyperClient;
use crate::registry::ProbeOutcome;

use super::report::classify_body;

/// Prober performs one bounded health check against one endpoint.
///
/// Implementations must never panic and never block beyond their timeout
/// budget; every failure mode maps to [`ProbeOutcome::Failed`].
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, health_path: &str) -> ProbeOutcome;
}

/// HTTP GET prober against `address + health_path`.
pub struct HttpProber {
    client: HyperClient,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(client: HyperClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch(&self, uri: Uri) -> Result<(u16, Bytes), anyhow::Error> {
        let empty: BoxBody<Bytes, hyper::Error> = Empty::<Bytes>::new()
            .map_err(|never: std::convert::Infallible| match never {})
            .boxed();

        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(hyper::header::ACCEPT, "application/json")
            .body(empty)?;

        let response = self.client.request(req).await?;
        let status = response.status().as_u16();
        let body = response.into_body().collect().await?.to_bytes();
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, address: &str, health_path: &str) -> ProbeOutcome {
        let raw = format!("{}{}", address.trim_end_matches('/'), health_path);
        let uri: Uri = match raw.parse() {
            Ok(u) => u,
            Err(e) => {
                debug!(
                    component = "probe",
                    event = "bad_probe_url",
                    url = %raw,
                    error = %e,
                    "health check url failed to parse"
                );
                return ProbeOutcome::Failed;
            }
        };

        // The whole exchange (connect, request, body) shares one timeout
        // budget, strictly below the probe interval so probes never overlap.
        match timeout(self.timeout, self.fetch(uri)).await {
            Ok(Ok((status, body))) => {
                if !(200..300).contains(&status) {
                    return ProbeOutcome::Failed;
                }
                classify_body(&body)
            }
            Ok(Err(e)) => {
                debug!(
                    component = "probe",
                    event = "probe_request_failed",
                    url = %raw,
                    error = %e,
                    "health check request failed"
                );
                ProbeOutcome::Failed
            }
            Err(_) => {
                debug!(
                    component = "probe",
                    event = "probe_timeout",
                    url = %raw,
                    timeout = %humantime::format_duration(self.timeout),
                    "health check timed out"
                );
                ProbeOutcome::Failed
            }
        }
    }
}
