//! Hyper HTTP client configuration for outbound health probes.
//!
//! Probe traffic is many small periodic GETs against a fixed endpoint set,
//! so the pool keeps a handful of warm connections per host instead of a
//! highload-sized pool:
//! - Max idle connections per host: 4
//! - Max idle connection duration: 90s (outlives the default probe interval)
//! - Connection timeout: 3s
//! - TCP keep-alive: 30s, TCP_NODELAY enabled

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::dns::GaiResolver;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

pub const CONNS_PER_HOST: usize = 4;
pub const MAX_IDLE_CONN_DURATION: Duration = Duration::from_secs(90);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Creates the shared probe client.
///
/// HTTP/1.1 only: health endpoints are plain request/response and probes
/// never multiplex, so HTTP/2 buys nothing here.
pub fn create_client() -> HyperClient {
    let resolver = GaiResolver::new();

    let mut http_connector = HttpConnector::new_with_resolver(resolver);
    http_connector.set_nodelay(true);
    http_connector.set_keepalive(Some(Duration::from_secs(30)));
    http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

    let tls = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .expect("Failed to load native root certificates")
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(MAX_IDLE_CONN_DURATION)
        .pool_max_idle_per_host(CONNS_PER_HOST)
        .retry_canceled_requests(true)
        .build(tls)
}

pub type HyperClient =
    Client<HttpsConnector<HttpConnector<GaiResolver>>, BoxBody<Bytes, hyper::Error>>;
