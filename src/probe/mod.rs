//! Connectivity probe.
//!
//! One HTTP GET with its own timeout, no retries. By default the request
//! goes out directly and ignores proxy environment variables; with
//! [`ProbeRoute::LocalProxy`] it is sent through the verification client's
//! local HTTP inbound instead.

pub mod egress;
pub mod error;

pub use egress::EgressInfo;
pub use error::ProbeError;

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

/// How the probe request reaches the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeRoute {
    /// Straight from this host.
    Direct,
    /// Through an HTTP proxy at `url`.
    LocalProxy {
        /// Proxy URL, e.g. `http://127.0.0.1:10808`.
        url: String,
    },
}

impl ProbeRoute {
    /// Route through the client's HTTP inbound on `port`.
    pub fn local_port(port: u16) -> Self {
        ProbeRoute::LocalProxy {
            url: format!("http://127.0.0.1:{}", port),
        }
    }
}

/// A configured probe.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    client: reqwest::Client,
    timeout: Duration,
    route: ProbeRoute,
}

impl ConnectivityProbe {
    /// Build a probe with the given timeout and route.
    pub fn new(timeout: Duration, route: ProbeRoute) -> Result<Self, ProbeError> {
        let builder = reqwest::Client::builder()
            .user_agent(format!("proxy-verify/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);

        let builder = match &route {
            ProbeRoute::Direct => builder.no_proxy(),
            ProbeRoute::LocalProxy { url } => {
                builder.proxy(reqwest::Proxy::all(url).map_err(ProbeError::Client)?)
            }
        };

        let client = builder.build().map_err(ProbeError::Client)?;
        Ok(Self {
            client,
            timeout,
            route,
        })
    }

    /// The route this probe uses.
    pub fn route(&self) -> &ProbeRoute {
        &self.route
    }

    /// GET `url` and return the raw body.
    pub async fn probe(&self, url: &str) -> Result<Bytes, ProbeError> {
        debug!("Probing {} via {:?}", url, self.route);

        let response = self.client.get(url).send().await.map_err(|source| {
            if source.is_timeout() {
                ProbeError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }
            } else {
                ProbeError::Request {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| {
            if source.is_timeout() {
                ProbeError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }
            } else {
                ProbeError::Body {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        info!("Probe {} -> {} ({} bytes)", url, status.as_u16(), body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one connection, report its request head, answer with `response`.
    async fn serve_once(response: &'static str) -> (SocketAddr, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        (addr, rx)
    }

    const OK_JSON: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 22\r\nConnection: close\r\n\r\n{\"ip\":\"203.0.113.50\"}\n";

    #[tokio::test]
    async fn test_direct_probe_returns_body() {
        let (addr, _head) = serve_once(OK_JSON).await;
        let probe = ConnectivityProbe::new(Duration::from_secs(5), ProbeRoute::Direct).unwrap();

        let body = probe.probe(&format!("http://{}/json", addr)).await.unwrap();
        assert_eq!(&body[..], b"{\"ip\":\"203.0.113.50\"}\n");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (addr, _head) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let probe = ConnectivityProbe::new(Duration::from_secs(5), ProbeRoute::Direct).unwrap();

        let err = probe.probe(&format!("http://{}/", addr)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_unresponsive_target_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let probe =
            ConnectivityProbe::new(Duration::from_millis(200), ProbeRoute::Direct).unwrap();
        let err = probe.probe(&format!("http://{}/", addr)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }), "got {:?}", err);

        holder.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = ConnectivityProbe::new(Duration::from_secs(2), ProbeRoute::Direct).unwrap();
        let err = probe.probe(&format!("http://{}/", addr)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Request { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_local_proxy_route_sends_absolute_uri() {
        let (addr, head) = serve_once(OK_JSON).await;
        let route = ProbeRoute::LocalProxy {
            url: format!("http://{}", addr),
        };
        let probe = ConnectivityProbe::new(Duration::from_secs(5), route).unwrap();

        let body = probe.probe("http://ifconfig.example/json").await.unwrap();
        assert!(body.starts_with(b"{\"ip\""));

        let head = head.await.unwrap();
        assert!(
            head.starts_with("GET http://ifconfig.example/json HTTP/1.1"),
            "unexpected request head: {}",
            head
        );
    }

    #[test]
    fn test_local_port_route() {
        assert_eq!(
            ProbeRoute::local_port(10808),
            ProbeRoute::LocalProxy {
                url: "http://127.0.0.1:10808".to_string()
            }
        );
    }
}
