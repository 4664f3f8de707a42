use std::io::ErrorKind;
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::warn;

use super::{ProbeFailure, ProbeOutcome};
use crate::models::Target;

/// Turns a probe address into `host:port`.
///
/// A missing scheme is treated as `https://`; a missing port defaults from the scheme.
pub fn resolve_endpoint(address: &str) -> Result<String, ProbeFailure> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ProbeFailure::InvalidAddress("empty address".to_string()));
    }
    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{address}")
    };
    let url = reqwest::Url::parse(&with_scheme)
        .map_err(|e| ProbeFailure::InvalidAddress(format!("{address}: {e}")))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProbeFailure::InvalidAddress(format!("{address}: missing host")))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "https" { 443 } else { 80 });
    Ok(format!("{host}:{port}"))
}

/// Whether a connect error means the endpoint is unreachable.
fn is_unreachable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
    )
}

pub async fn check(target: &Target) -> ProbeOutcome {
    let started = Instant::now();
    let timeout = target.timeout();

    let endpoint = match resolve_endpoint(&target.url) {
        Ok(endpoint) => endpoint,
        Err(failure) => return ProbeOutcome::down(started, 0, failure),
    };

    let connect = async {
        let addrs: Vec<_> = tokio::net::lookup_host(&endpoint)
            .await
            .map_err(|e| ProbeFailure::ConnectionFailed(format!("cannot resolve {endpoint}: {e}")))?
            .collect();
        if addrs.is_empty() {
            return Err(ProbeFailure::ConnectionFailed(format!("no addresses for {endpoint}")));
        }
        match TcpStream::connect(&addrs[..]).await {
            Ok(_stream) => Ok(()),
            Err(e) if is_unreachable(e.kind()) => Err(ProbeFailure::ConnectionFailed(e.to_string())),
            Err(e) => {
                // Only reachability matters here; anything past the refusal class counts as up.
                warn!(monitor_id = %target.id, endpoint = %endpoint, error = %e, "TCP connect returned a non-refusal error; treating as reachable.");
                Ok(())
            }
        }
    };

    match tokio::time::timeout(timeout, connect).await {
        Ok(result) => ProbeOutcome::from_result(started, 0, result),
        Err(_) => ProbeOutcome::down(started, 0, ProbeFailure::Timeout(timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckStatus, ProbeKind};
    use chrono::Utc;
    use tokio::net::TcpListener;

    fn tcp_target(url: String) -> Target {
        Target {
            id: "t1".to_string(),
            name: "db".to_string(),
            url,
            probe: ProbeKind::Tcp,
            check_interval: 1,
            check_interval_max: None,
            check_timeout: 2,
            webhook: None,
            notify_chat_id: None,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_endpoint_defaults() {
        assert_eq!(resolve_endpoint("example.com").unwrap(), "example.com:443");
        assert_eq!(resolve_endpoint("http://example.com/path").unwrap(), "example.com:80");
        assert_eq!(resolve_endpoint("db.internal:5432").unwrap(), "db.internal:5432");
        assert_eq!(resolve_endpoint("https://[::1]:8443").unwrap(), "[::1]:8443");
        assert!(matches!(resolve_endpoint("  "), Err(ProbeFailure::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_open_port_is_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let outcome = check(&tcp_target(format!("http://{addr}"))).await;
        assert_eq!(outcome.status, CheckStatus::Up);
        assert_eq!(outcome.status_code, 0);
    }

    #[tokio::test]
    async fn test_refused_port_is_down() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let outcome = check(&tcp_target(format!("http://{addr}"))).await;
        assert_eq!(outcome.status, CheckStatus::Down);
        assert!(matches!(outcome.failure, Some(ProbeFailure::ConnectionFailed(_))));
    }
}
