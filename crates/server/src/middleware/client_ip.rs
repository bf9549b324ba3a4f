//! Caller address extraction.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// The caller's address: the first `x-forwarded-for` hop, else the socket
/// peer, else unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_owned);

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(Self(ip))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> ClientIp {
        let (mut parts, ()) = request.into_parts();
        ClientIp::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_first_forwarded_hop() {
        let request = Request::builder()
            .header(FORWARDED_FOR_HEADER, "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, ClientIp(Some("203.0.113.7".to_owned())));
    }

    #[tokio::test]
    async fn test_socket_peer_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5123))));
        assert_eq!(extract(request).await, ClientIp(Some("192.0.2.4".to_owned())));
    }

    #[tokio::test]
    async fn test_unknown() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, ClientIp(None));
    }
}
