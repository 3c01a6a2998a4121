//! Shared `reqwest::Client` construction for source connectors.

use std::time::Duration;

/// Connection and timeout limits. Most source APIs publish a concurrent
/// request ceiling; undershoot it so a single tenant's backfill never trips
/// the vendor's own limiter.
#[derive(Debug, Clone, Copy)]
pub struct ClientLimits {
    pub max_idle_per_host: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self {
            max_idle_per_host: 15,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// Build a `reqwest::Client` pinned to `base_url`'s host pool with the given
/// limits and a default `Authorization: Bearer <token>` header when a token
/// is supplied.
pub fn build_http_client(
    limits: ClientLimits,
    bearer_token: Option<&str>,
) -> reqwest::Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    if let Some(token) = bearer_token {
        let value = format!("Bearer {token}");
        let mut header_value = reqwest::header::HeaderValue::from_str(&value)
            .expect("bearer token must be a valid header value");
        header_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, header_value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .pool_max_idle_per_host(limits.max_idle_per_host)
        .connect_timeout(limits.connect_timeout)
        .timeout(limits.read_timeout)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_bearer_token_and_json_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer shh"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = build_http_client(ClientLimits::default(), Some("shh")).unwrap();
        let resp = client.get(format!("{}/me", server.uri())).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn omits_authorization_header_when_no_token_given() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = build_http_client(ClientLimits::default(), None).unwrap();
        let resp = client.get(format!("{}/me", server.uri())).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }
}
