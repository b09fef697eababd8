//! Shared JSON-over-HTTP plumbing

use reqwest::{Client, RequestBuilder};
use sdcadm_core::{ApiErrorBody, ClientError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Longest response excerpt quoted in an error
const MAX_EXCERPT: usize = 200;

/// One collaborator endpoint
#[derive(Debug, Clone)]
pub(crate) struct HttpApi {
    name: &'static str,
    base: String,
    http: Client,
}

impl HttpApi {
    pub(crate) fn new(
        name: &'static str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sdcadm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build {name} client: {e}")))?;
        Ok(Self {
            name,
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(api = self.name, %url, "GET");
        self.send(self.http.get(url).query(query)).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(api = self.name, %url, "POST");
        self.send(self.http.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;
        decode_response(status, &body)
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Transport(format!("request timed out: {err}"))
    } else {
        ClientError::Transport(err.to_string())
    }
}

/// Decode a success body into `T`, anything else into an error
pub(crate) fn decode_response<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<T, ClientError> {
    if (200..300).contains(&status) {
        serde_json::from_slice(body)
            .map_err(|e| ClientError::InvalidResponse(format!("HTTP {status}: {e}")))
    } else {
        Err(decode_error(status, body))
    }
}

/// Error bodies must carry a message; anything else is unusable
pub(crate) fn decode_error(status: u16, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(body) => ClientError::Api { status, body },
        Err(_) => ClientError::InvalidResponse(format!("HTTP {status}: {}", excerpt(body))),
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty body".to_string();
    }
    match text.char_indices().nth(MAX_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        ok: bool,
    }

    #[test]
    fn joins_paths_without_double_slashes() {
        let api = HttpApi::new("cnapi", "http://cnapi.example/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.url("/servers/abc"), "http://cnapi.example/servers/abc");
        assert_eq!(api.url("tasks/1"), "http://cnapi.example/tasks/1");
    }

    #[test]
    fn decodes_success_body() {
        let ping: Ping = decode_response(200, br#"{"ok": true}"#).unwrap();
        assert_eq!(ping, Ping { ok: true });
    }

    #[test]
    fn malformed_success_body_is_invalid_response() {
        let err = decode_response::<Ping>(200, b"<html>").unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)), "{err:?}");
    }

    #[test]
    fn structured_error_body_is_api_error() {
        let body = br#"{
            "code": "InvalidParameters",
            "message": "Invalid parameters",
            "errors": [{"field": "image_uuid", "code": "Invalid", "message": "not a UUID"}]
        }"#;
        let ClientError::Api { status, body } = decode_error(409, body) else {
            panic!("expected an API error");
        };
        assert_eq!(status, 409);
        assert_eq!(body.code.as_deref(), Some("InvalidParameters"));
        assert_eq!(body.errors[0].field, "image_uuid");
    }

    #[test]
    fn error_body_without_message_is_invalid_response() {
        let err = decode_error(500, br#"{"code": "InternalError"}"#);
        assert!(
            matches!(err, ClientError::InvalidResponse(ref m) if m.starts_with("HTTP 500")),
            "{err:?}"
        );
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        let err = decode_error(502, long.as_bytes());
        let ClientError::InvalidResponse(message) = err else {
            panic!("expected invalid response");
        };
        assert!(message.ends_with("..."));
        assert!(message.len() < 220);
        assert_eq!(
            decode_error(503, b""),
            ClientError::InvalidResponse("HTTP 503: empty body".into())
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let api = HttpApi::new("cnapi", "http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = api.get::<Ping>("/ping", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
    }
}
