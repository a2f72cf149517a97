//! Fitness platform API client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mantra_core::{Clock, ExternalSource, NewExercise, SourceError, SystemClock};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::session::{Session, SessionMapping};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const SESSIONS_PATH: &str = "/v1/exercise-sessions";

/// Errors building an [`HttpSource`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The provided API token was invalid.
    #[error("invalid API token: {reason}")]
    InvalidToken { reason: &'static str },
    /// The base URL is not an http(s) URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Reads exercise sessions from a platform's HTTP API.
///
/// # Thread Safety
///
/// The source is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    endpoint: String,
    api_token: String,
    mapping: SessionMapping,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSource")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"[REDACTED]")
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

impl HttpSource {
    /// Creates a source for the API at `base_url`, authenticated with `api_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or whitespace-only, if the base
    /// URL is not http(s), or if the HTTP client fails to build.
    pub fn new(base_url: &str, api_token: impl Into<String>) -> Result<Self, ClientError> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(ClientError::InvalidToken {
                reason: "API token cannot be empty",
            });
        }
        if api_token.trim().is_empty() {
            return Err(ClientError::InvalidToken {
                reason: "API token cannot be whitespace-only",
            });
        }
        let base_url = base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(ClientError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint: format!("{}{SESSIONS_PATH}", base_url.trim_end_matches('/')),
            api_token,
            mapping: SessionMapping::default(),
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: SessionMapping) -> Self {
        self.mapping = mapping;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_sessions(&self) -> Result<Vec<Session>, SourceError> {
        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if let Some(err) = status_error(status, &body) {
            return Err(err);
        }
        parse_sessions(&body)
    }
}

impl ExternalSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<NewExercise>, SourceError> {
        let sessions = self.fetch_sessions().await?;
        let received = sessions.len();
        let candidates = self.mapping.map_all(sessions, self.clock.now());
        tracing::debug!(
            endpoint = %self.endpoint,
            received,
            mapped = candidates.len(),
            "fetched exercise sessions"
        );
        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    sessions: Vec<Session>,
}

fn parse_sessions(body: &str) -> Result<Vec<Session>, SourceError> {
    serde_json::from_str::<SessionsResponse>(body)
        .map(|payload| payload.sessions)
        .map_err(|err| SourceError::InvalidPayload(err.to_string()))
}

fn status_error(status: StatusCode, body: &str) -> Option<SourceError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized,
        _ => SourceError::Unavailable {
            reason: format!("status {status}: {}", body.trim()),
        },
    })
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_decode() {
        return SourceError::InvalidPayload(err.to_string());
    }
    SourceError::Unavailable {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use mantra_core::{ExerciseSource, FixedClock};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0_u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 20, 18, 0, 0).unwrap()
    }

    #[test]
    fn source_rejects_empty_token() {
        assert!(matches!(
            HttpSource::new("https://fit.example", ""),
            Err(ClientError::InvalidToken { .. })
        ));
    }

    #[test]
    fn source_rejects_whitespace_token() {
        assert!(matches!(
            HttpSource::new("https://fit.example", "   "),
            Err(ClientError::InvalidToken { .. })
        ));
    }

    #[test]
    fn source_rejects_non_http_base_url() {
        assert!(matches!(
            HttpSource::new("ftp://fit.example", "token"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let source = HttpSource::new("https://fit.example/", "token").unwrap();
        assert_eq!(source.endpoint(), "https://fit.example/v1/exercise-sessions");
    }

    #[test]
    fn source_debug_redacts_token() {
        let source = HttpSource::new("https://fit.example", "secret-token").unwrap();
        let debug = format!("{source:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn status_errors_are_classified() {
        assert_eq!(status_error(StatusCode::OK, ""), None);
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            Some(SourceError::Unauthorized)
        );
        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "no scope"),
            Some(SourceError::Unauthorized)
        );
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "maintenance"),
            Some(SourceError::Unavailable { reason }) if reason.contains("maintenance")
        ));
    }

    #[test]
    fn parse_sessions_rejects_invalid_json() {
        assert!(matches!(
            parse_sessions("not-json"),
            Err(SourceError::InvalidPayload(_))
        ));
        assert!(parse_sessions(r#"{"sessions":[]}"#).unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_maps_sessions_from_server() {
        let base = serve_once(
            "200 OK",
            r#"{"sessions":[
                {"title":"Ride","start_time":"2030-05-20T16:00:00Z","end_time":"2030-05-20T17:00:00Z","calories":500},
                {"start_time":"2030-05-20T17:00:00Z","end_time":"2030-05-20T17:20:00Z","source":"samsung_health"},
                {"title":"Old","start_time":"2030-05-18T08:00:00Z","end_time":"2030-05-18T09:00:00Z"}
            ]}"#,
        )
        .await;
        let source = HttpSource::new(&base, "token")
            .unwrap()
            .with_clock(FixedClock::new(now()));

        let candidates = source.fetch().await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Ride");
        assert_eq!(candidates[0].duration_minutes, 60);
        assert_eq!(candidates[0].source, ExerciseSource::GoogleHealth);
        assert_eq!(candidates[1].name, "Exercise");
        assert_eq!(candidates[1].calories, 100);
        assert_eq!(candidates[1].source, ExerciseSource::SamsungHealth);
    }

    #[tokio::test]
    async fn fetch_reports_unauthorized() {
        let base = serve_once("401 Unauthorized", r#"{"error":"token revoked"}"#).await;
        let source = HttpSource::new(&base, "token").unwrap();
        assert_eq!(source.fetch().await, Err(SourceError::Unauthorized));
    }

    #[tokio::test]
    async fn fetch_reports_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSource::new(&format!("http://{addr}"), "token").unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(SourceError::Unavailable { .. })
        ));
    }
}
