//! Client for applications sitting behind the security perimeter.
//!
//! Handles the double-submit dance: fetch a token once, then send it both
//! as the CSRF cookie and as the CSRF header on every mutating call.

use std::sync::Mutex;

use reqwest::header::{CONTENT_TYPE, COOKIE, ORIGIN};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_COOKIE: &str = "session-token";
pub const DEFAULT_CSRF_COOKIE: &str = "csrf-token";
pub const DEFAULT_CSRF_HEADER: &str = "x-csrf-token";
pub const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("perimeter returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Body of a 422 upload response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineNotice {
    pub error: String,
    pub quarantine_id: String,
    pub reason_code: String,
}

/// Body of a 201 upload response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub filename: String,
    pub stored_name: String,
    pub pathname: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Stored(StoredUpload),
    Quarantined(QuarantineNotice),
}

pub struct PerimeterClient {
    client: Client,
    base_url: String,
    origin: String,
    session: Option<String>,
    session_cookie: String,
    csrf_cookie: String,
    csrf_header: String,
    csrf_token: Mutex<Option<String>>,
}

impl PerimeterClient {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            origin: base_url.clone(),
            base_url,
            session: None,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            csrf_token: Mutex::new(None),
        }
    }

    /// Attach a signed session token.
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    /// Origin header to send; defaults to the base url.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_cookie_names(
        mut self,
        session_cookie: impl Into<String>,
        csrf_cookie: impl Into<String>,
        csrf_header: impl Into<String>,
    ) -> Self {
        self.session_cookie = session_cookie.into();
        self.csrf_cookie = csrf_cookie.into();
        self.csrf_header = csrf_header.into();
        self
    }

    /// Current CSRF token, fetched from `/api/csrf` on first use.
    pub async fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let resp = self
            .with_cookies(self.client.get(self.url("/api/csrf")), None)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let TokenResponse { token } = resp.json().await?;

        if let Ok(mut slot) = self.csrf_token.lock() {
            *slot = Some(token.clone());
        }
        Ok(token)
    }

    /// Forget the cached token, e.g. after the server rotated it.
    pub fn reset_csrf(&self) {
        if let Ok(mut slot) = self.csrf_token.lock() {
            *slot = None;
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        Ok(self
            .with_cookies(self.client.get(self.url(path)), None)
            .send()
            .await?)
    }

    /// POST a JSON body with the CSRF cookie, header and origin attached.
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let request = self.protected(self.client.post(self.url(path))).await?;
        Ok(request.json(body).send().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        let request = self.protected(self.client.delete(self.url(path))).await?;
        Ok(request.send().await?)
    }

    /// Upload raw bytes. Non-2xx answers other than 422 are errors.
    pub async fn upload(&self, filename: &str, content_type: &str, bytes: Vec<u8>) -> Result<UploadOutcome> {
        let request = self.protected(self.client.post(self.url("/api/uploads"))).await?;
        let resp = request
            .header(FILE_NAME_HEADER, filename)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(UploadOutcome::Quarantined(resp.json().await?));
        }
        let resp = ensure_success(resp).await?;
        Ok(UploadOutcome::Stored(resp.json().await?))
    }

    async fn protected(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.csrf_token().await?;
        Ok(self
            .with_cookies(request, Some(&token))
            .header(self.csrf_header.as_str(), token.as_str())
            .header(ORIGIN, self.origin.as_str()))
    }

    fn with_cookies(&self, request: RequestBuilder, csrf: Option<&str>) -> RequestBuilder {
        let mut pairs = Vec::new();
        if let Some(session) = &self.session {
            pairs.push(format!("{}={}", self.session_cookie, session));
        }
        if let Some(token) = csrf {
            pairs.push(format!("{}={}", self.csrf_cookie, token));
        }
        if pairs.is_empty() {
            request
        } else {
            request.header(COOKIE, pairs.join("; "))
        }
    }

    fn cached_token(&self) -> Option<String> {
        self.csrf_token.lock().ok().and_then(|slot| slot.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SdkError::Status { status, body })
}
