#![doc = "RemoteStore implementation backed by Supabase: GoTrue for auth, PostgREST for the `files` table."]
//
//! # Supabase client (CLI <-> Core)
//!
//! This module wires the [`RemoteStore`] contract from `northbase-core` to the
//! hosted backend. It is the only place that knows about URLs, headers and
//! response shapes.
//!
//! - Auth: `POST /auth/v1/token?grant_type=password|refresh_token`,
//!   `GET /auth/v1/user` to check an access token, `POST /auth/v1/logout`.
//! - Records: the `files` table (`path`, `content`, `updated_at`) through
//!   `/rest/v1/files`.
//!
//! The client carries the access token applied by `apply_session` and sends
//! it as the bearer on every record request; until then the publishable key
//! is used.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use northbase_core::contract::{Marker, RemoteEntry, RemoteFile, RemoteStore, Session, UserIdentity};
use northbase_core::session::now_epoch_seconds;
use northbase_core::RemoteError;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

pub const SUPABASE_URL: &str = "https://ivxgpjracfctkkdhlwgm.supabase.co";
pub const SUPABASE_KEY: &str = "sb_publishable_LZkkAwsx9q5KgIAeoZAO_A_U88rfFHL";

const FILES_TABLE: &str = "files";

/// Rows per listing request; PostgREST caps responses at `max-rows` (1000 by default).
const PAGE_SIZE: usize = 1000;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<UserIdentity>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => now_epoch_seconds() + secs,
            (None, None) => 0,
        };
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
        .normalized()
    }
}

/// GoTrue and PostgREST error bodies use different keys; take whichever is there.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ErrorBody {
    fn parse(status: StatusCode, text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| ErrorBody {
            message: Some(format!("HTTP {status}: {text}")),
            ..Default::default()
        })
    }

    fn describe(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }

    /// The refresh token itself was refused.
    fn is_invalid_grant(&self) -> bool {
        let code = self
            .error_code
            .as_deref()
            .or(self.error.as_deref())
            .or_else(|| self.code.as_ref().and_then(|c| c.as_str()))
            .unwrap_or_default();
        matches!(
            code,
            "invalid_grant" | "refresh_token_not_found" | "refresh_token_already_used" | "session_not_found"
        )
    }
}

#[derive(Debug, Deserialize)]
struct MarkerRow {
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentRow {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListRow {
    path: String,
    #[serde(default)]
    updated_at: Option<String>,
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!(%base_url, "Initialized SupabaseClient");
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            access_token: RwLock::new(None),
        }
    }

    /// Client for the northbase project.
    pub fn hosted() -> Self {
        Self::new(SUPABASE_URL, SUPABASE_KEY)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Response, RemoteError> {
        self.http
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)
    }

    async fn decode_session(response: Response) -> Result<Session, RemoteError> {
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(token.into_session())
    }

    /// Read an error response body into a description.
    async fn failure(response: Response) -> (StatusCode, ErrorBody) {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        (status, ErrorBody::parse(status, &text))
    }

    async fn store_error(response: Response) -> RemoteError {
        let (status, body) = Self::failure(response).await;
        tracing::error!(%status, error = %body.describe(), "Store request failed");
        if status.is_server_error() {
            RemoteError::Transport(body.describe())
        } else {
            RemoteError::Store(body.describe())
        }
    }

    async fn select_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        columns: &str,
    ) -> Result<Vec<T>, RemoteError> {
        let response = self
            .authed(self.http.get(self.url(&format!("/rest/v1/{FILES_TABLE}"))))
            .query(&[
                ("select", columns.to_string()),
                ("path", format!("eq.{path}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::store_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// One page of `path,updated_at` rows in path order.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ListRow>, RemoteError> {
        let mut query = vec![
            ("select", "path,updated_at".to_string()),
            ("order", "path.asc".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(prefix) = prefix {
            query.push(("path", format!("like.{prefix}*")));
        }
        let response = self
            .authed(self.http.get(self.url(&format!("/rest/v1/{FILES_TABLE}"))))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::store_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Fetch `page_size` rows at a time from `fetch(offset, limit)` until a page
/// comes back short, and concatenate the pages.
async fn collect_pages<T, F, Fut>(page_size: usize, mut fetch: F) -> Result<Vec<T>, RemoteError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, RemoteError>>,
{
    let mut rows = Vec::new();
    loop {
        let page = fetch(rows.len(), page_size).await?;
        let last = page.len() < page_size;
        rows.extend(page);
        if last {
            return Ok(rows);
        }
    }
}

/// Keep rows under `prefix` that carry a marker.
fn entries_from_rows(rows: Vec<ListRow>, prefix: Option<&str>) -> Vec<RemoteEntry> {
    rows.into_iter()
        // `like` treats `_` and `%` as wildcards.
        .filter(|row| prefix.map_or(true, |p| row.path.starts_with(p)))
        .filter_map(|row| match row.updated_at {
            Some(marker) => Some(RemoteEntry {
                path: row.path,
                marker: Marker(marker),
            }),
            None => {
                tracing::warn!(path = %row.path, "row without updated_at skipped");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        tracing::info!(email, "Signing in with password");
        let response = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?;
        if !response.status().is_success() {
            let (status, body) = Self::failure(response).await;
            tracing::error!(%status, error = %body.describe(), "Sign-in rejected");
            return Err(if status.is_server_error() {
                RemoteError::Transport(body.describe())
            } else {
                RemoteError::Auth(body.describe())
            });
        }
        Self::decode_session(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, RemoteError> {
        let response = self
            .token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        if !response.status().is_success() {
            let (status, body) = Self::failure(response).await;
            tracing::warn!(%status, error = %body.describe(), "Refresh rejected");
            return Err(if body.is_invalid_grant() {
                RemoteError::InvalidGrant(body.describe())
            } else if status.is_server_error() {
                RemoteError::Transport(body.describe())
            } else {
                RemoteError::Auth(body.describe())
            });
        }
        Self::decode_session(response).await
    }

    async fn apply_session(&self, access_token: &str, _refresh_token: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .get(self.url("/auth/v1/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;
        match response.status() {
            s if s.is_success() => {
                *self
                    .access_token
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(access_token.to_string());
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let (_, body) = Self::failure(response).await;
                Err(RemoteError::InvalidSession(body.describe()))
            }
            _ => {
                let (status, body) = Self::failure(response).await;
                Err(if status.is_server_error() {
                    RemoteError::Transport(body.describe())
                } else {
                    RemoteError::InvalidSession(body.describe())
                })
            }
        }
    }

    async fn fetch_marker(&self, path: &str) -> Result<Option<Marker>, RemoteError> {
        let rows: Vec<MarkerRow> = self.select_rows(path, "updated_at").await?;
        Ok(rows.into_iter().next().and_then(|r| r.updated_at).map(Marker))
    }

    async fn fetch_content(&self, path: &str) -> Result<Option<RemoteFile>, RemoteError> {
        let rows: Vec<ContentRow> = self.select_rows(path, "content,updated_at").await?;
        Ok(rows.into_iter().next().map(|row| RemoteFile {
            content: row.content.unwrap_or_default().into_bytes(),
            marker: row.updated_at.map(Marker),
        }))
    }

    async fn upsert(&self, path: &str, content: &[u8]) -> Result<(), RemoteError> {
        // The `content` column is text.
        let text = std::str::from_utf8(content)
            .map_err(|e| RemoteError::Store(format!("content of {path} is not valid UTF-8: {e}")))?;
        let response = self
            .authed(self.http.post(self.url(&format!("/rest/v1/{FILES_TABLE}"))))
            .query(&[("on_conflict", "path")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&json!([{ "path": path, "content": text }]))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::store_error(response).await);
        }
        tracing::debug!(path, bytes = content.len(), "Upserted record");
        Ok(())
    }

    async fn list(&self, prefix: Option<String>) -> Result<Vec<RemoteEntry>, RemoteError> {
        let filter = prefix.as_deref();
        let rows = collect_pages(PAGE_SIZE, move |offset, limit| {
            self.list_page(filter, offset, limit)
        })
        .await?;
        tracing::debug!(rows = rows.len(), prefix = ?filter, "Listed records");

        Ok(entries_from_rows(rows, filter))
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        let response = self
            .authed(self.http.post(self.url("/auth/v1/logout")))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            let (_, body) = Self::failure(response).await;
            return Err(RemoteError::Auth(body.describe()));
        }
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
