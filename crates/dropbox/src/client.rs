use std::time::Duration;

use dropstep_protocol::constants::{API_ARG_HEADER, API_RESULT_HEADER, endpoint};
use dropstep_protocol::{
    CommitInfo, DownloadArg, FileMetadata, UploadSessionAppendArg, UploadSessionCursor,
    UploadSessionFinishArg, UploadSessionStartArg, UploadSessionStartResult, to_header_json,
};
use dropstep_transfer::{BackendError, BackendFactory, BoxFuture, Downloaded, StorageBackend};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::DropboxConfig;
use crate::error::{Error, classify_response, transport};

/// Dropbox content API client bound to one access token.
pub struct DropboxClient {
    http: reqwest::Client,
    base_url: String,
    auth: HeaderValue,
}

impl DropboxClient {
    /// Creates a client with its own connection pool.
    pub fn new(access_token: &str, config: &DropboxConfig) -> Result<Self, Error> {
        let http = build_http(config)?;
        Self::with_http(http, &config.content_url, access_token)
    }

    fn with_http(http: reqwest::Client, base_url: &str, access_token: &str) -> Result<Self, Error> {
        if access_token.trim().is_empty() {
            return Err(Error::InvalidToken);
        }
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| Error::InvalidToken)?;
        auth.set_sensitive(true);

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Performs a content-upload style call: argument in the header, raw
    /// bytes in the body.
    async fn content_call<A: Serialize>(
        &self,
        endpoint: &str,
        arg: &A,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, BackendError> {
        let arg = to_header_json(arg)
            .map_err(|e| BackendError::Rejected(format!("encode argument: {e}")))?;
        let url = format!("{}{}", self.base_url, endpoint);

        let mut req = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.auth.clone())
            .header(API_ARG_HEADER, arg);
        if let Some(body) = body {
            debug!(endpoint, bytes = body.len(), "dropbox request");
            req = req
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(body);
        } else {
            debug!(endpoint, "dropbox request");
        }

        let resp = req.send().await.map_err(|e| transport(&e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.unwrap_or_default();
        let err = classify_response(endpoint, status.as_u16(), retry_after.as_deref(), &body);
        debug!(endpoint, status = status.as_u16(), error = %err, "dropbox call failed");
        Err(err)
    }

    async fn json_result<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BackendError> {
        let bytes = resp.bytes().await.map_err(|e| transport(&e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Rejected(format!("malformed response: {e}")))
    }
}

fn build_http(config: &DropboxConfig) -> Result<reqwest::Client, Error> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?)
}

impl StorageBackend for DropboxClient {
    fn upload_whole<'a>(
        &'a self,
        commit: &'a CommitInfo,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileMetadata, BackendError>> {
        Box::pin(async move {
            let resp = self.content_call(endpoint::UPLOAD, commit, Some(data)).await?;
            Self::json_result(resp).await
        })
    }

    fn session_start(&self, data: Vec<u8>) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            let arg = UploadSessionStartArg { close: false };
            let resp = self
                .content_call(endpoint::UPLOAD_SESSION_START, &arg, Some(data))
                .await?;
            let result: UploadSessionStartResult = Self::json_result(resp).await?;
            Ok(result.session_id)
        })
    }

    fn session_append<'a>(
        &'a self,
        cursor: &'a UploadSessionCursor,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let arg = UploadSessionAppendArg {
                cursor: cursor.clone(),
                close: false,
            };
            self.content_call(endpoint::UPLOAD_SESSION_APPEND, &arg, Some(data))
                .await?;
            Ok(())
        })
    }

    fn session_finish<'a>(
        &'a self,
        cursor: &'a UploadSessionCursor,
        commit: &'a CommitInfo,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileMetadata, BackendError>> {
        Box::pin(async move {
            let arg = UploadSessionFinishArg {
                cursor: cursor.clone(),
                commit: commit.clone(),
            };
            let resp = self
                .content_call(endpoint::UPLOAD_SESSION_FINISH, &arg, Some(data))
                .await?;
            Self::json_result(resp).await
        })
    }

    fn download<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Downloaded, BackendError>> {
        Box::pin(async move {
            let arg = DownloadArg {
                path: path.to_string(),
            };
            let resp = self.content_call(endpoint::DOWNLOAD, &arg, None).await?;

            let header = resp
                .headers()
                .get(API_RESULT_HEADER)
                .ok_or_else(|| {
                    BackendError::Rejected(format!("download of {path} returned no metadata"))
                })?
                .as_bytes()
                .to_vec();
            let metadata: FileMetadata = serde_json::from_slice(&header)
                .map_err(|e| BackendError::Rejected(format!("malformed result header: {e}")))?;

            let data = resp.bytes().await.map_err(|e| transport(&e))?.to_vec();
            Ok(Downloaded { metadata, data })
        })
    }
}

/// Builds a [`DropboxClient`] per access token over one shared connection pool.
pub struct DropboxConnector {
    http: reqwest::Client,
    base_url: String,
}

impl DropboxConnector {
    pub fn new(config: &DropboxConfig) -> Result<Self, Error> {
        Ok(Self {
            http: build_http(config)?,
            base_url: config.content_url.clone(),
        })
    }
}

impl BackendFactory for DropboxConnector {
    fn connect(&self, access_token: &str) -> Result<Box<dyn StorageBackend>, BackendError> {
        let client = DropboxClient::with_http(self.http.clone(), &self.base_url, access_token)?;
        Ok(Box::new(client))
    }
}
