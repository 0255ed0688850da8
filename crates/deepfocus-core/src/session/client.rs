//! HTTP implementation of [`FocusApi`] over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::api::FocusApi;
use super::types::{CompleteSession, CompletedSession, FocusSession, RemoteStats, StartSession};
use crate::error::ApiError;
use crate::storage::ApiSettings;

pub struct HttpFocusApi {
    client: Client,
    base: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpFocusApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            token,
            timeout,
        })
    }

    /// `None` when no backend is configured.
    pub fn from_settings(api: &ApiSettings) -> Result<Option<Self>, ApiError> {
        let base_url = api.base_url.trim();
        if base_url.is_empty() {
            return Ok(None);
        }
        Self::new(
            base_url,
            api.token.clone(),
            Duration::from_secs(api.timeout_secs),
        )
        .map(Some)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "focus api request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                self.map_error(e)
            } else {
                ApiError::Decode(e.to_string())
            }
        })
    }

    fn map_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ApiError::Network(e)
        }
    }
}

#[async_trait]
impl FocusApi for HttpFocusApi {
    async fn start(&self, request: StartSession) -> Result<FocusSession, ApiError> {
        let url = self.endpoint(&["focus", "start"])?;
        self.send_json(self.request(Method::POST, url).json(&request))
            .await
    }

    async fn complete(
        &self,
        id: &str,
        completed_duration: u32,
    ) -> Result<CompletedSession, ApiError> {
        let url = self.endpoint(&["focus", id, "complete"])?;
        let body = CompleteSession { completed_duration };
        self.send_json(self.request(Method::PUT, url).json(&body))
            .await
    }

    async fn abandon(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["focus", id, "abandon"])?;
        self.send(self.request(Method::PUT, url)).await?;
        Ok(())
    }

    async fn history(&self) -> Result<Vec<FocusSession>, ApiError> {
        let url = self.endpoint(&["focus", "history"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn stats(&self) -> Result<RemoteStats, ApiError> {
        let url = self.endpoint(&["focus", "stats"])?;
        self.send_json(self.request(Method::GET, url)).await
    }
}
