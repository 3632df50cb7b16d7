//! Media control-plane port: live-stream provisioner, HLS packager and CDN
//! distribution management.
//!
//! The control plane only consumes identifiers and URLs; the media pipeline
//! itself runs in a separate service reached over JSON/HTTP.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::models::VideoConfig;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The resource no longer exists. Teardown treats this as success.
    #[error("media resource not found")]
    NotFound,
    #[error("media control failure: {0}")]
    Upstream(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    Creating,
    Idle,
    Starting,
    Running,
    Stopping,
    Deleting,
    Deleted,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveInput {
    pub input_id: String,
    pub ingest_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagerEndpoint {
    pub endpoint_id: String,
    pub playback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub distribution_id: String,
    pub origin_id: String,
    #[serde(default)]
    pub cache_behavior_ids: Vec<String>,
    pub domain_url: String,
}

/// Operations the lifecycle controller invokes against the media pipeline.
#[async_trait]
pub trait MediaControl: Send + Sync {
    async fn create_input_security_group(&self, event_id: &str) -> MediaResult<String>;
    async fn create_input(&self, event_id: &str, security_group_id: &str) -> MediaResult<LiveInput>;
    async fn create_live_channel(
        &self,
        event_id: &str,
        input_id: &str,
        config: &VideoConfig,
    ) -> MediaResult<String>;
    async fn describe_channel(&self, channel_id: &str) -> MediaResult<ChannelState>;
    async fn start_channel(&self, channel_id: &str) -> MediaResult<()>;
    async fn stop_channel(&self, channel_id: &str) -> MediaResult<()>;
    async fn delete_channel(&self, channel_id: &str) -> MediaResult<()>;
    async fn delete_input(&self, input_id: &str) -> MediaResult<()>;
    async fn delete_input_security_group(&self, group_id: &str) -> MediaResult<()>;

    async fn create_packager_channel(&self, event_id: &str) -> MediaResult<String>;
    async fn create_packager_endpoint(&self, channel_id: &str) -> MediaResult<PackagerEndpoint>;
    async fn delete_packager_endpoint(&self, endpoint_id: &str) -> MediaResult<()>;
    async fn delete_packager_channel(&self, channel_id: &str) -> MediaResult<()>;

    async fn create_distribution(
        &self,
        event_id: &str,
        packager_url: &str,
    ) -> MediaResult<Distribution>;
    /// Removes the cache behaviors whose path patterns fall under the prefix.
    async fn remove_cache_behaviors(
        &self,
        distribution_id: &str,
        path_prefix: &str,
    ) -> MediaResult<()>;
    async fn remove_origin(&self, distribution_id: &str, origin_id: &str) -> MediaResult<()>;
}

/// JSON/HTTP implementation against the media-control service.
pub struct HttpMediaControl {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMediaControl {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> MediaResult<reqwest::Response> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MediaError::NotFound);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Upstream(format!("{status}: {body}")));
        }
        Ok(response)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> MediaResult<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))
    }

    async fn post_empty(&self, path: &str) -> MediaResult<()> {
        let response = self
            .http
            .post(self.url(path))
            .send()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> MediaResult<()> {
        let response = self
            .http
            .delete(self.url(path))
            .send()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        Self::check(response).await.map(|_| ())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateResponse {
    state: ChannelState,
}

#[async_trait]
impl MediaControl for HttpMediaControl {
    async fn create_input_security_group(&self, event_id: &str) -> MediaResult<String> {
        let resp: IdResponse = self
            .post_json("/v1/input-security-groups", json!({ "eventId": event_id }))
            .await?;
        Ok(resp.id)
    }

    async fn create_input(&self, event_id: &str, security_group_id: &str) -> MediaResult<LiveInput> {
        self.post_json(
            "/v1/inputs",
            json!({ "eventId": event_id, "securityGroupId": security_group_id }),
        )
        .await
    }

    async fn create_live_channel(
        &self,
        event_id: &str,
        input_id: &str,
        config: &VideoConfig,
    ) -> MediaResult<String> {
        let resp: IdResponse = self
            .post_json(
                "/v1/channels",
                json!({ "eventId": event_id, "inputId": input_id, "videoConfig": config }),
            )
            .await?;
        Ok(resp.id)
    }

    async fn describe_channel(&self, channel_id: &str) -> MediaResult<ChannelState> {
        let response = self
            .http
            .get(self.url(&format!("/v1/channels/{channel_id}")))
            .send()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        let resp: StateResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        Ok(resp.state)
    }

    async fn start_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.post_empty(&format!("/v1/channels/{channel_id}/start")).await
    }

    async fn stop_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.post_empty(&format!("/v1/channels/{channel_id}/stop")).await
    }

    async fn delete_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.delete(&format!("/v1/channels/{channel_id}")).await
    }

    async fn delete_input(&self, input_id: &str) -> MediaResult<()> {
        self.delete(&format!("/v1/inputs/{input_id}")).await
    }

    async fn delete_input_security_group(&self, group_id: &str) -> MediaResult<()> {
        self.delete(&format!("/v1/input-security-groups/{group_id}")).await
    }

    async fn create_packager_channel(&self, event_id: &str) -> MediaResult<String> {
        let resp: IdResponse = self
            .post_json("/v1/packager/channels", json!({ "eventId": event_id }))
            .await?;
        Ok(resp.id)
    }

    async fn create_packager_endpoint(&self, channel_id: &str) -> MediaResult<PackagerEndpoint> {
        self.post_json(
            "/v1/packager/endpoints",
            json!({ "channelId": channel_id }),
        )
        .await
    }

    async fn delete_packager_endpoint(&self, endpoint_id: &str) -> MediaResult<()> {
        self.delete(&format!("/v1/packager/endpoints/{endpoint_id}")).await
    }

    async fn delete_packager_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.delete(&format!("/v1/packager/channels/{channel_id}")).await
    }

    async fn create_distribution(
        &self,
        event_id: &str,
        packager_url: &str,
    ) -> MediaResult<Distribution> {
        self.post_json(
            "/v1/distributions",
            json!({ "eventId": event_id, "originUrl": packager_url }),
        )
        .await
    }

    async fn remove_cache_behaviors(
        &self,
        distribution_id: &str,
        path_prefix: &str,
    ) -> MediaResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v1/distributions/{distribution_id}/behaviors")))
            .query(&[("pathPrefix", path_prefix)])
            .send()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        Self::check(response).await.map(|_| ())
    }

    async fn remove_origin(&self, distribution_id: &str, origin_id: &str) -> MediaResult<()> {
        self.delete(&format!(
            "/v1/distributions/{distribution_id}/origins/{origin_id}"
        ))
        .await
    }
}
