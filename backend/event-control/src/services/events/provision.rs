//! Background provisioning of the media pipeline for streamed events.
//!
//! Handles are written onto the event as each resource materializes, so a
//! failed run leaves a partial set the teardown can still dismantle.

use doc_store::Mutation;
use serde_json::json;

use super::lifecycle::EventService;
use crate::error::{AppError, Result};
use crate::models::{
    BitrateProfile, Event, Resolution, VideoConfig,
};

const DEFAULT_VIDEO_CONFIG: VideoConfig = VideoConfig {
    resolution: Resolution::R720p,
    frame_rate: 30,
    bitrate_profile: BitrateProfile::Medium,
};

impl EventService {
    /// Runs the full provisioning pipeline. Non-streamed events are a no-op.
    /// Errors are surfaced to the caller; the spawning handler logs them.
    pub async fn provision(&self, event_id: &str) -> Result<()> {
        let event = self.events.require(event_id).await?;
        if !event.event_type.is_streamed() {
            return Ok(());
        }

        let security_group_id = self
            .media
            .create_input_security_group(event_id)
            .await
            .map_err(provision_failed)?;
        self.record(event_id, vec![
            Mutation::Set("inputSecurityGroupId", json!(security_group_id)),
        ])
        .await?;

        let input = self
            .media
            .create_input(event_id, &security_group_id)
            .await
            .map_err(provision_failed)?;
        tracing::info!(event_id, ingest_url = %input.ingest_url, "live input provisioned");
        self.record(event_id, vec![Mutation::Set("inputId", json!(input.input_id))])
            .await?;

        let video_config = event.video_config.clone().unwrap_or(DEFAULT_VIDEO_CONFIG);
        let channel_id = self
            .media
            .create_live_channel(event_id, &input.input_id, &video_config)
            .await
            .map_err(provision_failed)?;
        self.record(event_id, vec![Mutation::Set("liveChannelId", json!(channel_id))])
            .await?;
        self.media
            .start_channel(&channel_id)
            .await
            .map_err(provision_failed)?;

        let packager_channel_id = self
            .media
            .create_packager_channel(event_id)
            .await
            .map_err(provision_failed)?;
        self.record(event_id, vec![
            Mutation::Set("packagerChannelId", json!(packager_channel_id)),
        ])
        .await?;

        let endpoint = self
            .media
            .create_packager_endpoint(&packager_channel_id)
            .await
            .map_err(provision_failed)?;
        self.record(event_id, vec![
            Mutation::Set("packagerEndpointId", json!(endpoint.endpoint_id)),
            Mutation::Set("packagerUrl", json!(endpoint.playback_url)),
        ])
        .await?;

        let distribution = self
            .media
            .create_distribution(event_id, &endpoint.playback_url)
            .await
            .map_err(provision_failed)?;
        self.record(event_id, vec![
            Mutation::Set("distributionId", json!(distribution.distribution_id)),
            Mutation::Set("originId", json!(distribution.origin_id)),
            Mutation::Set("cacheBehaviorIds", json!(distribution.cache_behavior_ids)),
            Mutation::Set("cloudFrontUrl", json!(distribution.domain_url)),
        ])
        .await?;

        tracing::info!(event_id, "media pipeline provisioned");
        Ok(())
    }

    /// Spawn target for handlers: logs instead of propagating.
    pub async fn provision_logged(&self, event: Event) {
        if let Err(err) = self.provision(&event.event_id).await {
            tracing::error!(event_id = %event.event_id, error = %err, "provisioning failed");
        }
    }

    async fn record(&self, event_id: &str, mut mutations: Vec<Mutation>) -> Result<()> {
        mutations.push(Mutation::Set("updatedAt", json!(self.clock.now_iso())));
        self.events.update(event_id, mutations).await?;
        Ok(())
    }
}

fn provision_failed(err: crate::clients::MediaError) -> AppError {
    AppError::Upstream(format!("provisioning: {err}"))
}
