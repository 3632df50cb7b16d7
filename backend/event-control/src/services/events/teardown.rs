//! Two-phase event deletion.
//!
//! Phase 1 (`mark_for_deletion`) flips the single-writer guard and returns
//! immediately. Phase 2 (`teardown`) dismantles external resources in strict
//! order, treats missing resources as already done, and either deletes the
//! event record or records the failure and releases the guard so a later
//! delete request can resume with whatever still exists.

use std::time::Duration;

use tokio::time::sleep;

use super::lifecycle::EventService;
use crate::clients::{ChannelState, MediaError, MediaResult};
use crate::error::{AppError, Result};
use crate::models::Event;

#[derive(Debug, Clone)]
pub struct TeardownConfig {
    /// Interval between channel-state polls.
    pub poll_interval: Duration,
    /// Overall wait budget per resource class.
    pub budget: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            budget: Duration::from_secs(15 * 60),
        }
    }
}

/// Missing resources are idempotently done.
fn done_if_missing(result: MediaResult<()>) -> Result<()> {
    match result {
        Ok(()) | Err(MediaError::NotFound) => Ok(()),
        Err(err) => Err(AppError::Upstream(format!("teardown: {err}"))),
    }
}

impl EventService {
    /// Phase 1: acquire the deletion guard. Conflict when a deletion is
    /// already running.
    pub async fn mark_for_deletion(&self, event_id: &str) -> Result<Event> {
        self.events.require(event_id).await?;
        let event = self.events.mark_deletion(event_id, &self.clock.now_iso()).await?;
        tracing::info!(event_id, "event marked for deletion");
        Ok(event)
    }

    /// Phase 2: run the pipeline to completion. On success the event record
    /// is gone; on failure the guard is released and the error recorded.
    pub async fn teardown(&self, event: Event) {
        let event_id = event.event_id.clone();
        match self.run_teardown(&event).await {
            Ok(()) => {
                if let Err(err) = self.events.delete(&event_id).await {
                    tracing::error!(event_id, error = %err, "failed to delete event record");
                    crate::metrics::observe_teardown("record_delete_failed");
                    return;
                }
                tracing::info!(event_id, "teardown complete, event deleted");
                crate::metrics::observe_teardown("completed");
            }
            Err(err) => {
                tracing::error!(event_id, error = %err, "teardown failed");
                let recorded = self
                    .events
                    .record_deletion_failure(&event_id, &err.to_string(), &self.clock.now_iso())
                    .await;
                if let Err(record_err) = recorded {
                    tracing::error!(event_id, error = %record_err, "failed to record teardown failure");
                }
                crate::metrics::observe_teardown("failed");
            }
        }
    }

    async fn run_teardown(&self, event: &Event) -> Result<()> {
        if event.event_type.is_streamed() {
            self.teardown_streamed(event).await?;
        } else {
            self.teardown_vod(event).await?;
        }
        Ok(())
    }

    async fn teardown_streamed(&self, event: &Event) -> Result<()> {
        let event_id = &event.event_id;

        if let Some(channel_id) = &event.live_channel_id {
            match self.media.stop_channel(channel_id).await {
                Ok(()) => {
                    self.wait_for_channel_state(channel_id, ChannelState::Idle)
                        .await?;
                }
                Err(MediaError::NotFound) => {}
                Err(err) => return Err(AppError::Upstream(format!("teardown: {err}"))),
            }
            done_if_missing(self.media.delete_channel(channel_id).await)?;
            self.wait_for_channel_gone(channel_id).await?;
        }

        if let Some(input_id) = &event.input_id {
            done_if_missing(self.media.delete_input(input_id).await)?;
        }
        if let Some(group_id) = &event.input_security_group_id {
            done_if_missing(self.media.delete_input_security_group(group_id).await)?;
        }
        if let Some(endpoint_id) = &event.packager_endpoint_id {
            done_if_missing(self.media.delete_packager_endpoint(endpoint_id).await)?;
        }
        if let Some(channel_id) = &event.packager_channel_id {
            done_if_missing(self.media.delete_packager_channel(channel_id).await)?;
        }

        if let Some(distribution_id) = &event.distribution_id {
            let path_prefix = format!("/{event_id}");
            done_if_missing(
                self.media
                    .remove_cache_behaviors(distribution_id, &path_prefix)
                    .await,
            )?;
            if let Some(origin_id) = &event.origin_id {
                done_if_missing(self.media.remove_origin(distribution_id, origin_id).await)?;
            }
        }

        if let (Some(bucket), Some(prefix)) = (&event.recording_bucket, &event.recording_prefix) {
            let removed = self.storage.delete_prefix(bucket, prefix).await?;
            tracing::info!(event_id, removed, "recording prefix purged");
        }

        Ok(())
    }

    async fn teardown_vod(&self, event: &Event) -> Result<()> {
        if let Some(prefix) = &event.s3_prefix {
            let removed = self.storage.delete_prefix(&self.vod_bucket, prefix).await?;
            tracing::info!(event_id = %event.event_id, removed, "upload prefix purged");
        }
        let output_prefix = format!("vod/{}/", event.event_id);
        let removed = self
            .storage
            .delete_prefix(&self.vod_bucket, &output_prefix)
            .await?;
        tracing::info!(event_id = %event.event_id, removed, "output prefix purged");
        Ok(())
    }

    async fn wait_for_channel_state(&self, channel_id: &str, wanted: ChannelState) -> Result<()> {
        let started = std::time::Instant::now();
        loop {
            match self.media.describe_channel(channel_id).await {
                Ok(state) if state == wanted => return Ok(()),
                Ok(ChannelState::Deleted) | Err(MediaError::NotFound) => return Ok(()),
                Ok(_) => {}
                Err(err) => return Err(AppError::Upstream(format!("teardown: {err}"))),
            }
            if started.elapsed() >= self.teardown_config.budget {
                return Err(AppError::Upstream(format!(
                    "channel {channel_id} did not reach {wanted:?} within budget"
                )));
            }
            sleep(self.teardown_config.poll_interval).await;
        }
    }

    async fn wait_for_channel_gone(&self, channel_id: &str) -> Result<()> {
        let started = std::time::Instant::now();
        loop {
            match self.media.describe_channel(channel_id).await {
                Err(MediaError::NotFound) | Ok(ChannelState::Deleted) => return Ok(()),
                Ok(_) => {}
                Err(err) => return Err(AppError::Upstream(format!("teardown: {err}"))),
            }
            if started.elapsed() >= self.teardown_config.budget {
                return Err(AppError::Upstream(format!(
                    "channel {channel_id} was not removed within budget"
                )));
            }
            sleep(self.teardown_config.poll_interval).await;
        }
    }
}
