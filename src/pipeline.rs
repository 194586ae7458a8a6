//! Detection intake: geolocate, persist, encode, then deliver or queue.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::cot::{encode_cot, CotDocument};
use crate::db::Database;
use crate::delivery::OfflineQueue;
use crate::geolocation::geolocate;
use crate::models::{Detection, GeolocationResult};

/// How a processed detection left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Delivered to a transport within the push window.
    Immediate,
    /// Persisted to the offline queue for later sync.
    Queued,
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub detection_id: String,
    pub geolocation: GeolocationResult,
    pub disposition: Disposition,
}

pub struct DetectionPipeline {
    db: Database,
    queue: OfflineQueue,
    target_elevation_m: f64,
    push_timeout: Duration,
}

impl DetectionPipeline {
    pub fn new(
        db: Database,
        queue: OfflineQueue,
        target_elevation_m: f64,
        push_timeout: Duration,
    ) -> Self {
        Self {
            db,
            queue,
            target_elevation_m,
            push_timeout,
        }
    }

    /// Run one detection end to end.
    ///
    /// The database write is the durability point and a failure there is
    /// fatal. Delivery failure is not: a push that errors or exceeds the
    /// push window falls back to the offline queue, so every accepted
    /// detection reaches the TAK server eventually.
    pub async fn process(&self, detection: Detection) -> Result<ProcessOutcome> {
        let geo = geolocate(
            detection.pixel_x,
            detection.pixel_y,
            &detection.camera,
            self.target_elevation_m,
        );
        info!(
            "Detection {} ({}) geolocated to ({:.6}, {:.6}) {} +/-{:.0}m via {}",
            detection.id,
            detection.class_label,
            geo.latitude,
            geo.longitude,
            geo.flag.as_str(),
            geo.uncertainty_m,
            geo.method
        );

        self.db
            .insert_detection(&detection, &geo)
            .await
            .context("failed to persist detection")?;

        let doc = CotDocument::from_detection(
            &detection.id,
            &detection.class_label,
            detection.ai_confidence,
            &detection.camera_id,
            detection.captured_at,
            &geo,
        );
        let cot_xml = encode_cot(&doc).context("failed to encode CoT document")?;

        let disposition =
            match tokio::time::timeout(self.push_timeout, self.queue.attempt_delivery(&cot_xml))
                .await
            {
                Ok(Ok(())) => Disposition::Immediate,
                Ok(Err(err)) => {
                    warn!("Immediate push failed for detection {}: {err}", detection.id);
                    self.queue.enqueue(&detection, &cot_xml).await?;
                    Disposition::Queued
                }
                Err(_) => {
                    warn!(
                        "Immediate push exceeded {:?} for detection {}",
                        self.push_timeout, detection.id
                    );
                    self.queue.enqueue(&detection, &cot_xml).await?;
                    Disposition::Queued
                }
            };

        Ok(ProcessOutcome {
            detection_id: detection.id,
            geolocation: geo,
            disposition,
        })
    }
}
