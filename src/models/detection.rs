//! Detection data model.
//!
//! A detection is the unit of work for the pipeline: what the upstream AI
//! model saw, where in the frame, and the full camera telemetry needed to
//! put it on the ground. Field ranges are enforced at the ingestion
//! boundary; the core trusts them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geodetic location, orientation and intrinsics of the reporting camera
/// at capture time. Fully specified per detection; there is no shared
/// camera registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPose {
    pub latitude: f64,
    pub longitude: f64,
    /// Height above local ground, meters.
    pub elevation_m: f64,
    /// 0-360, clockwise from north.
    pub heading_deg: f64,
    /// -90..90, negative looks down.
    pub pitch_deg: f64,
    /// -180..180.
    pub roll_deg: f64,
    pub focal_length_px: f64,
    pub sensor_width_mm: f64,
    pub sensor_height_mm: f64,
    pub image_width_px: f64,
    pub image_height_px: f64,
}

/// A single AI object-detection event, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub id: String,
    pub class_label: String,
    /// Model-reported confidence, 0-1.
    pub ai_confidence: f64,
    pub source: String,
    pub camera_id: String,
    pub captured_at: DateTime<Utc>,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub camera: CameraPose,
}

impl Detection {
    pub fn new(
        class_label: String,
        ai_confidence: f64,
        source: String,
        camera_id: String,
        captured_at: DateTime<Utc>,
        pixel_x: f64,
        pixel_y: f64,
        camera: CameraPose,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            class_label,
            ai_confidence,
            source,
            camera_id,
            captured_at,
            pixel_x,
            pixel_y,
            camera,
        }
    }
}
