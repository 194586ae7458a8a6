use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConfidenceFlag, GeolocationResult};

/// Events go stale five minutes after capture.
pub const STALE_WINDOW_SECS: i64 = 300;

/// Sentinel for an unknown linear/circular error, meters.
pub const UNKNOWN_ERROR_M: f64 = 9_999_999.0;

/// Fixed mapping from the upstream model's class label to a CoT type
/// code. Unknown classes get a generic point-location code, never an
/// error.
pub fn cot_type_for_class(class_label: &str) -> &'static str {
    match class_label.to_ascii_lowercase().as_str() {
        "vehicle" => "b-m-p-s-u-c",
        "person" => "b-m-p-s-p-w-g",
        "aircraft" => "b-m-p-a",
        "fire" => "b-i-x-f-f",
        _ => "b-m-p-s-m",
    }
}

/// ARGB marker color for a confidence flag.
///
/// The mapping is intentionally inverted relative to the flag names
/// (GREEN confidence renders as a red-hued marker): downstream TAK
/// operators depend on the observed convention, so it is preserved
/// verbatim.
pub fn color_for_flag(flag: ConfidenceFlag) -> i32 {
    match flag {
        ConfidenceFlag::Green => -65536,    // 0xFFFF0000 red
        ConfidenceFlag::Yellow => -16711936, // 0xFF00FF00 green
        ConfidenceFlag::Red => -16776961,   // 0xFF0000FF blue
    }
}

/// One CoT event, derived deterministically from a single detection.
#[derive(Debug, Clone)]
pub struct CotDocument {
    pub uid: String,
    pub cot_type: &'static str,
    pub time: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub stale: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Circular error = geolocation uncertainty radius, meters.
    pub ce: f64,
    pub hae: f64,
    pub le: f64,
    pub color_argb: i32,
    pub remarks: String,
    pub callsign: String,
    pub link_uid: String,
}

impl CotDocument {
    pub fn from_detection(
        detection_id: &str,
        class_label: &str,
        ai_confidence: f64,
        camera_id: &str,
        captured_at: DateTime<Utc>,
        geo: &GeolocationResult,
    ) -> Self {
        let short_id = &detection_id[..detection_id.len().min(8)];
        let ce = if geo.uncertainty_m.is_finite() {
            geo.uncertainty_m
        } else {
            UNKNOWN_ERROR_M
        };

        Self {
            uid: format!("Detection.{detection_id}"),
            cot_type: cot_type_for_class(class_label),
            time: captured_at,
            start: captured_at,
            stale: captured_at + Duration::seconds(STALE_WINDOW_SECS),
            latitude: geo.latitude,
            longitude: geo.longitude,
            ce,
            hae: 0.0,
            le: UNKNOWN_ERROR_M,
            color_argb: color_for_flag(geo.flag),
            remarks: remarks_text(class_label, ai_confidence, geo),
            callsign: format!("Detection-{short_id}"),
            link_uid: camera_id.to_string(),
        }
    }
}

fn remarks_text(class_label: &str, ai_confidence: f64, geo: &GeolocationResult) -> String {
    let radius = if geo.uncertainty_m.is_finite() {
        format!("{:.1}", geo.uncertainty_m)
    } else {
        "unbounded".to_string()
    };
    format!(
        "{} detected with {:.0}% AI confidence; geolocation {} +/-{} m",
        class_label,
        ai_confidence * 100.0,
        geo.flag.as_str(),
        radius,
    )
}

/// Plain structured view of a CoT event, for consumers that prefer JSON
/// over XML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CotView {
    pub uid: String,
    pub cot_type: String,
    pub time: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub stale: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub ce: f64,
    pub hae: f64,
    pub le: f64,
    pub color_argb: i32,
    pub remarks: String,
    pub callsign: String,
    pub link_uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_classes_map_to_fixed_codes() {
        assert_eq!(cot_type_for_class("vehicle"), "b-m-p-s-u-c");
        assert_eq!(cot_type_for_class("person"), "b-m-p-s-p-w-g");
        assert_eq!(cot_type_for_class("aircraft"), "b-m-p-a");
        assert_eq!(cot_type_for_class("fire"), "b-i-x-f-f");
        assert_eq!(cot_type_for_class("Vehicle"), "b-m-p-s-u-c");
    }

    #[test]
    fn unknown_class_gets_generic_point_code() {
        assert_eq!(cot_type_for_class("unicycle"), "b-m-p-s-m");
        assert_eq!(cot_type_for_class(""), "b-m-p-s-m");
    }

    #[test]
    fn color_mapping_keeps_observed_inversion() {
        assert_eq!(color_for_flag(ConfidenceFlag::Green), -65536);
        assert_eq!(color_for_flag(ConfidenceFlag::Yellow), -16711936);
        assert_eq!(color_for_flag(ConfidenceFlag::Red), -16776961);
    }
}
