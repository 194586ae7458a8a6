use serde::{Deserialize, Serialize};

/// Traffic-light rating derived from the numeric confidence.
/// Total over [0,1]: the 0.75 and 0.50 boundaries are inclusive on the
/// upper side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfidenceFlag {
    Green,
    Yellow,
    Red,
}

impl ConfidenceFlag {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.75 {
            ConfidenceFlag::Green
        } else if confidence >= 0.50 {
            ConfidenceFlag::Yellow
        } else {
            ConfidenceFlag::Red
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceFlag::Green => "GREEN",
            ConfidenceFlag::Yellow => "YELLOW",
            ConfidenceFlag::Red => "RED",
        }
    }
}

/// Output of the geolocation engine for one detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationResult {
    pub latitude: f64,
    pub longitude: f64,
    /// 0-1 blend of ray verticality and height confidence.
    pub confidence: f64,
    pub flag: ConfidenceFlag,
    /// Meters, never below the 5 m floor; infinite when the ray geometry
    /// degenerated and the camera position was substituted.
    pub uncertainty_m: f64,
    pub method: &'static str,
}
