mod detection;
mod geolocation;

pub use detection::{CameraPose, Detection};
pub use geolocation::{ConfidenceFlag, GeolocationResult};
