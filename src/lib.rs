//! cot-relay: turns camera detections into Cursor-on-Target events and
//! gets them to a TAK server, immediately when it is reachable and via
//! a durable offline queue when it is not.

pub mod cot;
pub mod db;
pub mod delivery;
pub mod geolocation;
pub mod models;
pub mod pipeline;
pub mod settings;

pub use db::Database;
pub use delivery::{
    ConnectivityMonitor, ConnectivityProbe, CotTransport, DeliveryError, HttpProbe,
    HttpTakTransport, MonitorConfig, OfflineQueue, SyncReport,
};
pub use models::{CameraPose, Detection, GeolocationResult};
pub use pipeline::{DetectionPipeline, Disposition, ProcessOutcome};
pub use settings::Settings;
