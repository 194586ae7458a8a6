//! Resilient delivery: transports, the offline queue, and the
//! connectivity monitor that drains it.

mod monitor;
pub(crate) mod queue;
mod transport;

pub use monitor::{ConnectivityMonitor, ConnectivityProbe, HttpProbe, MonitorConfig};
pub use queue::{OfflineQueue, SyncReport};
pub use transport::{CotTransport, DeliveryError, HttpTakTransport};
