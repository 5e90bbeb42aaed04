mod pacing;
mod transport;

pub use pacing::{AdaptiveDelay, PacingConfig};
pub use transport::{BrowserTransport, TransportConfig};
