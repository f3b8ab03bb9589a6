//! hidapi bindings for capturing SayoDevice keyboard screens.
//!
//! - [`discovery`] finds and opens the vendor channel
//! - [`query`] asks the device for its screen parameters
//! - [`session`] runs single capture cycles
//! - [`worker`] runs cycles on a background thread and publishes frames

pub mod discovery;
pub mod error;
pub mod query;
pub mod session;
pub mod transport;
pub mod worker;

pub use discovery::{Channel, ChannelInfo};
pub use error::{CaptureError, Result};
pub use query::{query_refresh_rate, query_screen_size, query_system_info, ScreenSize};
pub use sayo_protocol as protocol;
pub use session::{CaptureOutcome, CaptureSession, CaptureStats};
pub use transport::Transport;
pub use worker::{CaptureEvent, CaptureWorker, LatestFrame};
