//! Errors surfaced by the device layer.
//!
//! Malformed packets never show up here: they are skipped while polling.
//! Timeouts are outcomes, not errors.

/// Errors that can occur while talking to the device
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No HID collection accepted as the vendor channel
    #[error("no compatible vendor channel found")]
    ChannelNotFound,

    /// The device reported a zero width or height
    #[error("device reported invalid screen size {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },

    /// The transport failed in a way that means the handle is gone.
    /// Terminal for the handle; do not retry on it.
    #[error("device disconnected: {0}")]
    Disconnected(#[source] std::io::Error),

    /// HID enumeration or open error
    #[error("hid error: {0}")]
    Hid(#[from] hidapi::HidError),
}

impl CaptureError {
    /// Whether the error means the channel must be torn down
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
