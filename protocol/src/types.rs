//! Protocol types and default constants.

use std::time::Duration;

pub mod consts {
    /// Report id of the fast (1024 byte) channel
    pub const REPORT_ID_FAST: u8 = 0x22;
    /// Report id of the alternate channel
    pub const REPORT_ID_ALT: u8 = 0x21;
    /// Total fast channel report length, including the report id prefix
    pub const REPORT_LEN_FAST: usize = 1024;
    /// Size of the report header
    pub const HEADER_SIZE: usize = 8;
    /// Echo token sent with every request
    pub const ECHO: u8 = 0x13;

    /// Default USB vendor id (O3C)
    pub const VENDOR_ID: u16 = 0x8089;
    /// Default USB product id (O3C)
    pub const PRODUCT_ID: u16 = 0x0009;

    pub const READ_TIMEOUT_MS: u64 = 50;
    pub const COMMAND_TIMEOUT_MS: u64 = 1500;
    pub const IDLE_BREAK_MS: u64 = 10;
}

/// Protocol commands understood by the capture engine
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Screen size and refresh rate
    SystemInfo = 0x02,
    /// Raw RGB565 screen buffer, streamed as addressed chunks
    ScreenBuffer = 0x25,
}

impl Command {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x02 => Ok(Self::SystemInfo),
            0x25 => Ok(Self::ScreenBuffer),
            other => Err(other),
        }
    }
}

/// Immutable protocol configuration shared by queries and capture cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConstants {
    pub report_id: u8,
    pub report_len: usize,
    pub header_size: usize,
    pub echo: u8,
    /// Wait for a single bounded read
    pub read_timeout: Duration,
    /// Overall deadline for one command, including all its reads
    pub command_timeout: Duration,
    /// Quiet period after which a fully covered frame is considered done
    pub idle_break: Duration,
    /// End a capture as soon as coverage reaches the frame size, instead of
    /// waiting for the idle break.
    pub exit_on_coverage: bool,
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self {
            report_id: consts::REPORT_ID_FAST,
            report_len: consts::REPORT_LEN_FAST,
            header_size: consts::HEADER_SIZE,
            echo: consts::ECHO,
            read_timeout: Duration::from_millis(consts::READ_TIMEOUT_MS),
            command_timeout: Duration::from_millis(consts::COMMAND_TIMEOUT_MS),
            idle_break: Duration::from_millis(consts::IDLE_BREAK_MS),
            exit_on_coverage: true,
        }
    }
}

impl ProtocolConstants {
    /// Responses must echo our token, but firmware sometimes answers with 0
    pub fn echo_matches(&self, echo: u8) -> bool {
        echo == self.echo || echo == 0
    }
}

/// Identity used to narrow HID enumeration.
///
/// A zero vendor or product id is a wildcard. Substring filters are
/// case-insensitive and an empty filter matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer_contains: String,
    pub product_contains: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            vendor_id: consts::VENDOR_ID,
            product_id: consts::PRODUCT_ID,
            manufacturer_contains: String::new(),
            product_contains: String::new(),
        }
    }
}

impl DeviceIdentity {
    /// Whether the identity narrows enumeration by id at all
    pub fn has_ids(&self) -> bool {
        self.vendor_id != 0 || self.product_id != 0
    }

    /// Check vendor and product ids, treating zero as a wildcard
    pub fn ids_match(&self, vendor_id: u16, product_id: u16) -> bool {
        (self.vendor_id == 0 || self.vendor_id == vendor_id)
            && (self.product_id == 0 || self.product_id == product_id)
    }

    /// Check the manufacturer and product strings.
    ///
    /// Passes when either filter is found in its string.
    pub fn names_match(&self, manufacturer: Option<&str>, product: Option<&str>) -> bool {
        contains_ci(manufacturer, &self.manufacturer_contains)
            || contains_ci(product, &self.product_contains)
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes() {
        assert_eq!(Command::SystemInfo.code(), 0x02);
        assert_eq!(Command::ScreenBuffer.code(), 0x25);
        assert_eq!(Command::try_from(0x25), Ok(Command::ScreenBuffer));
        assert_eq!(Command::try_from(0x7f), Err(0x7f));
    }

    #[test]
    fn echo_wildcard() {
        let proto = ProtocolConstants::default();
        assert!(proto.echo_matches(consts::ECHO));
        assert!(proto.echo_matches(0));
        assert!(!proto.echo_matches(0x14));
    }

    #[test]
    fn identity_filters() {
        let mut id = DeviceIdentity::default();
        assert!(id.has_ids());
        assert!(id.ids_match(0x8089, 0x0009));
        assert!(!id.ids_match(0x8089, 0x000a));
        // empty filters match anything, including missing strings
        assert!(id.names_match(None, None));

        id.manufacturer_contains = "sayo".into();
        id.product_contains = "O3C".into();
        assert!(id.names_match(Some("SayoDevice"), None));
        assert!(id.names_match(None, Some("sayodevice o3c++")));
        assert!(!id.names_match(Some("Logitech"), Some("G Pro")));
        assert!(!id.names_match(None, None));

        id.vendor_id = 0;
        id.product_id = 0;
        assert!(!id.has_ids());
        assert!(id.ids_match(0x1234, 0x5678));
    }
}
