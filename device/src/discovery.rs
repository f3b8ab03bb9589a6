//! Vendor channel discovery.
//!
//! The keyboard exposes several top-level collections on interface 1
//! (keyboard, consumer control, vendor). Most of them deny writes, so the
//! collection carrying report id 0x22 has to be picked by usage.

use std::borrow::Cow;
use std::ffi::CString;
use std::io;
use std::time::Duration;

use hidapi::{DeviceInfo, HidApi, HidDevice};
use sayo_protocol::DeviceIdentity;
use tracing::{debug, info};

use crate::error::{CaptureError, Result};
use crate::transport::Transport;

pub mod consts {
    /// Interface carrying the vendor collections
    pub const VENDOR_INTERFACE: i32 = 1;
    /// Start of the vendor defined usage page range
    pub const VENDOR_USAGE_PAGE_MIN: u16 = 0xFF00;
    /// Known vendor collections, most preferred first
    pub const PREFERRED_USAGES: [(u16, u16); 3] = [
        // fast channel
        (0xFF12, 0x0002),
        // alternate polling rate channel
        (0xFF11, 0x0002),
        (0xFF00, 0x0001),
    ];
}

/// One enumerated HID collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub path: CString,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub usage_page: u16,
    pub usage: u16,
    pub interface_number: i32,
}

impl ChannelInfo {
    pub fn path_lossy(&self) -> Cow<'_, str> {
        self.path.to_string_lossy()
    }

    fn matches(&self, identity: &DeviceIdentity, match_ids: bool) -> bool {
        self.interface_number == consts::VENDOR_INTERFACE
            && (!match_ids || identity.ids_match(self.vendor_id, self.product_id))
            && identity.names_match(self.manufacturer.as_deref(), self.product.as_deref())
    }
}

impl From<&DeviceInfo> for ChannelInfo {
    fn from(d: &DeviceInfo) -> Self {
        Self {
            path: d.path().to_owned(),
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
            manufacturer: d.manufacturer_string().map(str::to_owned),
            product: d.product_string().map(str::to_owned),
            serial: d.serial_number().map(str::to_owned),
            usage_page: d.usage_page(),
            usage: d.usage(),
            interface_number: d.interface_number(),
        }
    }
}

/// Snapshot every HID collection currently visible to hidapi
pub fn enumerate(api: &HidApi) -> Vec<ChannelInfo> {
    api.device_list().map(ChannelInfo::from).collect()
}

/// Pick the vendor channel from a candidate list, first match wins:
///
/// 1. usage page 0xFF12, usage 0x02
/// 2. usage page 0xFF11, usage 0x02
/// 3. usage page 0xFF00, usage 0x01
/// 4. any vendor defined usage page
///
/// Only interface 1 collections passing the identity filter are considered.
/// With `match_ids` unset the vendor and product ids are ignored.
pub fn select<'a>(
    candidates: &'a [ChannelInfo],
    identity: &DeviceIdentity,
    match_ids: bool,
) -> Option<&'a ChannelInfo> {
    let mut eligible = candidates.iter().filter(|c| c.matches(identity, match_ids));

    consts::PREFERRED_USAGES
        .iter()
        .find_map(|&(page, usage)| {
            eligible
                .clone()
                .find(|c| c.usage_page == page && c.usage == usage)
        })
        .or_else(|| eligible.find(|c| c.usage_page >= consts::VENDOR_USAGE_PAGE_MIN))
}

/// Select with the identity first, then fall back to ignoring the ids
pub fn choose<'a>(
    candidates: &'a [ChannelInfo],
    identity: &DeviceIdentity,
) -> Option<&'a ChannelInfo> {
    select(candidates, identity, true).or_else(|| {
        if !identity.has_ids() {
            return None;
        }
        debug!(
            "no channel for {:04x}:{:04x}, falling back to all hid devices",
            identity.vendor_id, identity.product_id
        );
        select(candidates, identity, false)
    })
}

/// Collections matching the identity, for diagnostics
pub fn list<'a>(candidates: &'a [ChannelInfo], identity: &DeviceIdentity) -> Vec<&'a ChannelInfo> {
    candidates
        .iter()
        .filter(|c| {
            identity.ids_match(c.vendor_id, c.product_id)
                && identity.names_match(c.manufacturer.as_deref(), c.product.as_deref())
        })
        .collect()
}

/// An opened vendor channel. Dropping it closes the device.
pub struct Channel {
    device: HidDevice,
    info: ChannelInfo,
}

impl Channel {
    /// Discover and open the vendor channel
    pub fn open(api: &HidApi, identity: &DeviceIdentity) -> Result<Self> {
        let candidates = enumerate(api);
        let info = choose(&candidates, identity)
            .ok_or(CaptureError::ChannelNotFound)?
            .clone();
        Self::open_info(api, info)
    }

    /// Open a specific collection
    pub fn open_info(api: &HidApi, info: ChannelInfo) -> Result<Self> {
        info!(
            "opening {} (interface={} usage_page=0x{:x} usage=0x{:x})",
            info.path_lossy(),
            info.interface_number,
            info.usage_page,
            info.usage
        );
        let device = api.open_path(&info.path)?;
        Ok(Self { device, info })
    }

    pub fn info(&self) -> &ChannelInfo {
        &self.info
    }

    /// Manufacturer string as reported by the opened device
    pub fn manufacturer(&self) -> Option<String> {
        self.device.get_manufacturer_string().ok().flatten()
    }

    /// Product string as reported by the opened device
    pub fn product(&self) -> Option<String> {
        self.device.get_product_string().ok().flatten()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("info", &self.info).finish()
    }
}

impl Transport for Channel {
    fn write_report(&mut self, report: &[u8]) -> io::Result<usize> {
        self.device.write_report(report)
    }

    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.device.read_report(buf, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(interface: i32, usage_page: u16, usage: u16) -> ChannelInfo {
        ChannelInfo {
            path: CString::new(format!("if{interface}-{usage_page:04x}-{usage:04x}")).unwrap(),
            vendor_id: 0x8089,
            product_id: 0x0009,
            manufacturer: Some("SayoDevice".into()),
            product: Some("SayoDevice O3C".into()),
            serial: None,
            usage_page,
            usage,
            interface_number: interface,
        }
    }

    #[test]
    fn priority_two_beats_three() {
        let list = [candidate(1, 0xFF00, 0x0001), candidate(1, 0xFF11, 0x0002)];
        let picked = select(&list, &DeviceIdentity::default(), true).unwrap();
        assert_eq!(picked.usage_page, 0xFF11);
    }

    #[test]
    fn fast_channel_preferred() {
        let list = [
            candidate(1, 0x0001, 0x0006),
            candidate(1, 0xFF11, 0x0002),
            candidate(1, 0xFF12, 0x0002),
            candidate(1, 0xFF00, 0x0001),
        ];
        let picked = select(&list, &DeviceIdentity::default(), true).unwrap();
        assert_eq!((picked.usage_page, picked.usage), (0xFF12, 0x0002));
    }

    #[test]
    fn vendor_page_fallback() {
        let list = [
            candidate(1, 0x000C, 0x0001),
            candidate(1, 0xFF60, 0x0061),
            candidate(1, 0xFF70, 0x0001),
        ];
        let picked = select(&list, &DeviceIdentity::default(), true).unwrap();
        assert_eq!(picked.usage_page, 0xFF60);
    }

    #[test]
    fn only_interface_one() {
        let list = [candidate(0, 0xFF12, 0x0002), candidate(2, 0xFF00, 0x0001)];
        assert!(select(&list, &DeviceIdentity::default(), true).is_none());
    }

    #[test]
    fn standard_pages_never_selected() {
        let list = [candidate(1, 0x0001, 0x0006), candidate(1, 0x000C, 0x0001)];
        assert!(choose(&list, &DeviceIdentity::default()).is_none());
    }

    #[test]
    fn falls_back_to_unfiltered_ids() {
        let mut other = candidate(1, 0xFF12, 0x0002);
        other.vendor_id = 0x1234;
        other.product_id = 0x5678;
        let list = [other];

        let identity = DeviceIdentity::default();
        assert!(select(&list, &identity, true).is_none());
        let picked = choose(&list, &identity).unwrap();
        assert_eq!(picked.vendor_id, 0x1234);
    }

    #[test]
    fn no_fallback_without_ids() {
        let identity = DeviceIdentity {
            vendor_id: 0,
            product_id: 0,
            manufacturer_contains: "nothing".into(),
            product_contains: "nothing".into(),
        };
        let list = [candidate(1, 0xFF12, 0x0002)];
        assert!(choose(&list, &identity).is_none());
    }

    #[test]
    fn name_filters_narrow_candidates() {
        let mut foreign = candidate(1, 0xFF12, 0x0002);
        foreign.manufacturer = Some("Other".into());
        foreign.product = Some("Gadget".into());
        let list = [foreign, candidate(1, 0xFF11, 0x0002)];

        let identity = DeviceIdentity {
            manufacturer_contains: "sayo".into(),
            product_contains: "sayo".into(),
            ..Default::default()
        };
        let picked = choose(&list, &identity).unwrap();
        assert_eq!(picked.usage_page, 0xFF11);
    }

    #[test]
    fn list_ignores_interface() {
        let mut foreign = candidate(1, 0xFF12, 0x0002);
        foreign.vendor_id = 0x046d;
        let candidates = [candidate(0, 0x0001, 0x0006), candidate(1, 0xFF12, 0x0002), foreign];
        assert_eq!(list(&candidates, &DeviceIdentity::default()).len(), 2);
    }
}
