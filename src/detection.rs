//! Device selection arguments and diagnostics.

use std::error::Error;
use std::str::FromStr;

use bpaf::Bpaf;
use hidapi::HidApi;
use sayo_device::discovery::{self, Channel};
use sayo_device::{query_system_info, CaptureError, ScreenSize};
use sayo_protocol::{DeviceIdentity, ProtocolConstants};
use tracing::info;

/// Utility for parsing hex USB ids from bpaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexId(pub u16);

impl FromStr for HexId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim_start_matches("0x").trim_start_matches("0X");
        u16::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| format!("invalid hex id: {s}"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Bpaf)]
#[bpaf(group_help("Device selection:"))]
pub struct IdentityArgs {
    /// USB vendor id in hex, 0 for any
    #[bpaf(long("vid"), argument("HEX"))]
    pub vendor_id: Option<HexId>,
    /// USB product id in hex, 0 for any
    #[bpaf(long("pid"), argument("HEX"))]
    pub product_id: Option<HexId>,
    /// Only consider devices whose manufacturer contains TEXT
    #[bpaf(long("manufacturer"), argument("TEXT"))]
    pub manufacturer: Option<String>,
    /// Only consider devices whose product name contains TEXT
    #[bpaf(long("product"), argument("TEXT"))]
    pub product: Option<String>,
}

impl IdentityArgs {
    /// Override the configured identity with anything given on the command line
    pub fn apply(&self, mut identity: DeviceIdentity) -> DeviceIdentity {
        if let Some(HexId(vid)) = self.vendor_id {
            identity.vendor_id = vid;
        }
        if let Some(HexId(pid)) = self.product_id {
            identity.product_id = pid;
        }
        if let Some(m) = &self.manufacturer {
            identity.manufacturer_contains = m.clone();
        }
        if let Some(p) = &self.product {
            identity.product_contains = p.clone();
        }
        identity
    }
}

/// Open the vendor channel and log what was found
pub fn open_channel(api: &HidApi, identity: &DeviceIdentity) -> Result<Channel, CaptureError> {
    let channel = Channel::open(api, identity)?;
    if let Some(manufacturer) = channel.manufacturer() {
        info!("manufacturer string: {manufacturer}");
    }
    if let Some(product) = channel.product() {
        info!("product string: {product}");
    }
    Ok(channel)
}

/// Print every HID collection matching the identity, marking the one that
/// would be opened.
pub fn list_devices(identity: &DeviceIdentity) -> Result<(), Box<dyn Error>> {
    let api = HidApi::new()?;
    let candidates = discovery::enumerate(&api);
    let selected = discovery::choose(&candidates, identity);
    let matching = discovery::list(&candidates, identity);

    println!(
        "found {} collections for VID={:04x} PID={:04x}",
        matching.len(),
        identity.vendor_id,
        identity.product_id
    );
    for c in &matching {
        let mark = if selected.is_some_and(|s| s.path == c.path) { '*' } else { ' ' };
        println!(
            "{mark} path={} interface={} usage_page=0x{:x} usage=0x{:x}",
            c.path_lossy(),
            c.interface_number,
            c.usage_page,
            c.usage
        );
        if let Some(m) = &c.manufacturer {
            println!("    manufacturer: {m}");
        }
        if let Some(p) = &c.product {
            println!("    product: {p}");
        }
        if let Some(s) = &c.serial {
            println!("    serial: {s}");
        }
    }

    match selected {
        Some(s) if !matching.iter().any(|c| c.path == s.path) => println!(
            "no match for the configured ids, would fall back to {} ({:04x}:{:04x})",
            s.path_lossy(),
            s.vendor_id,
            s.product_id
        ),
        Some(_) => {},
        None => println!("no compatible vendor channel found"),
    }
    Ok(())
}

/// Open the device and print its screen parameters
pub fn print_info(identity: &DeviceIdentity, proto: &ProtocolConstants) -> Result<(), Box<dyn Error>> {
    let api = HidApi::new()?;
    let mut channel = open_channel(&api, identity)?;
    let system = query_system_info(&mut channel, proto)?
        .ok_or("opened device, but screen size query timed out")?;
    let size = ScreenSize::new(system.width, system.height)?;

    let ch = channel.info();
    println!("path: {}", ch.path_lossy());
    println!(
        "interface: {} (usage_page=0x{:x} usage=0x{:x})",
        ch.interface_number, ch.usage_page, ch.usage
    );
    println!("screen: {size} ({} bytes per frame)", size.frame_len());
    match system.refresh_rate {
        Some(hz) => println!("refresh rate: {hz} Hz"),
        None => println!("refresh rate: not reported"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_ids() {
        assert_eq!("8089".parse(), Ok(HexId(0x8089)));
        assert_eq!("0x0009".parse(), Ok(HexId(9)));
        assert_eq!("0XFF12".parse(), Ok(HexId(0xFF12)));
        assert!("zz".parse::<HexId>().is_err());
        assert!("10000".parse::<HexId>().is_err());
    }

    #[test]
    fn args_override_identity() {
        let args = IdentityArgs {
            vendor_id: Some(HexId(0)),
            product: Some("o3c".into()),
            ..Default::default()
        };
        let identity = args.apply(DeviceIdentity::default());
        assert_eq!(identity.vendor_id, 0);
        assert_eq!(identity.product_id, sayo_protocol::consts::PRODUCT_ID);
        assert_eq!(identity.product_contains, "o3c");
        assert!(identity.manufacturer_contains.is_empty());

        assert_eq!(
            IdentityArgs::default().apply(DeviceIdentity::default()),
            DeviceIdentity::default()
        );
    }
}
