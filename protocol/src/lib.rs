//! HID protocol primitives for SayoDevice keyboard screens.
//!
//! This crate has no transport dependency. It provides:
//! - The 16-bit word-sum checksum used by every report
//! - Request construction and inbound report filtering
//! - Frame reassembly from addressed screen buffer chunks
//!
//! ## Protocol Overview
//!
//! Reports are 1024 bytes on the fast channel (report id `0x22`), starting
//! with an 8 byte header:
//!
//! | Offset | Size | Field                                        |
//! |--------|------|----------------------------------------------|
//! | 0      | 1    | report id                                    |
//! | 1      | 1    | echo                                         |
//! | 2      | 2    | checksum (LE, computed with this field zero) |
//! | 4      | 2    | `status << 10 \| (body_len + 4)` (LE)         |
//! | 6      | 1    | command                                      |
//! | 7      | 1    | index                                        |
//!
//! Screen buffer responses carry a LE `u32` address followed by RGB565
//! pixel bytes to place at that address.

pub mod abi;
pub mod checksum;
pub mod frame;
pub mod types;

pub use abi::*;
pub use checksum::*;
pub use frame::*;
pub use types::*;
