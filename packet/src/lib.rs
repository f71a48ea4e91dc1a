// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Parsing and construction of the Ethernet frames exchanged on a simulated
//! PON: 802.1Q tag manipulation and the EAPOL / DHCP / IGMP subscriber
//! protocols.  Frames are opaque `&[u8]` buffers at the API boundary.

use thiserror::Error;

pub mod classify;
pub mod cursor;
pub mod dhcp;
pub mod eapol;
pub mod eth;
pub mod igmp;
pub mod ipv4;

pub use common::network::MacAddr;

/// EtherType for 802.1Q tagged frames.
pub const ETHERTYPE_VLAN: u16 = 0x8100;
/// EtherType for IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// EtherType for 802.1X port authentication.
pub const ETHERTYPE_EAPOL: u16 = 0x888e;

pub type PacketResult<T> = Result<T, PacketError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// The frame could not be interpreted at the given byte offset.
    #[error("parse failure at offset {offset}: {msg}")]
    Parse { offset: usize, msg: String },
    /// A tag operation was applied to a frame with no 802.1Q layer.
    #[error("no-dot1q-layer-in-packet")]
    NoDot1qLayer,
    /// A synthesized field was out of range.
    #[error("invalid field: {0}")]
    Invalid(String),
}

/// Build a [`PacketError::Parse`] at the cursor's current offset.
pub fn parse_error(cur: &cursor::Cursor, msg: impl ToString) -> PacketError {
    PacketError::Parse {
        offset: cur.pos(),
        msg: msg.to_string(),
    }
}
