// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Ethernet and 802.1Q header handling, including the VLAN push/pop
//! operations applied to subscriber frames as they cross the OLT.

use bytes::BufMut;
use bytes::BytesMut;

use crate::cursor::Cursor;
use crate::parse_error;
use crate::MacAddr;
use crate::PacketError;
use crate::PacketResult;
use crate::ETHERTYPE_VLAN;

/// Bytes in an untagged Ethernet header.
pub const ETH_HDR_LEN: usize = 14;
/// Bytes added by a single 802.1Q tag.
pub const DOT1Q_LEN: usize = 4;

/// Largest legal 12-bit VLAN identifier.
pub const VID_MAX: u16 = 0xfff;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthHdr {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthHdr {
    pub fn parse(cur: &mut Cursor) -> PacketResult<EthHdr> {
        if cur.remaining() < ETH_HDR_LEN {
            return Err(parse_error(cur, "ethernet header too short"));
        }
        Ok(EthHdr {
            dst: cur.read_mac()?,
            src: cur.read_mac()?,
            ethertype: cur.read_u16()?,
        })
    }

    pub fn deparse_into(&self, v: &mut BytesMut) {
        v.put_slice(&self.dst.to_vec());
        v.put_slice(&self.src.to_vec());
        v.put_u16(self.ethertype);
    }
}

/// A single 802.1Q tag, as it appears after the source MAC: the TCI word
/// followed by the EtherType of the inner payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dot1qHdr {
    pub pcp: u8,
    pub dei: bool,
    pub vid: u16,
    pub ethertype: u16,
}

impl Dot1qHdr {
    pub fn parse(cur: &mut Cursor) -> PacketResult<Dot1qHdr> {
        let tci = cur.read_u16()?;
        let ethertype = cur.read_u16()?;
        Ok(Dot1qHdr {
            pcp: (tci >> 13) as u8,
            dei: tci & 0x1000 != 0,
            vid: tci & VID_MAX,
            ethertype,
        })
    }

    pub fn deparse_into(&self, v: &mut BytesMut) {
        let tci = ((self.pcp as u16) << 13)
            | ((self.dei as u16) << 12)
            | (self.vid & VID_MAX);
        v.put_u16(tci);
        v.put_u16(self.ethertype);
    }
}

// Split a frame into its ethernet header and everything that follows it.
fn split_eth(frame: &[u8]) -> PacketResult<(EthHdr, &[u8])> {
    let mut cur = Cursor::new(frame);
    let eth = EthHdr::parse(&mut cur)?;
    Ok((eth, &frame[ETH_HDR_LEN..]))
}

/// Insert an 802.1Q tag with the given VLAN ID as the new outermost tag.
/// The tag inherits the frame's EtherType as its inner type; priority and
/// DEI are zero.
pub fn push_single_tag(vid: u16, frame: &[u8]) -> PacketResult<Vec<u8>> {
    if vid > VID_MAX {
        return Err(PacketError::Invalid(format!(
            "VLAN ID {vid} exceeds 12 bits"
        )));
    }
    let (eth, rest) = split_eth(frame)?;

    let mut v = BytesMut::with_capacity(frame.len() + DOT1Q_LEN);
    EthHdr {
        ethertype: ETHERTYPE_VLAN,
        ..eth
    }
    .deparse_into(&mut v);
    Dot1qHdr {
        pcp: 0,
        dei: false,
        vid,
        ethertype: eth.ethertype,
    }
    .deparse_into(&mut v);
    v.put_slice(rest);
    Ok(v.to_vec())
}

/// Push a C-tag and then an S-tag, leaving the S-tag outermost.
pub fn push_double_tag(
    s_tag: u16,
    c_tag: u16,
    frame: &[u8],
) -> PacketResult<Vec<u8>> {
    let inner = push_single_tag(c_tag, frame)?;
    push_single_tag(s_tag, &inner)
}

/// Remove the outermost 802.1Q tag.  Fails if the frame carries none.
pub fn pop_single_tag(frame: &[u8]) -> PacketResult<Vec<u8>> {
    let mut cur = Cursor::new(frame);
    let eth = EthHdr::parse(&mut cur)?;
    if eth.ethertype != ETHERTYPE_VLAN {
        return Err(PacketError::NoDot1qLayer);
    }
    let tag = Dot1qHdr::parse(&mut cur)?;

    let rest = &frame[ETH_HDR_LEN + DOT1Q_LEN..];
    let mut v = BytesMut::with_capacity(frame.len() - DOT1Q_LEN);
    EthHdr {
        ethertype: tag.ethertype,
        ..eth
    }
    .deparse_into(&mut v);
    v.put_slice(rest);
    Ok(v.to_vec())
}

/// Remove the two outermost 802.1Q tags.
pub fn pop_double_tag(frame: &[u8]) -> PacketResult<Vec<u8>> {
    let inner = pop_single_tag(frame)?;
    pop_single_tag(&inner)
}

/// The VLAN ID of the outermost tag.
pub fn vlan_tag(frame: &[u8]) -> PacketResult<u16> {
    let mut cur = Cursor::new(frame);
    let eth = EthHdr::parse(&mut cur)?;
    if eth.ethertype != ETHERTYPE_VLAN {
        return Err(PacketError::NoDot1qLayer);
    }
    Ok(Dot1qHdr::parse(&mut cur)?.vid)
}

/// Walk any stack of 802.1Q tags and return the EtherType of the first
/// non-VLAN layer, along with the offset at which it starts.
pub fn inner_ethertype(frame: &[u8]) -> PacketResult<(u16, usize)> {
    let mut cur = Cursor::new(frame);
    let eth = EthHdr::parse(&mut cur)?;
    let mut ethertype = eth.ethertype;
    let mut offset = ETH_HDR_LEN;
    while ethertype == ETHERTYPE_VLAN {
        let tag = Dot1qHdr::parse(&mut cur)?;
        ethertype = tag.ethertype;
        offset += DOT1Q_LEN;
    }
    Ok((ethertype, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    // An untagged frame whose declared EtherType is 0x8100 but which carries
    // raw payload bytes, matching the shape used by the tagger callers.
    fn test_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut v = BytesMut::new();
        EthHdr {
            dst: MacAddr::BROADCAST,
            src: MacAddr::new(0xff, 0xff, 0xff, 0xff, 1, 1),
            ethertype,
        }
        .deparse_into(&mut v);
        v.put_slice(payload);
        v.to_vec()
    }

    #[test]
    fn test_push_single_tag() {
        let frame = test_frame(ETHERTYPE_VLAN, &[10, 20, 30]);
        let tagged = push_single_tag(111, &frame).unwrap();
        assert_eq!(vlan_tag(&tagged).unwrap(), 111);
        assert_eq!(tagged.len(), frame.len() + DOT1Q_LEN);
    }

    #[test]
    fn test_push_then_pop_restores_frame() {
        let frame = test_frame(0x0800, &[1, 2, 3, 4, 5]);
        let tagged = push_single_tag(42, &frame).unwrap();
        let popped = pop_single_tag(&tagged).unwrap();
        assert_eq!(popped, frame);
    }

    #[test]
    fn test_push_double_tag() {
        let frame = test_frame(ETHERTYPE_VLAN, &[10, 20, 30]);
        let tagged = push_double_tag(900, 800, &frame).unwrap();

        assert_eq!(vlan_tag(&tagged).unwrap(), 900);
        let inner = pop_single_tag(&tagged).unwrap();
        assert_eq!(vlan_tag(&inner).unwrap(), 800);
        let restored = pop_single_tag(&inner).unwrap();
        assert_eq!(restored, frame);
    }

    #[test]
    fn test_pop_untagged_fails() {
        let frame = test_frame(0x0800, &[10, 20, 30]);
        let err = pop_single_tag(&frame).unwrap_err();
        assert_eq!(err.to_string(), "no-dot1q-layer-in-packet");
    }

    #[test]
    fn test_vlan_tag_untagged_fails() {
        let frame = test_frame(0x0800, &[10, 20, 30]);
        let err = vlan_tag(&frame).unwrap_err();
        assert_eq!(err.to_string(), "no-dot1q-layer-in-packet");
    }

    #[test]
    fn test_vid_range_enforced() {
        let frame = test_frame(0x0800, &[]);
        assert!(push_single_tag(4095, &frame).is_ok());
        assert!(push_single_tag(4096, &frame).is_err());
    }

    #[test]
    fn test_pcp_dei_preserved() {
        let frame = test_frame(0x0800, &[9, 9]);
        let mut v = BytesMut::new();
        EthHdr {
            dst: MacAddr::BROADCAST,
            src: MacAddr::ZERO,
            ethertype: ETHERTYPE_VLAN,
        }
        .deparse_into(&mut v);
        Dot1qHdr {
            pcp: 5,
            dei: true,
            vid: 333,
            ethertype: 0x0800,
        }
        .deparse_into(&mut v);
        v.put_slice(&frame[ETH_HDR_LEN..]);
        let tagged = v.to_vec();

        // pushing another tag on top leaves the inner tci intact
        let double = push_single_tag(900, &tagged).unwrap();
        let inner = pop_single_tag(&double).unwrap();

        let mut cur = Cursor::new(&inner);
        EthHdr::parse(&mut cur).unwrap();
        let tag = Dot1qHdr::parse(&mut cur).unwrap();
        assert_eq!(tag.pcp, 5);
        assert!(tag.dei);
        assert_eq!(tag.vid, 333);
    }
}
