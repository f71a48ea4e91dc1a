// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::net::Ipv4Addr;

use bytes::BufMut;
use bytes::BytesMut;

use crate::cursor::Cursor;
use crate::parse_error;
use crate::PacketResult;

/// IP protocol number for IGMP.
pub const IPPROTO_IGMP: u8 = 2;
/// IP protocol number for UDP.
pub const IPPROTO_UDP: u8 = 17;

/// The Router Alert option carried by IGMP datagrams.
pub const ROUTER_ALERT: [u8; 4] = [0x94, 0x04, 0x00, 0x00];

/// RFC 1071 internet checksum over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += ((chunk[0] as u32) << 8) | (chunk[1] as u32);
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// The subset of the IPv4 header the simulator reads and writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Hdr {
    pub protocol: u8,
    pub ttl: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// Raw option bytes, already padded to a 4-byte boundary.
    pub options: Vec<u8>,
}

impl Ipv4Hdr {
    pub fn hdr_len(&self) -> usize {
        20 + self.options.len()
    }

    /// Emit the header, computing total length from `payload_len` and
    /// filling in the header checksum.
    pub fn deparse_into(&self, v: &mut BytesMut, payload_len: usize) {
        let ihl = (self.hdr_len() / 4) as u8;
        let total_len = (self.hdr_len() + payload_len) as u16;

        let mut hdr = BytesMut::with_capacity(self.hdr_len());
        hdr.put_u8(0x40 | ihl);
        hdr.put_u8(0); // DSCP/ECN
        hdr.put_u16(total_len);
        hdr.put_u16(0); // identification
        hdr.put_u16(0); // flags/fragment offset
        hdr.put_u8(self.ttl);
        hdr.put_u8(self.protocol);
        hdr.put_u16(0); // checksum placeholder
        hdr.put_slice(&self.src.octets());
        hdr.put_slice(&self.dst.octets());
        hdr.put_slice(&self.options);

        let sum = checksum(&hdr);
        hdr[10] = (sum >> 8) as u8;
        hdr[11] = (sum & 0xff) as u8;
        v.put_slice(&hdr);
    }

    /// Parse a header, leaving the cursor positioned at the payload.
    pub fn parse(cur: &mut Cursor) -> PacketResult<Ipv4Hdr> {
        // version and IHL share the first octet
        let vi = cur.read_u8()?;
        if vi >> 4 != 4 {
            return Err(parse_error(cur, "not an IPv4 header"));
        }
        let ihl = (vi & 0x0f) as usize;
        if ihl < 5 {
            return Err(parse_error(cur, "bad IPv4 header length"));
        }
        cur.skip(3)?; // DSCP/ECN, total length
        cur.skip(4)?; // identification, flags, fragment offset
        let ttl = cur.read_u8()?;
        let protocol = cur.read_u8()?;
        cur.skip(2)?; // checksum
        let src = cur.read_ipv4()?;
        let dst = cur.read_ipv4()?;
        let options = cur.read_bytes(ihl * 4 - 20)?;

        Ok(Ipv4Hdr {
            protocol,
            ttl,
            src,
            dst,
            options,
        })
    }
}

/// A UDP header; the checksum is left zero (legal for IPv4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpHdr {
    pub src_port: u16,
    pub dst_port: u16,
}

impl UdpHdr {
    pub fn deparse_into(&self, v: &mut BytesMut, payload_len: usize) {
        v.put_u16(self.src_port);
        v.put_u16(self.dst_port);
        v.put_u16((8 + payload_len) as u16);
        v.put_u16(0);
    }

    pub fn parse(cur: &mut Cursor) -> PacketResult<UdpHdr> {
        let src_port = cur.read_u16()?;
        let dst_port = cur.read_u16()?;
        cur.skip(4)?; // length, checksum
        Ok(UdpHdr { src_port, dst_port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_odd_length() {
        // the trailing byte is padded with zeros
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), checksum(&[0x01, 0x02, 0x03, 0x00]));
    }

    #[test]
    fn test_header_roundtrip() {
        let hdr = Ipv4Hdr {
            protocol: IPPROTO_UDP,
            ttl: 64,
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(255, 255, 255, 255),
            options: vec![],
        };
        let mut v = BytesMut::new();
        hdr.deparse_into(&mut v, 0);
        assert_eq!(v.len(), 20);

        // a deparsed header checksums to zero
        assert_eq!(checksum(&v), 0);

        let mut cur = Cursor::new(&v);
        let parsed = Ipv4Hdr::parse(&mut cur).unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn test_router_alert_roundtrip() {
        let hdr = Ipv4Hdr {
            protocol: IPPROTO_IGMP,
            ttl: 1,
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::new(224, 0, 0, 22),
            options: ROUTER_ALERT.to_vec(),
        };
        let mut v = BytesMut::new();
        hdr.deparse_into(&mut v, 8);
        assert_eq!(v.len(), 24);

        let mut cur = Cursor::new(&v);
        let parsed = Ipv4Hdr::parse(&mut cur).unwrap();
        assert_eq!(parsed.options, ROUTER_ALERT.to_vec());
    }
}
