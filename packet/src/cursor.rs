// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! A read cursor over a raw frame.
//!
//! Every header this crate parses is laid out in whole octets, with
//! multi-byte fields in network byte order.  The two sub-byte cases (the
//! 802.1Q TCI and the IPv4 version/IHL octet) are read as whole words and
//! split by the header code that knows their layout, so the cursor itself
//! never tracks bit positions.

use std::net::Ipv4Addr;

use crate::parse_error;
use crate::MacAddr;
use crate::PacketResult;

pub struct Cursor<'a> {
    frame: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(frame: &'a [u8]) -> Cursor<'a> {
        Cursor { frame, pos: 0 }
    }

    /// Byte offset of the next unread field.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.frame.len() - self.pos
    }

    // Consume `len` bytes, failing without moving the cursor if the frame
    // is too short.
    fn take(&mut self, len: usize) -> PacketResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(parse_error(
                self,
                format!("frame truncated reading {len} bytes"),
            ));
        }
        let frame = self.frame;
        let field = &frame[self.pos..self.pos + len];
        self.pos += len;
        Ok(field)
    }

    /// Step over a field the caller does not interpret.
    pub fn skip(&mut self, len: usize) -> PacketResult<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> PacketResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> PacketResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> PacketResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> PacketResult<Vec<u8>> {
        self.take(len).map(|b| b.to_vec())
    }

    pub fn read_mac(&mut self) -> PacketResult<MacAddr> {
        self.take(6).map(MacAddr::from_slice)
    }

    pub fn read_ipv4(&mut self) -> PacketResult<Ipv4Addr> {
        let b = self.take(4)?;
        Ok(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn test_reads_advance() {
        let raw = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77];
        let mut cur = Cursor::new(&raw);

        assert_eq!(cur.read_u8().unwrap(), 0x11);
        assert_eq!(cur.read_u16().unwrap(), 0x2233);
        assert_eq!(cur.read_u32().unwrap(), 0x44556677);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_truncated_read_leaves_cursor() {
        let raw = [0x11, 0x22];
        let mut cur = Cursor::new(&raw);

        assert!(cur.read_u32().is_err());
        // the failed read consumed nothing
        assert_eq!(cur.pos(), 0);
        assert_eq!(cur.read_u16().unwrap(), 0x1122);
    }

    #[test]
    fn test_skip_is_bounds_checked() {
        let raw = [0u8; 4];
        let mut cur = Cursor::new(&raw);

        cur.skip(3).unwrap();
        assert_eq!(cur.pos(), 3);
        assert!(cur.skip(2).is_err());
        assert_eq!(cur.remaining(), 1);
    }

    #[test]
    fn test_read_mac() {
        let raw = [0x2e, 0x60, 0x70, 0x13, 0x00, 0x01];
        let mut cur = Cursor::new(&raw);
        assert_eq!(cur.read_mac().unwrap().to_string(), "2e:60:70:13:00:01");
    }

    #[test]
    fn test_read_ipv4() {
        let raw = [224, 0, 0, 22];
        let mut cur = Cursor::new(&raw);
        assert_eq!(
            cur.read_ipv4().unwrap(),
            std::net::Ipv4Addr::new(224, 0, 0, 22)
        );
    }
}
