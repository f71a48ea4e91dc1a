// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! DHCPv4 over UDP, as used for subscriber address assignment.  The client
//! side (Discover/Request) is what an ONU emits; the server side
//! (Offer/Ack) exists so tests and the north-bound adapter can play the
//! DHCP server.

use std::net::Ipv4Addr;

use bytes::BufMut;
use bytes::BytesMut;

use crate::cursor::Cursor;
use crate::eth::EthHdr;
use crate::ipv4::Ipv4Hdr;
use crate::ipv4::UdpHdr;
use crate::ipv4::IPPROTO_UDP;
use crate::parse_error;
use crate::MacAddr;
use crate::PacketResult;
use crate::ETHERTYPE_IPV4;

/// UDP port the DHCP server listens on.
pub const SERVER_PORT: u16 = 67;
/// UDP port the DHCP client listens on.
pub const CLIENT_PORT: u16 = 68;

const BOOTREQUEST: u8 = 1;
const BOOTREPLY: u8 = 2;
const MAGIC_COOKIE: u32 = 0x6382_5363;

const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_SERVER_ID: u8 = 54;
const OPT_END: u8 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Ack = 5,
    Nak = 6,
}

impl TryFrom<u8> for DhcpMessageType {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(DhcpMessageType::Discover),
            2 => Ok(DhcpMessageType::Offer),
            3 => Ok(DhcpMessageType::Request),
            5 => Ok(DhcpMessageType::Ack),
            6 => Ok(DhcpMessageType::Nak),
            x => Err(x),
        }
    }
}

/// The fields of a DHCP exchange the simulator acts on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DhcpPdu {
    pub msg_type: DhcpMessageType,
    pub xid: u32,
    /// The address being offered or acknowledged (`yiaddr`).
    pub yiaddr: Ipv4Addr,
    /// The DHCP server, when the server identifier option is present.
    pub server_id: Option<Ipv4Addr>,
}

struct Bootp {
    op: u8,
    xid: u32,
    yiaddr: Ipv4Addr,
    chaddr: MacAddr,
    options: Vec<(u8, Vec<u8>)>,
}

impl Bootp {
    fn deparse(&self) -> Vec<u8> {
        let mut v = BytesMut::with_capacity(300);
        v.put_u8(self.op);
        v.put_u8(1); // htype: ethernet
        v.put_u8(6); // hlen
        v.put_u8(0); // hops
        v.put_u32(self.xid);
        v.put_u16(0); // secs
        v.put_u16(0x8000); // flags: broadcast
        v.put_slice(&Ipv4Addr::UNSPECIFIED.octets()); // ciaddr
        v.put_slice(&self.yiaddr.octets());
        v.put_slice(&Ipv4Addr::UNSPECIFIED.octets()); // siaddr
        v.put_slice(&Ipv4Addr::UNSPECIFIED.octets()); // giaddr
        v.put_slice(&self.chaddr.to_vec());
        v.put_bytes(0, 10); // chaddr padding
        v.put_bytes(0, 64); // sname
        v.put_bytes(0, 128); // file
        v.put_u32(MAGIC_COOKIE);
        for (code, data) in &self.options {
            v.put_u8(*code);
            v.put_u8(data.len() as u8);
            v.put_slice(data);
        }
        v.put_u8(OPT_END);
        v.to_vec()
    }
}

fn dhcp_frame(
    dst_mac: MacAddr,
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    bootp: &Bootp,
) -> Vec<u8> {
    let payload = bootp.deparse();
    let udp = UdpHdr { src_port, dst_port };
    let ip = Ipv4Hdr {
        protocol: IPPROTO_UDP,
        ttl: 64,
        src: src_ip,
        dst: dst_ip,
        options: vec![],
    };

    let mut v = BytesMut::new();
    EthHdr {
        dst: dst_mac,
        src: src_mac,
        ethertype: ETHERTYPE_IPV4,
    }
    .deparse_into(&mut v);
    ip.deparse_into(&mut v, 8 + payload.len());
    udp.deparse_into(&mut v, payload.len());
    v.put_slice(&payload);
    v.to_vec()
}

/// The broadcast Discover an ONU client emits to start the exchange.
pub fn discover_frame(src_mac: MacAddr, xid: u32) -> Vec<u8> {
    let bootp = Bootp {
        op: BOOTREQUEST,
        xid,
        yiaddr: Ipv4Addr::UNSPECIFIED,
        chaddr: src_mac,
        options: vec![(OPT_MESSAGE_TYPE, vec![DhcpMessageType::Discover as u8])],
    };
    dhcp_frame(
        MacAddr::BROADCAST,
        src_mac,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::BROADCAST,
        CLIENT_PORT,
        SERVER_PORT,
        &bootp,
    )
}

/// The Request an ONU client emits in response to an Offer.
pub fn request_frame(
    src_mac: MacAddr,
    xid: u32,
    requested: Ipv4Addr,
    server: Ipv4Addr,
) -> Vec<u8> {
    let bootp = Bootp {
        op: BOOTREQUEST,
        xid,
        yiaddr: Ipv4Addr::UNSPECIFIED,
        chaddr: src_mac,
        options: vec![
            (OPT_MESSAGE_TYPE, vec![DhcpMessageType::Request as u8]),
            (OPT_REQUESTED_IP, requested.octets().to_vec()),
            (OPT_SERVER_ID, server.octets().to_vec()),
        ],
    };
    dhcp_frame(
        MacAddr::BROADCAST,
        src_mac,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::BROADCAST,
        CLIENT_PORT,
        SERVER_PORT,
        &bootp,
    )
}

fn reply_frame(
    msg_type: DhcpMessageType,
    client_mac: MacAddr,
    server_mac: MacAddr,
    xid: u32,
    yiaddr: Ipv4Addr,
    server: Ipv4Addr,
) -> Vec<u8> {
    let bootp = Bootp {
        op: BOOTREPLY,
        xid,
        yiaddr,
        chaddr: client_mac,
        options: vec![
            (OPT_MESSAGE_TYPE, vec![msg_type as u8]),
            (OPT_SERVER_ID, server.octets().to_vec()),
        ],
    };
    dhcp_frame(
        client_mac,
        server_mac,
        server,
        Ipv4Addr::BROADCAST,
        SERVER_PORT,
        CLIENT_PORT,
        &bootp,
    )
}

/// A server-side Offer.
pub fn offer_frame(
    client_mac: MacAddr,
    server_mac: MacAddr,
    xid: u32,
    yiaddr: Ipv4Addr,
    server: Ipv4Addr,
) -> Vec<u8> {
    reply_frame(DhcpMessageType::Offer, client_mac, server_mac, xid, yiaddr, server)
}

/// A server-side Ack.
pub fn ack_frame(
    client_mac: MacAddr,
    server_mac: MacAddr,
    xid: u32,
    yiaddr: Ipv4Addr,
    server: Ipv4Addr,
) -> Vec<u8> {
    reply_frame(DhcpMessageType::Ack, client_mac, server_mac, xid, yiaddr, server)
}

/// Interpret a DHCP frame, skipping any 802.1Q tags in front of the IPv4
/// layer.
pub fn parse(frame: &[u8]) -> PacketResult<DhcpPdu> {
    let (ethertype, offset) = crate::eth::inner_ethertype(frame)?;
    if ethertype != ETHERTYPE_IPV4 {
        let cur = Cursor::new(frame);
        return Err(parse_error(&cur, "not an IPv4 frame"));
    }

    let mut cur = Cursor::new(&frame[offset..]);
    let ip = Ipv4Hdr::parse(&mut cur)?;
    if ip.protocol != IPPROTO_UDP {
        return Err(parse_error(&cur, "not a UDP datagram"));
    }
    let udp = UdpHdr::parse(&mut cur)?;
    if udp.dst_port != SERVER_PORT && udp.dst_port != CLIENT_PORT {
        return Err(parse_error(&cur, "not a DHCP datagram"));
    }

    cur.skip(4)?; // op, htype, hlen, hops
    let xid = cur.read_u32()?;
    cur.skip(8)?; // secs, flags, ciaddr
    let yiaddr = cur.read_ipv4()?;
    cur.skip(8)?; // siaddr, giaddr
    cur.skip(16)?; // chaddr
    cur.skip(64 + 128)?; // sname, file
    if cur.read_u32()? != MAGIC_COOKIE {
        return Err(parse_error(&cur, "missing DHCP magic cookie"));
    }

    let mut msg_type = None;
    let mut server_id = None;
    while cur.remaining() > 0 {
        let code = cur.read_u8()?;
        if code == OPT_END {
            break;
        }
        if code == 0 {
            continue; // pad
        }
        let len = cur.read_u8()? as usize;
        let data = cur.read_bytes(len)?;
        match code {
            OPT_MESSAGE_TYPE if len == 1 => {
                msg_type = Some(DhcpMessageType::try_from(data[0]).map_err(
                    |t| parse_error(&cur, format!("bad DHCP message type {t}")),
                )?);
            }
            OPT_SERVER_ID if len == 4 => {
                server_id =
                    Some(Ipv4Addr::new(data[0], data[1], data[2], data[3]));
            }
            _ => {}
        }
    }

    let msg_type = msg_type
        .ok_or_else(|| parse_error(&cur, "missing DHCP message type"))?;
    Ok(DhcpPdu {
        msg_type,
        xid,
        yiaddr,
        server_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: MacAddr = MacAddr::ZERO;
    const SERVER: MacAddr = MacAddr::BROADCAST;

    #[test]
    fn test_discover() {
        let frame = discover_frame(CLIENT, 0x1234);
        let pdu = parse(&frame).unwrap();
        assert_eq!(pdu.msg_type, DhcpMessageType::Discover);
        assert_eq!(pdu.xid, 0x1234);
    }

    #[test]
    fn test_offer_yiaddr() {
        let addr = Ipv4Addr::new(10, 11, 0, 1);
        let server = Ipv4Addr::new(10, 11, 0, 254);
        let frame = offer_frame(CLIENT, SERVER, 0x1234, addr, server);
        let pdu = parse(&frame).unwrap();
        assert_eq!(pdu.msg_type, DhcpMessageType::Offer);
        assert_eq!(pdu.yiaddr, addr);
        assert_eq!(pdu.server_id, Some(server));
    }

    #[test]
    fn test_parse_tagged_frame() {
        let addr = Ipv4Addr::new(10, 11, 0, 2);
        let server = Ipv4Addr::new(10, 11, 0, 254);
        let frame = ack_frame(CLIENT, SERVER, 0x99, addr, server);
        let tagged = crate::eth::push_single_tag(800, &frame).unwrap();
        let pdu = parse(&tagged).unwrap();
        assert_eq!(pdu.msg_type, DhcpMessageType::Ack);
        assert_eq!(pdu.yiaddr, addr);
    }

    #[test]
    fn test_request_roundtrip() {
        let addr = Ipv4Addr::new(10, 11, 0, 3);
        let server = Ipv4Addr::new(10, 11, 0, 254);
        let frame = request_frame(CLIENT, 0x77, addr, server);
        let pdu = parse(&frame).unwrap();
        assert_eq!(pdu.msg_type, DhcpMessageType::Request);
        assert_eq!(pdu.server_id, Some(server));
    }
}
