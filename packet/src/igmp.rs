// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! IGMP membership signaling for subscriber multicast: v2 reports and
//! leaves, and the v3 report used for source-specific joins.

use std::net::Ipv4Addr;

use bytes::BufMut;
use bytes::BytesMut;

use crate::cursor::Cursor;
use crate::eth::EthHdr;
use crate::ipv4::checksum;
use crate::ipv4::Ipv4Hdr;
use crate::ipv4::IPPROTO_IGMP;
use crate::ipv4::ROUTER_ALERT;
use crate::parse_error;
use crate::MacAddr;
use crate::PacketResult;
use crate::ETHERTYPE_IPV4;

const TYPE_V2_REPORT: u8 = 0x16;
const TYPE_V2_LEAVE: u8 = 0x17;
const TYPE_V3_REPORT: u8 = 0x22;

/// Group record type: change to exclude-mode (i.e. join, any source).
const RECORD_CHANGE_TO_EXCLUDE: u8 = 4;

/// All IGMPv3-capable routers, the destination of v3 reports.
pub const ALL_V3_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 22);
/// All routers on this subnet, the destination of v2 leaves.
pub const ALL_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgmpPdu {
    V2Report { group: Ipv4Addr },
    V2Leave { group: Ipv4Addr },
    V3Report { group: Ipv4Addr },
}

// The IPv4 multicast-derived MAC address: 01:00:5e plus the low 23 bits of
// the group.
fn multicast_mac(group: Ipv4Addr) -> MacAddr {
    let o = group.octets();
    MacAddr::new(0x01, 0x00, 0x5e, o[1] & 0x7f, o[2], o[3])
}

fn igmp_frame(
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    payload: &[u8],
) -> Vec<u8> {
    let ip = Ipv4Hdr {
        protocol: IPPROTO_IGMP,
        ttl: 1,
        src: src_ip,
        dst: dst_ip,
        options: ROUTER_ALERT.to_vec(),
    };
    let mut v = BytesMut::new();
    EthHdr {
        dst: multicast_mac(dst_ip),
        src: src_mac,
        ethertype: ETHERTYPE_IPV4,
    }
    .deparse_into(&mut v);
    ip.deparse_into(&mut v, payload.len());
    v.put_slice(payload);
    v.to_vec()
}

fn v2_message(typ: u8, group: Ipv4Addr) -> Vec<u8> {
    let mut m = BytesMut::with_capacity(8);
    m.put_u8(typ);
    m.put_u8(0); // max response time
    m.put_u16(0); // checksum placeholder
    m.put_slice(&group.octets());
    let sum = checksum(&m);
    m[2] = (sum >> 8) as u8;
    m[3] = (sum & 0xff) as u8;
    m.to_vec()
}

/// An IGMPv2 Membership Report for `group`, addressed to the group itself.
pub fn v2_report_frame(
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    group: Ipv4Addr,
) -> Vec<u8> {
    igmp_frame(src_mac, src_ip, group, &v2_message(TYPE_V2_REPORT, group))
}

/// An IGMPv2 Leave Group for `group`, addressed to all-routers.
pub fn v2_leave_frame(
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    group: Ipv4Addr,
) -> Vec<u8> {
    igmp_frame(src_mac, src_ip, ALL_ROUTERS, &v2_message(TYPE_V2_LEAVE, group))
}

/// An IGMPv3 Membership Report joining `group` in exclude mode.
pub fn v3_report_frame(
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    group: Ipv4Addr,
) -> Vec<u8> {
    let mut m = BytesMut::with_capacity(16);
    m.put_u8(TYPE_V3_REPORT);
    m.put_u8(0); // reserved
    m.put_u16(0); // checksum placeholder
    m.put_u16(0); // reserved
    m.put_u16(1); // number of group records
    m.put_u8(RECORD_CHANGE_TO_EXCLUDE);
    m.put_u8(0); // aux data len
    m.put_u16(0); // number of sources
    m.put_slice(&group.octets());
    let sum = checksum(&m);
    m[2] = (sum >> 8) as u8;
    m[3] = (sum & 0xff) as u8;

    igmp_frame(src_mac, src_ip, ALL_V3_ROUTERS, &m)
}

/// Interpret an IGMP frame, skipping any 802.1Q tags.
pub fn parse(frame: &[u8]) -> PacketResult<IgmpPdu> {
    let (ethertype, offset) = crate::eth::inner_ethertype(frame)?;
    if ethertype != ETHERTYPE_IPV4 {
        let cur = Cursor::new(frame);
        return Err(parse_error(&cur, "not an IPv4 frame"));
    }

    let mut cur = Cursor::new(&frame[offset..]);
    let ip = Ipv4Hdr::parse(&mut cur)?;
    if ip.protocol != IPPROTO_IGMP {
        return Err(parse_error(&cur, "not an IGMP datagram"));
    }

    let typ = cur.read_u8()?;
    match typ {
        TYPE_V2_REPORT | TYPE_V2_LEAVE => {
            cur.skip(3)?; // max response time, checksum
            let group = cur.read_ipv4()?;
            if typ == TYPE_V2_REPORT {
                Ok(IgmpPdu::V2Report { group })
            } else {
                Ok(IgmpPdu::V2Leave { group })
            }
        }
        TYPE_V3_REPORT => {
            cur.skip(5)?; // reserved, checksum, reserved
            let records = cur.read_u16()?;
            if records != 1 {
                return Err(parse_error(
                    &cur,
                    format!("expected one group record, found {records}"),
                ));
            }
            cur.skip(4)?; // record type, aux len, sources
            let group = cur.read_ipv4()?;
            Ok(IgmpPdu::V3Report { group })
        }
        _ => Err(parse_error(&cur, format!("bad IGMP type {typ:#x}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONU: MacAddr = MacAddr::ZERO;
    const GROUP: Ipv4Addr = ALL_V3_ROUTERS;

    #[test]
    fn test_v2_report() {
        let frame =
            v2_report_frame(ONU, Ipv4Addr::new(10, 11, 0, 1), GROUP);
        assert_eq!(parse(&frame).unwrap(), IgmpPdu::V2Report { group: GROUP });
    }

    #[test]
    fn test_v2_leave() {
        let frame = v2_leave_frame(ONU, Ipv4Addr::new(10, 11, 0, 1), GROUP);
        assert_eq!(parse(&frame).unwrap(), IgmpPdu::V2Leave { group: GROUP });
    }

    #[test]
    fn test_v3_report() {
        let frame =
            v3_report_frame(ONU, Ipv4Addr::new(10, 11, 0, 1), GROUP);
        assert_eq!(parse(&frame).unwrap(), IgmpPdu::V3Report { group: GROUP });
    }

    #[test]
    fn test_group_mac_mapping() {
        let frame =
            v2_report_frame(ONU, Ipv4Addr::UNSPECIFIED, Ipv4Addr::new(239, 129, 1, 2));
        // 239.129.1.2 maps onto 01:00:5e:01:01:02
        assert_eq!(
            frame[..6],
            [0x01, 0x00, 0x5e, 0x01, 0x01, 0x02]
        );
    }
}
