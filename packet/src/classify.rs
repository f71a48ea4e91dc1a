// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Classification of frames by their innermost protocol, used to route
//! traffic between the subscriber sub-FSMs and the forwarding path.

use crate::cursor::Cursor;
use crate::eth::inner_ethertype;
use crate::ipv4::Ipv4Hdr;
use crate::ipv4::UdpHdr;
use crate::ipv4::IPPROTO_IGMP;
use crate::ipv4::IPPROTO_UDP;
use crate::ETHERTYPE_EAPOL;
use crate::ETHERTYPE_IPV4;

/// What a frame is, for routing purposes.  Unparseable frames classify as
/// [`FrameClass::Other`] and take the forwarding path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    /// 802.1X authentication traffic.
    Eapol,
    /// DHCPv4 address assignment traffic.
    Dhcp,
    /// IGMP membership signaling.
    Igmp,
    /// Anything else.
    Other,
}

/// Classify a frame by its innermost EtherType, looking through any stack
/// of 802.1Q tags.
pub fn classify(frame: &[u8]) -> FrameClass {
    let Ok((ethertype, offset)) = inner_ethertype(frame) else {
        return FrameClass::Other;
    };
    match ethertype {
        ETHERTYPE_EAPOL => FrameClass::Eapol,
        ETHERTYPE_IPV4 => {
            let mut cur = Cursor::new(&frame[offset..]);
            let Ok(ip) = Ipv4Hdr::parse(&mut cur) else {
                return FrameClass::Other;
            };
            match ip.protocol {
                IPPROTO_IGMP => FrameClass::Igmp,
                IPPROTO_UDP => match UdpHdr::parse(&mut cur) {
                    Ok(udp)
                        if udp.dst_port == crate::dhcp::SERVER_PORT
                            || udp.dst_port == crate::dhcp::CLIENT_PORT =>
                    {
                        FrameClass::Dhcp
                    }
                    _ => FrameClass::Other,
                },
                _ => FrameClass::Other,
            }
        }
        _ => FrameClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MacAddr;
    use std::net::Ipv4Addr;

    #[test]
    fn test_classify_eapol() {
        let frame = crate::eapol::start_frame(MacAddr::ZERO);
        assert_eq!(classify(&frame), FrameClass::Eapol);
    }

    #[test]
    fn test_classify_dhcp() {
        let frame = crate::dhcp::discover_frame(MacAddr::ZERO, 1);
        assert_eq!(classify(&frame), FrameClass::Dhcp);
    }

    #[test]
    fn test_classify_igmp() {
        let frame = crate::igmp::v2_report_frame(
            MacAddr::ZERO,
            Ipv4Addr::UNSPECIFIED,
            crate::igmp::ALL_V3_ROUTERS,
        );
        assert_eq!(classify(&frame), FrameClass::Igmp);
    }

    #[test]
    fn test_classify_tagged_dhcp() {
        let frame = crate::dhcp::discover_frame(MacAddr::ZERO, 1);
        let tagged = crate::eth::push_double_tag(900, 800, &frame).unwrap();
        assert_eq!(classify(&tagged), FrameClass::Dhcp);
    }

    #[test]
    fn test_classify_garbage() {
        assert_eq!(classify(&[1, 2, 3]), FrameClass::Other);
    }
}
