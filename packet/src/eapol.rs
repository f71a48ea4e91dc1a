// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! 802.1X EAPOL frames, as exchanged between an ONU supplicant and the
//! authenticator behind the OLT.  Only the small subset of EAP used by the
//! subscriber bring-up sequence is modeled: Start, Identity and the final
//! Success/Failure verdict.

use bytes::BufMut;
use bytes::BytesMut;

use crate::cursor::Cursor;
use crate::eth::EthHdr;
use crate::parse_error;
use crate::MacAddr;
use crate::PacketResult;
use crate::ETHERTYPE_EAPOL;

const EAPOL_VERSION: u8 = 1;

const EAPOL_TYPE_EAP: u8 = 0;
const EAPOL_TYPE_START: u8 = 1;
const EAPOL_TYPE_LOGOFF: u8 = 2;

const EAP_CODE_REQUEST: u8 = 1;
const EAP_CODE_RESPONSE: u8 = 2;
const EAP_CODE_SUCCESS: u8 = 3;
const EAP_CODE_FAILURE: u8 = 4;

const EAP_TYPE_IDENTITY: u8 = 1;

/// The EAPOL PDUs the simulator understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EapolPdu {
    Start,
    Logoff,
    RequestIdentity { id: u8 },
    ResponseIdentity { id: u8, identity: Vec<u8> },
    Success { id: u8 },
    Failure { id: u8 },
}

fn eapol_frame(dst: MacAddr, src: MacAddr, typ: u8, body: &[u8]) -> Vec<u8> {
    let mut v = BytesMut::with_capacity(
        crate::eth::ETH_HDR_LEN + 4 + body.len(),
    );
    EthHdr {
        dst,
        src,
        ethertype: ETHERTYPE_EAPOL,
    }
    .deparse_into(&mut v);
    v.put_u8(EAPOL_VERSION);
    v.put_u8(typ);
    v.put_u16(body.len() as u16);
    v.put_slice(body);
    v.to_vec()
}

/// An EAPOL-Start frame, sent by the supplicant to the PAE group address.
pub fn start_frame(src: MacAddr) -> Vec<u8> {
    eapol_frame(MacAddr::PAE_GROUP, src, EAPOL_TYPE_START, &[])
}

/// An EAP Request-Identity, as the authenticator would send it.
pub fn request_identity_frame(dst: MacAddr, src: MacAddr, id: u8) -> Vec<u8> {
    let body = [EAP_CODE_REQUEST, id, 0, 5, EAP_TYPE_IDENTITY];
    eapol_frame(dst, src, EAPOL_TYPE_EAP, &body)
}

/// The supplicant's EAP Response-Identity.
pub fn response_identity_frame(
    src: MacAddr,
    id: u8,
    identity: &[u8],
) -> Vec<u8> {
    let len = (5 + identity.len()) as u16;
    let mut body = vec![
        EAP_CODE_RESPONSE,
        id,
        (len >> 8) as u8,
        (len & 0xff) as u8,
        EAP_TYPE_IDENTITY,
    ];
    body.extend_from_slice(identity);
    eapol_frame(MacAddr::PAE_GROUP, src, EAPOL_TYPE_EAP, &body)
}

/// An EAP-Success verdict, as the authenticator would send it.
pub fn success_frame(dst: MacAddr, src: MacAddr, id: u8) -> Vec<u8> {
    let body = [EAP_CODE_SUCCESS, id, 0, 4];
    eapol_frame(dst, src, EAPOL_TYPE_EAP, &body)
}

/// Interpret an untagged EAPOL frame.
pub fn parse(frame: &[u8]) -> PacketResult<EapolPdu> {
    let mut cur = Cursor::new(frame);
    let eth = EthHdr::parse(&mut cur)?;
    if eth.ethertype != ETHERTYPE_EAPOL {
        return Err(parse_error(&cur, "not an EAPOL frame"));
    }
    cur.skip(1)?; // protocol version
    let typ = cur.read_u8()?;
    cur.skip(2)?; // body length
    match typ {
        EAPOL_TYPE_START => Ok(EapolPdu::Start),
        EAPOL_TYPE_LOGOFF => Ok(EapolPdu::Logoff),
        EAPOL_TYPE_EAP => {
            let code = cur.read_u8()?;
            let id = cur.read_u8()?;
            cur.skip(2)?; // EAP length
            match code {
                EAP_CODE_SUCCESS => Ok(EapolPdu::Success { id }),
                EAP_CODE_FAILURE => Ok(EapolPdu::Failure { id }),
                EAP_CODE_REQUEST => {
                    let eap_type = cur.read_u8()?;
                    if eap_type != EAP_TYPE_IDENTITY {
                        return Err(parse_error(
                            &cur,
                            format!("unsupported EAP request type {eap_type}"),
                        ));
                    }
                    Ok(EapolPdu::RequestIdentity { id })
                }
                EAP_CODE_RESPONSE => {
                    let eap_type = cur.read_u8()?;
                    if eap_type != EAP_TYPE_IDENTITY {
                        return Err(parse_error(
                            &cur,
                            format!(
                                "unsupported EAP response type {eap_type}"
                            ),
                        ));
                    }
                    let left = cur.remaining();
                    let identity = cur.read_bytes(left)?;
                    Ok(EapolPdu::ResponseIdentity { id, identity })
                }
                _ => Err(parse_error(&cur, format!("bad EAP code {code}"))),
            }
        }
        _ => Err(parse_error(&cur, format!("bad EAPOL type {typ}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONU: MacAddr = MacAddr::ZERO;

    #[test]
    fn test_start() {
        let frame = start_frame(ONU);
        assert_eq!(parse(&frame).unwrap(), EapolPdu::Start);
    }

    #[test]
    fn test_request_identity() {
        let frame = request_identity_frame(ONU, MacAddr::BROADCAST, 7);
        assert_eq!(parse(&frame).unwrap(), EapolPdu::RequestIdentity { id: 7 });
    }

    #[test]
    fn test_response_identity() {
        let frame = response_identity_frame(ONU, 7, b"user");
        assert_eq!(
            parse(&frame).unwrap(),
            EapolPdu::ResponseIdentity { id: 7, identity: b"user".to_vec() }
        );
    }

    #[test]
    fn test_success() {
        let frame = success_frame(ONU, MacAddr::BROADCAST, 8);
        assert_eq!(parse(&frame).unwrap(), EapolPdu::Success { id: 8 });
    }

    #[test]
    fn test_not_eapol() {
        let frame = crate::eapol::start_frame(ONU);
        let mut bad = frame.clone();
        bad[12] = 0x08;
        bad[13] = 0x00;
        assert!(parse(&bad).is_err());
    }
}
