// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! End-to-end lifecycle tests: a constructed OLT, the control API on top
//! of it, and synthesized authenticator/DHCP-server traffic driving the
//! subscriber machines through the full bring-up.

use std::net::Ipv4Addr;
use std::time::Duration;

use common::ids::OnuId;
use common::ids::PonId;
use common::ids::SerialNumber;
use common::network::MacAddr;

use packet::dhcp;
use packet::eapol;
use packet::eth;
use packet::igmp;

use ponsimd::api::ControlApi;
use ponsimd::api::IgmpAction;
use ponsimd::api::Response;
use ponsimd::config::Config;
use ponsimd::config::ControlledActivation;
use ponsimd::fsm::OnuState;
use ponsimd::fsm::OperState;
use ponsimd::messages::Indication;
use ponsimd::messages::IndicationStream;
use ponsimd::olt::Olt;
use ponsimd::olt::OltDevice;
use ponsimd::types::ResponseCode;

const DEADLINE: Duration = Duration::from_secs(5);
const PON: PonId = PonId(0);
const ONU: OnuId = OnuId(1);

// The MAC our fake authenticator / DHCP server answers from.
const PEER_MAC: MacAddr = MacAddr::BROADCAST;

fn serial() -> SerialNumber {
    "BBSM00000001".parse().unwrap()
}

fn build_olt(config: &Config) -> (Olt, IndicationStream, ControlApi) {
    let log = common::logging::test_logger();
    let (olt, stream) = OltDevice::new(config, &log);
    let api = ControlApi::new(olt.clone());
    (olt, stream, api)
}

async fn next_matching(
    stream: &mut IndicationStream,
    pred: impl Fn(&Indication) -> bool,
) -> Indication {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ind = stream.recv().await.expect("indication stream ended");
            if pred(&ind) {
                return ind;
            }
        }
    })
    .await
    .expect("timed out waiting for indication")
}

async fn next_packet(stream: &mut IndicationStream) -> Vec<u8> {
    match next_matching(stream, |i| matches!(i, Indication::Packet { .. }))
        .await
    {
        Indication::Packet { payload, .. } => payload,
        _ => unreachable!(),
    }
}

async fn wait_for_state(olt: &Olt, state: OnuState) {
    let onu = olt.find_onu_by_sn(&serial()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while onu.internal_state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "ONU stuck in {}, wanted {}",
            onu.internal_state(),
            state
        )
    });
}

// Walk a freshly-enabled ONU through authentication and DHCP by playing
// the network-side peers, leaving it in `dhcp_ack_received`.
async fn bring_up_subscriber(olt: &Olt, stream: &mut IndicationStream) {
    let onu = olt.find_onu_by_sn(&serial()).unwrap();
    let mac = onu.hw_address;

    // ONU starts authentication on its own after activation.
    let start = next_packet(stream).await;
    assert_eq!(eapol::parse(&start).unwrap(), eapol::EapolPdu::Start);

    olt.onu_packet_out(
        PON,
        ONU,
        eapol::request_identity_frame(mac, PEER_MAC, 1),
    )
    .await
    .unwrap();
    let identity = next_packet(stream).await;
    match eapol::parse(&identity).unwrap() {
        eapol::EapolPdu::ResponseIdentity { identity, .. } => {
            assert_eq!(identity, b"BBSM00000001");
        }
        pdu => panic!("expected Response-Identity, got {pdu:?}"),
    }

    olt.onu_packet_out(PON, ONU, eapol::success_frame(mac, PEER_MAC, 2))
        .await
        .unwrap();

    // Success rolls straight into DHCP; the Discover carries the C-tag.
    let discover = next_packet(stream).await;
    assert_eq!(eth::vlan_tag(&discover).unwrap(), onu.c_tag);
    let pdu = dhcp::parse(&discover).unwrap();
    assert_eq!(pdu.msg_type, dhcp::DhcpMessageType::Discover);

    let leased = Ipv4Addr::new(10, 11, 0, 1);
    let server = Ipv4Addr::new(10, 11, 0, 254);
    olt.onu_packet_out(
        PON,
        ONU,
        dhcp::offer_frame(mac, PEER_MAC, pdu.xid, leased, server),
    )
    .await
    .unwrap();

    let request = next_packet(stream).await;
    let pdu = dhcp::parse(&request).unwrap();
    assert_eq!(pdu.msg_type, dhcp::DhcpMessageType::Request);

    olt.onu_packet_out(
        PON,
        ONU,
        dhcp::ack_frame(mac, PEER_MAC, pdu.xid, leased, server),
    )
    .await
    .unwrap();
    wait_for_state(olt, OnuState::DhcpAckReceived).await;
    assert_eq!(onu.assigned_ip(), Some(leased));
}

#[tokio::test]
async fn test_discovery_on_enable() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();

    let ind = next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;
    assert_eq!(
        ind,
        Indication::OnuDiscovered {
            pon_id: PON,
            onu_id: ONU,
            serial_number: serial(),
        }
    );

    let snap = api.get_onu(&serial()).unwrap();
    assert_eq!(snap.internal_state, "discovered");
    assert_eq!(snap.oper_state, "down");
    assert_eq!(snap.serial_number, "BBSM00000001");
}

#[tokio::test]
async fn test_subscriber_bring_up_and_flow() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;

    api.activate_onu(&serial(), DEADLINE).await.unwrap();
    let ind = next_matching(&mut stream, |i| {
        matches!(i, Indication::Onu { .. })
    })
    .await;
    assert_eq!(
        ind,
        Indication::Onu {
            pon_id: PON,
            onu_id: ONU,
            oper: OperState::Up,
        }
    );
    // activation schedules the OMCI bring-up
    next_matching(&mut stream, |i| matches!(i, Indication::Omci { .. }))
        .await;

    bring_up_subscriber(&olt, &mut stream).await;

    // Installing the EAPOL trap flow completes the chain.
    olt.flow_add(PON, ONU, packet::ETHERTYPE_EAPOL).await.unwrap();
    wait_for_state(&olt, OnuState::EapolFlowReceived).await;
}

#[tokio::test]
async fn test_shutdown_emits_dying_gasp_then_down() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;
    api.activate_onu(&serial(), DEADLINE).await.unwrap();

    let res = api.shutdown_onu(&serial(), DEADLINE).await;
    let response = Response::from_result(res, "ONU shut down");
    assert_eq!(response.status_code, ResponseCode::Ok);

    // The dying gasp precedes the operational-down indication.
    let ind = next_matching(&mut stream, |i| {
        matches!(
            i,
            Indication::DyingGasp { .. }
                | Indication::Onu { oper: OperState::Down, .. }
        )
    })
    .await;
    assert_eq!(
        ind,
        Indication::DyingGasp {
            pon_id: PON,
            onu_id: ONU,
            status: "on".to_string(),
        }
    );
    next_matching(&mut stream, |i| {
        matches!(i, Indication::Onu { oper: OperState::Down, .. })
    })
    .await;

    let snap = api.get_onu(&serial()).unwrap();
    assert_eq!(snap.internal_state, "disabled");
}

#[tokio::test]
async fn test_poweron_requires_enabled_pon() {
    let config = Config {
        controlled_activation: ControlledActivation::OnlyPon,
        ..Config::default()
    };
    let (olt, _stream, api) = build_olt(&config);
    // The policy keeps PON ports down until explicitly enabled.
    olt.enable().await.unwrap();

    let before = api.get_onu(&serial()).unwrap().internal_state;
    let err = api.poweron_onu(&serial(), DEADLINE).await.unwrap_err();
    assert_eq!(err.code(), ResponseCode::FailedPrecondition);
    assert!(err.to_string().contains("PON port 0 not enabled"));
    assert_eq!(api.get_onu(&serial()).unwrap().internal_state, before);
}

#[tokio::test]
async fn test_get_unknown_onu() {
    let (_olt, _stream, api) = build_olt(&Config::default());
    let sn: SerialNumber = "BBSM000000ff".parse().unwrap();
    let err = api.get_onu(&sn).unwrap_err();
    assert_eq!(err.code(), ResponseCode::NotFound);
}

#[tokio::test]
async fn test_igmp_join_v3_from_steady_state() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;
    api.activate_onu(&serial(), DEADLINE).await.unwrap();
    bring_up_subscriber(&olt, &mut stream).await;

    api.change_igmp_state(&serial(), IgmpAction::JoinV3, DEADLINE)
        .await
        .unwrap();

    let report = next_packet(&mut stream).await;
    match igmp::parse(&report).unwrap() {
        igmp::IgmpPdu::V3Report { .. } => {}
        pdu => panic!("expected IGMPv3 report, got {pdu:?}"),
    }
    // The sub-sequence returns the ONU to its steady state.
    wait_for_state(&olt, OnuState::DhcpAckReceived).await;

    api.change_igmp_state(&serial(), IgmpAction::Leave, DEADLINE)
        .await
        .unwrap();
    let leave = next_packet(&mut stream).await;
    assert!(matches!(
        igmp::parse(&leave).unwrap(),
        igmp::IgmpPdu::V2Leave { .. }
    ));
}

#[tokio::test]
async fn test_igmp_rejected_before_dhcp() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;

    let err = api
        .change_igmp_state(&serial(), IgmpAction::Join, DEADLINE)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResponseCode::FailedPrecondition);
}

#[tokio::test]
async fn test_pon_disable_parks_onus() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;

    olt.disable_pon(PON).await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::Pon { oper: OperState::Down, .. })
    })
    .await;
    wait_for_state(&olt, OnuState::PonDisabled).await;

    // Re-enabling rediscovers the parked ONU.
    olt.enable_pon(PON).await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;
    assert_eq!(api.get_onu(&serial()).unwrap().internal_state, "discovered");
}

#[tokio::test]
async fn test_restart_auth_from_steady_state() {
    let (olt, mut stream, api) = build_olt(&Config::default());
    olt.enable().await.unwrap();
    next_matching(&mut stream, |i| {
        matches!(i, Indication::OnuDiscovered { .. })
    })
    .await;
    api.activate_onu(&serial(), DEADLINE).await.unwrap();
    bring_up_subscriber(&olt, &mut stream).await;

    api.restart_eapol(&serial(), DEADLINE).await.unwrap();
    let start = next_packet(&mut stream).await;
    assert_eq!(eapol::parse(&start).unwrap(), eapol::EapolPdu::Start);
    wait_for_state(&olt, OnuState::EapStartSent).await;
}

#[tokio::test]
async fn test_uni_to_nni_tag_swap() {
    let (olt, _stream, _api) = build_olt(&Config::default());
    olt.enable().await.unwrap();

    let onu = olt.find_onu_by_sn(&serial()).unwrap();
    // an arbitrary subscriber data frame
    let frame = {
        let mut f = Vec::new();
        f.extend_from_slice(&MacAddr::BROADCAST.to_vec());
        f.extend_from_slice(&onu.hw_address.to_vec());
        f.extend_from_slice(&[0x08, 0x00]);
        f.extend_from_slice(&[1, 2, 3, 4]);
        f
    };

    let egress = olt.uni_packet_in(PON, ONU, 0, &frame).unwrap();
    assert_eq!(eth::vlan_tag(&egress).unwrap(), onu.s_tag);
    let inner = eth::pop_single_tag(&egress).unwrap();
    assert_eq!(eth::vlan_tag(&inner).unwrap(), onu.c_tag);
    assert_eq!(eth::pop_single_tag(&inner).unwrap(), frame);

    // The same frame entering the uplink routes back on the C-tag.
    olt.uplink_packet_in(0, &egress).await.unwrap();
    assert_eq!(olt.nnis()[0].packet_count(), 2);
}

#[tokio::test]
async fn test_list_onus_snapshot() {
    let config = Config {
        num_pon_ports: 2,
        num_onu_per_pon: 4,
        ..Config::default()
    };
    let (olt, _stream, api) = build_olt(&config);
    olt.enable().await.unwrap();

    let onus = api.list_onus();
    assert_eq!(onus.len(), 8);

    // (PonPortID, OnuID) pairs and serial numbers are globally unique.
    let mut keys: Vec<_> =
        onus.iter().map(|o| (o.pon_port_id, o.id)).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 8);
    let mut serials: Vec<_> =
        onus.iter().map(|o| o.serial_number.clone()).collect();
    serials.sort();
    serials.dedup();
    assert_eq!(serials.len(), 8);

    // C-tags count up from the base without collisions.
    let mut tags: Vec<_> = onus.iter().map(|o| o.c_tag).collect();
    tags.sort();
    tags.dedup();
    assert_eq!(tags.len(), 8);
}
