// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Per-ONU state and the task that owns it.
//!
//! Each ONU runs one long-lived task that drains its inbound channel and
//! applies messages to the local state machines.  The machines themselves
//! live behind a `Mutex` so that API snapshots can read them, but they are
//! only ever mutated by the owning task.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::timeout;

use common::ids::OnuId;
use common::ids::PonId;
use common::ids::PortNo;
use common::ids::SerialNumber;
use common::network::MacAddr;
use packet::classify::classify;
use packet::classify::FrameClass;
use packet::dhcp;
use packet::eapol;
use packet::eth;
use packet::igmp;

use crate::fsm::onu_transition;
use crate::fsm::OnuAction;
use crate::fsm::OnuEvent;
use crate::fsm::OnuFrame;
use crate::fsm::OnuState;
use crate::fsm::OperState;
use crate::messages::Indication;
use crate::messages::IndicationSender;
use crate::messages::OnuMessage;
use crate::pon::PonAdmin;
use crate::types::SimError;
use crate::types::SimResult;

// Inbound message queue depth per ONU.
const CHANNEL_DEPTH: usize = 32;

// The multicast group subscribers join in the simulated IGMP exchanges.
const MCAST_GROUP: Ipv4Addr = igmp::ALL_V3_ROUTERS;

// Opaque payload carried by the OMCI bring-up indication emitted when an
// ONU is activated.  A real ONU would begin its MIB upload here.
const OMCI_BRINGUP: &[u8] = &[0x00, 0x01, 0x0f, 0x00];

struct OnuStateMachines {
    internal: OnuState,
    oper: OperState,
    // where an IGMP sub-sequence returns to
    steady: OnuState,
    // identifier of the most recent EAP Request-Identity
    eap_id: u8,
    // transaction ID used for this ONU's DHCP exchanges
    xid: u32,
    // address confirmed by the most recent Ack
    assigned_ip: Option<Ipv4Addr>,
}

/// A simulated Optical Network Unit.
pub struct Onu {
    pub id: OnuId,
    pub pon_id: PonId,
    pub serial_number: SerialNumber,
    pub hw_address: MacAddr,
    pub s_tag: u16,
    pub c_tag: u16,
    pub port_no: PortNo,
    state: Mutex<OnuStateMachines>,
    tx: mpsc::Sender<OnuMessage>,
    log: slog::Logger,
}

impl Onu {
    pub(crate) fn new(
        olt_id: u32,
        pon_id: PonId,
        id: OnuId,
        s_tag: u16,
        c_tag: u16,
        log: &slog::Logger,
    ) -> (Arc<Onu>, mpsc::Receiver<OnuMessage>) {
        let serial_number = SerialNumber::new(
            *b"BBSM",
            [olt_id as u8, pon_id.0 as u8, 0, id.0 as u8],
        );
        let hw_address =
            MacAddr::new(0x2e, 0x60, 0x70, 0x13, pon_id.0 as u8, id.0 as u8);
        let port_no = PortNo::new(pon_id, id);

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let onu = Onu {
            id,
            pon_id,
            serial_number,
            hw_address,
            s_tag,
            c_tag,
            port_no,
            state: Mutex::new(OnuStateMachines {
                internal: OnuState::Created,
                oper: OperState::Down,
                steady: OnuState::DhcpAckReceived,
                eap_id: 0,
                xid: port_no.0,
                assigned_ip: None,
            }),
            tx,
            log: log.new(o!(
                "pon_id" => pon_id.to_string(),
                "onu_id" => id.to_string()
            )),
        };
        (Arc::new(onu), rx)
    }

    pub fn internal_state(&self) -> OnuState {
        self.state.lock().unwrap().internal
    }

    pub fn oper_state(&self) -> OperState {
        self.state.lock().unwrap().oper
    }

    /// The address this ONU obtained through DHCP, if any.
    pub fn assigned_ip(&self) -> Option<Ipv4Addr> {
        self.state.lock().unwrap().assigned_ip
    }

    /// Offer an FSM event and wait for it to be accepted or rejected.
    pub async fn event(&self, event: OnuEvent) -> SimResult<()> {
        let (reply, rx) = oneshot::channel();
        self.deliver(OnuMessage::Event {
            event,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| {
            SimError::Internal(format!(
                "ONU {} dropped event reply",
                self.serial_number
            ))
        })?
    }

    /// Like [`Onu::event`], but abandon the attempt if the message cannot
    /// be queued before the deadline.  Once queued, the transition runs to
    /// completion regardless.
    pub async fn event_with_deadline(
        &self,
        event: OnuEvent,
        deadline: Duration,
    ) -> SimResult<()> {
        let (reply, rx) = oneshot::channel();
        let msg = OnuMessage::Event {
            event,
            reply: Some(reply),
        };
        match timeout(deadline, self.tx.send(msg)).await {
            Err(_) => Err(SimError::DeadlineExceeded),
            Ok(Err(_)) => Err(SimError::Internal(format!(
                "ONU {} task is gone",
                self.serial_number
            ))),
            Ok(Ok(())) => rx.await.map_err(|_| {
                SimError::Internal(format!(
                    "ONU {} dropped event reply",
                    self.serial_number
                ))
            })?,
        }
    }

    /// Queue a message for the owning task.
    pub(crate) async fn deliver(&self, msg: OnuMessage) -> SimResult<()> {
        self.tx.send(msg).await.map_err(|_| {
            SimError::Internal(format!(
                "ONU {} task is gone",
                self.serial_number
            ))
        })
    }

    /// Queue a message, abandoning the attempt at the deadline.
    pub(crate) async fn deliver_with_deadline(
        &self,
        msg: OnuMessage,
        deadline: Duration,
    ) -> SimResult<()> {
        match timeout(deadline, self.tx.send(msg)).await {
            Err(_) => Err(SimError::DeadlineExceeded),
            Ok(Err(_)) => Err(SimError::Internal(format!(
                "ONU {} task is gone",
                self.serial_number
            ))),
            Ok(Ok(())) => Ok(()),
        }
    }

    // Apply one FSM event: compute the transition, update the machine, and
    // run the resulting actions.  A rejection leaves all state untouched.
    fn apply_event(
        &self,
        event: OnuEvent,
        pending: &mut VecDeque<OnuEvent>,
        ind: &IndicationSender,
        pon: &PonAdmin,
    ) -> SimResult<()> {
        let mut st = self.state.lock().unwrap();
        let tr = onu_transition(st.internal, event)?;
        debug!(
            self.log,
            "changing ONU internal state";
            "from" => st.internal.name(),
            "to" => tr.next.name(),
            "event" => event.name()
        );
        st.internal = tr.next;
        if st.internal.is_steady() {
            st.steady = st.internal;
        }
        for action in tr.actions {
            self.apply_action(&mut st, action, pending, ind, pon);
        }
        Ok(())
    }

    fn apply_action(
        &self,
        st: &mut OnuStateMachines,
        action: OnuAction,
        pending: &mut VecDeque<OnuEvent>,
        ind: &IndicationSender,
        pon: &PonAdmin,
    ) {
        match action {
            OnuAction::SyncOper(target) => {
                if st.oper != target {
                    st.oper = target;
                    ind.send(Indication::Onu {
                        pon_id: self.pon_id,
                        onu_id: self.id,
                        oper: target,
                    });
                }
            }
            OnuAction::EmitDiscovered => {
                info!(self.log, "ONU discovered";
                    "serial_number" => self.serial_number.to_string());
                ind.send(Indication::OnuDiscovered {
                    pon_id: self.pon_id,
                    onu_id: self.id,
                    serial_number: self.serial_number,
                });
            }
            OnuAction::EmitOmciBringup => {
                ind.send(Indication::Omci {
                    pon_id: self.pon_id,
                    onu_id: self.id,
                    payload: OMCI_BRINGUP.to_vec(),
                });
            }
            OnuAction::EmitFrame(kind) => {
                if !pon.is_enabled() {
                    debug!(self.log, "dropping frame, PON port disabled";
                        "frame" => ?kind);
                    return;
                }
                if let Some(payload) = self.build_frame(st, kind) {
                    ind.send(Indication::Packet {
                        pon_id: self.pon_id,
                        onu_id: self.id,
                        port_no: self.port_no,
                        payload,
                    });
                }
            }
            OnuAction::FollowUp(event) => pending.push_back(event),
            OnuAction::ResumeSteady => {
                debug!(
                    self.log,
                    "returning to steady state";
                    "from" => st.internal.name(),
                    "to" => st.steady.name()
                );
                st.internal = st.steady;
            }
        }
    }

    // Build one of the upstream subscriber frames.  DHCP and IGMP traffic
    // carries the subscriber C-tag; EAPOL goes out untagged.
    fn build_frame(
        &self,
        st: &OnuStateMachines,
        kind: OnuFrame,
    ) -> Option<Vec<u8>> {
        let src_ip = st.assigned_ip.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let raw = match kind {
            OnuFrame::EapolStart => {
                return Some(eapol::start_frame(self.hw_address));
            }
            OnuFrame::EapResponseIdentity => {
                return Some(eapol::response_identity_frame(
                    self.hw_address,
                    st.eap_id,
                    self.serial_number.to_string().as_bytes(),
                ));
            }
            OnuFrame::DhcpDiscover => {
                dhcp::discover_frame(self.hw_address, st.xid)
            }
            OnuFrame::IgmpJoin => igmp::v2_report_frame(
                self.hw_address,
                src_ip,
                MCAST_GROUP,
            ),
            OnuFrame::IgmpJoinV3 => igmp::v3_report_frame(
                self.hw_address,
                src_ip,
                MCAST_GROUP,
            ),
            OnuFrame::IgmpLeave => igmp::v2_leave_frame(
                self.hw_address,
                src_ip,
                MCAST_GROUP,
            ),
        };
        match eth::push_single_tag(self.c_tag, &raw) {
            Ok(tagged) => Some(tagged),
            Err(e) => {
                error!(self.log, "failed to tag upstream frame";
                    "frame" => ?kind, "error" => %e);
                None
            }
        }
    }

    // Run a downstream frame through the subscriber sub-FSMs.
    fn handle_frame(
        &self,
        payload: &[u8],
        pending: &mut VecDeque<OnuEvent>,
        ind: &IndicationSender,
    ) {
        {
            let st = self.state.lock().unwrap();
            if matches!(
                st.internal,
                OnuState::Disabled | OnuState::PonDisabled
            ) {
                debug!(self.log, "dropping frame for inactive ONU";
                    "state" => st.internal.name());
                return;
            }
        }

        match classify(payload) {
            FrameClass::Eapol => match eapol::parse(payload) {
                Ok(eapol::EapolPdu::RequestIdentity { id }) => {
                    self.state.lock().unwrap().eap_id = id;
                    pending.push_back(OnuEvent::EapResponseIdentitySent);
                }
                Ok(eapol::EapolPdu::Success { .. }) => {
                    pending.push_back(OnuEvent::EapResponseSuccessReceived);
                }
                Ok(pdu) => {
                    debug!(self.log, "ignoring EAPOL frame"; "pdu" => ?pdu);
                }
                Err(e) => {
                    warn!(self.log, "bad EAPOL frame"; "error" => %e);
                }
            },
            FrameClass::Dhcp => match dhcp::parse(payload) {
                Ok(pdu) => self.handle_dhcp(pdu, pending, ind),
                Err(e) => {
                    warn!(self.log, "bad DHCP frame"; "error" => %e);
                }
            },
            FrameClass::Igmp => {
                // Membership queries are not modeled; joins are driven from
                // the control API.
                debug!(self.log, "ignoring downstream IGMP frame");
            }
            FrameClass::Other => {
                debug!(self.log, "dropping unclassified downstream frame";
                    "len" => payload.len());
            }
        }
    }

    fn handle_dhcp(
        &self,
        pdu: dhcp::DhcpPdu,
        pending: &mut VecDeque<OnuEvent>,
        ind: &IndicationSender,
    ) {
        match pdu.msg_type {
            dhcp::DhcpMessageType::Offer => {
                let server = match pdu.server_id {
                    Some(server) => server,
                    None => {
                        warn!(self.log, "DHCP Offer without server id");
                        return;
                    }
                };
                let request = {
                    let st = self.state.lock().unwrap();
                    if st.internal != OnuState::DhcpDiscoverySent {
                        debug!(self.log, "ignoring unsolicited DHCP Offer";
                            "state" => st.internal.name());
                        return;
                    }
                    dhcp::request_frame(
                        self.hw_address,
                        st.xid,
                        pdu.yiaddr,
                        server,
                    )
                };
                // The Request does not change the machine state; it is the
                // client half of the Offer/Ack exchange.
                match eth::push_single_tag(self.c_tag, &request) {
                    Ok(tagged) => ind.send(Indication::Packet {
                        pon_id: self.pon_id,
                        onu_id: self.id,
                        port_no: self.port_no,
                        payload: tagged,
                    }),
                    Err(e) => {
                        error!(self.log, "failed to tag DHCP Request";
                            "error" => %e);
                    }
                }
            }
            dhcp::DhcpMessageType::Ack => {
                let mut st = self.state.lock().unwrap();
                st.assigned_ip = Some(pdu.yiaddr);
                drop(st);
                info!(self.log, "DHCP assignment complete";
                    "address" => %pdu.yiaddr);
                pending.push_back(OnuEvent::DhcpAckReceived);
            }
            other => {
                debug!(self.log, "ignoring DHCP message"; "type" => ?other);
            }
        }
    }
}

/// Spawn the task owning `onu`.  The task exits on [`OnuMessage::Shutdown`]
/// or when every sender is gone.
pub(crate) fn start(
    onu: Arc<Onu>,
    mut rx: mpsc::Receiver<OnuMessage>,
    ind: IndicationSender,
    pon: Arc<PonAdmin>,
) {
    tokio::spawn(async move {
        // Follow-up events generated by the FSM's own actions.  Kept local
        // so that applying an action can never block on the inbound channel.
        let mut pending: VecDeque<OnuEvent> = VecDeque::new();
        loop {
            let msg = match pending.pop_front() {
                Some(event) => OnuMessage::Event { event, reply: None },
                None => match rx.recv().await {
                    Some(msg) => msg,
                    None => break,
                },
            };
            match msg {
                OnuMessage::Shutdown => break,
                OnuMessage::Event { event, reply } => {
                    let res =
                        onu.apply_event(event, &mut pending, &ind, &pon);
                    match reply {
                        Some(reply) => {
                            // the caller may have given up on a deadline
                            let _ = reply.send(res);
                        }
                        None => {
                            if let Err(e) = res {
                                debug!(onu.log, "self event not applied";
                                    "error" => %e);
                            }
                        }
                    }
                }
                OnuMessage::Frame { payload } => {
                    onu.handle_frame(&payload, &mut pending, &ind);
                }
                OnuMessage::FlowUpdate { eth_type } => {
                    if eth_type == packet::ETHERTYPE_EAPOL {
                        pending.push_back(OnuEvent::EapolFlowReceived);
                    } else {
                        debug!(onu.log, "ignoring flow update";
                            "eth_type" => format!("{eth_type:#x}"));
                    }
                }
                OnuMessage::DyingGasp { status } => {
                    info!(onu.log, "emitting dying gasp");
                    ind.send(Indication::DyingGasp {
                        pon_id: onu.pon_id,
                        onu_id: onu.id,
                        status,
                    });
                }
            }
        }
        debug!(onu.log, "ONU task exiting");
    });
}
