// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! State machines for the devices in the simulated PON tree.
//!
//! Each machine is an explicit transition table: feeding an event to a state
//! either yields the next state plus a list of side effects for the owning
//! task to apply, or a rejection that leaves the state untouched.  The
//! tables themselves perform no I/O, so every lifecycle path can be tested
//! deterministically.

use thiserror::Error;

/// An event was offered to a machine in a state that does not accept it.
/// The rejection is non-destructive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("event {event} inappropriate in current state {state}")]
pub struct FsmError {
    pub event: &'static str,
    pub state: &'static str,
}

/// Operational state, as reported on the north-bound interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperState {
    Down,
    Up,
}

impl OperState {
    pub fn name(&self) -> &'static str {
        match self {
            OperState::Down => "down",
            OperState::Up => "up",
        }
    }
}

impl std::fmt::Display for OperState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Internal lifecycle state of an ONU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnuState {
    Created,
    Initialized,
    Discovered,
    Enabled,
    AuthStarted,
    EapStartSent,
    EapResponseIdentitySent,
    AuthSuccess,
    DhcpStarted,
    DhcpDiscoverySent,
    DhcpAckReceived,
    EapolFlowReceived,
    IgmpJoinStarted,
    IgmpJoinV3Started,
    IgmpLeft,
    Disabled,
    PonDisabled,
}

impl OnuState {
    pub fn name(&self) -> &'static str {
        match self {
            OnuState::Created => "created",
            OnuState::Initialized => "initialized",
            OnuState::Discovered => "discovered",
            OnuState::Enabled => "enabled",
            OnuState::AuthStarted => "auth_started",
            OnuState::EapStartSent => "eap_start_sent",
            OnuState::EapResponseIdentitySent => "eap_response_identity_sent",
            OnuState::AuthSuccess => "auth_success",
            OnuState::DhcpStarted => "dhcp_started",
            OnuState::DhcpDiscoverySent => "dhcp_discovery_sent",
            OnuState::DhcpAckReceived => "dhcp_ack_received",
            OnuState::EapolFlowReceived => "eapol_flow_received",
            OnuState::IgmpJoinStarted => "igmp_join_started",
            OnuState::IgmpJoinV3Started => "igmp_join_v3_started",
            OnuState::IgmpLeft => "igmp_left",
            OnuState::Disabled => "disabled",
            OnuState::PonDisabled => "pon_disabled",
        }
    }

    /// True for the states in which the ONU reports operationally up.
    pub fn oper_up(&self) -> bool {
        !matches!(
            self,
            OnuState::Created
                | OnuState::Initialized
                | OnuState::Discovered
                | OnuState::Disabled
                | OnuState::PonDisabled
        )
    }

    /// The steady states that an IGMP sub-sequence returns to.
    pub fn is_steady(&self) -> bool {
        matches!(
            self,
            OnuState::DhcpAckReceived | OnuState::EapolFlowReceived
        )
    }
}

impl std::fmt::Display for OnuState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Events accepted by the ONU internal machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnuEvent {
    Initialize,
    Discover,
    Enable,
    StartAuth,
    EapStartSent,
    EapResponseIdentitySent,
    EapResponseSuccessReceived,
    StartDhcp,
    DhcpDiscoverySent,
    DhcpAckReceived,
    EapolFlowReceived,
    IgmpJoinStart,
    IgmpJoinStartV3,
    IgmpLeave,
    Disable,
    PonDisabled,
}

impl OnuEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OnuEvent::Initialize => "initialize",
            OnuEvent::Discover => "discover",
            OnuEvent::Enable => "enable",
            OnuEvent::StartAuth => "start_auth",
            OnuEvent::EapStartSent => "eap_start_sent",
            OnuEvent::EapResponseIdentitySent => {
                "eap_response_identity_sent"
            }
            OnuEvent::EapResponseSuccessReceived => {
                "eap_response_success_received"
            }
            OnuEvent::StartDhcp => "start_dhcp",
            OnuEvent::DhcpDiscoverySent => "dhcp_discovery_sent",
            OnuEvent::DhcpAckReceived => "dhcp_ack_received",
            OnuEvent::EapolFlowReceived => "eapol_flow_received",
            OnuEvent::IgmpJoinStart => "igmp_join_start",
            OnuEvent::IgmpJoinStartV3 => "igmp_join_startv3",
            OnuEvent::IgmpLeave => "igmp_leave",
            OnuEvent::Disable => "disable",
            OnuEvent::PonDisabled => "pon_disabled",
        }
    }
}

impl std::fmt::Display for OnuEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The subscriber-protocol frames an ONU emits upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnuFrame {
    EapolStart,
    EapResponseIdentity,
    DhcpDiscover,
    IgmpJoin,
    IgmpJoinV3,
    IgmpLeave,
}

/// Side effects of an ONU transition, applied by the owning task after the
/// state has been updated.  None of these block: indications go through the
/// unbounded fan-in channel and follow-up events join a local queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OnuAction {
    /// Bring the operational state in line with the internal state, emitting
    /// an OnuIndication if it actually changed.
    SyncOper(OperState),
    /// Emit an OnuDiscovery indication.
    EmitDiscovered,
    /// Emit the OMCI bring-up notification.
    EmitOmciBringup,
    /// Emit a subscriber-protocol frame upstream.  Dropped silently when the
    /// parent PON is not enabled.
    EmitFrame(OnuFrame),
    /// Enqueue a follow-up event on the ONU itself.
    FollowUp(OnuEvent),
    /// Return to the steady state the ONU held before an IGMP sub-sequence.
    ResumeSteady,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: OnuState,
    pub actions: Vec<OnuAction>,
}

/// The ONU internal-state transition table.
pub fn onu_transition(
    state: OnuState,
    event: OnuEvent,
) -> Result<Transition, FsmError> {
    use OnuAction::*;
    use OnuEvent as E;
    use OnuState as S;

    let t = |next, actions| Ok(Transition { next, actions });

    match (state, event) {
        (S::Created | S::Disabled, E::Initialize) => {
            t(S::Initialized, vec![])
        }
        (S::Initialized | S::PonDisabled, E::Discover) => {
            t(S::Discovered, vec![EmitDiscovered])
        }
        (S::Discovered, E::Enable) => t(
            S::Enabled,
            vec![
                SyncOper(OperState::Up),
                EmitOmciBringup,
                FollowUp(E::StartAuth),
            ],
        ),

        // Authentication, restartable from any post-activation steady state.
        (
            S::Enabled
            | S::AuthSuccess
            | S::DhcpAckReceived
            | S::EapolFlowReceived,
            E::StartAuth,
        ) => t(
            S::AuthStarted,
            vec![
                EmitFrame(OnuFrame::EapolStart),
                FollowUp(E::EapStartSent),
            ],
        ),
        (S::AuthStarted, E::EapStartSent) => t(S::EapStartSent, vec![]),
        (S::EapStartSent, E::EapResponseIdentitySent) => t(
            S::EapResponseIdentitySent,
            vec![EmitFrame(OnuFrame::EapResponseIdentity)],
        ),
        (S::EapResponseIdentitySent, E::EapResponseSuccessReceived) => {
            t(S::AuthSuccess, vec![FollowUp(E::StartDhcp)])
        }

        // Address assignment.
        (
            S::AuthSuccess | S::DhcpAckReceived | S::EapolFlowReceived,
            E::StartDhcp,
        ) => t(
            S::DhcpStarted,
            vec![
                EmitFrame(OnuFrame::DhcpDiscover),
                FollowUp(E::DhcpDiscoverySent),
            ],
        ),
        (S::DhcpStarted, E::DhcpDiscoverySent) => {
            t(S::DhcpDiscoverySent, vec![])
        }
        (S::DhcpDiscoverySent, E::DhcpAckReceived) => {
            t(S::DhcpAckReceived, vec![])
        }
        (S::DhcpAckReceived, E::EapolFlowReceived) => {
            t(S::EapolFlowReceived, vec![])
        }

        // Multicast membership, allowed once address assignment completed.
        // Each emits its report and falls back to the prior steady state.
        (
            S::DhcpAckReceived
            | S::EapolFlowReceived
            | S::IgmpJoinStarted
            | S::IgmpJoinV3Started
            | S::IgmpLeft,
            E::IgmpJoinStart,
        ) => t(
            S::IgmpJoinStarted,
            vec![EmitFrame(OnuFrame::IgmpJoin), ResumeSteady],
        ),
        (
            S::DhcpAckReceived
            | S::EapolFlowReceived
            | S::IgmpJoinStarted
            | S::IgmpJoinV3Started
            | S::IgmpLeft,
            E::IgmpJoinStartV3,
        ) => t(
            S::IgmpJoinV3Started,
            vec![EmitFrame(OnuFrame::IgmpJoinV3), ResumeSteady],
        ),
        (
            S::DhcpAckReceived
            | S::EapolFlowReceived
            | S::IgmpJoinStarted
            | S::IgmpJoinV3Started
            | S::IgmpLeft,
            E::IgmpLeave,
        ) => t(
            S::IgmpLeft,
            vec![EmitFrame(OnuFrame::IgmpLeave), ResumeSteady],
        ),

        (s, E::Disable) if s.oper_up() || s == S::PonDisabled => {
            t(S::Disabled, vec![SyncOper(OperState::Down)])
        }
        (s, E::PonDisabled)
            if !matches!(s, S::Disabled | S::PonDisabled) =>
        {
            t(S::PonDisabled, vec![SyncOper(OperState::Down)])
        }

        (s, e) => Err(FsmError {
            event: e.name(),
            state: s.name(),
        }),
    }
}

/// Internal lifecycle state of a PON port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PonState {
    Created,
    Enabled,
    Disabled,
}

impl PonState {
    pub fn name(&self) -> &'static str {
        match self {
            PonState::Created => "created",
            PonState::Enabled => "enabled",
            PonState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for PonState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PonEvent {
    Enable,
    Disable,
}

impl PonEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PonEvent::Enable => "enable",
            PonEvent::Disable => "disable",
        }
    }
}

/// The PON internal-state transition table.  Cascades to child ONUs are
/// decided by the owning task from the previous state.
pub fn pon_transition(
    state: PonState,
    event: PonEvent,
) -> Result<PonState, FsmError> {
    match (state, event) {
        (PonState::Created | PonState::Disabled, PonEvent::Enable) => {
            Ok(PonState::Enabled)
        }
        (PonState::Enabled, PonEvent::Disable) => Ok(PonState::Disabled),
        (s, e) => Err(FsmError {
            event: e.name(),
            state: s.name(),
        }),
    }
}

/// Internal lifecycle state of the OLT itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OltState {
    Created,
    Enabled,
    Disabled,
}

impl OltState {
    pub fn name(&self) -> &'static str {
        match self {
            OltState::Created => "created",
            OltState::Enabled => "enabled",
            OltState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for OltState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The OLT internal-state transition table.
pub fn olt_transition(
    state: OltState,
    event: PonEvent,
) -> Result<OltState, FsmError> {
    match (state, event) {
        (OltState::Created | OltState::Disabled, PonEvent::Enable) => {
            Ok(OltState::Enabled)
        }
        (OltState::Enabled, PonEvent::Disable) => Ok(OltState::Disabled),
        (s, e) => Err(FsmError {
            event: e.name(),
            state: s.name(),
        }),
    }
}
