// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The control-plane operation surface.
//!
//! Every operation resolves its target ONU by serial number, forwards an
//! event through the ONU's channel and returns once the transition has been
//! accepted or rejected; it does not wait for the resulting indications to
//! reach the north-bound consumer.  An external transport (gRPC or
//! otherwise) is expected to sit on top of this and translate
//! [`SimError`]s through [`Response`].

use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::info;
use slog::o;
use slog::warn;

use common::ids::PonId;
use common::ids::SerialNumber;

use crate::fsm::OnuEvent;
use crate::fsm::OnuState;
use crate::messages::OnuMessage;
use crate::olt::Olt;
use crate::types::ResponseCode;
use crate::types::SimError;
use crate::types::SimResult;
use crate::views::OnuSnapshot;
use crate::views::PonSnapshot;

/// Deadline applied by callers that do not supply their own.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// The result of a control operation, in the shape the external transport
/// puts on the wire.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct Response {
    pub status_code: ResponseCode,
    pub message: String,
}

impl Response {
    /// Collapse an operation result into a wire response.
    pub fn from_result(
        result: SimResult<()>,
        ok_message: impl ToString,
    ) -> Response {
        match result {
            Ok(()) => Response {
                status_code: ResponseCode::Ok,
                message: ok_message.to_string(),
            },
            Err(e) => Response {
                status_code: e.code(),
                message: e.to_string(),
            },
        }
    }
}

/// Multicast membership actions accepted by
/// [`ControlApi::change_igmp_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgmpAction {
    Join,
    Leave,
    JoinV3,
}

impl FromStr for IgmpAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "join" => Ok(IgmpAction::Join),
            "leave" => Ok(IgmpAction::Leave),
            "joinv3" => Ok(IgmpAction::JoinV3),
            _ => Err(format!("invalid igmp action: {s}")),
        }
    }
}

impl From<IgmpAction> for OnuEvent {
    fn from(action: IgmpAction) -> OnuEvent {
        match action {
            IgmpAction::Join => OnuEvent::IgmpJoinStart,
            IgmpAction::Leave => OnuEvent::IgmpLeave,
            IgmpAction::JoinV3 => OnuEvent::IgmpJoinStartV3,
        }
    }
}

/// The operation surface offered to the north-bound transport.
pub struct ControlApi {
    olt: Olt,
    log: slog::Logger,
}

impl ControlApi {
    pub fn new(olt: Olt) -> ControlApi {
        let log = olt.log().new(o!("unit" => "control-api"));
        ControlApi { olt, log }
    }

    /// Snapshot every ONU on the device.
    pub fn list_onus(&self) -> Vec<OnuSnapshot> {
        self.olt
            .pons()
            .iter()
            .flat_map(|pon| pon.onus().iter().map(|o| OnuSnapshot::from(&**o)))
            .collect()
    }

    /// Snapshot every PON port on the device.
    pub fn list_pons(&self) -> Vec<PonSnapshot> {
        self.olt
            .pons()
            .iter()
            .map(|p| PonSnapshot::from(&**p))
            .collect()
    }

    /// Snapshot a single ONU.
    pub fn get_onu(&self, sn: &SerialNumber) -> SimResult<OnuSnapshot> {
        let onu = self.olt.find_onu_by_sn(sn)?;
        Ok(OnuSnapshot::from(&*onu))
    }

    /// Simulate a subscriber power cut: the ONU emits a dying gasp and is
    /// then disabled.
    pub async fn shutdown_onu(
        &self,
        sn: &SerialNumber,
        deadline: Duration,
    ) -> SimResult<()> {
        info!(self.log, "shutting down ONU"; "serial_number" => %sn);
        let onu = self.olt.find_onu_by_sn(sn)?;
        // The status field is opaque and preserved on the wire.
        onu.deliver_with_deadline(
            OnuMessage::DyingGasp {
                status: "on".to_string(),
            },
            deadline,
        )
        .await?;
        self.send_event(&onu, OnuEvent::Disable, deadline).await
    }

    /// Power a previously-shut-down or not-yet-started ONU back up.  The
    /// parent PON port must be enabled.
    pub async fn poweron_onu(
        &self,
        sn: &SerialNumber,
        deadline: Duration,
    ) -> SimResult<()> {
        info!(self.log, "powering on ONU"; "serial_number" => %sn);
        let onu = self.olt.find_onu_by_sn(sn)?;
        self.require_pon_enabled(onu.pon_id)?;

        if onu.internal_state() == OnuState::Created {
            self.send_event(&onu, OnuEvent::Initialize, deadline).await?;
        }
        self.send_event(&onu, OnuEvent::Discover, deadline).await
    }

    /// Activate a discovered ONU, starting its subscriber bring-up.
    pub async fn activate_onu(
        &self,
        sn: &SerialNumber,
        deadline: Duration,
    ) -> SimResult<()> {
        info!(self.log, "activating ONU"; "serial_number" => %sn);
        let onu = self.olt.find_onu_by_sn(sn)?;
        self.require_pon_enabled(onu.pon_id)?;
        self.send_event(&onu, OnuEvent::Enable, deadline).await
    }

    /// Restart 802.1X authentication.
    pub async fn restart_eapol(
        &self,
        sn: &SerialNumber,
        deadline: Duration,
    ) -> SimResult<()> {
        info!(self.log, "restarting authentication"; "serial_number" => %sn);
        let onu = self.olt.find_onu_by_sn(sn)?;
        self.send_event(&onu, OnuEvent::StartAuth, deadline).await
    }

    /// Restart DHCP address assignment.
    pub async fn restart_dhcp(
        &self,
        sn: &SerialNumber,
        deadline: Duration,
    ) -> SimResult<()> {
        info!(self.log, "restarting DHCP"; "serial_number" => %sn);
        let onu = self.olt.find_onu_by_sn(sn)?;
        self.send_event(&onu, OnuEvent::StartDhcp, deadline).await
    }

    /// Drive an IGMP join or leave on behalf of the subscriber.
    pub async fn change_igmp_state(
        &self,
        sn: &SerialNumber,
        action: IgmpAction,
        deadline: Duration,
    ) -> SimResult<()> {
        info!(self.log, "igmp request for ONU";
            "serial_number" => %sn, "sub_action" => ?action);
        let onu = self.olt.find_onu_by_sn(sn)?;
        self.send_event(&onu, action.into(), deadline).await
    }

    fn require_pon_enabled(&self, pon_id: PonId) -> SimResult<()> {
        let pon = self.olt.get_pon_by_id(pon_id)?;
        if pon.internal_state() != crate::fsm::PonState::Enabled {
            let err = SimError::PonNotEnabled { pon_id };
            warn!(self.log, "rejecting request"; "error" => %err);
            return Err(err);
        }
        Ok(())
    }

    async fn send_event(
        &self,
        onu: &crate::onu::Onu,
        event: OnuEvent,
        deadline: Duration,
    ) -> SimResult<()> {
        onu.event_with_deadline(event, deadline).await.map_err(|e| {
            warn!(self.log, "event rejected";
                "serial_number" => %onu.serial_number,
                "event" => event.name(),
                "error" => %e);
            e
        })
    }
}
