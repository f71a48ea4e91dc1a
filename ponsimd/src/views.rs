// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Public API view types, exposing the internal device state in a manner
//! suitable for API clients.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use common::ids::OnuId;
use common::ids::PonId;
use common::ids::PortNo;

use crate::onu;
use crate::pon;

/// A snapshot of one ONU.
//
// NOTE: This is the public API view onto `onu::Onu`.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct OnuSnapshot {
    /// The ONU's ID within its PON port.
    pub id: OnuId,
    /// The immutable vendor serial number.
    pub serial_number: String,
    /// Operational state name, `up` or `down`.
    pub oper_state: String,
    /// Name of the internal lifecycle state.
    pub internal_state: String,
    /// The PON port this ONU hangs off.
    pub pon_port_id: PonId,
    /// The service VLAN applied at the network side.
    pub s_tag: u16,
    /// The subscriber VLAN.
    pub c_tag: u16,
    /// The hardware address of the UNI.
    pub hw_address: String,
    /// The logical port number on the north-bound interface.
    pub port_no: PortNo,
}

impl std::fmt::Display for OnuSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.pon_port_id, self.id)
    }
}

impl From<&onu::Onu> for OnuSnapshot {
    fn from(o: &onu::Onu) -> Self {
        Self {
            id: o.id,
            serial_number: o.serial_number.to_string(),
            oper_state: o.oper_state().name().to_string(),
            internal_state: o.internal_state().name().to_string(),
            pon_port_id: o.pon_id,
            s_tag: o.s_tag,
            c_tag: o.c_tag,
            hw_address: o.hw_address.to_string(),
            port_no: o.port_no,
        }
    }
}

/// A snapshot of one PON port.
//
// NOTE: This is a view onto `pon::PonPort`.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct PonSnapshot {
    /// The port's ID on the OLT.
    pub id: PonId,
    /// Name of the internal lifecycle state.
    pub internal_state: String,
    /// Operational state name, `up` or `down`.
    pub oper_state: String,
    /// ONUs configured behind this port.
    pub onu_count: u32,
    /// ONUs that have progressed beyond the quiescent pool.
    pub active_onu_count: u32,
    /// Frames this port has carried.
    pub packet_count: u64,
}

impl From<&pon::PonPort> for PonSnapshot {
    fn from(p: &pon::PonPort) -> Self {
        Self {
            id: p.id,
            internal_state: p.internal_state().name().to_string(),
            oper_state: p.oper_state().name().to_string(),
            onu_count: p.onus().len() as u32,
            active_onu_count: p.active_onu_count(),
            packet_count: p.packet_count(),
        }
    }
}
