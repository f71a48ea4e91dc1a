// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! General types used throughout the simulator daemon.

use common::ids::PonId;
use common::ids::SerialNumber;

use crate::fsm::FsmError;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("cannot find ONU with serial number {serial_number}")]
    NoSuchOnu { serial_number: SerialNumber },
    #[error("PON port {pon_id} does not exist")]
    NoSuchPon { pon_id: PonId },
    #[error("ONU {onu_id} does not exist on PON port {pon_id}")]
    NoSuchOnuId {
        pon_id: PonId,
        onu_id: common::ids::OnuId,
    },
    #[error("NNI port {nni_id} does not exist")]
    NoSuchNni { nni_id: u32 },
    #[error("no ONU owns C-tag {c_tag}")]
    NoOnuForCtag { c_tag: u16 },
    #[error("PON port {pon_id} not enabled")]
    PonNotEnabled { pon_id: PonId },
    #[error("OLT not enabled")]
    OltNotEnabled,
    #[error(transparent)]
    Transition(#[from] FsmError),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Frame(#[from] packet::PacketError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Response codes surfaced on the north-bound control interface, aligned
/// with the standard gRPC code numbering for wire compatibility.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
pub enum ResponseCode {
    Ok = 0,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    FailedPrecondition = 9,
    Internal = 13,
}

impl SimError {
    pub fn code(&self) -> ResponseCode {
        match self {
            SimError::NoSuchOnu { .. }
            | SimError::NoSuchPon { .. }
            | SimError::NoSuchOnuId { .. }
            | SimError::NoSuchNni { .. }
            | SimError::NoOnuForCtag { .. } => ResponseCode::NotFound,
            SimError::PonNotEnabled { .. }
            | SimError::OltNotEnabled
            | SimError::Transition(_) => ResponseCode::FailedPrecondition,
            SimError::DeadlineExceeded => ResponseCode::DeadlineExceeded,
            SimError::Frame(_) => ResponseCode::InvalidArgument,
            SimError::Internal(_) => ResponseCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = SimError::NoSuchOnu {
            serial_number: "BBSM00000001".parse().unwrap(),
        };
        assert_eq!(err.code(), ResponseCode::NotFound);

        let err = SimError::PonNotEnabled { pon_id: PonId(0) };
        assert_eq!(err.code(), ResponseCode::FailedPrecondition);
        assert_eq!(err.to_string(), "PON port 0 not enabled");
    }
}
