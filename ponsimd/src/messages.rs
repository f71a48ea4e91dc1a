// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The message unions flowing through the simulator: per-ONU inbound
//! messages, and the indications multiplexed onto the north-bound stream.

use common::ids::OnuId;
use common::ids::PonId;
use common::ids::PortNo;
use common::ids::SerialNumber;
use slog::error;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::fsm::OnuEvent;
use crate::fsm::OperState;
use crate::types::SimResult;

/// A message delivered to an ONU's inbound channel and applied by its
/// owning task.
#[derive(Debug)]
pub enum OnuMessage {
    /// An FSM event.  When `reply` is present the sender is waiting for the
    /// transition to be accepted or rejected.
    Event {
        event: OnuEvent,
        reply: Option<oneshot::Sender<SimResult<()>>>,
    },
    /// A downstream frame to run through the subscriber sub-FSMs.
    Frame { payload: Vec<u8> },
    /// A flow table update pushed by the controller.
    FlowUpdate { eth_type: u16 },
    /// The last-gasp notification; forwarded north-bound without touching
    /// the internal state.
    DyingGasp { status: String },
    /// Stop the owning task.
    Shutdown,
}

/// An asynchronous event reported to the north-bound consumer.  Every
/// variant names the device it originated from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Indication {
    Olt {
        oper: OperState,
    },
    Pon {
        pon_id: PonId,
        oper: OperState,
    },
    OnuDiscovered {
        pon_id: PonId,
        onu_id: OnuId,
        serial_number: SerialNumber,
    },
    Onu {
        pon_id: PonId,
        onu_id: OnuId,
        oper: OperState,
    },
    Omci {
        pon_id: PonId,
        onu_id: OnuId,
        payload: Vec<u8>,
    },
    Packet {
        pon_id: PonId,
        onu_id: OnuId,
        port_no: PortNo,
        payload: Vec<u8>,
    },
    DyingGasp {
        pon_id: PonId,
        onu_id: OnuId,
        status: String,
    },
}

/// The producer half of the indication path.  Sends land on the OLT's
/// internal fan-in channel, which is unbounded so that device tasks and
/// control-plane callers never block behind a stalled consumer; the fan-in
/// task alone absorbs north-bound backpressure.
#[derive(Clone)]
pub struct IndicationSender {
    tx: mpsc::UnboundedSender<Indication>,
    log: slog::Logger,
}

impl IndicationSender {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Indication>,
        log: slog::Logger,
    ) -> Self {
        IndicationSender { tx, log }
    }

    /// Enqueue an indication.  A send to a torn-down stream is an internal
    /// fault: it is logged and the device carries on.
    pub fn send(&self, ind: Indication) {
        if self.tx.send(ind).is_err() {
            error!(self.log, "indication stream closed; dropping indication");
        }
    }
}

/// The consumer half of the north-bound stream: a strictly ordered,
/// single-consumer, backpressured sequence of [`Indication`]s.  Messages
/// from the same ONU arrive in enqueue order; no cross-ONU order is
/// guaranteed.
pub struct IndicationStream {
    rx: mpsc::Receiver<Indication>,
}

impl IndicationStream {
    pub(crate) fn new(rx: mpsc::Receiver<Indication>) -> Self {
        IndicationStream { rx }
    }

    /// Receive the next indication, or `None` once the OLT has shut down.
    pub async fn recv(&mut self) -> Option<Indication> {
        self.rx.recv().await
    }
}
