// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The top-level OLT aggregate: PON ports, NNI uplinks, the operational
//! state machine and the indication fan-in.
//!
//! There is no process-wide singleton; callers construct an [`Olt`] handle
//! at startup and pass it wherever it is needed, so tests can run
//! independent instances side by side.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use tokio::sync::mpsc;

use common::ids::PonId;
use common::ids::SerialNumber;

use crate::config::Config;
use crate::config::ControlledActivation;
use crate::fsm::olt_transition;
use crate::fsm::OltState;
use crate::fsm::OperState;
use crate::fsm::PonEvent;
use crate::messages::Indication;
use crate::messages::IndicationSender;
use crate::messages::IndicationStream;
use crate::onu::Onu;
use crate::pon::PonPort;
use crate::types::SimError;
use crate::types::SimResult;

// Depth of the bounded north-bound stream.  When the consumer lags behind
// this, the fan-in task stalls; device tasks and the control plane do not.
const INDICATION_STREAM_DEPTH: usize = 512;

/// An NNI uplink port.
pub struct NniPort {
    pub id: u32,
    oper: Mutex<OperState>,
    packet_count: AtomicU64,
}

impl NniPort {
    fn new(id: u32) -> Arc<NniPort> {
        Arc::new(NniPort {
            id,
            oper: Mutex::new(OperState::Down),
            packet_count: AtomicU64::new(0),
        })
    }

    pub fn oper_state(&self) -> OperState {
        *self.oper.lock().unwrap()
    }

    fn set_oper(&self, state: OperState) {
        *self.oper.lock().unwrap() = state;
    }

    pub(crate) fn count_packet(&self) {
        self.packet_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count.load(Ordering::Relaxed)
    }
}

struct OltAdmin {
    internal: OltState,
    oper: OperState,
}

/// A handle to a running OLT instance.
pub type Olt = Arc<OltDevice>;

/// The simulated Optical Line Terminal.
pub struct OltDevice {
    pub id: u32,
    pub serial_number: String,
    pons: Vec<Arc<PonPort>>,
    nnis: Vec<Arc<NniPort>>,
    policy: ControlledActivation,
    state: Mutex<OltAdmin>,
    ind: IndicationSender,
    log: slog::Logger,
}

impl OltDevice {
    /// Build the device tree described by `config`, spawning the per-device
    /// tasks and the indication fan-in.  Returns the control handle and the
    /// north-bound stream.
    pub fn new(config: &Config, log: &slog::Logger) -> (Olt, IndicationStream) {
        let log = log.new(o!("olt_id" => config.olt_id));

        let (north_tx, north_rx) =
            mpsc::channel::<Indication>(INDICATION_STREAM_DEPTH);
        let (fan_tx, mut fan_rx) = mpsc::unbounded_channel::<Indication>();
        let ind = IndicationSender::new(fan_tx, log.clone());

        // The fan-in task is the single producer on the backpressured
        // stream; everything else enqueues through `ind`.
        let fan_log = log.new(o!("unit" => "indication-fan-in"));
        tokio::spawn(async move {
            while let Some(msg) = fan_rx.recv().await {
                if north_tx.send(msg).await.is_err() {
                    debug!(fan_log, "north-bound consumer is gone");
                    break;
                }
            }
            debug!(fan_log, "indication fan-in exiting");
        });

        let nnis = (0..config.num_nni_ports).map(NniPort::new).collect();
        let pons = (0..config.num_pon_ports)
            .map(|i| PonPort::new(PonId(i), config, &ind, &log))
            .collect();

        let olt = Arc::new(OltDevice {
            id: config.olt_id,
            serial_number: format!("BBSM_OLT_{}", config.olt_id),
            pons,
            nnis,
            policy: config.controlled_activation,
            state: Mutex::new(OltAdmin {
                internal: OltState::Created,
                oper: OperState::Down,
            }),
            ind,
            log,
        });
        (olt, IndicationStream::new(north_rx))
    }

    pub fn log(&self) -> &slog::Logger {
        &self.log
    }

    pub fn internal_state(&self) -> OltState {
        self.state.lock().unwrap().internal
    }

    pub fn oper_state(&self) -> OperState {
        self.state.lock().unwrap().oper
    }

    pub fn pons(&self) -> &[Arc<PonPort>] {
        &self.pons
    }

    pub fn nnis(&self) -> &[Arc<NniPort>] {
        &self.nnis
    }

    pub fn get_pon_by_id(&self, id: PonId) -> SimResult<Arc<PonPort>> {
        self.pons
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(SimError::NoSuchPon { pon_id: id })
    }

    pub(crate) fn get_nni_by_id(&self, id: u32) -> SimResult<Arc<NniPort>> {
        self.nnis
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(SimError::NoSuchNni { nni_id: id })
    }

    /// Look an ONU up by its serial number, anywhere on the OLT.
    pub fn find_onu_by_sn(&self, sn: &SerialNumber) -> SimResult<Arc<Onu>> {
        self.pons
            .iter()
            .find_map(|p| p.get_onu_by_sn(sn))
            .ok_or(SimError::NoSuchOnu { serial_number: *sn })
    }

    /// Synthesize a PonIndication from the port's current operational
    /// state and push it onto the stream.
    pub fn send_pon_indication(&self, id: PonId) -> SimResult<()> {
        let pon = self.get_pon_by_id(id)?;
        self.ind.send(Indication::Pon {
            pon_id: pon.id,
            oper: pon.oper_state(),
        });
        Ok(())
    }

    /// Bring the OLT up, cascading to the PON ports unless the activation
    /// policy reserves them for explicit commands.
    pub async fn enable(&self) -> SimResult<()> {
        {
            let mut st = self.state.lock().unwrap();
            st.internal = olt_transition(st.internal, PonEvent::Enable)?;
            st.oper = OperState::Up;
        }
        info!(self.log, "enabling OLT";
            "serial_number" => %self.serial_number);
        self.ind.send(Indication::Olt {
            oper: OperState::Up,
        });
        for nni in &self.nnis {
            nni.set_oper(OperState::Up);
        }

        if matches!(
            self.policy,
            ControlledActivation::Default | ControlledActivation::OnlyOnu
        ) {
            for pon in &self.pons {
                if let Err(e) = pon.enable().await {
                    error!(self.log, "error enabling PON port";
                        "pon_id" => %pon.id, "error" => %e);
                }
            }
        }
        Ok(())
    }

    /// Take the OLT down, disabling every enabled PON port first so their
    /// indications are emitted while the OLT is still operationally up.
    pub async fn disable(&self) -> SimResult<()> {
        {
            let mut st = self.state.lock().unwrap();
            st.internal = olt_transition(st.internal, PonEvent::Disable)?;
        }
        info!(self.log, "disabling OLT");
        for pon in &self.pons {
            if let Err(e) = pon.disable().await {
                error!(self.log, "error disabling PON port";
                    "pon_id" => %pon.id, "error" => %e);
            }
        }
        for nni in &self.nnis {
            nni.set_oper(OperState::Down);
        }
        self.state.lock().unwrap().oper = OperState::Down;
        self.ind.send(Indication::Olt {
            oper: OperState::Down,
        });
        Ok(())
    }

    /// Enable one PON port.  The OLT must be operating.
    pub async fn enable_pon(&self, id: PonId) -> SimResult<()> {
        if self.internal_state() != OltState::Enabled {
            return Err(SimError::OltNotEnabled);
        }
        self.get_pon_by_id(id)?.enable().await
    }

    /// Disable one PON port.
    pub async fn disable_pon(&self, id: PonId) -> SimResult<()> {
        self.get_pon_by_id(id)?.disable().await
    }

    /// Install a flow against an ONU.  Only the trap EtherType matters to
    /// the simulation; an EAPOL flow completes the subscriber bring-up.
    pub async fn flow_add(
        &self,
        pon_id: PonId,
        onu_id: common::ids::OnuId,
        eth_type: u16,
    ) -> SimResult<()> {
        let pon = self.get_pon_by_id(pon_id)?;
        let onu = pon.get_onu_by_id(onu_id)?;
        onu.deliver(crate::messages::OnuMessage::FlowUpdate { eth_type })
            .await
    }

    /// Stop every device task.  Indications already queued still drain to
    /// the stream before it ends.
    pub async fn shutdown(&self) {
        info!(self.log, "shutting down OLT");
        for pon in &self.pons {
            pon.shutdown().await;
        }
    }
}
