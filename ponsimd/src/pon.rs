// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! PON ports and the admin tasks that serialize their transitions.
//!
//! A PON transition cascades to the child ONUs: enabling a freshly-created
//! port may auto-discover its ONUs (depending on the activation policy),
//! re-enabling a disabled port re-discovers them, and disabling a port
//! parks every non-quiescent ONU in `pon_disabled`.  Errors from individual
//! ONUs are logged and skipped; the port transition itself always proceeds.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use slog::debug;
use slog::error;
use slog::o;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use common::ids::OnuId;
use common::ids::PonId;
use common::ids::SerialNumber;

use crate::config::Config;
use crate::config::ControlledActivation;
use crate::fsm::pon_transition;
use crate::fsm::OnuEvent;
use crate::fsm::OnuState;
use crate::fsm::OperState;
use crate::fsm::PonEvent;
use crate::fsm::PonState;
use crate::messages::Indication;
use crate::messages::IndicationSender;
use crate::messages::OnuMessage;
use crate::onu::Onu;
use crate::types::SimError;
use crate::types::SimResult;

/// The admin-plane state of a PON port.  Mutated only by the port's task;
/// read by API snapshots and by child ONUs gating their frame emission.
#[derive(Debug)]
pub(crate) struct PonAdmin {
    internal: Mutex<PonState>,
    oper: Mutex<OperState>,
}

impl PonAdmin {
    fn new() -> Self {
        PonAdmin {
            internal: Mutex::new(PonState::Created),
            oper: Mutex::new(OperState::Down),
        }
    }

    pub(crate) fn internal(&self) -> PonState {
        *self.internal.lock().unwrap()
    }

    pub(crate) fn oper(&self) -> OperState {
        *self.oper.lock().unwrap()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.internal() == PonState::Enabled
    }

    fn set_internal(&self, state: PonState) {
        *self.internal.lock().unwrap() = state;
    }

    fn set_oper(&self, state: OperState) {
        *self.oper.lock().unwrap() = state;
    }
}

pub(crate) enum PonMessage {
    Enable {
        reply: oneshot::Sender<SimResult<()>>,
    },
    Disable {
        reply: oneshot::Sender<SimResult<()>>,
    },
    Shutdown,
}

/// A PON port and the ONUs behind it.
pub struct PonPort {
    pub id: PonId,
    admin: Arc<PonAdmin>,
    onus: Vec<Arc<Onu>>,
    tx: mpsc::Sender<PonMessage>,
    packet_count: AtomicU64,
    log: slog::Logger,
}

impl PonPort {
    /// Build the port and its ONUs, spawning the owning tasks.
    pub(crate) fn new(
        id: PonId,
        config: &Config,
        ind: &IndicationSender,
        log: &slog::Logger,
    ) -> Arc<PonPort> {
        let log = log.new(o!("pon_id" => id.to_string()));
        let admin = Arc::new(PonAdmin::new());

        let mut onus = Vec::with_capacity(config.num_onu_per_pon as usize);
        for i in 0..config.num_onu_per_pon {
            let onu_id = OnuId(i + 1);
            let c_tag = config.c_tag_init
                + (id.0 * config.num_onu_per_pon + i) as u16;
            let (onu, rx) = Onu::new(
                config.olt_id,
                id,
                onu_id,
                config.s_tag,
                c_tag,
                &log,
            );
            crate::onu::start(onu.clone(), rx, ind.clone(), admin.clone());
            onus.push(onu);
        }

        let (tx, rx) = mpsc::channel(8);
        let port = Arc::new(PonPort {
            id,
            admin: admin.clone(),
            onus: onus.clone(),
            tx,
            packet_count: AtomicU64::new(0),
            log: log.clone(),
        });

        let task = PonTask {
            id,
            admin,
            onus,
            policy: config.controlled_activation,
            ind: ind.clone(),
            log,
        };
        tokio::spawn(task.run(rx));

        port
    }

    pub fn internal_state(&self) -> PonState {
        self.admin.internal()
    }

    pub fn oper_state(&self) -> OperState {
        self.admin.oper()
    }

    pub fn onus(&self) -> &[Arc<Onu>] {
        &self.onus
    }

    pub fn get_onu_by_id(&self, id: OnuId) -> SimResult<Arc<Onu>> {
        self.onus
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(SimError::NoSuchOnuId {
                pon_id: self.id,
                onu_id: id,
            })
    }

    pub fn get_onu_by_sn(&self, sn: &SerialNumber) -> Option<Arc<Onu>> {
        self.onus.iter().find(|o| &o.serial_number == sn).cloned()
    }

    /// Number of ONUs that have progressed beyond the quiescent pool.
    pub fn active_onu_count(&self) -> u32 {
        self.onus
            .iter()
            .filter(|o| {
                !matches!(
                    o.internal_state(),
                    OnuState::Created
                        | OnuState::Initialized
                        | OnuState::Disabled
                )
            })
            .count() as u32
    }

    pub(crate) fn count_packet(&self) {
        self.packet_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count.load(Ordering::Relaxed)
    }

    /// Enable the port, waiting for the transition and its cascade.
    pub async fn enable(&self) -> SimResult<()> {
        self.transition(|reply| PonMessage::Enable { reply }).await
    }

    /// Disable the port, parking the child ONUs.
    pub async fn disable(&self) -> SimResult<()> {
        self.transition(|reply| PonMessage::Disable { reply }).await
    }

    async fn transition<F>(&self, msg: F) -> SimResult<()>
    where
        F: FnOnce(oneshot::Sender<SimResult<()>>) -> PonMessage,
    {
        let (reply, rx) = oneshot::channel();
        self.tx.send(msg(reply)).await.map_err(|_| {
            SimError::Internal(format!("PON port {} task is gone", self.id))
        })?;
        rx.await.map_err(|_| {
            SimError::Internal(format!(
                "PON port {} dropped transition reply",
                self.id
            ))
        })?
    }

    /// Stop the port task and every child ONU task.
    pub(crate) async fn shutdown(&self) {
        debug!(self.log, "stopping PON port");
        let _ = self.tx.send(PonMessage::Shutdown).await;
        for onu in &self.onus {
            let _ = onu.deliver(OnuMessage::Shutdown).await;
        }
    }
}

// The state owned by a PON port's admin task.
struct PonTask {
    id: PonId,
    admin: Arc<PonAdmin>,
    onus: Vec<Arc<Onu>>,
    policy: ControlledActivation,
    ind: IndicationSender,
    log: slog::Logger,
}

impl PonTask {
    async fn run(self, mut rx: mpsc::Receiver<PonMessage>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                PonMessage::Enable { reply } => {
                    let _ = reply.send(self.handle_enable().await);
                }
                PonMessage::Disable { reply } => {
                    let _ = reply.send(self.handle_disable().await);
                }
                PonMessage::Shutdown => break,
            }
        }
        debug!(self.log, "PON task exiting");
    }

    // Send the ONU an event, logging and swallowing a rejection.  Returns
    // false if the event was not accepted.
    async fn onu_event(&self, onu: &Arc<Onu>, event: OnuEvent) -> bool {
        if let Err(e) = onu.event(event).await {
            error!(self.log, "error cascading event to ONU";
                "onu_id" => %onu.id,
                "event" => event.name(),
                "error" => %e);
            false
        } else {
            true
        }
    }

    async fn handle_enable(&self) -> SimResult<()> {
        let prev = self.admin.internal();
        let next = pon_transition(prev, PonEvent::Enable)?;
        debug!(self.log, "changing PON port internal state";
            "from" => prev.name(), "to" => next.name());
        self.admin.set_internal(next);
        self.admin.set_oper(OperState::Up);
        self.ind.send(Indication::Pon {
            pon_id: self.id,
            oper: OperState::Up,
        });

        match prev {
            PonState::Created => {
                if matches!(
                    self.policy,
                    ControlledActivation::Default
                        | ControlledActivation::OnlyPon
                ) {
                    for onu in &self.onus {
                        if !self.onu_event(onu, OnuEvent::Initialize).await {
                            continue;
                        }
                        self.onu_event(onu, OnuEvent::Discover).await;
                    }
                }
            }
            PonState::Disabled => {
                for onu in &self.onus {
                    match onu.internal_state() {
                        OnuState::PonDisabled => {
                            self.onu_event(onu, OnuEvent::Discover).await;
                        }
                        OnuState::Disabled => {
                            if self
                                .onu_event(onu, OnuEvent::Initialize)
                                .await
                            {
                                self.onu_event(onu, OnuEvent::Discover)
                                    .await;
                            }
                        }
                        _ => {}
                    }
                }
            }
            PonState::Enabled => {}
        }
        Ok(())
    }

    async fn handle_disable(&self) -> SimResult<()> {
        let prev = self.admin.internal();
        let next = pon_transition(prev, PonEvent::Disable)?;
        debug!(self.log, "changing PON port internal state";
            "from" => prev.name(), "to" => next.name());
        self.admin.set_internal(next);
        self.admin.set_oper(OperState::Down);
        self.ind.send(Indication::Pon {
            pon_id: self.id,
            oper: OperState::Down,
        });

        // ONUs still in `initialized` are left alone as a quiescent pool.
        for onu in &self.onus {
            if onu.internal_state() == OnuState::Initialized {
                continue;
            }
            self.onu_event(onu, OnuEvent::PonDisabled).await;
        }
        Ok(())
    }
}
