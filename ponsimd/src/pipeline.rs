// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The packet pipeline: classification, tag transforms and routing of
//! frames between the north-bound adapter, the ONUs and the NNI uplinks.
//!
//! The simulator never touches raw sockets; frames enter and leave as
//! opaque buffers.  Downstream packet-outs land on the owning ONU's task,
//! where the subscriber sub-FSMs consume them.  Upstream subscriber frames
//! of the "other traffic" class are tag-swapped and returned as the frame
//! that would egress the uplink.

use slog::debug;

use common::ids::OnuId;
use common::ids::PonId;

use packet::classify::classify;
use packet::classify::FrameClass;
use packet::eth;

use crate::messages::OnuMessage;
use crate::olt::OltDevice;
use crate::onu::Onu;
use crate::types::SimError;
use crate::types::SimResult;

impl OltDevice {
    /// A controller-originated frame addressed to an ONU (packet-out).
    /// EAPOL and DHCP frames drive that ONU's subscriber machines; anything
    /// else is counted and dropped at the UNI.
    pub async fn onu_packet_out(
        &self,
        pon_id: PonId,
        onu_id: OnuId,
        payload: Vec<u8>,
    ) -> SimResult<()> {
        let pon = self.get_pon_by_id(pon_id)?;
        let onu = pon.get_onu_by_id(onu_id)?;
        pon.count_packet();
        onu.deliver(OnuMessage::Frame { payload }).await
    }

    /// A frame arriving on an NNI uplink.  The service tag is popped and
    /// the frame is routed to the ONU owning the exposed C-tag.
    pub async fn uplink_packet_in(
        &self,
        nni_id: u32,
        frame: &[u8],
    ) -> SimResult<()> {
        let nni = self.get_nni_by_id(nni_id)?;
        nni.count_packet();

        let inner = eth::pop_single_tag(frame)?;
        let c_tag = eth::vlan_tag(&inner)?;
        let onu = self.find_onu_by_ctag(c_tag)?;
        let payload = eth::pop_single_tag(&inner)?;

        debug!(self.log(), "routing uplink frame";
            "c_tag" => c_tag,
            "pon_id" => %onu.pon_id,
            "onu_id" => %onu.id);
        let pon = self.get_pon_by_id(onu.pon_id)?;
        pon.count_packet();
        onu.deliver(OnuMessage::Frame { payload }).await
    }

    /// A subscriber frame entering at an ONU UNI and headed upstream.
    /// Returns the frame as it would egress the uplink: C-tagged at the
    /// ONU, S-tagged crossing the OLT.  Subscriber-protocol traffic does
    /// not take this path; it is emitted by the ONU machines themselves.
    pub fn uni_packet_in(
        &self,
        pon_id: PonId,
        onu_id: OnuId,
        nni_id: u32,
        frame: &[u8],
    ) -> SimResult<Vec<u8>> {
        let pon = self.get_pon_by_id(pon_id)?;
        let onu = pon.get_onu_by_id(onu_id)?;
        let nni = self.get_nni_by_id(nni_id)?;

        if let class @ (FrameClass::Eapol | FrameClass::Dhcp
        | FrameClass::Igmp) = classify(frame)
        {
            debug!(self.log(), "subscriber frame on the forwarding path";
                "class" => ?class);
        }

        let tagged = eth::push_double_tag(onu.s_tag, onu.c_tag, frame)?;
        pon.count_packet();
        nni.count_packet();
        Ok(tagged)
    }

    fn find_onu_by_ctag(&self, c_tag: u16) -> SimResult<std::sync::Arc<Onu>> {
        self.pons()
            .iter()
            .flat_map(|p| p.onus().iter())
            .find(|o| o.c_tag == c_tag)
            .cloned()
            .ok_or(SimError::NoOnuForCtag { c_tag })
    }
}
