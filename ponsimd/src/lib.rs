// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! A broadband access-network simulator: an OLT and its subtending ONUs,
//! exposed through the same control surface a production device would
//! offer, with no hardware underneath.
//!
//! The core is the device tree in [`olt`], [`pon`] and [`onu`] (one task
//! per device, explicit transition tables in [`fsm`]), the ordered
//! north-bound indication stream in [`messages`], the control operations
//! in [`api`] and the frame routing in [`pipeline`].

pub mod api;
pub mod config;
pub mod fsm;
pub mod messages;
pub mod olt;
pub mod onu;
pub mod pipeline;
pub mod pon;
pub mod types;
pub mod views;
