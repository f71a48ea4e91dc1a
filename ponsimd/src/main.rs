// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Main application entry point for `ponsimd`, the broadband
//! access-network simulator.

use anyhow::Context;
use futures::stream::StreamExt;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGQUIT;
use signal_hook::consts::SIGTERM;
use signal_hook_tokio::Signals;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use structopt::StructOpt;

use ponsimd::config;
use ponsimd::config::Opt;
use ponsimd::olt::OltDevice;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let config = config::build_config(&opt)?;

    let log =
        common::logging::init("ponsimd", &config.log_file, config.log_format)?;
    info!(log, "ponsimd config: {config:#?}");

    let (olt, mut stream) = OltDevice::new(&config, &log);

    // Stand-in for the north-bound transport: drain the indication stream
    // into the log so the device tree never stalls on a missing consumer.
    let stream_log = log.new(o!("unit" => "indication-stream"));
    let drain = tokio::spawn(async move {
        while let Some(ind) = stream.recv().await {
            debug!(stream_log, "indication"; "msg" => ?ind);
        }
        debug!(stream_log, "indication stream ended");
    });

    olt.enable().await.context("enabling OLT")?;
    info!(log, "OLT enabled";
        "pon_ports" => config.num_pon_ports,
        "onus_per_pon" => config.num_onu_per_pon);

    // Wait for a signal to exit.
    let mut signals =
        Signals::new([SIGTERM, SIGQUIT, SIGINT]).context("signal handler")?;
    if let Some(signal) = signals.next().await {
        info!(log, "caught signal, shutting down"; "signal" => signal);
    }

    if let Err(e) = olt.disable().await {
        error!(log, "error disabling OLT"; "error" => %e);
    }
    olt.shutdown().await;
    drop(olt);
    let _ = drain.await;

    info!(log, "done");
    Ok(())
}
