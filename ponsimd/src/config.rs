// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Configuration for `ponsimd`.

use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;
use structopt::StructOpt;

use common::logging::LogFormat;
use common::network::validate_vlan;

/// Command-line options for the daemon.  Everything is optional; defaults
/// and the topology file fill in the rest.
#[derive(Debug, Default, StructOpt)]
#[structopt(name = "ponsimd", about = "broadband access-network simulator")]
pub struct Opt {
    #[structopt(
        long,
        help = "send log data to the named file rather than stdout"
    )]
    pub log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        help = "format logs for 'human' or 'json' consumption"
    )]
    pub log_format: Option<LogFormat>,

    #[structopt(long, help = "TOML file describing the simulated topology")]
    pub config: Option<String>,

    #[structopt(long, help = "numeric ID of the simulated OLT")]
    pub olt_id: Option<u32>,

    #[structopt(long, help = "number of PON ports")]
    pub pon_ports: Option<u32>,

    #[structopt(long, help = "number of ONUs behind each PON port")]
    pub onus_per_pon: Option<u32>,

    #[structopt(long, help = "number of NNI uplink ports")]
    pub nni_ports: Option<u32>,

    #[structopt(long, help = "service VLAN pushed at the network side")]
    pub s_tag: Option<u16>,

    #[structopt(
        long,
        help = "first subscriber VLAN; ONUs count up from it"
    )]
    pub c_tag_init: Option<u16>,

    #[structopt(
        long,
        help = "activation policy: default, only-onu, only-pon or both"
    )]
    pub controlled_activation: Option<ControlledActivation>,
}

/// Which layers of the device tree wait for explicit activation commands
/// rather than coming up automatically when their parent is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlledActivation {
    /// Everything activates automatically.
    Default,
    /// PON ports auto-enable; ONUs wait for the controller.
    OnlyOnu,
    /// PON ports wait for the controller; ONUs then activate automatically.
    OnlyPon,
    /// Both layers wait for the controller.
    Both,
}

impl FromStr for ControlledActivation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(ControlledActivation::Default),
            "only-onu" => Ok(ControlledActivation::OnlyOnu),
            "only-pon" => Ok(ControlledActivation::OnlyPon),
            "both" => Ok(ControlledActivation::Both),
            _ => Err(format!("invalid activation policy: {s}")),
        }
    }
}

/// The run-time settings of the simulator, assembled from the command line
/// and an optional TOML topology file (command-line flags win).
#[derive(Debug, Clone)]
pub struct Config {
    /// If set, where the log should be written.  If not set, the log goes
    /// to stdout.
    pub log_file: Option<String>,

    /// Output log info in unstructured text or json?
    pub log_format: LogFormat,

    /// Numeric ID of the simulated OLT.
    pub olt_id: u32,

    /// Number of PON ports on the OLT.
    pub num_pon_ports: u32,

    /// Number of ONUs behind each PON port.
    pub num_onu_per_pon: u32,

    /// Number of NNI uplink ports.
    pub num_nni_ports: u32,

    /// The service VLAN pushed at the network side.
    pub s_tag: u16,

    /// The first customer VLAN; each ONU gets `c_tag_init + index`.
    pub c_tag_init: u16,

    /// Which device layers wait for explicit activation.
    pub controlled_activation: ControlledActivation,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_file: None,
            log_format: LogFormat::Human,
            olt_id: 0,
            num_pon_ports: 1,
            num_onu_per_pon: 1,
            num_nni_ports: 1,
            s_tag: 900,
            c_tag_init: 900,
            controlled_activation: ControlledActivation::Default,
        }
    }
}

// The subset of settings that may come from a topology file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    olt_id: Option<u32>,
    pon_ports: Option<u32>,
    onus_per_pon: Option<u32>,
    nni_ports: Option<u32>,
    s_tag: Option<u16>,
    c_tag_init: Option<u16>,
    controlled_activation: Option<ControlledActivation>,
}

/// Assemble the daemon configuration from the parsed command line.
pub fn build_config(opt: &Opt) -> anyhow::Result<Config> {
    let file = match &opt.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            toml::from_str::<ConfigFile>(&contents)
                .with_context(|| format!("parsing config file {path}"))?
        }
        None => ConfigFile::default(),
    };

    let defaults = Config::default();
    let config = Config {
        log_file: opt.log_file.clone(),
        log_format: opt.log_format.unwrap_or(defaults.log_format),
        olt_id: opt.olt_id.or(file.olt_id).unwrap_or(defaults.olt_id),
        num_pon_ports: opt
            .pon_ports
            .or(file.pon_ports)
            .unwrap_or(defaults.num_pon_ports),
        num_onu_per_pon: opt
            .onus_per_pon
            .or(file.onus_per_pon)
            .unwrap_or(defaults.num_onu_per_pon),
        num_nni_ports: opt
            .nni_ports
            .or(file.nni_ports)
            .unwrap_or(defaults.num_nni_ports),
        s_tag: opt.s_tag.or(file.s_tag).unwrap_or(defaults.s_tag),
        c_tag_init: opt
            .c_tag_init
            .or(file.c_tag_init)
            .unwrap_or(defaults.c_tag_init),
        controlled_activation: opt
            .controlled_activation
            .or(file.controlled_activation)
            .unwrap_or(defaults.controlled_activation),
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> anyhow::Result<()> {
    validate_vlan(config.s_tag).context("bad s-tag")?;
    validate_vlan(config.c_tag_init).context("bad c-tag")?;

    let total_onus = config.num_pon_ports * config.num_onu_per_pon;
    if total_onus == 0 {
        anyhow::bail!("topology has no ONUs");
    }
    let last_c_tag = config.c_tag_init as u32 + total_onus - 1;
    if last_c_tag > 4094 {
        anyhow::bail!(
            "c-tag range {}..={last_c_tag} exceeds the VLAN space",
            config.c_tag_init
        );
    }
    // ONU IDs and serial bytes are packed into single octets
    if config.num_onu_per_pon > 255 || config.num_pon_ports > 255 {
        anyhow::bail!("at most 255 PON ports and 255 ONUs per port");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt_with(f: impl FnOnce(&mut Opt)) -> Opt {
        let mut opt = Opt::default();
        f(&mut opt);
        opt
    }

    #[test]
    fn test_defaults() {
        let config = build_config(&Opt::default()).unwrap();
        assert_eq!(config.num_pon_ports, 1);
        assert_eq!(config.s_tag, 900);
        assert_eq!(
            config.controlled_activation,
            ControlledActivation::Default
        );
    }

    #[test]
    fn test_flag_overrides() {
        let opt = opt_with(|o| {
            o.pon_ports = Some(4);
            o.onus_per_pon = Some(16);
        });
        let config = build_config(&opt).unwrap();
        assert_eq!(config.num_pon_ports, 4);
        assert_eq!(config.num_onu_per_pon, 16);
    }

    #[test]
    fn test_ctag_space_exhaustion() {
        let opt = opt_with(|o| {
            o.pon_ports = Some(64);
            o.onus_per_pon = Some(64);
            o.c_tag_init = Some(4000);
        });
        assert!(build_config(&opt).is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "only-pon".parse::<ControlledActivation>().unwrap(),
            ControlledActivation::OnlyPon
        );
        assert!("sometimes".parse::<ControlledActivation>().is_err());
    }
}
