use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;

use pri_core::{NodeType, SwitchType};

use super::stack_config::{CfgIo, InterfaceKind, IoBackend, SharedConfig, StackConfig, StackState};
use super::timers::{TimerIdx, TimerTable};

const CONFIG_VERSION: &str = "0.1";

type CfgResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Parses a D-channel configuration. Unknown keys, unknown timer names and an
/// inconsistent frame transport are all refused rather than ignored.
pub fn from_toml_str(toml_str: &str) -> CfgResult<SharedConfig> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;
    if root.config_version != CONFIG_VERSION {
        return Err(format!("config_version {} is not supported (want {})", root.config_version, CONFIG_VERSION).into());
    }
    reject_unknown("top level", &root.extra)?;

    let mut cfg = StackConfig::new(root.node, root.switch, root.interface);
    cfg.debug_log = root.debug_log;
    if let Some(io) = root.io {
        reject_unknown("[io]", &io.extra)?;
        io.apply(&mut cfg.io);
    }
    if let Some(opts) = root.options {
        reject_unknown("[options]", &opts.extra)?;
        opts.apply(&mut cfg);
    }
    for (name, value) in sorted(root.timers.unwrap_or_default()) {
        set_timer(&mut cfg.timers, &name, value)?;
    }

    cfg.validate().map_err(|e| format!("inconsistent configuration: {}", e))?;
    let state = StackState::from_config(&cfg);
    Ok(SharedConfig::from_parts(cfg, state))
}

pub fn from_reader<R: Read>(mut reader: R) -> CfgResult<SharedConfig> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    from_toml_str(&text)
}

pub fn from_file<P: AsRef<Path>>(path: P) -> CfgResult<SharedConfig> {
    from_reader(BufReader::new(File::open(path)?))
}

fn reject_unknown(section: &str, extra: &HashMap<String, Value>) -> Result<(), String> {
    if extra.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = sorted(extra.clone()).into_iter().map(|(k, _)| k).collect();
    Err(format!("unknown keys in {}: {}", section, names.join(", ")))
}

fn sorted<V>(map: HashMap<String, V>) -> Vec<(String, V)> {
    let mut v: Vec<(String, V)> = map.into_iter().collect();
    v.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    v
}

/// `T309 = 6000` sets a timer in milliseconds, `-1` disables it.
fn set_timer(timers: &mut TimerTable, name: &str, value: i64) -> Result<(), String> {
    let idx = TimerIdx::from_name(name).ok_or_else(|| format!("no timer named {}", name))?;
    if value == -1 {
        timers.disable(idx);
        return Ok(());
    }
    let ms = i32::try_from(value).map_err(|_| format!("{} = {} does not fit", name, value))?;
    timers.set(idx, ms).map_err(|e| format!("{}: {}", name, e))?;
    Ok(())
}

impl IoDto {
    fn apply(self, io: &mut CfgIo) {
        io.backend = self.backend;
        io.local_path = self.local_path;
        io.peer_path = self.peer_path;
        io.compute_fcs = self.compute_fcs.unwrap_or(io.compute_fcs);
    }
}

impl OptionsDto {
    fn apply(self, cfg: &mut StackConfig) {
        cfg.debug_flags = self.debug_flags.unwrap_or(cfg.debug_flags);
        cfg.overlapdial = self.overlapdial.unwrap_or(cfg.overlapdial);
        cfg.inband_disconnect = self.inband_disconnect.unwrap_or(cfg.inband_disconnect);
        cfg.sendfacility = self.sendfacility.unwrap_or(cfg.sendfacility);
        cfg.nsf = self.nsf;
    }
}

// Input shape of the file

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    node: NodeType,
    switch: SwitchType,
    interface: InterfaceKind,
    debug_log: Option<String>,

    #[serde(default)]
    io: Option<IoDto>,
    #[serde(default)]
    options: Option<OptionsDto>,
    /// Timer name to milliseconds
    #[serde(default)]
    timers: Option<HashMap<String, i64>>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct IoDto {
    backend: IoBackend,
    local_path: Option<String>,
    peer_path: Option<String>,
    compute_fcs: Option<bool>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct OptionsDto {
    debug_flags: Option<u32>,
    overlapdial: Option<bool>,
    inband_disconnect: Option<bool>,
    sendfacility: Option<bool>,
    /// Network specific facility code, DMS-100 and 4ESS only
    nsf: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
config_version = "0.1"
node = "Cpe"
switch = "Ni2"
interface = "Pri"

[io]
backend = "None"

[options]
overlapdial = true
nsf = 3

[timers]
T309 = 6000
t203 = -1
"#;

    #[test]
    fn parses_basic_config() {
        let shared = from_toml_str(BASIC).unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.node, NodeType::Cpe);
        assert_eq!(cfg.switch, SwitchType::Ni2);
        assert_eq!(cfg.nsf, Some(3));
        let state = shared.state_read();
        assert!(state.overlapdial);
        assert_eq!(state.timers.get(TimerIdx::T309), 6000);
        assert_eq!(state.timers.delay_ms(TimerIdx::T203), None);
        assert_eq!(state.timers.get(TimerIdx::T200), 1000);
    }

    #[test]
    fn rejects_unknown_fields_and_timers() {
        let extra = BASIC.replace("[io]", "bogus = 1\n[io]");
        assert!(from_toml_str(&extra).is_err());
        let bad_timer = BASIC.replace("T309", "T399");
        assert!(from_toml_str(&bad_timer).is_err());
        let bad_version = BASIC.replace("\"0.1\"", "\"9.9\"");
        assert!(from_toml_str(&bad_version).is_err());
    }

    #[test]
    fn unix_backend_requires_paths() {
        let cfg = BASIC.replace("backend = \"None\"", "backend = \"UnixDatagram\"\nlocal_path = \"/tmp/a\"");
        assert!(from_toml_str(&cfg).is_err());
    }
}
