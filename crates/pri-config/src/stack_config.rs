use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pri_core::{DebugFlags, NodeType, SwitchType};

use crate::timers::{TimerIdx, TimerTable};

/// Physical interface the D-channel runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InterfaceKind {
    /// Primary rate, TEI 0
    Pri,
    /// Basic rate, point-to-point, TEI 0
    BriPtp,
    /// Basic rate, point-to-multipoint, TEI assigned by the network
    BriPtmp,
}

impl InterfaceKind {
    pub fn is_bri(self) -> bool {
        self != InterfaceKind::Pri
    }
}

/// The frame I/O backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum IoBackend {
    Undefined,
    /// No I/O, frames are handed to the stack by the embedding code
    None,
    /// Unix datagram socket, one HDLC frame per datagram
    UnixDatagram,
}

/// Frame I/O configuration
#[derive(Debug, Clone)]
pub struct CfgIo {
    pub backend: IoBackend,

    /// For UnixDatagram backend: our socket path
    pub local_path: Option<String>,
    /// For UnixDatagram backend: the peer's socket path
    pub peer_path: Option<String>,

    /// Compute the FCS on transmit instead of leaving it to the HDLC driver
    pub compute_fcs: bool,
}

impl Default for CfgIo {
    fn default() -> Self {
        Self {
            backend: IoBackend::Undefined,
            local_path: None,
            peer_path: None,
            compute_fcs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StackConfig {
    pub node: NodeType,
    pub switch: SwitchType,
    pub interface: InterfaceKind,
    pub debug_log: Option<String>,

    pub io: CfgIo,

    /// Initial runtime settings. Copied into StackState on construction.
    pub debug_flags: u32,
    pub overlapdial: bool,
    pub inband_disconnect: bool,
    pub sendfacility: bool,
    /// Network specific facility code, None for no NSF IE
    pub nsf: Option<u8>,
    pub timers: TimerTable,
}

impl StackConfig {
    pub fn new(node: NodeType, switch: SwitchType, interface: InterfaceKind) -> Self {
        StackConfig {
            node,
            switch,
            interface,
            debug_log: None,
            io: CfgIo::default(),
            debug_flags: 0,
            overlapdial: false,
            inband_disconnect: false,
            sendfacility: false,
            nsf: None,
            timers: TimerTable::default(),
        }
    }

    /// Refuses a transport without its parameters, internal GR-303 types and
    /// link parameters that would stall Q.921
    pub fn validate(&self) -> Result<(), &str> {
        match self.io.backend {
            IoBackend::UnixDatagram => {
                if self.io.local_path.is_none() || self.io.peer_path.is_none() {
                    return Err("UnixDatagram backend requires local_path and peer_path");
                }
            }
            IoBackend::None => {}
            IoBackend::Undefined => {
                return Err("io backend must be defined");
            }
        };

        if matches!(self.switch, SwitchType::Gr303EocPath | SwitchType::Gr303TmcSwitching) {
            return Err("internal GR-303 switch types can't be configured");
        }
        if self.switch.is_gr303() && self.interface.is_bri() {
            return Err("GR-303 runs on a primary rate interface only");
        }
        if self.timers.get(TimerIdx::K) < 1 {
            return Err("window size K must be at least 1");
        }
        if self.timers.get(TimerIdx::N200) < 1 || self.timers.get(TimerIdx::T200) < 1 {
            return Err("N200 and T200 must be positive");
        }

        Ok(())
    }
}

/// Settings the host may change while the D-channel runs
#[derive(Debug, Clone, Default)]
pub struct StackState {
    pub debug: DebugFlags,
    pub overlapdial: bool,
    pub inband_disconnect: bool,
    pub sendfacility: bool,
    pub nsf: Option<u8>,
    pub timers: TimerTable,
}

impl StackState {
    pub fn from_config(cfg: &StackConfig) -> Self {
        Self {
            debug: DebugFlags(cfg.debug_flags),
            overlapdial: cfg.overlapdial,
            inband_disconnect: cfg.inband_disconnect,
            sendfacility: cfg.sendfacility,
            nsf: cfg.nsf,
            timers: cfg.timers.clone(),
        }
    }
}

/// Configuration handle shared by every layer of one D-channel. The
/// `StackConfig` is fixed once built; `StackState` is written by the host API.
#[derive(Clone)]
pub struct SharedConfig {
    cfg: Arc<StackConfig>,
    state: Arc<RwLock<StackState>>,
}

impl SharedConfig {
    pub fn new(node: NodeType, switch: SwitchType, interface: InterfaceKind) -> Self {
        let mut cfg = StackConfig::new(node, switch, interface);
        cfg.io.backend = IoBackend::None;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: StackConfig) -> Self {
        let state = StackState::from_config(&cfg);
        Self::from_parts(cfg, state)
    }

    /// Panics on a configuration `validate` refuses
    pub fn from_parts(cfg: StackConfig, state: StackState) -> Self {
        if let Err(e) = cfg.validate() {
            panic!("invalid D-channel configuration: {}", e);
        }
        Self { cfg: Arc::new(cfg), state: Arc::new(RwLock::new(state)) }
    }

    pub fn config(&self) -> Arc<StackConfig> {
        Arc::clone(&self.cfg)
    }

    /// Lock poisoning is ignored, the state only holds plain values
    pub fn state_read(&self) -> RwLockReadGuard<'_, StackState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state_write(&self) -> RwLockWriteGuard<'_, StackState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shorthand for the current debug flags
    pub fn debug(&self) -> DebugFlags {
        self.state_read().debug
    }

    /// Shorthand for a timer value
    pub fn timer(&self, idx: TimerIdx) -> i32 {
        self.state_read().timers.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_seeded_from_config() {
        let mut cfg = StackConfig::new(NodeType::Cpe, SwitchType::Ni2, InterfaceKind::Pri);
        cfg.io.backend = IoBackend::None;
        cfg.overlapdial = true;
        cfg.debug_flags = DebugFlags::Q931_DUMP;
        let shared = SharedConfig::from_config(cfg);
        assert!(shared.state_read().overlapdial);
        assert!(shared.debug().has(DebugFlags::Q931_DUMP));
        shared.state_write().overlapdial = false;
        assert!(!shared.state_read().overlapdial);
    }

    #[test]
    fn gr303_on_bri_is_rejected() {
        let mut cfg = StackConfig::new(NodeType::Cpe, SwitchType::Gr303Tmc, InterfaceKind::BriPtp);
        cfg.io.backend = IoBackend::None;
        assert!(cfg.validate().is_err());
    }
}
