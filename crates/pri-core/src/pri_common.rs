use serde::Deserialize;

/// Service access points between the entities of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sap {
    /// PhyIo/Lapd, raw HDLC frames
    PhSap,
    /// Lapd/CallControl, data link service
    DlSap,
    /// CallControl/Host, call control events towards the application
    CcSap,
}

/// Which side of the user-network interface we are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum NodeType {
    Network = 1,
    Cpe = 2,
}

impl NodeType {
    pub fn into_raw(self) -> u8 {
        self as u8
    }

    pub fn is_cpe(self) -> bool {
        self == NodeType::Cpe
    }
}

impl core::fmt::Display for NodeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NodeType::Network => write!(f, "Network"),
            NodeType::Cpe => write!(f, "CPE"),
        }
    }
}

/// Switch variant spoken on the D-channel. The last two are used internally for GR-303 subchannels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SwitchType {
    Unknown = 0,
    Ni2 = 1,
    Dms100 = 2,
    Lucent5e = 3,
    Att4ess = 4,
    EuroIsdnE1 = 5,
    EuroIsdnT1 = 6,
    Ni1 = 7,
    Gr303Eoc = 8,
    Gr303Tmc = 9,
    Qsig = 10,
    #[serde(skip)]
    Gr303EocPath = 19,
    #[serde(skip)]
    Gr303TmcSwitching = 20,
}

impl std::convert::TryFrom<u64> for SwitchType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(SwitchType::Unknown),
            1 => Ok(SwitchType::Ni2),
            2 => Ok(SwitchType::Dms100),
            3 => Ok(SwitchType::Lucent5e),
            4 => Ok(SwitchType::Att4ess),
            5 => Ok(SwitchType::EuroIsdnE1),
            6 => Ok(SwitchType::EuroIsdnT1),
            7 => Ok(SwitchType::Ni1),
            8 => Ok(SwitchType::Gr303Eoc),
            9 => Ok(SwitchType::Gr303Tmc),
            10 => Ok(SwitchType::Qsig),
            19 => Ok(SwitchType::Gr303EocPath),
            20 => Ok(SwitchType::Gr303TmcSwitching),
            _ => Err(()),
        }
    }
}

impl SwitchType {
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn is_gr303(self) -> bool {
        matches!(self, SwitchType::Gr303Eoc | SwitchType::Gr303Tmc | SwitchType::Gr303EocPath | SwitchType::Gr303TmcSwitching)
    }

    /// EuroISDN, either flavour
    pub fn is_euro(self) -> bool {
        matches!(self, SwitchType::EuroIsdnE1 | SwitchType::EuroIsdnT1)
    }
}

impl core::fmt::Display for SwitchType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SwitchType::Unknown => write!(f, "Unknown switchtype"),
            SwitchType::Ni2 => write!(f, "National ISDN"),
            SwitchType::Dms100 => write!(f, "Nortel DMS100"),
            SwitchType::Lucent5e => write!(f, "Lucent 5E"),
            SwitchType::Att4ess => write!(f, "AT&T 4ESS"),
            SwitchType::EuroIsdnE1 => write!(f, "EuroISDN"),
            SwitchType::EuroIsdnT1 => write!(f, "US EuroISDN"),
            SwitchType::Ni1 => write!(f, "Old National ISDN"),
            SwitchType::Gr303Eoc => write!(f, "GR303 EOC"),
            SwitchType::Gr303Tmc => write!(f, "GR303 TMC"),
            SwitchType::Qsig => write!(f, "Q.SIG switch"),
            SwitchType::Gr303EocPath => write!(f, "GR303 EOC Path"),
            SwitchType::Gr303TmcSwitching => write!(f, "GR303 TMC Switching"),
        }
    }
}

/// Debug flags as set by the application. Each flag enables a class of log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugFlags(pub u32);

impl DebugFlags {
    /// Raw HDLC frames
    pub const Q921_RAW: u32 = 1 << 0;
    /// Each interpreted Q.921 frame
    pub const Q921_DUMP: u32 = 1 << 1;
    /// Q.921 state machine changes
    pub const Q921_STATE: u32 = 1 << 2;
    /// Configuration errors
    pub const CONFIG: u32 = 1 << 3;
    /// Interpreted Q.931 messages
    pub const Q931_DUMP: u32 = 1 << 5;
    /// Q.931 state machine changes
    pub const Q931_STATE: u32 = 1 << 6;
    /// Unexpected events
    pub const Q931_ANOMALY: u32 = 1 << 7;
    /// ROSE components
    pub const APDU: u32 = 1 << 8;
    /// Advice of charge components
    pub const AOC: u32 = 1 << 9;
    pub const ALL: u32 = 0xffff;

    pub fn has(self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

/// SAPI values used on the D-channel
pub mod sapi {
    pub const CALL_CTRL: u8 = 0;
    pub const GR303_EOC: u8 = 1;
    pub const GR303_TMC_SWITCHING: u8 = 1;
    pub const GR303_TMC_CALLPROC: u8 = 0;
    pub const PACKET_MODE: u8 = 1;
    pub const X25_LAYER3: u8 = 16;
    pub const LAYER2_MANAGEMENT: u8 = 63;
}

/// TEI values used on the D-channel
pub mod tei {
    pub const GROUP: u8 = 127;
    pub const PRI: u8 = 0;
    pub const GR303_EOC_PATH: u8 = 0;
    pub const GR303_EOC_OPS: u8 = 4;
    pub const GR303_TMC_SWITCHING: u8 = 0;
    pub const GR303_TMC_CALLPROC: u8 = 0;
    /// First TEI handed out by automatic assignment
    pub const AUTO_FIRST: u8 = 64;
    /// Last TEI handed out by automatic assignment
    pub const AUTO_LAST: u8 = 126;
}

/// Protocol discriminators
pub mod protodisc {
    pub const Q931: u8 = 0x08;
    pub const GR303: u8 = 0x4f;
    pub const ATT_MAINTENANCE: u8 = 0x03;
    pub const NEW_ATT_MAINTENANCE: u8 = 0x43;
}
