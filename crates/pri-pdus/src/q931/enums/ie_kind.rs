/// Information elements known to the stack. The discriminant is the full IE
/// identifier, `codeset << 8 | id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum IeKind {
    // Codeset 0
    SegmentedMsg = 0x00,
    ChangeStatus = 0x01,
    BearerCapability = 0x04,
    Cause = 0x08,
    ConnectedAddr = 0x0c,
    CallIdentity = 0x10,
    CallState = 0x14,
    ChannelIdent = 0x18,
    Facility = 0x1c,
    ProgressIndicator = 0x1e,
    NetworkSpecFac = 0x20,
    EndpointId = 0x26,
    NotifyInd = 0x27,
    Display = 0x28,
    TimeDate = 0x29,
    KeypadFacility = 0x2c,
    CallStatus = 0x2d,
    Update = 0x31,
    InfoRequest = 0x32,
    Signal = 0x34,
    Switchhook = 0x36,
    FeatureActivate = 0x38,
    FeatureInd = 0x39,
    InformationRate = 0x40,
    TransitDelay = 0x42,
    TransDelaySelect = 0x43,
    BinaryParameters = 0x44,
    WindowSize = 0x45,
    PacketSize = 0x46,
    ClosedUserGroup = 0x47,
    ReverseChargeIndic = 0x4a,
    ConnectedNum = 0x4c,
    CallingPartyNumber = 0x6c,
    CallingPartySubaddr = 0x6d,
    CalledPartyNumber = 0x70,
    CalledPartySubaddr = 0x71,
    OriginalCalledNumber = 0x73,
    RedirectingNumber = 0x74,
    RedirectingSubaddr = 0x75,
    RedirectionNumber = 0x76,
    RedirectionSubaddr = 0x77,
    TransitNetSelect = 0x78,
    RestartIndicator = 0x79,
    UserUserFacility = 0x7a,
    LowLayerCompat = 0x7c,
    HighLayerCompat = 0x7d,
    UserUser = 0x7e,
    EscapeForExt = 0x7f,
    LockingShift = 0x90,
    SendingComplete = 0xa1,

    // Codeset 4, Q.SIG
    TransitCount = 0x431,

    // Codeset 6, network specific
    OriginatingLineInfo = 0x601,
    FacilityCs6 = 0x61c,
    DisplayCs6 = 0x628,
    GenericDigits = 0x637,
}

const ALL_IES: [IeKind; 55] = [
    IeKind::SegmentedMsg, IeKind::ChangeStatus, IeKind::BearerCapability, IeKind::Cause,
    IeKind::ConnectedAddr, IeKind::CallIdentity, IeKind::CallState, IeKind::ChannelIdent,
    IeKind::Facility, IeKind::ProgressIndicator, IeKind::NetworkSpecFac, IeKind::EndpointId,
    IeKind::NotifyInd, IeKind::Display, IeKind::TimeDate, IeKind::KeypadFacility,
    IeKind::CallStatus, IeKind::Update, IeKind::InfoRequest, IeKind::Signal,
    IeKind::Switchhook, IeKind::FeatureActivate, IeKind::FeatureInd, IeKind::InformationRate,
    IeKind::TransitDelay, IeKind::TransDelaySelect, IeKind::BinaryParameters, IeKind::WindowSize,
    IeKind::PacketSize, IeKind::ClosedUserGroup, IeKind::ReverseChargeIndic, IeKind::ConnectedNum,
    IeKind::CallingPartyNumber, IeKind::CallingPartySubaddr, IeKind::CalledPartyNumber,
    IeKind::CalledPartySubaddr, IeKind::OriginalCalledNumber, IeKind::RedirectingNumber,
    IeKind::RedirectingSubaddr, IeKind::RedirectionNumber, IeKind::RedirectionSubaddr,
    IeKind::TransitNetSelect, IeKind::RestartIndicator, IeKind::UserUserFacility,
    IeKind::LowLayerCompat, IeKind::HighLayerCompat, IeKind::UserUser, IeKind::EscapeForExt,
    IeKind::LockingShift, IeKind::SendingComplete, IeKind::TransitCount,
    IeKind::OriginatingLineInfo, IeKind::FacilityCs6, IeKind::DisplayCs6, IeKind::GenericDigits,
];

/// Locking shift, `0x90 | codeset`
pub const LOCKING_SHIFT: u8 = 0x90;
/// Non-locking shift, `0x98 | codeset`
pub const NON_LOCKING_SHIFT: u8 = 0x98;

pub const fn full_ie(codeset: u8, id: u8) -> u16 {
    ((codeset as u16) << 8) | id as u16
}

impl std::convert::TryFrom<u64> for IeKind {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        ALL_IES.iter().copied().find(|k| *k as u64 == x).ok_or(())
    }
}

impl IeKind {
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn from_full(full: u16) -> Option<IeKind> {
        IeKind::try_from(full as u64).ok()
    }

    /// Looks up an element as it appears on the wire under `codeset`
    pub fn lookup(codeset: u8, id: u8) -> Option<IeKind> {
        Self::from_full(full_ie(codeset, id))
    }

    pub fn full_id(self) -> u16 {
        self as u16
    }

    /// Identifier octet
    pub fn id(self) -> u8 {
        (self as u16 & 0xff) as u8
    }

    pub fn codeset(self) -> u8 {
        (self as u16 >> 8) as u8
    }

    pub fn is_single_octet(self) -> bool {
        self.id() & 0x80 != 0
    }

    /// How often the element may appear in one message, 0 for no limit
    pub fn max_count(self) -> usize {
        match self {
            IeKind::LockingShift
            | IeKind::BearerCapability
            | IeKind::Cause
            | IeKind::ChannelIdent
            | IeKind::ProgressIndicator
            | IeKind::NetworkSpecFac
            | IeKind::RedirectingNumber
            | IeKind::TransitNetSelect
            | IeKind::LowLayerCompat
            | IeKind::HighLayerCompat
            | IeKind::Facility
            | IeKind::Signal
            | IeKind::GenericDigits => 0,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IeKind::SegmentedMsg => "Segmented Message",
            IeKind::ChangeStatus => "Change Status",
            IeKind::BearerCapability => "Bearer Capability",
            IeKind::Cause => "Cause",
            IeKind::ConnectedAddr => "Connected Number",
            IeKind::CallIdentity => "Call Identity",
            IeKind::CallState => "Call State",
            IeKind::ChannelIdent => "Channel Identification",
            IeKind::Facility => "Facility",
            IeKind::ProgressIndicator => "Progress Indicator",
            IeKind::NetworkSpecFac => "Network-Specific Facilities",
            IeKind::EndpointId => "Endpoint Identification",
            IeKind::NotifyInd => "Notification Indicator",
            IeKind::Display => "Display",
            IeKind::TimeDate => "Date/Time",
            IeKind::KeypadFacility => "Keypad Facility",
            IeKind::CallStatus => "Call Status",
            IeKind::Update => "Update",
            IeKind::InfoRequest => "Feature Request",
            IeKind::Signal => "Signal",
            IeKind::Switchhook => "Switch-hook",
            IeKind::FeatureActivate => "Feature Activation",
            IeKind::FeatureInd => "Feature Indication",
            IeKind::InformationRate => "Information Rate",
            IeKind::TransitDelay => "End-to-End Transit Delay",
            IeKind::TransDelaySelect => "Transmit Delay Selection and Indication",
            IeKind::BinaryParameters => "Packet-layer Binary Parameters",
            IeKind::WindowSize => "Packet-layer Window Size",
            IeKind::PacketSize => "Packet Size",
            IeKind::ClosedUserGroup => "Closed User Group",
            IeKind::ReverseChargeIndic => "Reverse Charging Indication",
            IeKind::ConnectedNum => "Connected Number",
            IeKind::CallingPartyNumber => "Calling Party Number",
            IeKind::CallingPartySubaddr => "Calling Party Subaddress",
            IeKind::CalledPartyNumber => "Called Party Number",
            IeKind::CalledPartySubaddr => "Called Party Subaddress",
            IeKind::OriginalCalledNumber => "Original Called Number",
            IeKind::RedirectingNumber => "Redirecting Number",
            IeKind::RedirectingSubaddr => "Redirecting Subaddress",
            IeKind::RedirectionNumber => "Redirection Number",
            IeKind::RedirectionSubaddr => "Redirection Subaddress",
            IeKind::TransitNetSelect => "Transit Network Selection",
            IeKind::RestartIndicator => "Restart Indicator",
            IeKind::UserUserFacility => "User-User Facility",
            IeKind::LowLayerCompat => "Low-layer Compatibility",
            IeKind::HighLayerCompat => "High-layer Compatibility",
            IeKind::UserUser => "User-User",
            IeKind::EscapeForExt => "Escape for Extension",
            IeKind::LockingShift => "Locking Shift",
            IeKind::SendingComplete => "Sending Complete",
            IeKind::TransitCount => "Transit Count",
            IeKind::OriginatingLineInfo => "Originating Line Information",
            IeKind::FacilityCs6 => "Facility",
            IeKind::DisplayCs6 => "Display (CS6)",
            IeKind::GenericDigits => "Generic Digits",
        }
    }
}

/// Name of a full IE identifier, including the shift pseudo-elements
pub fn ie_name(full: u16) -> String {
    let id = (full & 0xff) as u8;
    match id & 0xf8 {
        LOCKING_SHIFT => {
            let cs = id & 0x07;
            if cs == 0 {
                "!! INVALID Locking Shift To Codeset 0".to_string()
            } else {
                format!("Locking Shift To Codeset {}", cs)
            }
        }
        NON_LOCKING_SHIFT => format!("Non-Locking Shift To Codeset {}", id & 0x07),
        _ => match IeKind::from_full(full) {
            Some(k) => k.name().to_string(),
            None => "Unknown Information Element".to_string(),
        },
    }
}

impl core::fmt::Display for IeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codeset_lookup() {
        assert_eq!(IeKind::lookup(6, 0x01), Some(IeKind::OriginatingLineInfo));
        assert_eq!(IeKind::lookup(0, 0x01), Some(IeKind::ChangeStatus));
        assert_eq!(IeKind::lookup(4, 0x31), Some(IeKind::TransitCount));
        assert_eq!(IeKind::lookup(0, 0x31), Some(IeKind::Update));
        assert_eq!(IeKind::lookup(5, 0x31), None);
        assert_eq!(IeKind::GenericDigits.codeset(), 6);
        assert_eq!(IeKind::GenericDigits.id(), 0x37);
    }

    #[test]
    fn shift_names() {
        assert_eq!(ie_name(0x90), "!! INVALID Locking Shift To Codeset 0");
        assert_eq!(ie_name(0x96), "Locking Shift To Codeset 6");
        assert_eq!(ie_name(0x9c), "Non-Locking Shift To Codeset 4");
        assert_eq!(ie_name(0x18), "Channel Identification");
        assert_eq!(ie_name(0x5e), "Unknown Information Element");
    }

    #[test]
    fn repeat_limits() {
        assert_eq!(IeKind::ProgressIndicator.max_count(), 0);
        assert_eq!(IeKind::CalledPartyNumber.max_count(), 1);
        assert!(IeKind::SendingComplete.is_single_octet());
    }
}
