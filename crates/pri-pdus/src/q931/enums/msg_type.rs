use super::ie_kind::IeKind;

/// Q.931 message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    // Call establishment
    Alerting = 0x01,
    CallProceeding = 0x02,
    Progress = 0x03,
    Setup = 0x05,
    Connect = 0x07,
    SetupAcknowledge = 0x0d,
    ConnectAcknowledge = 0x0f,

    // Call clearing
    Disconnect = 0x45,
    Restart = 0x46,
    Release = 0x4d,
    RestartAcknowledge = 0x4e,
    ReleaseComplete = 0x5a,

    // Miscellaneous
    UserInformation = 0x20,
    Segment = 0x60,
    Facility = 0x62,
    Notify = 0x6e,
    StatusEnquiry = 0x75,
    CongestionControl = 0x79,
    Information = 0x7b,
    Status = 0x7d,

    // Call management
    SuspendReject = 0x21,
    ResumeReject = 0x22,
    Hold = 0x24,
    Suspend = 0x25,
    Resume = 0x26,
    HoldAcknowledge = 0x28,
    SuspendAcknowledge = 0x2d,
    ResumeAcknowledge = 0x2e,
    HoldReject = 0x30,
    Retrieve = 0x31,
    RetrieveAcknowledge = 0x33,
    RetrieveReject = 0x37,
}

/// Maintenance SERVICE message, only seen with the AT&T maintenance discriminators
pub const MAINT_SERVICE: u8 = 0x0f;
/// Maintenance SERVICE ACKNOWLEDGE
pub const MAINT_SERVICE_ACKNOWLEDGE: u8 = 0x07;

const ALL_MSG_TYPES: [MsgType; 32] = [
    MsgType::Alerting, MsgType::CallProceeding, MsgType::Progress, MsgType::Setup,
    MsgType::Connect, MsgType::SetupAcknowledge, MsgType::ConnectAcknowledge,
    MsgType::Disconnect, MsgType::Restart, MsgType::Release, MsgType::RestartAcknowledge,
    MsgType::ReleaseComplete, MsgType::UserInformation, MsgType::Segment, MsgType::Facility,
    MsgType::Notify, MsgType::StatusEnquiry, MsgType::CongestionControl, MsgType::Information,
    MsgType::Status, MsgType::SuspendReject, MsgType::ResumeReject, MsgType::Hold,
    MsgType::Suspend, MsgType::Resume, MsgType::HoldAcknowledge, MsgType::SuspendAcknowledge,
    MsgType::ResumeAcknowledge, MsgType::HoldReject, MsgType::Retrieve,
    MsgType::RetrieveAcknowledge, MsgType::RetrieveReject,
];

impl std::convert::TryFrom<u64> for MsgType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        ALL_MSG_TYPES.iter().copied().find(|m| *m as u64 == x).ok_or(())
    }
}

impl MsgType {
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            MsgType::Alerting => "ALERTING",
            MsgType::CallProceeding => "CALL PROCEEDING",
            MsgType::Connect => "CONNECT",
            MsgType::ConnectAcknowledge => "CONNECT ACKNOWLEDGE",
            MsgType::Progress => "PROGRESS",
            MsgType::Setup => "SETUP",
            MsgType::SetupAcknowledge => "SETUP ACKNOWLEDGE",
            MsgType::Disconnect => "DISCONNECT",
            MsgType::Release => "RELEASE",
            MsgType::ReleaseComplete => "RELEASE COMPLETE",
            MsgType::Restart => "RESTART",
            MsgType::RestartAcknowledge => "RESTART ACKNOWLEDGE",
            MsgType::Status => "STATUS",
            MsgType::StatusEnquiry => "STATUS ENQUIRY",
            MsgType::UserInformation => "USER_INFORMATION",
            MsgType::Segment => "SEGMENT",
            MsgType::CongestionControl => "CONGESTION CONTROL",
            MsgType::Information => "INFORMATION",
            MsgType::Facility => "FACILITY",
            MsgType::Notify => "NOTIFY",
            MsgType::Hold => "HOLD",
            MsgType::HoldAcknowledge => "HOLD ACKNOWLEDGE",
            MsgType::HoldReject => "HOLD REJECT",
            MsgType::Retrieve => "RETRIEVE",
            MsgType::RetrieveAcknowledge => "RETRIEVE ACKNOWLEDGE",
            MsgType::RetrieveReject => "RETRIEVE REJECT",
            MsgType::Resume => "RESUME",
            MsgType::ResumeAcknowledge => "RESUME ACKNOWLEDGE",
            MsgType::ResumeReject => "RESUME REJECT",
            MsgType::Suspend => "SUSPEND",
            MsgType::SuspendAcknowledge => "SUSPEND ACKNOWLEDGE",
            MsgType::SuspendReject => "SUSPEND REJECT",
        }
    }

    /// Information elements a received message must carry
    pub fn mandatory_ies(self) -> &'static [IeKind] {
        match self {
            MsgType::Progress => &[IeKind::ProgressIndicator],
            MsgType::Setup => &[IeKind::BearerCapability, IeKind::ChannelIdent],
            MsgType::Disconnect => &[IeKind::Cause],
            MsgType::Restart | MsgType::RestartAcknowledge => &[IeKind::RestartIndicator],
            MsgType::Status => &[IeKind::Cause, IeKind::CallState],
            MsgType::Notify => &[IeKind::NotifyInd],
            MsgType::ResumeAcknowledge => &[IeKind::ChannelIdent],
            MsgType::ResumeReject => &[IeKind::Cause],
            _ => &[],
        }
    }
}

/// Name of a raw message type octet. Maintenance discriminators reuse two codes for SERVICE.
pub fn msg_name(raw: u8, maintenance: bool) -> &'static str {
    if maintenance {
        match raw {
            MAINT_SERVICE => return "SERVICE",
            MAINT_SERVICE_ACKNOWLEDGE => return "SERVICE ACKNOWLEDGE",
            _ => {}
        }
    }
    match MsgType::try_from(raw as u64) {
        Ok(m) => m.name(),
        Err(_) => "Unknown Message Type",
    }
}

impl core::fmt::Display for MsgType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_names() {
        assert_eq!(MsgType::try_from(0x05), Ok(MsgType::Setup));
        assert_eq!(MsgType::try_from(0x5a).map(|m| m.name()), Ok("RELEASE COMPLETE"));
        assert!(MsgType::try_from(0x99).is_err());
        assert_eq!(msg_name(0x0f, false), "CONNECT ACKNOWLEDGE");
        assert_eq!(msg_name(0x0f, true), "SERVICE");
        assert_eq!(msg_name(0x99, false), "Unknown Message Type");
    }

    #[test]
    fn setup_requires_bearer_and_channel() {
        assert_eq!(MsgType::Setup.mandatory_ies(), &[IeKind::BearerCapability, IeKind::ChannelIdent]);
        assert!(MsgType::Connect.mandatory_ies().is_empty());
    }
}
