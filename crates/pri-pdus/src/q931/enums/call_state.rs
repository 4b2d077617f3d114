/// Q.931 call states, tracked for both our side and the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CallState {
    #[default]
    Null = 0,
    CallInitiated = 1,
    OverlapSending = 2,
    OutgoingCallProceeding = 3,
    CallDelivered = 4,
    CallPresent = 6,
    CallReceived = 7,
    ConnectRequest = 8,
    IncomingCallProceeding = 9,
    Active = 10,
    DisconnectRequest = 11,
    DisconnectIndication = 12,
    SuspendRequest = 15,
    ResumeRequest = 17,
    ReleaseRequest = 19,
    CallAbort = 22,
    OverlapReceiving = 25,
    RestartRequest = 61,
    Restart = 62,
}

impl std::convert::TryFrom<u64> for CallState {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(CallState::Null),
            1 => Ok(CallState::CallInitiated),
            2 => Ok(CallState::OverlapSending),
            3 => Ok(CallState::OutgoingCallProceeding),
            4 => Ok(CallState::CallDelivered),
            6 => Ok(CallState::CallPresent),
            7 => Ok(CallState::CallReceived),
            8 => Ok(CallState::ConnectRequest),
            9 => Ok(CallState::IncomingCallProceeding),
            10 => Ok(CallState::Active),
            11 => Ok(CallState::DisconnectRequest),
            12 => Ok(CallState::DisconnectIndication),
            15 => Ok(CallState::SuspendRequest),
            17 => Ok(CallState::ResumeRequest),
            19 => Ok(CallState::ReleaseRequest),
            22 => Ok(CallState::CallAbort),
            25 => Ok(CallState::OverlapReceiving),
            61 => Ok(CallState::RestartRequest),
            62 => Ok(CallState::Restart),
            _ => Err(()),
        }
    }
}

impl CallState {
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        callstate_name(self as u8)
    }
}

pub fn callstate_name(state: u8) -> &'static str {
    match state {
        0 => "Null",
        1 => "Call Initiated",
        2 => "Overlap sending",
        3 => "Outgoing call  Proceeding",
        4 => "Call Delivered",
        6 => "Call Present",
        7 => "Call Received",
        8 => "Connect Request",
        9 => "Incoming Call Proceeding",
        10 => "Active",
        11 => "Disconnect Request",
        12 => "Disconnect Indication",
        15 => "Suspend Request",
        17 => "Resume Request",
        19 => "Release Request",
        22 => "Call Abort",
        25 => "Overlap Receiving",
        61 => "Restart Request",
        62 => "Restart",
        _ => "Unknown",
    }
}

impl core::fmt::Display for CallState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}
