use pri_core::InstanceId;

/// Frame to be transmitted on the D-channel, without FCS
#[derive(Debug, Clone)]
pub struct PhDataReq {
    /// Instance the frame was built by, for logging
    pub inst: InstanceId,
    pub frame: Vec<u8>,
}

/// Frame received from the D-channel, FCS still attached
#[derive(Debug, Clone)]
pub struct PhDataInd {
    pub frame: Vec<u8>,
}
