use pri_core::{CallRef, InstanceId, NodeType, SwitchType};

/// Description of a data link as seen by call control. Sent whenever Q.921
/// creates an instance and attached to every DL primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlLinkInfo {
    pub inst: InstanceId,
    /// Set for subchannels (BRI TEI links, GR-303 split channels)
    pub master: Option<InstanceId>,
    pub node: NodeType,
    pub switch: SwitchType,
    pub bri: bool,
    pub sapi: u8,
    pub tei: u8,
    /// Q.931 protocol discriminator used on this link
    pub protodisc: u8,
    /// Instance owns a GR-303 subchannel. Changes the call reference encoding.
    pub gr303_master: bool,
}

impl DlLinkInfo {
    pub fn is_subchannel(&self) -> bool {
        self.master.is_some()
    }

    /// Point-to-multipoint broadcast link (group TEI)
    pub fn is_ptmp_master(&self) -> bool {
        self.tei == pri_core::tei::GROUP
    }
}

/// DL-DATA request, an I-frame payload to be sent on an instance
#[derive(Debug, Clone)]
pub struct DlDataReq {
    pub inst: InstanceId,
    /// Call the message belongs to, for logging only
    pub cr: Option<CallRef>,
    pub payload: Vec<u8>,
}

/// DL-DATA indication, payload of an in-sequence I-frame
#[derive(Debug, Clone)]
pub struct DlDataInd {
    pub link: DlLinkInfo,
    pub payload: Vec<u8>,
}

/// DL-UNIT-DATA indication, payload of a UI frame outside TEI management
#[derive(Debug, Clone)]
pub struct DlUnitdataInd {
    pub link: DlLinkInfo,
    pub payload: Vec<u8>,
}

/// Multiple frame operation established
#[derive(Debug, Clone)]
pub struct DlEstablishInd {
    pub link: DlLinkInfo,
}

/// Multiple frame operation released
#[derive(Debug, Clone)]
pub struct DlReleaseInd {
    pub link: DlLinkInfo,
}

/// A new instance exists (startup or TEI assignment)
#[derive(Debug, Clone)]
pub struct DlAssignInd {
    pub link: DlLinkInfo,
}

/// An instance has been freed (TEI removal)
#[derive(Debug, Clone)]
pub struct DlRemoveInd {
    pub inst: InstanceId,
}
