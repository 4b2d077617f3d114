use core::fmt::Display;

use pri_core::Sap;
use pri_core::pri_entities::PriEntity;

use super::cc::*;
use super::dl::*;
use super::ph::*;

/// Exhaustive list of primitives that can be carried in a SapMsg
#[derive(Debug)]
pub enum SapMsgInner {
    // PH-SAP (frame I/O <-> Q.921)
    PhDataReq(PhDataReq),
    PhDataInd(PhDataInd),

    // DL-SAP (Q.921 <-> Q.931)
    DlDataReq(DlDataReq),
    DlDataInd(DlDataInd),
    DlUnitdataInd(DlUnitdataInd),
    DlEstablishInd(DlEstablishInd),
    DlReleaseInd(DlReleaseInd),
    DlAssignInd(DlAssignInd),
    DlRemoveInd(DlRemoveInd),

    // CC-SAP (stack -> application)
    CcEventInd(CcEventInd),
}

impl Display for SapMsgInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            // PH-SAP
            SapMsgInner::PhDataReq(_) => write!(f, "PhDataReq"),
            SapMsgInner::PhDataInd(_) => write!(f, "PhDataInd"),

            // DL-SAP
            SapMsgInner::DlDataReq(_) => write!(f, "DlDataReq"),
            SapMsgInner::DlDataInd(_) => write!(f, "DlDataInd"),
            SapMsgInner::DlUnitdataInd(_) => write!(f, "DlUnitdataInd"),
            SapMsgInner::DlEstablishInd(_) => write!(f, "DlEstablishInd"),
            SapMsgInner::DlReleaseInd(_) => write!(f, "DlReleaseInd"),
            SapMsgInner::DlAssignInd(_) => write!(f, "DlAssignInd"),
            SapMsgInner::DlRemoveInd(_) => write!(f, "DlRemoveInd"),

            // CC-SAP
            SapMsgInner::CcEventInd(ev) => write!(f, "CcEventInd({})", ev.event),
        }
    }
}

#[derive(Debug)]
pub struct SapMsg {
    pub sap: Sap,
    pub src: PriEntity,
    pub dest: PriEntity,
    pub msg: SapMsgInner,
}

impl SapMsg {
    pub fn new(sap: Sap, src: PriEntity, dest: PriEntity, msg: SapMsgInner) -> Self {
        Self { sap, src, dest, msg }
    }

    pub fn get_source(&self) -> &PriEntity {
        &self.src
    }
    pub fn get_dest(&self) -> &PriEntity {
        &self.dest
    }
    pub fn get_sap(&self) -> &Sap {
        &self.sap
    }
}
