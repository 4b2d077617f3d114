use core::fmt;

use pri_core::pdu_parse_error::PduParseErr;
use pri_core::{OctetBuffer, expect_value};

/// Layer management entity identifier, first octet of every TEI management message
pub const TEI_MGMT_ENTITY: u8 = 0x0f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TeiMsgType {
    IdentityRequest = 1,
    IdentityAssigned = 2,
    IdentityDenied = 3,
    IdentityCheckRequest = 4,
    IdentityCheckResponse = 5,
    IdentityRemove = 6,
    IdentityVerify = 7,
}

impl std::convert::TryFrom<u64> for TeiMsgType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            1 => Ok(TeiMsgType::IdentityRequest),
            2 => Ok(TeiMsgType::IdentityAssigned),
            3 => Ok(TeiMsgType::IdentityDenied),
            4 => Ok(TeiMsgType::IdentityCheckRequest),
            5 => Ok(TeiMsgType::IdentityCheckResponse),
            6 => Ok(TeiMsgType::IdentityRemove),
            7 => Ok(TeiMsgType::IdentityVerify),
            _ => Err(()),
        }
    }
}

impl TeiMsgType {
    pub fn into_raw(self) -> u64 {
        self as u64
    }
}

/// TEI management message carried in a UI frame on SAPI 63, TEI 127
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeiMgmtMsg {
    /// Reference number chosen by the requesting user
    pub ri: u16,
    pub msg: TeiMsgType,
    /// Action indicator, the TEI concerned (127 = any / all)
    pub ai: u8,
}

impl TeiMgmtMsg {
    pub fn new(msg: TeiMsgType, ri: u16, ai: u8) -> Self {
        Self { ri, msg, ai }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PduParseErr> {
        let mut buf = OctetBuffer::from_bytes(data);
        let entity = buf.read_field("entity")?;
        expect_value!(entity, TEI_MGMT_ENTITY)?;
        let ri = buf.read_u16_field("ri")?;
        let raw = buf.read_field("msg")?;
        let Ok(msg) = TeiMsgType::try_from(raw as u64) else {
            return Err(PduParseErr::InvalidValue { field: "msg", value: raw as u64 });
        };
        let ai = buf.read_field("ai")?;
        if ai & 0x01 == 0 {
            return Err(PduParseErr::InvalidValue { field: "ai_ext", value: 0 });
        }
        Ok(Self { ri, msg, ai: ai >> 1 })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        vec![TEI_MGMT_ENTITY, (self.ri >> 8) as u8, self.ri as u8, self.msg as u8, (self.ai << 1) | 0x01]
    }
}

impl fmt::Display for TeiMgmtMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ri=0x{:04x} ai={}", self.msg, self.ri, self.ai)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_request_layout() {
        let m = TeiMgmtMsg::new(TeiMsgType::IdentityRequest, 0x1234, 127);
        assert_eq!(m.to_bytes(), vec![0x0f, 0x12, 0x34, 0x01, 0xff]);
    }

    #[test]
    fn parses_assignment() {
        let m = TeiMgmtMsg::from_bytes(&[0x0f, 0xbe, 0xef, 0x02, 0x81]).unwrap();
        assert_eq!(m.msg, TeiMsgType::IdentityAssigned);
        assert_eq!(m.ri, 0xbeef);
        assert_eq!(m.ai, 64);
    }

    #[test]
    fn wrong_entity_or_type() {
        assert!(TeiMgmtMsg::from_bytes(&[0x0e, 0, 0, 0x01, 0xff]).is_err());
        assert!(TeiMgmtMsg::from_bytes(&[0x0f, 0, 0, 0x09, 0xff]).is_err());
        assert!(TeiMgmtMsg::from_bytes(&[0x0f, 0, 0, 0x01]).is_err());
    }
}
