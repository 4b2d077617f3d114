use core::fmt;

use pri_core::pdu_parse_error::PduParseErr;
use pri_core::{OctetBuffer, expect_failed};

/// Address field: SAPI(6) C/R(1) EA0, TEI(7) EA1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Q921Header {
    pub sapi: u8,
    pub c_r: bool,
    pub tei: u8,
}

impl Q921Header {
    pub fn new(sapi: u8, c_r: bool, tei: u8) -> Self {
        Self { sapi, c_r, tei }
    }

    pub fn from_buf(buf: &mut OctetBuffer) -> Result<Self, PduParseErr> {
        let b0 = buf.read_field("address0")?;
        let b1 = buf.read_field("address1")?;
        if b0 & 0x01 != 0 {
            return Err(PduParseErr::InvalidValue { field: "ea1", value: 1 });
        }
        if b1 & 0x01 == 0 {
            return Err(PduParseErr::InvalidValue { field: "ea2", value: 0 });
        }
        Ok(Self {
            sapi: b0 >> 2,
            c_r: b0 & 0x02 != 0,
            tei: b1 >> 1,
        })
    }

    pub fn to_buf(&self, buf: &mut OctetBuffer) -> Result<(), PduParseErr> {
        buf.write_u8((self.sapi << 2) | ((self.c_r as u8) << 1))?;
        buf.write_u8((self.tei << 1) | 0x01)
    }
}

/// Supervisory function bits (SS)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SFrameKind {
    Rr = 0,
    Rnr = 1,
    Rej = 2,
}

impl std::convert::TryFrom<u64> for SFrameKind {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(SFrameKind::Rr),
            1 => Ok(SFrameKind::Rnr),
            2 => Ok(SFrameKind::Rej),
            _ => Err(()),
        }
    }
}

impl SFrameKind {
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn long_name(self) -> &'static str {
        match self {
            SFrameKind::Rr => "RR (receive ready)",
            SFrameKind::Rnr => "RNR (receive not ready)",
            SFrameKind::Rej => "REJ (reject)",
        }
    }
}

/// Unnumbered frame types, identified by the M3/M2 modifier bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UFrameKind {
    Sabme,
    Dm,
    Ui,
    Disc,
    Ua,
    Frmr,
    Xid,
}

impl UFrameKind {
    /// (M3, M2)
    pub fn modifiers(self) -> (u8, u8) {
        match self {
            UFrameKind::Dm => (0, 3),
            UFrameKind::Ui => (0, 0),
            UFrameKind::Disc => (2, 0),
            UFrameKind::Sabme => (3, 3),
            UFrameKind::Ua => (3, 0),
            UFrameKind::Frmr => (4, 1),
            UFrameKind::Xid => (5, 3),
        }
    }

    pub fn from_modifiers(m3: u8, m2: u8) -> Option<Self> {
        match (m3, m2) {
            (0, 3) => Some(UFrameKind::Dm),
            (0, 0) => Some(UFrameKind::Ui),
            (2, 0) => Some(UFrameKind::Disc),
            (3, 3) => Some(UFrameKind::Sabme),
            (3, 0) => Some(UFrameKind::Ua),
            (4, 1) => Some(UFrameKind::Frmr),
            (5, 3) => Some(UFrameKind::Xid),
            _ => None,
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            UFrameKind::Dm => "DM (disconnect mode)",
            UFrameKind::Ui => "UI (unnumbered information)",
            UFrameKind::Disc => "DISC (disconnect)",
            UFrameKind::Sabme => "SABME (set asynchronous balanced mode extended)",
            UFrameKind::Ua => "UA (unnumbered acknowledgement)",
            UFrameKind::Frmr => "FRMR (frame reject)",
            UFrameKind::Xid => "XID (exchange identification note)",
        }
    }
}

/// Control field of a LAPD frame. Sequence numbers are modulo 128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Q921Control {
    I { n_s: u8, n_r: u8, p: bool },
    S { kind: SFrameKind, n_r: u8, p_f: bool },
    U { kind: UFrameKind, p_f: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Q921Frame {
    pub header: Q921Header,
    pub control: Q921Control,
    /// Information field, empty for most S and U frames
    pub payload: Vec<u8>,
}

impl Q921Frame {
    pub fn iframe(header: Q921Header, n_s: u8, n_r: u8, p: bool, payload: Vec<u8>) -> Self {
        Self { header, control: Q921Control::I { n_s, n_r, p }, payload }
    }

    pub fn sframe(header: Q921Header, kind: SFrameKind, n_r: u8, p_f: bool) -> Self {
        Self { header, control: Q921Control::S { kind, n_r, p_f }, payload: Vec::new() }
    }

    pub fn uframe(header: Q921Header, kind: UFrameKind, p_f: bool, payload: Vec<u8>) -> Self {
        Self { header, control: Q921Control::U { kind, p_f }, payload }
    }

    /// Parses a frame without FCS
    pub fn from_bytes(data: &[u8]) -> Result<Self, PduParseErr> {
        let mut buf = OctetBuffer::from_bytes(data);
        let header = Q921Header::from_buf(&mut buf)?;
        let c0 = buf.read_field("control")?;

        let control = if c0 & 0x01 == 0 {
            let c1 = buf.read_field("n_r")?;
            Q921Control::I { n_s: c0 >> 1, n_r: c1 >> 1, p: c1 & 0x01 != 0 }
        } else if c0 & 0x03 == 0x01 {
            let c1 = buf.read_field("n_r")?;
            let ss = (c0 >> 2) & 0x03;
            let Ok(kind) = SFrameKind::try_from(ss as u64) else {
                return expect_failed!(ss, "ss");
            };
            if c0 & 0xf0 != 0 {
                return Err(PduParseErr::InvalidValue { field: "s_zero", value: (c0 >> 4) as u64 });
            }
            Q921Control::S { kind, n_r: c1 >> 1, p_f: c1 & 0x01 != 0 }
        } else {
            let m3 = c0 >> 5;
            let m2 = (c0 >> 2) & 0x03;
            let Some(kind) = UFrameKind::from_modifiers(m3, m2) else {
                return Err(PduParseErr::InvalidValue { field: "u_modifier", value: c0 as u64 });
            };
            Q921Control::U { kind, p_f: c0 & 0x10 != 0 }
        };

        Ok(Self { header, control, payload: buf.read_remaining().to_vec() })
    }

    /// Encodes the frame without FCS
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = OctetBuffer::new_autoexpand(4 + self.payload.len());
        // Autoexpanding buffers can't run out of room
        let _ = self.to_buf(&mut buf);
        buf.into_bytes()
    }

    pub fn to_buf(&self, buf: &mut OctetBuffer) -> Result<(), PduParseErr> {
        self.header.to_buf(buf)?;
        match self.control {
            Q921Control::I { n_s, n_r, p } => {
                buf.write_u8((n_s & 0x7f) << 1)?;
                buf.write_u8(((n_r & 0x7f) << 1) | p as u8)?;
            }
            Q921Control::S { kind, n_r, p_f } => {
                buf.write_u8(((kind as u8) << 2) | 0x01)?;
                buf.write_u8(((n_r & 0x7f) << 1) | p_f as u8)?;
            }
            Q921Control::U { kind, p_f } => {
                let (m3, m2) = kind.modifiers();
                buf.write_u8((m3 << 5) | ((p_f as u8) << 4) | (m2 << 2) | 0x03)?;
            }
        }
        buf.write_bytes(&self.payload)
    }

    /// Multi-line interpretation of the frame, each line prefixed with the direction tag
    pub fn dump(&self, tx: bool) -> String {
        let d = if tx { '>' } else { '<' };
        let mut s = String::new();
        let kind = match self.control {
            Q921Control::I { .. } => "Informational",
            Q921Control::S { .. } => "Supervisory",
            Q921Control::U { .. } => "Unnumbered",
        };
        s.push_str(&format!("{} {} frame:\n", d, kind));
        s.push_str(&format!("{} SAPI: {:02}  C/R: {} EA: 0\n", d, self.header.sapi, self.header.c_r as u8));
        s.push_str(&format!("{}  TEI: {:03}        EA: 1\n", d, self.header.tei));
        match self.control {
            Q921Control::I { n_s, n_r, p } => {
                s.push_str(&format!("{} N(S): {:03}   0: 0\n", d, n_s));
                s.push_str(&format!("{} N(R): {:03}   P: {}\n", d, n_r, p as u8));
            }
            Q921Control::S { kind, n_r, p_f } => {
                s.push_str(&format!("{} Zero: 0     S: {} 01: 1  [ {} ]\n", d, kind as u8, kind.long_name()));
                s.push_str(&format!("{} N(R): {:03} P/F: {}\n", d, n_r, p_f as u8));
            }
            Q921Control::U { kind, p_f } => {
                let (m3, m2) = kind.modifiers();
                s.push_str(&format!("{}   M3: {}   P/F: {} M2: {} 11: 3  [ {} ]\n", d, m3, p_f as u8, m2, kind.long_name()));
            }
        }
        s.push_str(&format!("{} {} bytes of data\n", d, self.payload.len()));
        s
    }
}

impl fmt::Display for Q921Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        match self.control {
            Q921Control::I { n_s, n_r, p } => write!(
                f,
                "I sapi={} tei={} c/r={} n_s={} n_r={} p={} len={}",
                h.sapi, h.tei, h.c_r as u8, n_s, n_r, p as u8, self.payload.len()
            ),
            Q921Control::S { kind, n_r, p_f } => {
                write!(f, "{:?} sapi={} tei={} c/r={} n_r={} p/f={}", kind, h.sapi, h.tei, h.c_r as u8, n_r, p_f as u8)
            }
            Q921Control::U { kind, p_f } => {
                write!(f, "{:?} sapi={} tei={} c/r={} p/f={}", kind, h.sapi, h.tei, h.c_r as u8, p_f as u8)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sabme_encoding() {
        let f = Q921Frame::uframe(Q921Header::new(0, true, 0), UFrameKind::Sabme, true, Vec::new());
        assert_eq!(f.to_bytes(), vec![0x02, 0x01, 0x7f]);
        assert_eq!(Q921Frame::from_bytes(&[0x02, 0x01, 0x7f]).unwrap(), f);
    }

    #[test]
    fn iframe_fields() {
        let f = Q921Frame::from_bytes(&[0x00, 0x01, 0x0a, 0x07, 0x08, 0x02, 0x00, 0x01, 0x05]).unwrap();
        assert_eq!(f.header, Q921Header::new(0, false, 0));
        assert_eq!(f.control, Q921Control::I { n_s: 5, n_r: 3, p: true });
        assert_eq!(f.payload, vec![0x08, 0x02, 0x00, 0x01, 0x05]);
    }

    #[test]
    fn rr_with_final_bit() {
        let f = Q921Frame::sframe(Q921Header::new(0, false, 64), SFrameKind::Rr, 17, true);
        let bytes = f.to_bytes();
        assert_eq!(bytes, vec![0x00, 0x81, 0x01, 0x23]);
        assert!(f.dump(true).contains("RR (receive ready)"));
    }

    #[test]
    fn rejects_bad_address_extension() {
        assert!(matches!(Q921Frame::from_bytes(&[0x03, 0x01, 0x7f]), Err(PduParseErr::InvalidValue { field: "ea1", .. })));
        assert!(matches!(Q921Frame::from_bytes(&[0x02, 0x00, 0x7f]), Err(PduParseErr::InvalidValue { field: "ea2", .. })));
        assert!(Q921Frame::from_bytes(&[0x02, 0x01]).is_err());
    }

    #[test]
    fn unknown_u_modifier_is_an_error() {
        // M3=7, M2=3
        assert!(Q921Frame::from_bytes(&[0x02, 0x01, 0xef]).is_err());
    }
}
