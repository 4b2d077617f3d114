use pri_core::pdu_parse_error::PduParseErr;
use pri_core::{CallRef, OctetBuffer};

/// Protocol discriminator and call reference, as they start every Q.931 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Q931Header {
    pub pd: u8,
    /// Call reference value octets as found on the wire, 0 to 2 octets
    pub crv: Vec<u8>,
}

impl Q931Header {
    /// Builds the header for a message on `cr`. The origination flag is inverted
    /// on the wire so the peer sees the call from its own side.
    ///
    /// `cr == 0` encodes the dummy call reference unless `forceinvert` is set.
    /// On GR-303 subchannels the top bit is always clear.
    pub fn for_call(pd: u8, cr: CallRef, forceinvert: bool, bri: bool, gr303_sub: bool) -> Self {
        let use_cr = cr != 0 || forceinvert;
        let crv = if !bri {
            let mut hi = if use_cr { (((cr ^ 0x8000) & 0xff00) >> 8) as u8 } else { 0 };
            let lo = if use_cr { (cr & 0xff) as u8 } else { 0 };
            if gr303_sub {
                hi &= 0x7f;
            }
            vec![hi, lo]
        } else if use_cr {
            vec![((((cr ^ 0x8000) & 0x8000) >> 8) as u8) | (cr & 0x7f) as u8]
        } else {
            vec![0]
        };
        Self { pd, crv }
    }

    pub fn from_buf(buf: &mut OctetBuffer) -> Result<Self, PduParseErr> {
        let pd = buf.read_field("pd")?;
        let crlen = buf.read_field("crlen")? & 0x0f;
        if crlen > 2 {
            return Err(PduParseErr::InvalidValue { field: "crlen", value: crlen as u64 });
        }
        let crv = buf.read_bytes(crlen as usize, "crv")?.to_vec();
        Ok(Self { pd, crv })
    }

    pub fn to_buf(&self, buf: &mut OctetBuffer) -> Result<(), PduParseErr> {
        buf.write_u8(self.pd)?;
        buf.write_u8(self.crv.len() as u8)?;
        buf.write_bytes(&self.crv)
    }

    /// Call reference as used internally: 15 bit value plus the 0x8000 flag as sent by the peer
    pub fn call_ref(&self) -> CallRef {
        match self.crv.len() {
            2 => ((self.crv[0] as u16) << 8) | self.crv[1] as u16,
            1 => {
                let cr = self.crv[0] as u16;
                if cr & 0x80 != 0 { (cr & 0x7f) | 0x8000 } else { cr }
            }
            _ => 0,
        }
    }

    /// Set if the sender of the message is the side that did not originate the call
    pub fn from_terminator(&self) -> bool {
        self.crv.first().is_some_and(|b| b & 0x80 != 0)
    }

    pub fn len(&self) -> usize {
        2 + self.crv.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Name of a protocol discriminator
pub fn disc_name(pd: u8) -> &'static str {
    match pd {
        pri_core::protodisc::Q931 => "Q.931",
        pri_core::protodisc::GR303 => "GR-303",
        pri_core::protodisc::ATT_MAINTENANCE => "AT&T Maintenance",
        pri_core::protodisc::NEW_ATT_MAINTENANCE => "New AT&T Maintenance",
        _ => "Unknown",
    }
}
