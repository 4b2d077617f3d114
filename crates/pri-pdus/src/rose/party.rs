//! Party numbers, presented numbers and names as carried in Q.932 operation arguments,
//! plus the mapping of type-of-number and diversion reason values to their Q.931 forms.

use pri_core::SwitchType;
use pri_core::pdu_parse_error::PduParseErr;

use super::ber::{BerBuilder, BerComponent, BerReader, asn1};
use crate::q931::ie::numbers::pres;

/// Longest digit string in a NumberDigits component
pub const MAX_PARTY_DIGITS: usize = 20;
/// Longest name kept from a Name component
pub const MAX_NAME_LEN: usize = 50;

/// Numbering plan values (Q.931 octet 3, low nibble)
pub mod npi {
    pub const UNKNOWN: u8 = 0x0;
    pub const E163_E164: u8 = 0x1;
    pub const X121: u8 = 0x3;
    pub const F69: u8 = 0x4;
    pub const NATIONAL: u8 = 0x8;
    pub const PRIVATE: u8 = 0x9;
}

/// Type of number values (Q.931 octet 3, bits 5-7)
pub mod ton {
    pub const UNKNOWN: u8 = 0x0;
    pub const INTERNATIONAL: u8 = 0x1;
    pub const NATIONAL: u8 = 0x2;
    pub const NET_SPECIFIC: u8 = 0x3;
    pub const SUBSCRIBER: u8 = 0x4;
    pub const ABBREVIATED: u8 = 0x6;
    pub const RESERVED: u8 = 0x7;
}

/// Q.931 redirecting reason values
pub mod redir {
    pub const UNKNOWN: u8 = 0x0;
    pub const FORWARD_ON_BUSY: u8 = 0x1;
    pub const FORWARD_ON_NO_REPLY: u8 = 0x2;
    pub const DEFLECTION: u8 = 0x3;
    pub const DTE_OUT_OF_ORDER: u8 = 0x9;
    pub const FORWARDED_BY_DTE: u8 = 0xa;
    pub const UNCONDITIONAL: u8 = 0xf;
}

/// Q.932 PublicTypeOfNumber
mod q932_ton {
    pub const UNKNOWN: i64 = 0;
    pub const INTERNATIONAL: i64 = 1;
    pub const NATIONAL: i64 = 2;
    pub const NET_SPECIFIC: i64 = 3;
    pub const SUBSCRIBER: i64 = 4;
    pub const ABBREVIATED: i64 = 6;
}

/// Q.952 DiversionReason
mod q952_reason {
    pub const UNKNOWN: u8 = 0;
    pub const CFU: u8 = 1;
    pub const CFB: u8 = 2;
    pub const CFNR: u8 = 3;
    pub const CD: u8 = 4;
    pub const IMMEDIATE: u8 = 5;
}

/// Q.SIG DiversionReason
mod qsig_reason {
    pub const UNKNOWN: u8 = 0;
    pub const CFU: u8 = 1;
    pub const CFB: u8 = 2;
    pub const CFNR: u8 = 3;
}

pub fn ton_from_q931(t: u8) -> u8 {
    match t {
        ton::INTERNATIONAL => q932_ton::INTERNATIONAL as u8,
        ton::NATIONAL => q932_ton::NATIONAL as u8,
        ton::NET_SPECIFIC => q932_ton::NET_SPECIFIC as u8,
        ton::SUBSCRIBER => q932_ton::SUBSCRIBER as u8,
        ton::ABBREVIATED => q932_ton::ABBREVIATED as u8,
        ton::UNKNOWN => q932_ton::UNKNOWN as u8,
        _ => {
            tracing::debug!("unsupported Q.931 type of number {}", t);
            q932_ton::UNKNOWN as u8
        }
    }
}

pub fn ton_for_q931(t: i64) -> u8 {
    match t {
        q932_ton::UNKNOWN => ton::UNKNOWN,
        q932_ton::INTERNATIONAL => ton::INTERNATIONAL,
        q932_ton::NATIONAL => ton::NATIONAL,
        q932_ton::NET_SPECIFIC => ton::NET_SPECIFIC,
        q932_ton::SUBSCRIBER => ton::SUBSCRIBER,
        q932_ton::ABBREVIATED => ton::ABBREVIATED,
        _ => {
            tracing::debug!("invalid Q.932 type of number {}", t);
            ton::UNKNOWN
        }
    }
}

/// Q.931 redirecting reason to the diversion reason of the switch's ROSE dialect
pub fn redirecting_reason_from_q931(switch: SwitchType, reason: u8) -> u8 {
    if switch == SwitchType::Qsig {
        return match reason {
            redir::FORWARD_ON_BUSY => qsig_reason::CFB,
            redir::FORWARD_ON_NO_REPLY => qsig_reason::CFNR,
            redir::UNCONDITIONAL => qsig_reason::CFU,
            redir::UNKNOWN => qsig_reason::UNKNOWN,
            _ => {
                tracing::debug!("can't convert Q.931 redirection reason {} to Q.SIG", reason);
                qsig_reason::UNKNOWN
            }
        };
    }
    match reason {
        redir::FORWARD_ON_BUSY => q952_reason::CFB,
        redir::FORWARD_ON_NO_REPLY => q952_reason::CFNR,
        redir::DEFLECTION => q952_reason::CD,
        redir::UNCONDITIONAL => q952_reason::CFU,
        redir::UNKNOWN => q952_reason::UNKNOWN,
        _ => {
            tracing::debug!("can't convert Q.931 redirection reason {} to Q.952", reason);
            q952_reason::UNKNOWN
        }
    }
}

/// Diversion reason of the switch's ROSE dialect to a Q.931 redirecting reason
pub fn redirecting_reason_for_q931(switch: SwitchType, reason: i64) -> u8 {
    let Ok(reason) = u8::try_from(reason) else {
        tracing::debug!("diversion reason {} out of range", reason);
        return redir::UNKNOWN;
    };
    if switch == SwitchType::Qsig {
        return match reason {
            qsig_reason::UNKNOWN => redir::UNKNOWN,
            qsig_reason::CFU => redir::UNCONDITIONAL,
            qsig_reason::CFB => redir::FORWARD_ON_BUSY,
            qsig_reason::CFNR => redir::FORWARD_ON_NO_REPLY,
            _ => {
                tracing::debug!("unknown Q.SIG diversion reason {}", reason);
                redir::UNKNOWN
            }
        };
    }
    match reason {
        q952_reason::UNKNOWN => redir::UNKNOWN,
        q952_reason::CFU => redir::UNCONDITIONAL,
        q952_reason::CFB => redir::FORWARD_ON_BUSY,
        q952_reason::CFNR => redir::FORWARD_ON_NO_REPLY,
        q952_reason::CD => redir::DEFLECTION,
        q952_reason::IMMEDIATE => {
            tracing::debug!("Q.952 diversion reason IMMEDIATE has no Q.931 counterpart");
            redir::UNKNOWN
        }
        _ => {
            tracing::debug!("unknown Q.952 diversion reason {}", reason);
            redir::UNKNOWN
        }
    }
}

/// A decoded PartyNumber together with its presentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentedNumber {
    pub pres: u8,
    pub npi: u8,
    pub ton: u8,
    pub number: String,
    /// Screening indicator, only for screened numbers
    pub screening: Option<i64>,
}

impl PresentedNumber {
    /// Plan octet in the Q.931 layout, type of number in bits 5-7
    pub fn plan(&self) -> u8 {
        (self.ton << 4) | self.npi
    }
}

/// NumberDigits, either a NumericString component or the contents of an implicit tag
fn number_digits(comp: &BerComponent) -> Result<String, PduParseErr> {
    let digits = if comp.is_constructed() {
        comp.reader().expect(asn1::NUMERICSTRING, "number_digits")?
    } else {
        *comp
    };
    if digits.len() > MAX_PARTY_DIGITS {
        return Err(PduParseErr::InvalidValue { field: "number_digits_len", value: digits.len() as u64 });
    }
    Ok(digits.as_string(MAX_PARTY_DIGITS))
}

/// PublicPartyNumber / PrivatePartyNumber: type of number followed by the digits
fn typed_party_number(comp: &BerComponent) -> Result<(u8, String), PduParseErr> {
    let mut r = comp.reader();
    let t = r.expect(asn1::ENUMERATED, "type_of_number")?.as_int()?;
    let digits = r.expect(asn1::NUMERICSTRING, "number_digits")?;
    if digits.len() > MAX_PARTY_DIGITS {
        return Err(PduParseErr::InvalidValue { field: "number_digits_len", value: digits.len() as u64 });
    }
    Ok((ton_for_q931(t), digits.as_string(MAX_PARTY_DIGITS)))
}

/// PartyNumber choice. Fills plan, type of number and digits of `out`.
pub fn decode_party_number(comp: &BerComponent, out: &mut PresentedNumber) -> Result<(), PduParseErr> {
    match comp.tag & !asn1::PC_MASK {
        0x80 => {
            out.number = number_digits(comp)?;
            out.npi = npi::UNKNOWN;
            out.ton = ton::UNKNOWN;
        }
        0x81 => {
            (out.ton, out.number) = typed_party_number(comp)?;
            out.npi = npi::E163_E164;
        }
        0x82 => return Err(PduParseErr::NotImplemented { field: Some("nsap_encoded_number") }),
        0x83 => {
            tracing::debug!("dataPartyNumber is reserved");
            out.number = number_digits(comp)?;
            out.npi = npi::X121;
            out.ton = ton::UNKNOWN;
        }
        0x84 => {
            tracing::debug!("telexPartyNumber is reserved");
            out.number = number_digits(comp)?;
            out.npi = npi::F69;
            out.ton = ton::UNKNOWN;
        }
        0x85 => {
            (out.ton, out.number) = typed_party_number(comp)?;
            out.npi = npi::PRIVATE;
        }
        0x88 => {
            out.number = number_digits(comp)?;
            out.npi = npi::NATIONAL;
            out.ton = ton::NATIONAL;
        }
        _ => return Err(PduParseErr::InvalidValue { field: "party_number", value: comp.tag as u64 }),
    }
    Ok(())
}

/// Address: a PartyNumber, optionally followed by a subaddress which is ignored
fn decode_address(data: &[u8], out: &mut PresentedNumber) -> Result<(), PduParseErr> {
    let mut r = BerReader::new(data);
    let party = r.expect_component("party_number")?;
    decode_party_number(&party, out)?;
    if !r.is_empty() {
        tracing::debug!("subaddress of address component not handled");
    }
    Ok(())
}

fn expect_null(comp: &BerComponent, field: &'static str) -> Result<(), PduParseErr> {
    if comp.is_empty() {
        Ok(())
    } else {
        Err(PduParseErr::InconsistentLength { expected: 0, found: comp.len() })
            .inspect_err(|_| tracing::warn!("invalid {} component, length {}", field, comp.len()))
    }
}

/// PresentedNumberUnscreened choice
pub fn decode_presented_number_unscreened(comp: &BerComponent) -> Result<PresentedNumber, PduParseErr> {
    let mut out = PresentedNumber { npi: npi::E163_E164, ..Default::default() };
    match comp.tag {
        t if t == asn1::ctx_cons(0) => {
            out.pres = pres::ALLOWED_USER_NUMBER_NOT_SCREENED;
            decode_address(comp.data, &mut out)?;
        }
        t if t == asn1::ctx(1) => {
            expect_null(comp, "presentationRestricted")?;
            out.pres = pres::PROHIB_USER_NUMBER_NOT_SCREENED;
        }
        t if t == asn1::ctx(2) => {
            expect_null(comp, "numberNotAvailableDueToInterworking")?;
            out.pres = pres::NUMBER_NOT_AVAILABLE;
        }
        t if t == asn1::ctx_cons(3) => {
            out.pres = pres::PROHIB_USER_NUMBER_NOT_SCREENED;
            decode_address(comp.data, &mut out)?;
        }
        _ => return Err(PduParseErr::InvalidValue { field: "presented_number_unscreened", value: comp.tag as u64 }),
    }
    Ok(out)
}

/// NumberScreened: PartyNumber followed by the screening indicator
fn decode_number_screened(data: &[u8], out: &mut PresentedNumber) -> Result<(), PduParseErr> {
    let mut r = BerReader::new(data);
    let party = r.expect_component("party_number")?;
    decode_party_number(&party, out)?;
    out.screening = Some(r.expect(asn1::ENUMERATED, "screening_indicator")?.as_int()?);
    Ok(())
}

/// PresentedNumberScreened choice
pub fn decode_presented_number_screened(comp: &BerComponent) -> Result<PresentedNumber, PduParseErr> {
    let mut out = PresentedNumber { npi: npi::UNKNOWN, ..Default::default() };
    match comp.tag {
        t if t == asn1::ctx_cons(0) => {
            out.pres = pres::ALLOWED_USER_NUMBER_PASSED_SCREEN;
            decode_number_screened(comp.data, &mut out)?;
        }
        t if t == asn1::ctx(1) => {
            expect_null(comp, "presentationRestricted")?;
            out.pres = pres::PROHIB_USER_NUMBER_PASSED_SCREEN;
        }
        t if t == asn1::ctx(2) => {
            expect_null(comp, "numberNotAvailableDueToInterworking")?;
            out.pres = pres::NUMBER_NOT_AVAILABLE;
        }
        t if t == asn1::ctx_cons(3) => {
            out.pres = pres::PROHIB_USER_NUMBER_PASSED_SCREEN;
            decode_number_screened(comp.data, &mut out)?;
        }
        _ => return Err(PduParseErr::InvalidValue { field: "presented_number_screened", value: comp.tag as u64 }),
    }
    Ok(out)
}

/// Name presentation tags
pub mod name_tag {
    pub const ALLOWED_SIMPLE: u8 = 0x80;
    pub const ALLOWED_EXTENDED: u8 = 0xa1;
    pub const RESTRICTED_SIMPLE: u8 = 0x82;
    pub const RESTRICTED_EXTENDED: u8 = 0xa3;
    pub const NOT_AVAILABLE: u8 = 0x84;
    pub const RESTRICTED_NULL: u8 = 0x87;
}

pub fn is_name_tag(tag: u8) -> bool {
    matches!(
        tag,
        name_tag::ALLOWED_SIMPLE
            | name_tag::ALLOWED_EXTENDED
            | name_tag::RESTRICTED_SIMPLE
            | name_tag::RESTRICTED_EXTENDED
            | name_tag::NOT_AVAILABLE
            | name_tag::RESTRICTED_NULL
    )
}

/// Name choice. Extended forms carry the name in their first component.
/// Unavailable and restricted-null names yield an empty string.
pub fn decode_name(comp: &BerComponent) -> Result<String, PduParseErr> {
    match comp.tag {
        name_tag::ALLOWED_SIMPLE | name_tag::RESTRICTED_SIMPLE => Ok(comp.as_string(MAX_NAME_LEN)),
        name_tag::ALLOWED_EXTENDED | name_tag::RESTRICTED_EXTENDED => {
            let inner = comp.reader().expect_component("name_data")?;
            Ok(inner.as_string(MAX_NAME_LEN))
        }
        name_tag::NOT_AVAILABLE | name_tag::RESTRICTED_NULL => Ok(String::new()),
        _ => Err(PduParseErr::InvalidValue { field: "name", value: comp.tag as u64 }),
    }
}

/// Name wrapped in an explicit context tag, as in DivertingLegInformation2
pub fn decode_tagged_name(comp: &BerComponent) -> Result<String, PduParseErr> {
    if !comp.is_constructed() {
        return Ok(comp.as_string(MAX_NAME_LEN));
    }
    let inner = comp.reader().expect_component("name")?;
    decode_name(&inner)
}

/// Writes a PresentedNumberUnscreened for a Q.931 number. Numbers are always sent as
/// public party numbers, an allowed presentation without digits is sent as restricted.
pub fn encode_presented_number_unscreened(b: &mut BerBuilder, presentation: u8, plan: u8, number: &str) -> Result<(), PduParseErr> {
    match presentation {
        pres::ALLOWED_USER_NUMBER_NOT_SCREENED | pres::ALLOWED_USER_NUMBER_PASSED_SCREEN if !number.is_empty() => {
            b.nested(asn1::ctx_cons(0), |b| {
                b.nested(asn1::ctx_cons(1), |b| {
                    b.add_byte(asn1::ENUMERATED, ton_from_q931(plan >> 4));
                    b.add_string(asn1::NUMERICSTRING, number.as_bytes(), MAX_PARTY_DIGITS)
                })
            })?;
        }
        pres::ALLOWED_USER_NUMBER_NOT_SCREENED
        | pres::ALLOWED_USER_NUMBER_PASSED_SCREEN
        | pres::PROHIB_USER_NUMBER_PASSED_SCREEN
        | pres::PROHIB_USER_NUMBER_NOT_SCREENED
        | pres::ALLOWED_NETWORK_NUMBER
        | pres::PROHIB_NETWORK_NUMBER
        | pres::ALLOWED_USER_NUMBER_FAILED_SCREEN
        | pres::PROHIB_USER_NUMBER_FAILED_SCREEN => b.add_null(asn1::ctx(1)),
        pres::NUMBER_NOT_AVAILABLE => b.add_null(asn1::ctx(2)),
        other => {
            tracing::debug!("undefined presentation value for redirecting number: {}", other);
            b.add_null(asn1::ctx(2));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(data: &[u8]) -> BerComponent<'_> {
        BerReader::new(data).expect_component("test").unwrap()
    }

    #[test]
    fn reason_mapping_depends_on_dialect() {
        assert_eq!(redirecting_reason_from_q931(SwitchType::Qsig, redir::UNCONDITIONAL), 1);
        assert_eq!(redirecting_reason_from_q931(SwitchType::EuroIsdnE1, redir::DEFLECTION), 4);
        assert_eq!(redirecting_reason_from_q931(SwitchType::Qsig, redir::DEFLECTION), 0);
        assert_eq!(redirecting_reason_for_q931(SwitchType::Ni2, 4), redir::DEFLECTION);
        assert_eq!(redirecting_reason_for_q931(SwitchType::Qsig, 4), redir::UNKNOWN);
        assert_eq!(redirecting_reason_for_q931(SwitchType::Ni2, 5), redir::UNKNOWN);
    }

    #[test]
    fn public_number_round_trip() {
        let mut b = BerBuilder::new();
        encode_presented_number_unscreened(&mut b, pres::ALLOWED_USER_NUMBER_NOT_SCREENED, 0x21, "5551212").unwrap();
        let out = b.finish();
        assert_eq!(
            out,
            vec![0xa0, 0x0e, 0xa1, 0x0c, 0x0a, 0x01, 0x02, 0x12, 0x07, b'5', b'5', b'5', b'1', b'2', b'1', b'2']
        );
        let num = decode_presented_number_unscreened(&first(&out)).unwrap();
        assert_eq!(num.pres, pres::ALLOWED_USER_NUMBER_NOT_SCREENED);
        assert_eq!(num.number, "5551212");
        assert_eq!(num.plan(), 0x21);
    }

    #[test]
    fn restricted_and_unavailable_presentations() {
        let mut b = BerBuilder::new();
        encode_presented_number_unscreened(&mut b, pres::ALLOWED_USER_NUMBER_NOT_SCREENED, 0x21, "").unwrap();
        encode_presented_number_unscreened(&mut b, pres::NUMBER_NOT_AVAILABLE, 0, "123").unwrap();
        let out = b.finish();
        assert_eq!(out, vec![0x81, 0x00, 0x82, 0x00]);
        let mut r = BerReader::new(&out);
        let restricted = decode_presented_number_unscreened(&r.expect_component("a").unwrap()).unwrap();
        assert_eq!(restricted.pres, pres::PROHIB_USER_NUMBER_NOT_SCREENED);
        let na = decode_presented_number_unscreened(&r.expect_component("b").unwrap()).unwrap();
        assert_eq!(na.pres, pres::NUMBER_NOT_AVAILABLE);

        assert!(decode_presented_number_unscreened(&first(&[0x81, 0x01, 0x00])).is_err());
    }

    #[test]
    fn screened_number_carries_screening_indicator() {
        // [0] { [0] unknownPartyNumber "42", ENUMERATED 3 }
        let data = [0xa0, 0x07, 0x80, 0x02, b'4', b'2', 0x0a, 0x01, 0x03];
        let num = decode_presented_number_screened(&first(&data)).unwrap();
        assert_eq!(num.pres, pres::ALLOWED_USER_NUMBER_PASSED_SCREEN);
        assert_eq!(num.number, "42");
        assert_eq!(num.npi, npi::UNKNOWN);
        assert_eq!(num.screening, Some(3));
    }

    #[test]
    fn oversized_digits_are_rejected() {
        let mut data = vec![0x80, 21];
        data.extend(std::iter::repeat_n(b'1', 21));
        let mut out = PresentedNumber::default();
        assert!(decode_party_number(&first(&data), &mut out).is_err());
    }

    #[test]
    fn names() {
        assert_eq!(decode_name(&first(&[0x80, 0x03, b'B', b'o', b'b'])).unwrap(), "Bob");
        assert_eq!(decode_name(&first(&[0xa1, 0x05, 0x04, 0x03, b'A', b'n', b'n'])).unwrap(), "Ann");
        assert_eq!(decode_name(&first(&[0x84, 0x00])).unwrap(), "");
        assert_eq!(decode_tagged_name(&first(&[0xa3, 0x04, 0x80, 0x02, b'J', b'o'])).unwrap(), "Jo");
        let long = [vec![0x80, 60], vec![b'x'; 60]].concat();
        assert_eq!(decode_name(&first(&long)).unwrap().len(), MAX_NAME_LEN);
    }
}
