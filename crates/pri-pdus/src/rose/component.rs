//! Framing of a Facility element: protocol profile octet, network extension
//! components and the ROSE service components that follow them.

use pri_core::pdu_parse_error::PduParseErr;

use super::ber::{BerComponent, BerReader};

/// Q.932 protocol profiles, low five bits of the first Facility octet
pub mod profile {
    pub const ROSE: u8 = 0x11;
    pub const CMIP: u8 = 0x12;
    pub const ACSE: u8 = 0x13;
    pub const GAT: u8 = 0x16;
    pub const EXTENSIONS: u8 = 0x1f;

    /// First octet of an element without a service indicator octet
    pub const fn octet(profile: u8) -> u8 {
        0x80 | profile
    }
}

/// Component tags at the outer level of a Facility element
pub mod comp_type {
    pub const INTERPRETATION: u8 = 0x8b;
    pub const NETWORK_PROTOCOL_PROFILE: u8 = 0x92;
    pub const INVOKE: u8 = 0xa1;
    pub const RETURN_RESULT: u8 = 0xa2;
    pub const RETURN_ERROR: u8 = 0xa3;
    pub const REJECT: u8 = 0xa4;
    pub const NFE: u8 = 0xaa;
}

pub fn comp_type_name(t: u8) -> &'static str {
    match t {
        comp_type::INTERPRETATION => "Interpretation",
        comp_type::NETWORK_PROTOCOL_PROFILE => "Network protocol profile",
        comp_type::INVOKE => "ROSE Invoke",
        comp_type::RETURN_RESULT => "ROSE return result",
        comp_type::RETURN_ERROR => "ROSE return error",
        comp_type::REJECT => "ROSE reject",
        comp_type::NFE => "Network facility extensions",
        _ => "Unknown",
    }
}

/// Position in the component sequence. Components must appear in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ComponentState {
    Nfe,
    Npp,
    Interpretation,
    Service,
}

impl ComponentState {
    fn of(comp: u8) -> Option<Self> {
        match comp {
            comp_type::NFE => Some(ComponentState::Nfe),
            comp_type::NETWORK_PROTOCOL_PROFILE => Some(ComponentState::Npp),
            comp_type::INTERPRETATION => Some(ComponentState::Interpretation),
            comp_type::INVOKE | comp_type::RETURN_RESULT | comp_type::RETURN_ERROR | comp_type::REJECT => {
                Some(ComponentState::Service)
            }
            _ => None,
        }
    }
}

/// A Facility element split into its ROSE service components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityApdu<'a> {
    /// Protocol profile as received
    pub profile: u8,
    /// Service indicator octet, if present
    pub service_indicator: Option<u8>,
    /// Invoke, return result, return error and reject components in order of appearance
    pub components: Vec<BerComponent<'a>>,
    /// Components that were out of order or not understood
    pub skipped: usize,
}

/// Splits the content of a Facility element. Only the ROSE profile, directly or behind
/// network extensions, is understood.
pub fn parse_facility(data: &[u8]) -> Result<FacilityApdu<'_>, PduParseErr> {
    let Some(&first) = data.first() else {
        return Err(PduParseErr::BufferEnded { field: Some("protocol_profile") });
    };
    let received = first & 0x1f;
    let (mut protocol, mut state) = match received {
        profile::ROSE => (profile::ROSE, ComponentState::Service),
        profile::EXTENSIONS => (profile::EXTENSIONS, ComponentState::Nfe),
        profile::CMIP | profile::ACSE => {
            tracing::debug!("don't know how to handle Q.932 protocol profile 0x{:02X}", received);
            return Err(PduParseErr::NotImplemented { field: Some("protocol_profile") });
        }
        _ => {
            tracing::warn!("invalid Q.932 protocol profile 0x{:02X} received", received);
            return Err(PduParseErr::InvalidValue { field: "protocol_profile", value: received as u64 });
        }
    };

    let (service_indicator, start) = if first & 0x80 == 0 {
        let si = *data.get(1).ok_or(PduParseErr::BufferEnded { field: Some("service_indicator") })?;
        (Some(si), 2)
    } else {
        (None, 1)
    };
    if data.len() < 3 {
        return Err(PduParseErr::BufferEnded { field: Some("facility_components") });
    }

    let mut apdu = FacilityApdu { profile: received, service_indicator, components: Vec::new(), skipped: 0 };
    let mut reader = BerReader::new(&data[start..]);
    while let Some(comp) = reader.next_component()? {
        let comp_state = ComponentState::of(comp.tag);
        if protocol == profile::EXTENSIONS {
            match comp_state {
                Some(s) if s < ComponentState::Service => {
                    if state > s {
                        tracing::warn!("{} component received in wrong place", comp_type_name(comp.tag));
                        apdu.skipped += 1;
                    } else {
                        state = s;
                        tracing::trace!("Q.932 {} component is not handled", comp_type_name(comp.tag));
                    }
                    continue;
                }
                _ => protocol = profile::ROSE,
            }
        }
        match comp_state {
            Some(ComponentState::Service) => {
                state = ComponentState::Service;
                apdu.components.push(comp);
            }
            Some(_) => {
                // Extension components are only valid ahead of the ROSE components
                tracing::warn!("{} component received in wrong place", comp_type_name(comp.tag));
                apdu.skipped += 1;
            }
            None => {
                tracing::debug!("don't know how to handle ROSE component of type 0x{:02X}", comp.tag);
                apdu.skipped += 1;
            }
        }
    }
    Ok(apdu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rose_profile_without_service_indicator() {
        let data = [0x91, 0xa1, 0x06, 0x02, 0x01, 0x05, 0x02, 0x01, 0x00];
        let apdu = parse_facility(&data).unwrap();
        assert_eq!(apdu.profile, profile::ROSE);
        assert_eq!(apdu.service_indicator, None);
        assert_eq!(apdu.components.len(), 1);
        assert_eq!(apdu.components[0].tag, comp_type::INVOKE);
        assert_eq!(apdu.components[0].len(), 6);
    }

    #[test]
    fn service_indicator_octet_is_skipped() {
        let data = [0x11, 0xbe, 0xa1, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
        let apdu = parse_facility(&data).unwrap();
        assert_eq!(apdu.service_indicator, Some(0xbe));
        assert_eq!(apdu.components.len(), 1);
    }

    #[test]
    fn extensions_ahead_of_invoke() {
        let data = [
            0x9f, 0xaa, 0x06, 0x80, 0x01, 0x00, 0x82, 0x01, 0x00, 0x8b, 0x01, 0x00, 0xa1, 0x03, 0x02, 0x01, 0x07,
        ];
        let apdu = parse_facility(&data).unwrap();
        assert_eq!(apdu.profile, profile::EXTENSIONS);
        assert_eq!(apdu.skipped, 0);
        assert_eq!(apdu.components.len(), 1);
    }

    #[test]
    fn out_of_order_components_are_skipped() {
        // Interpretation before NFE, then an NFE after the invoke
        let data = [
            0x9f, 0x8b, 0x01, 0x00, 0xaa, 0x00, 0xa1, 0x03, 0x02, 0x01, 0x07, 0xaa, 0x00, 0xa4, 0x03, 0x02, 0x01, 0x07,
        ];
        let apdu = parse_facility(&data).unwrap();
        assert_eq!(apdu.skipped, 2);
        assert_eq!(apdu.components.len(), 2);
        assert_eq!(apdu.components[1].tag, comp_type::REJECT);
    }

    #[test]
    fn unsupported_profiles() {
        assert_eq!(parse_facility(&[0x92, 0xa1, 0x00]), Err(PduParseErr::NotImplemented { field: Some("protocol_profile") }));
        assert!(matches!(parse_facility(&[0x85, 0xa1, 0x00]), Err(PduParseErr::InvalidValue { .. })));
        assert!(parse_facility(&[]).is_err());
        assert!(parse_facility(&[0x91, 0xa1]).is_err());
    }
}
