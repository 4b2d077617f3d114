/// Failure to read or write an octet-oriented PDU: Q.921 frames, Q.931 messages
/// and their information elements, or BER encoded ROSE components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PduParseErr {
    /// A BER tag other than the one the decoder was positioned for
    UnexpectedTag { expected: u64, found: u64 },
    /// Input ran out in the middle of `field`
    BufferEnded { field: Option<&'static str> },
    /// A mandatory element or component is absent
    FieldNotPresent { field: Option<&'static str> },
    InvalidValue { field: &'static str, value: u64 },
    /// A length octet disagrees with the octets actually present
    InconsistentLength { expected: usize, found: usize },
    Inconsistency { field: &'static str, reason: &'static str },
    NotImplemented { field: Option<&'static str> },
    /// Encoder ran out of room
    BufferFull { needed: usize, available: usize },
}

impl core::fmt::Display for PduParseErr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = |field: &Option<&'static str>| field.unwrap_or("<unnamed>");
        match self {
            Self::UnexpectedTag { expected, found } => write!(f, "tag 0x{:02x} where 0x{:02x} belongs", found, expected),
            Self::BufferEnded { field } => write!(f, "truncated at {}", name(field)),
            Self::FieldNotPresent { field } => write!(f, "{} missing", name(field)),
            Self::InvalidValue { field, value } => write!(f, "{} = {} (0x{:x}) out of range", field, value, value),
            Self::InconsistentLength { expected, found } => {
                write!(f, "length says {} octets, {} present", expected, found)
            }
            Self::Inconsistency { field, reason } => write!(f, "{} {}", field, reason),
            Self::NotImplemented { field } => write!(f, "{} unsupported", name(field)),
            Self::BufferFull { needed, available } => write!(f, "{} octets do not fit in {}", needed, available),
        }
    }
}

impl std::error::Error for PduParseErr {}

/// `Ok(())` when `$value == $expected`, otherwise `InvalidValue` naming the field
/// (the identifier itself, or an explicit name as third argument).
#[macro_export]
macro_rules! expect_value {
    ($value:ident, $expected:expr) => {
        $crate::expect_value!($value, $expected, stringify!($value))
    };
    ($value:expr, $expected:expr, $field:expr) => {{
        let seen = $value;
        if seen == $expected {
            Ok(())
        } else {
            Err($crate::PduParseErr::InvalidValue { field: $field, value: seen.into() })
        }
    }};
}

/// `Err(InvalidValue)` for a value already known to be wrong
#[macro_export]
macro_rules! expect_failed {
    ($value:expr, $field:expr) => {
        Err($crate::PduParseErr::InvalidValue { field: $field, value: $value as u64 })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_entity(entity: u8) -> Result<(), PduParseErr> {
        expect_value!(entity, 0x0f)
    }

    #[test]
    fn expect_value_names_the_field() {
        assert!(check_entity(0x0f).is_ok());
        assert_eq!(check_entity(0x0e), Err(PduParseErr::InvalidValue { field: "entity", value: 0x0e }));
    }

    #[test]
    fn display_reads_as_a_sentence() {
        assert_eq!(PduParseErr::BufferEnded { field: Some("n_r") }.to_string(), "truncated at n_r");
        assert_eq!(
            PduParseErr::InconsistentLength { expected: 4, found: 2 }.to_string(),
            "length says 4 octets, 2 present"
        );
    }
}
