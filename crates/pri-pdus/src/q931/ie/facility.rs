use pri_core::pdu_parse_error::PduParseErr;

use super::misc::ie_data_string;

/// Largest APDU accepted into the queue
pub const MAX_APDU_LEN: usize = 255;
/// Largest APDU that still fits into one Facility element
pub const MAX_APDU_TX_LEN: usize = 235;

/// A ROSE APDU waiting to be carried in a Facility element of a given message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduEvent {
    /// Message type the APDU travels in
    pub message: u8,
    pub apdu: Vec<u8>,
    pub sent: bool,
}

/// Appends an APDU to a call's queue
pub fn queue_apdu(queue: &mut Vec<ApduEvent>, message: u8, apdu: Vec<u8>) -> Result<(), PduParseErr> {
    if message == 0 {
        return Err(PduParseErr::InvalidValue { field: "apdu_message", value: 0 });
    }
    if apdu.is_empty() || apdu.len() > MAX_APDU_LEN {
        return Err(PduParseErr::InvalidValue { field: "apdu_len", value: apdu.len() as u64 });
    }
    queue.push(ApduEvent { message, apdu, sent: false });
    Ok(())
}

/// Takes the next unsent APDU for `msg_type`. Oversized APDUs stay in the queue unsent.
pub(crate) fn transmit(queue: &mut [ApduEvent], msg_type: u8) -> Option<Vec<u8>> {
    let ev = queue.iter_mut().find(|ev| ev.message == msg_type && !ev.sent)?;
    if ev.apdu.len() > MAX_APDU_TX_LEN {
        tracing::warn!("requested APDU ({} bytes) is too long", ev.apdu.len());
        return None;
    }
    ev.sent = true;
    Some(ev.apdu.clone())
}

pub(crate) fn dump(data: &[u8], codeset: u8, prefix: char) -> Vec<String> {
    let mut lines = vec![format!(
        "{} Facility (len={:2}, codeset={}) [ {} ]",
        prefix,
        data.len() + 2,
        codeset,
        ie_data_string(data)
    )];
    if data.len() > 1 {
        let start = if data[0] & 0x80 != 0 { 1 } else { 2 };
        lines.push(format!("PROTOCOL {:02X}", data[0] & 0x1f));
        lines.extend(crate::rose::ber::asn1_dump(data.get(start..).unwrap_or(&[])));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apdus_are_sent_once_per_message() {
        let mut q = Vec::new();
        queue_apdu(&mut q, 0x05, vec![0x91, 0xa1, 0x00]).unwrap();
        queue_apdu(&mut q, 0x62, vec![0x91, 0xa1, 0x01]).unwrap();
        queue_apdu(&mut q, 0x05, vec![0x91, 0xa1, 0x02]).unwrap();
        assert_eq!(transmit(&mut q, 0x05), Some(vec![0x91, 0xa1, 0x00]));
        assert_eq!(transmit(&mut q, 0x05), Some(vec![0x91, 0xa1, 0x02]));
        assert_eq!(transmit(&mut q, 0x05), None);
        assert!(!q[1].sent);
    }

    #[test]
    fn oversized_apdus() {
        let mut q = Vec::new();
        assert!(queue_apdu(&mut q, 0x05, vec![0; 256]).is_err());
        assert!(queue_apdu(&mut q, 0x05, Vec::new()).is_err());
        queue_apdu(&mut q, 0x05, vec![0; 240]).unwrap();
        assert_eq!(transmit(&mut q, 0x05), None);
        assert!(!q[0].sent);
    }
}
