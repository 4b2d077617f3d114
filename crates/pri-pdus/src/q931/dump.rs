use pri_core::octet_buffer::hex_string;

use super::enums::ie_kind::{LOCKING_SHIFT, NON_LOCKING_SHIFT};
use super::enums::msg_type::msg_name;
use super::header::disc_name;
use super::ie::dump_ie;
use super::message::{Q931Message, WalkEvent};

fn is_maintenance(pd: u8) -> bool {
    pd == pri_core::protodisc::ATT_MAINTENANCE || pd == pri_core::protodisc::NEW_ATT_MAINTENANCE
}

/// Human readable dump of a Q.931 message, one entry per line.
/// `tx` selects the '>' prefix for sent messages, received ones use '<'.
pub fn dump_message(data: &[u8], tx: bool) -> Vec<String> {
    let c = if tx { '>' } else { '<' };
    let msg = match Q931Message::from_bytes(data) {
        Ok(m) => m,
        Err(e) => return vec![format!("{} Undecodable message ({}): {}", c, e, hex_string(data))],
    };
    let cr = msg.header.call_ref() & 0x7fff;
    let mut lines = vec![
        format!(
            "{} Protocol Discriminator: {} ({})  len={}",
            c,
            disc_name(msg.header.pd),
            msg.header.pd,
            data.len()
        ),
        format!(
            "{} Call Ref: len={:2} (reference {}/0x{:X}) ({})",
            c,
            msg.header.crv.len(),
            cr,
            cr,
            if msg.header.from_terminator() { "Terminator" } else { "Originator" }
        ),
        format!(
            "{} Message type: {} ({})",
            c,
            msg_name(msg.msg_type, is_maintenance(msg.header.pd)),
            msg.msg_type
        ),
    ];

    for ev in msg.walk() {
        match ev {
            Ok(WalkEvent::Ie { ie, .. }) => {
                if ie.id & 0x80 != 0 {
                    lines.push(format!("{} [{:02x}]", c, ie.id));
                } else {
                    let body: String = ie.data.iter().map(|b| format!(" {:02x}", b)).collect();
                    lines.push(format!("{} [{:02x} {:02x}{}]", c, ie.id, ie.data.len(), body));
                }
                lines.extend(dump_ie(ie.codeset, ie.id, &ie.data, c));
            }
            Ok(shift) => {
                let id = match shift {
                    WalkEvent::LockingShift { to, .. } => LOCKING_SHIFT | to,
                    WalkEvent::NonLockingShift { to } => NON_LOCKING_SHIFT | to,
                    _ => LOCKING_SHIFT,
                };
                lines.push(format!("{} [{:02x}]", c, id));
                lines.extend(dump_ie(0, id, &[], c));
            }
            Err(_) => lines.push("XXX Message longer than it should be?? XXX".to_string()),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_header_and_elements() {
        // RELEASE COMPLETE, call 1 from the terminator, cause 16
        let lines = dump_message(&[0x08, 0x02, 0x80, 0x01, 0x5a, 0x08, 0x02, 0x81, 0x90], false);
        assert_eq!(lines[0], "< Protocol Discriminator: Q.931 (8)  len=9");
        assert_eq!(lines[1], "< Call Ref: len= 2 (reference 1/0x1) (Terminator)");
        assert_eq!(lines[2], "< Message type: RELEASE COMPLETE (90)");
        assert_eq!(lines[3], "< [08 02 81 90]");
        assert!(lines[4].starts_with("< Cause (len= 4) [ Ext: 1  Coding: CCITT (ITU) standard (0)"));
        assert!(lines[5].contains("Normal Clearing (16)"));
    }

    #[test]
    fn maintenance_service_name() {
        let lines = dump_message(&[0x03, 0x02, 0x00, 0x01, 0x0f], true);
        assert_eq!(lines[2], "> Message type: SERVICE (15)");
    }

    #[test]
    fn shifts_are_shown() {
        let lines = dump_message(&[0x08, 0x01, 0x01, 0x05, 0x96, 0x01, 0x01, 0x00], true);
        assert_eq!(lines[3], "> [96]");
        assert_eq!(lines[4], "> Locking Shift (len=01): Requested codeset 6");
        assert!(lines[6].contains("Originating Line Information (len=03): Plain Old Telephone Service (POTS) (0)"));
    }
}
