//! Single purpose elements: restart, notification, call state, keypad, display,
//! user-user, network specific facilities, sending complete, line information and
//! generic digits

use pri_core::pdu_parse_error::PduParseErr;
use pri_core::SwitchType;

use crate::q931::enums::call_state::callstate_name;
use crate::q931::enums::msg_type::MsgType;

use super::cause::coding_name;
use super::numbers::get_number;
use super::{CallInfo, IeContext};

pub const MAX_KEYPAD_RX: usize = 63;
pub const MAX_KEYPAD_TX: usize = 32;
pub const MAX_USERUSER_TX: usize = 35;
/// USER INFORMATION allows a longer text, bounded by the length octet
pub const MAX_USERUSER_TX_USER_INFO: usize = 254;

/// User-user protocol discriminator for IA5 text
const UU_IA5: u8 = 0x04;

pub mod restart_ind {
    pub const INDICATED_CHANNEL: u8 = 0;
    /// Switch compatibility variant, sent with coding bits set
    pub const COMPAT: u8 = 5;
    pub const SINGLE_INTERFACE: u8 = 6;
    pub const ALL_INTERFACES: u8 = 7;
}

fn first(data: &[u8], field: &'static str) -> Result<u8, PduParseErr> {
    data.first().copied().ok_or(PduParseErr::BufferEnded { field: Some(field) })
}

pub(crate) fn receive_restart(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    call.ri = first(data, "restart_class")? & 0x07;
    Ok(())
}

pub(crate) fn transmit_restart(call: &CallInfo) -> Result<Vec<u8>, PduParseErr> {
    match call.ri {
        restart_ind::INDICATED_CHANNEL | restart_ind::SINGLE_INTERFACE | restart_ind::ALL_INTERFACES => {
            Ok(vec![0x80 | (call.ri & 0x07)])
        }
        restart_ind::COMPAT => Ok(vec![0xa0 | (call.ri & 0x07)]),
        ri => Err(PduParseErr::InvalidValue { field: "restart_class", value: ri as u64 }),
    }
}

pub(crate) fn receive_notify(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    call.notify = Some(first(data, "notify_description")? & 0x7f);
    Ok(())
}

pub(crate) fn transmit_notify(call: &CallInfo) -> Option<Vec<u8>> {
    call.notify.map(|n| vec![0x80 | n])
}

pub(crate) fn receive_call_state(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    call.sugcallstate = Some(first(data, "call_state")? & 0x3f);
    Ok(())
}

pub(crate) fn receive_keypad(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    if data.is_empty() {
        return Err(PduParseErr::BufferEnded { field: Some("keypad_digits") });
    }
    let n = data.len().min(MAX_KEYPAD_RX);
    call.keypad_digits = String::from_utf8_lossy(&data[..n]).into_owned();
    Ok(())
}

/// Keypad digits are sent once, the field is cleared afterwards
pub(crate) fn transmit_keypad(call: &mut CallInfo) -> Option<Vec<u8>> {
    if call.keypad_digits.is_empty() {
        return None;
    }
    let mut out = call.keypad_digits.as_bytes().to_vec();
    out.truncate(MAX_KEYPAD_TX);
    call.keypad_digits.clear();
    Some(out)
}

pub(crate) fn receive_display(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    // Leading octet with the high bit set names the character set
    let text = match data.first() {
        Some(b) if b & 0x80 != 0 => &data[1..],
        _ => data,
    };
    call.callername = get_number(text, super::numbers::MAX_NUMBER_LEN);
    Ok(())
}

pub(crate) fn transmit_display(call: &CallInfo, ctx: &IeContext) -> Option<Vec<u8>> {
    if ctx.switch == SwitchType::Qsig
        || (ctx.switch == SwitchType::EuroIsdnE1 && ctx.node.is_cpe())
        || call.callername.is_empty()
    {
        return None;
    }
    let mut out = Vec::with_capacity(call.callername.len() + 1);
    if ctx.switch != SwitchType::EuroIsdnE1 {
        out.push(0xb1);
    }
    out.extend_from_slice(call.callername.as_bytes());
    Some(out)
}

pub(crate) fn receive_user_user(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    let pd = first(data, "useruser_protocol")?;
    call.useruserprotocoldisc = pd;
    if pd == UU_IA5 {
        call.useruserinfo = get_number(&data[1..], super::numbers::MAX_NUMBER_LEN);
    }
    Ok(())
}

/// User-user text is sent once. USER INFORMATION messages allow a longer text.
pub(crate) fn transmit_user_user(call: &mut CallInfo, ctx: &IeContext) -> Option<Vec<u8>> {
    if call.useruserinfo.is_empty() {
        return None;
    }
    let limit = if ctx.msg_type == MsgType::UserInformation as u8 { MAX_USERUSER_TX_USER_INFO } else { MAX_USERUSER_TX };
    let mut out = vec![UU_IA5];
    let text = call.useruserinfo.as_bytes();
    out.extend_from_slice(&text[..text.len().min(limit)]);
    call.useruserinfo.clear();
    Some(out)
}

pub(crate) fn transmit_nsf(ctx: &IeContext) -> Option<Vec<u8>> {
    ctx.nsf.map(|nsf| vec![0x00, nsf])
}

pub(crate) fn transmit_sending_complete(call: &CallInfo, ctx: &IeContext) -> bool {
    (ctx.overlapdial && call.complete) || (!ctx.overlapdial && ctx.switch.is_euro())
}

pub(crate) fn receive_line_info(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    call.ani2 = first(data, "line_info")? as i32;
    Ok(())
}

/// Generic digits, only Info Digits (type 4) are kept, as the ANI II value
pub(crate) fn receive_generic_digits(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    let d0 = first(data, "generic_digits_type")?;
    let encoding = (d0 >> 5) & 0x07;
    let kind = d0 & 0x1f;
    if encoding == 3 {
        tracing::debug!("unable to handle binary encoded generic digits");
        return Ok(());
    }
    if data.len() == 1 || kind != 4 {
        return Ok(());
    }
    call.ani2 = generic_digits_value(encoding, &data[1..]).0;
    Ok(())
}

/// Decodes BCD (even/odd) or IA5 digits into their integer value and text
fn generic_digits_value(encoding: u8, digits: &[u8]) -> (i32, String) {
    let mut value: i32 = 0;
    let mut text = String::new();
    for (i, &b) in digits.iter().enumerate() {
        match encoding {
            0 | 1 => {
                let lo = b & 0x0f;
                value = value.wrapping_mul(10).wrapping_add(lo as i32);
                text.push((b'0' + lo) as char);
                // BCD odd leaves the last high nibble unused
                if encoding == 0 || i + 1 < digits.len() {
                    let hi = (b >> 4) & 0x0f;
                    value = value.wrapping_mul(10).wrapping_add(hi as i32);
                    text.push((b'0' + hi) as char);
                }
            }
            2 => {
                value = value.wrapping_mul(10).wrapping_add(b as i32 - '0' as i32);
                text.push(b as char);
            }
            _ => {}
        }
    }
    (value, text)
}

pub fn notify_name(notify: u8) -> &'static str {
    match notify {
        0x00 => "User suspended",
        0x01 => "User resumed",
        0x02 => "Bearer service change (DSS1)",
        0x03 => "ASN.1 encoded component (DSS1)",
        0x04 => "Call completion delay",
        0x42 => "Conference established",
        0x43 => "Conference disconnected",
        0x44 => "Other party added",
        0x45 => "Isolated",
        0x46 => "Reattached",
        0x47 => "Other party isolated",
        0x48 => "Other party reattached",
        0x49 => "Other party split",
        0x4a => "Other party disconnected",
        0x4b => "Conference floating",
        0x60 => "Call is waiting call",
        0x68 => "Diversion activated (DSS1)",
        0x69 => "Call transfer, alerting",
        0x6a => "Call transfer, active",
        0x79 => "Remote hold",
        0x7a => "Remote retrieval",
        0x7b => "Call is diverting",
        _ => "Unknown",
    }
}

pub fn restart_name(ri: u8) -> &'static str {
    match ri {
        restart_ind::INDICATED_CHANNEL => "Indicated Channel",
        restart_ind::SINGLE_INTERFACE => "Single DS1 Facility",
        restart_ind::ALL_INTERFACES => "All DS1 Facilities",
        _ => "Unknown",
    }
}

pub fn nsf_name(nsf: u8) -> &'static str {
    match nsf {
        0xb1 => "CPN (SID) preferred",
        0xb2 => "BN (ANI) preferred",
        0xb3 => "CPN (SID) only",
        0xb4 => "BN (ANI) only",
        0xb9 => "Call Associated TSC",
        0xba => "Notification of CATSC Clearing or Resource Unavailable",
        0xb5 => "Operator",
        0xb6 => "Pre-subscribed Common Carrier Operator (PCCO)",
        0xe1 => "SDN (including GSDN)",
        0xe2 => "Toll Free MEGACOM",
        0xe3 => "MEGACOM",
        0xe6 => "ACCUNET Switched Digital Service",
        0xe7 => "Long Distance Service",
        0xe8 => "International Toll Free Service",
        0xf0 => "AT&T MultiQuest",
        0xf7 => "Call Redirection Service",
        _ => "Unknown",
    }
}

/// NANPA ANI II digits
pub fn line_info_name(info: i32) -> &'static str {
    match info {
        0 => "Plain Old Telephone Service (POTS)",
        1 => "Multiparty line (more than 2)",
        2 => "ANI failure",
        6 => "Station Level Rating",
        7 => "Special Operator Handling Required",
        20 => "Automatic Identified Outward Dialing (AIOD)",
        23 => "Coing or Non-Coin",
        24 => "Toll free translated to POTS originated for non-pay station",
        25 => "Toll free translated to POTS originated from pay station",
        27 => "Pay station with coin control signalling",
        29 => "Prison/Inmate Service",
        30 => "Intercept (blank)",
        31 => "Intercept (trouble)",
        32 => "Intercept (regular)",
        34 => "Telco Operator Handled Call",
        52 => "Outward Wide Area Telecommunications Service (OUTWATS)",
        60 => "TRS call from unrestricted line",
        61 => "Cellular/Wireless PCS (Type 1)",
        62 => "Cellular/Wireless PCS (Type 2)",
        63 => "Cellular/Wireless PCS (Roaming)",
        66 => "TRS call from hotel/motel",
        67 => "TRS call from restricted line",
        70 => "Line connected to pay station",
        93 => "Private virtual network call",
        _ => "Unknown",
    }
}

fn gd_encoding_name(encoding: u8) -> &'static str {
    match encoding {
        0 => "BCD even",
        1 => "BCD odd",
        2 => "IA5",
        3 => "Binary",
        _ => "Unknown",
    }
}

fn gd_type_name(kind: u8) -> &'static str {
    match kind {
        0 => "Account Code",
        1 => "Auth Code",
        2 => "Customer ID",
        3 => "Universal Access",
        4 => "Info Digits",
        5 => "Callid",
        6 => "Opart",
        7 => "TCN",
        9 => "Adin",
        _ => "Unknown",
    }
}

fn signal_name(signal: u8) -> &'static str {
    match signal {
        0 => "Dial tone",
        1 => "Ring back tone",
        2 => "Intercept tone",
        3 => "Network congestion tone",
        4 => "Busy tone",
        5 => "Confirm tone",
        6 => "Answer tone",
        7 => "Call waiting tone",
        8 => "Off-hook warning tone",
        9 => "Pre-emption tone",
        63 => "Tones off",
        64..=71 => ["Alerting on - pattern 0", "Alerting on - pattern 1", "Alerting on - pattern 2",
            "Alerting on - pattern 3", "Alerting on - pattern 4", "Alerting on - pattern 5",
            "Alerting on - pattern 6", "Alerting on - pattern 7"][(signal - 64) as usize],
        79 => "Alerting off",
        _ => "Unknown",
    }
}

/// Printable runs quoted, everything else as hex, comma separated
pub fn ie_data_string(data: &[u8]) -> String {
    let mut out = String::new();
    let mut in_ascii = false;
    for &c in data {
        if c.is_ascii_graphic() || c == b' ' {
            if !in_ascii {
                if !out.is_empty() {
                    out.push_str(", ");
                }
                out.push('\'');
                in_ascii = true;
            }
            out.push(c as char);
        } else {
            if in_ascii {
                out.push('\'');
                in_ascii = false;
            }
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(&format!("0x{:02X}", c));
        }
    }
    if in_ascii {
        out.push('\'');
    }
    out
}

pub(crate) fn dump_restart(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    vec![format!(
        "{} Restart Indentifier (len={:2}) [ Ext: {}  Spare: {}  Resetting {} ({}) ]",
        prefix,
        data.len() + 2,
        (d0 & 0x80) >> 7,
        (d0 & 0x78) >> 3,
        restart_name(d0 & 0x07),
        d0 & 0x07
    )]
}

pub(crate) fn dump_call_state(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    vec![format!(
        "{} Call State (len={:2}) [ Ext: {}  Coding: {} ({})  Call state: {} ({})",
        prefix,
        data.len() + 2,
        d0 >> 7,
        coding_name((d0 & 0xc0) >> 6),
        (d0 & 0xc0) >> 6,
        callstate_name(d0 & 0x3f),
        d0 & 0x3f
    )]
}

pub(crate) fn dump_call_identity(data: &[u8], prefix: char) -> Vec<String> {
    let bytes: String = data.iter().map(|b| format!("0x{:02X} ", b)).collect();
    vec![format!("{} Call Identity (len={:2}) [ {} ]", prefix, data.len() + 2, bytes)]
}

pub(crate) fn dump_time_date(data: &[u8], prefix: char) -> Vec<String> {
    const SEPARATORS: [&str; 6] = ["", "-", "-", " ", ":", ":"];
    let stamp: String = data.iter().zip(SEPARATORS).map(|(v, sep)| format!("{}{:02}", sep, v)).collect();
    vec![format!("{} Time Date (len={:2}) [ {} ]", prefix, data.len() + 2, stamp)]
}

pub(crate) fn dump_keypad(data: &[u8], prefix: char) -> Vec<String> {
    if data.is_empty() || data.len() > 64 {
        return Vec::new();
    }
    vec![format!("{} Keypad Facility (len={:2}) [ {} ]", prefix, data.len(), String::from_utf8_lossy(data))]
}

pub(crate) fn dump_display(data: &[u8], prefix: char) -> Vec<String> {
    let (charset, text) = match data.first() {
        Some(b) if b & 0x80 != 0 => (format!("Charset: {:02x} ", b & 0x7f), &data[1..]),
        _ => (String::new(), data),
    };
    let text: String = text.iter().map(|b| (b & 0x7f) as char).collect();
    vec![format!("{} Display (len={:2}) {}[ {} ]", prefix, data.len(), charset, text)]
}

pub(crate) fn dump_user_user(data: &[u8], prefix: char) -> Vec<String> {
    let bytes: String = data.iter().map(|b| format!(" {:02x}", b & 0x7f)).collect();
    vec![format!("{} User-User Information (len={:2}) [{} ]", prefix, data.len() + 2, bytes)]
}

pub(crate) fn dump_notify(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    vec![format!(
        "{} Notification indicator (len={:2}): Ext: {}  {} ({})",
        prefix,
        data.len() + 2,
        d0 >> 7,
        notify_name(d0 & 0x7f),
        d0 & 0x7f
    )]
}

pub(crate) fn dump_nsf(data: &[u8], prefix: char) -> Vec<String> {
    let body = match data {
        [0x00, nsf, ..] => nsf_name(*nsf).to_string(),
        _ => ie_data_string(data),
    };
    vec![format!("{} Network-Specific Facilities (len={:2}) [ {} ]", prefix, data.len(), body)]
}

pub(crate) fn dump_sending_complete(prefix: char) -> Vec<String> {
    vec![format!("{} Sending Complete (len= 1)", prefix)]
}

pub(crate) fn dump_shift(id: u8, prefix: char) -> Vec<String> {
    vec![format!(
        "{} {}Locking Shift (len=01): Requested codeset {}",
        prefix,
        if id & 0x08 != 0 { "Non-" } else { "" },
        id & 0x07
    )]
}

pub(crate) fn dump_line_info(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    vec![format!(
        "{} Originating Line Information (len={:02}): {} ({})",
        prefix,
        data.len() + 2,
        line_info_name(d0 as i32),
        d0
    )]
}

pub(crate) fn dump_generic_digits(data: &[u8], prefix: char) -> Vec<String> {
    let len = data.len() + 2;
    let Some(&d0) = data.first() else {
        return vec![format!("{} Generic Digits (len={:02}): Invalid length", prefix, len)];
    };
    let encoding = (d0 >> 5) & 0x07;
    let kind = d0 & 0x1f;
    let mut lines = vec![format!(
        "{} Generic Digits (len={:02}): Encoding {}  Type {}",
        prefix,
        len,
        gd_encoding_name(encoding),
        gd_type_name(kind)
    )];
    if encoding == 3 {
        lines.push(format!("{}                            Don't know how to handle binary encoding", prefix));
        return lines;
    }
    if data.len() == 1 {
        return lines;
    }
    let (value, text) = generic_digits_value(encoding, &data[1..]);
    let suffix = if kind == 4 { format!(" - {}", line_info_name(value)) } else { String::new() };
    lines.push(format!("{}                            Digits: {}{}", prefix, text, suffix));
    lines
}

pub(crate) fn dump_signal(data: &[u8], prefix: char) -> Vec<String> {
    match data.first() {
        Some(&s) => vec![format!("{} Signal (len={:02}): Signal {} ({})", prefix, data.len() + 2, signal_name(s), s)],
        None => vec![format!("{} Signal (len=02): Invalid length", prefix)],
    }
}

pub(crate) fn dump_transit_count(data: &[u8], prefix: char) -> Vec<String> {
    match data.first() {
        Some(&c) => vec![format!(
            "{} Transit Count (len={:02}): Count={} (0x{:02x})",
            prefix,
            data.len() + 2,
            c & 0x1f,
            c & 0x1f
        )],
        None => vec![format!("{} Transit Count (len=02): Invalid length", prefix)],
    }
}
