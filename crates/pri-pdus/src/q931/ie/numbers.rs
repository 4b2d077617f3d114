//! Party number and subaddress elements

use pri_core::names::{npi_name, pres_name, ton_name};
use pri_core::pdu_parse_error::PduParseErr;

use super::CallInfo;

/// Longest number or name kept for a call
pub const MAX_NUMBER_LEN: usize = 255;

pub mod pres {
    pub const ALLOWED_USER_NUMBER_NOT_SCREENED: u8 = 0x00;
    pub const ALLOWED_USER_NUMBER_PASSED_SCREEN: u8 = 0x01;
    pub const ALLOWED_USER_NUMBER_FAILED_SCREEN: u8 = 0x02;
    pub const ALLOWED_NETWORK_NUMBER: u8 = 0x03;
    pub const PROHIB_USER_NUMBER_NOT_SCREENED: u8 = 0x20;
    pub const PROHIB_USER_NUMBER_PASSED_SCREEN: u8 = 0x21;
    pub const PROHIB_USER_NUMBER_FAILED_SCREEN: u8 = 0x22;
    pub const PROHIB_NETWORK_NUMBER: u8 = 0x23;
    pub const NUMBER_NOT_AVAILABLE: u8 = 0x43;
}

/// Copies number digits, an oversized number is dropped entirely
pub(crate) fn get_number(src: &[u8], max: usize) -> String {
    if src.len() > max {
        return String::new();
    }
    String::from_utf8_lossy(src).into_owned()
}

fn first(data: &[u8], field: &'static str) -> Result<u8, PduParseErr> {
    data.first().copied().ok_or(PduParseErr::BufferEnded { field: Some(field) })
}

pub(crate) fn receive_called(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    let d0 = first(data, "called_type")?;
    call.callednum = get_number(&data[1..], MAX_NUMBER_LEN);
    call.calledplan = d0 & 0x7f;
    Ok(())
}

pub(crate) fn transmit_called(call: &CallInfo) -> Vec<u8> {
    let mut out = vec![0x80 | call.calledplan];
    out.extend_from_slice(call.callednum.as_bytes());
    out
}

pub(crate) fn receive_calling(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    let d0 = first(data, "calling_type")?;
    let digits = if d0 & 0x80 != 0 {
        call.callerpres = pres::ALLOWED_USER_NUMBER_NOT_SCREENED;
        &data[1..]
    } else {
        let Some(&d1) = data.get(1) else {
            return Err(PduParseErr::BufferEnded { field: Some("calling_presentation") });
        };
        call.callerpres = d1 & 0x7f;
        &data[2..]
    };

    if call.callerpres == pres::ALLOWED_NETWORK_NUMBER || call.callerpres == pres::PROHIB_NETWORK_NUMBER {
        call.callerani = get_number(digits, MAX_NUMBER_LEN);
        call.callerplanani = d0 & 0x7f;
        // A network provided number doubles as caller id if none was seen
        if call.callernum.is_empty() {
            call.callernum = call.callerani.clone();
            call.callerplan = call.callerplanani;
        }
    } else {
        call.callernum = get_number(digits, MAX_NUMBER_LEN);
        call.callerplan = d0 & 0x7f;
    }
    Ok(())
}

pub(crate) fn transmit_calling(call: &CallInfo) -> Vec<u8> {
    let mut out = vec![call.callerplan, 0x80 | call.callerpres];
    out.extend_from_slice(call.callernum.as_bytes());
    out
}

/// Redirecting number and original called number share one layout: octets 3, 3a, 3b
/// terminated by the first octet with the extension bit set, then the digits
pub(crate) fn receive_redirecting(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    let mut i = 0;
    loop {
        let Some(&b) = data.get(i) else {
            return Err(PduParseErr::BufferEnded { field: Some("redirecting_octet3") });
        };
        match i {
            0 => call.redirectingplan = b & 0x7f,
            1 => call.redirectingpres = b & 0x7f,
            2 => call.redirectingreason = b & 0x0f,
            _ => {}
        }
        i += 1;
        if b & 0x80 != 0 {
            break;
        }
    }
    call.redirectingnum = get_number(&data[i..], MAX_NUMBER_LEN);
    Ok(())
}

pub(crate) fn transmit_redirecting(call: &CallInfo) -> Option<Vec<u8>> {
    if call.redirectingnum.is_empty() {
        return None;
    }
    let mut out = vec![call.redirectingplan, call.redirectingpres, 0x80 | (call.redirectingreason & 0x0f)];
    out.extend_from_slice(call.redirectingnum.as_bytes());
    Some(out)
}

pub(crate) fn receive_calling_subaddr(call: &mut CallInfo, data: &[u8]) -> Result<(), PduParseErr> {
    first(data, "subaddr_type")?;
    call.callingsubaddr = get_number(&data[1..], MAX_NUMBER_LEN);
    Ok(())
}

pub fn redirection_reason_name(reason: u8) -> &'static str {
    match reason {
        0x0 => "Unknown",
        0x1 => "Forwarded on busy",
        0x2 => "Forwarded on no reply",
        0x3 => "Call deflected",
        0x9 => "Called DTE out of order",
        0xa => "Forwarded by called DTE",
        0xf => "Forwarded unconditionally",
        _ => "Unknown",
    }
}

fn subaddr_type_name(t: u8) -> &'static str {
    match t {
        0 => "NSAP (X.213/ISO 8348 AD2)",
        2 => "User Specified",
        _ => "Unknown",
    }
}

fn ton_npi(d0: u8) -> String {
    format!(
        "Ext: {}  TON: {} ({})  NPI: {} ({})",
        d0 >> 7,
        ton_name((d0 >> 4) & 0x07),
        (d0 >> 4) & 0x07,
        npi_name(d0 & 0x0f),
        d0 & 0x0f
    )
}

pub(crate) fn dump_called(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    let num = get_number(data.get(1..).unwrap_or(&[]), MAX_NUMBER_LEN);
    vec![format!("{} Called Number (len={:2}) [ {}  '{}' ]", prefix, data.len() + 2, ton_npi(d0), num)]
}

pub(crate) fn dump_calling(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    let (pres, digits) = if d0 & 0x80 != 0 {
        (0, data.get(1..).unwrap_or(&[]))
    } else {
        (data.get(1).map_or(0, |p| p & 0x7f), data.get(2..).unwrap_or(&[]))
    };
    vec![
        format!("{} Calling Number (len={:2}) [ {}", prefix, data.len() + 2, ton_npi(d0)),
        format!(
            "{}                           Presentation: {} ({})  '{}' ]",
            prefix,
            pres_name(pres as i32),
            pres,
            get_number(digits, MAX_NUMBER_LEN)
        ),
    ]
}

pub(crate) fn dump_subaddr(title: &str, data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    vec![format!(
        "{} {} (len={:2}) [ Ext: {}  Type: {} ({})  O: {}  '{}' ]",
        prefix,
        title,
        data.len() + 2,
        d0 >> 7,
        subaddr_type_name((d0 & 0x70) >> 4),
        (d0 & 0x70) >> 4,
        (d0 & 0x08) >> 3,
        get_number(data.get(1..).unwrap_or(&[]), MAX_NUMBER_LEN)
    )]
}

/// Redirecting, original called and connected numbers
pub(crate) fn dump_redirecting(title: &str, data: &[u8], prefix: char) -> Vec<String> {
    let mut lines = Vec::new();
    let mut i = 0;
    while let Some(&b) = data.get(i) {
        match i {
            0 => lines.push(format!("{} {} (len={:2}) [ {}", prefix, title, data.len() + 2, ton_npi(b))),
            1 => lines.push(format!(
                "{}                               Ext: {}  Presentation: {} ({})",
                prefix,
                b >> 7,
                pres_name((b & 0x7f) as i32),
                b & 0x7f
            )),
            2 => lines.push(format!(
                "{}                               Ext: {}  Reason: {} ({})",
                prefix,
                b >> 7,
                redirection_reason_name(b & 0x7f),
                b & 0x7f
            )),
            _ => {}
        }
        i += 1;
        if b & 0x80 != 0 {
            break;
        }
    }
    let num = get_number(data.get(i..).unwrap_or(&[]), MAX_NUMBER_LEN);
    match lines.last_mut() {
        Some(last) => last.push_str(&format!("  '{}' ]", num)),
        None => lines.push(format!("{} {} (len= 2) [ ]", prefix, title)),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calling_number_with_presentation() {
        let mut call = CallInfo::default();
        receive_calling(&mut call, b"\x21\x80\x32\x35\x36\x35\x35\x35\x31\x32\x31\x32").unwrap();
        assert_eq!(call.callernum, "2565551212");
        assert_eq!(call.callerplan, 0x21);
        assert_eq!(call.callerpres, 0);
        assert_eq!(transmit_calling(&call), b"\x21\x80\x32\x35\x36\x35\x35\x35\x31\x32\x31\x32".to_vec());
    }

    #[test]
    fn network_number_is_stored_as_ani() {
        let mut call = CallInfo::default();
        receive_calling(&mut call, b"\x21\x83\x35\x35\x35").unwrap();
        assert_eq!(call.callerani, "555");
        assert_eq!(call.callernum, "555");
        assert_eq!(call.callerplanani, 0x21);

        let mut call = CallInfo { callernum: "100".into(), ..Default::default() };
        receive_calling(&mut call, b"\x21\x83\x35\x35\x35").unwrap();
        assert_eq!(call.callernum, "100");
    }

    #[test]
    fn calling_number_without_octet_3a() {
        let mut call = CallInfo::default();
        receive_calling(&mut call, b"\xa1\x31\x32").unwrap();
        assert_eq!(call.callernum, "12");
        assert_eq!(call.callerplan, 0x21);
    }

    #[test]
    fn redirecting_number_walks_extension_bits() {
        let mut call = CallInfo::default();
        receive_redirecting(&mut call, b"\x21\x03\x82\x31\x32\x33").unwrap();
        assert_eq!(call.redirectingplan, 0x21);
        assert_eq!(call.redirectingpres, 0x03);
        assert_eq!(call.redirectingreason, 0x02);
        assert_eq!(call.redirectingnum, "123");
        assert_eq!(transmit_redirecting(&call), Some(b"\x21\x03\x82\x31\x32\x33".to_vec()));

        let mut short = CallInfo::default();
        receive_redirecting(&mut short, b"\xa1\x39").unwrap();
        assert_eq!(short.redirectingnum, "9");
        assert!(receive_redirecting(&mut short, b"\x21\x03").is_err());
    }

    #[test]
    fn called_number() {
        let mut call = CallInfo::default();
        receive_called(&mut call, b"\xa1\x35\x35\x35\x31\x32\x31\x32").unwrap();
        assert_eq!(call.callednum, "5551212");
        assert_eq!(call.calledplan, 0x21);
        assert_eq!(transmit_called(&call), b"\xa1\x35\x35\x35\x31\x32\x31\x32".to_vec());
        assert_eq!(transmit_redirecting(&call), None);
    }
}
