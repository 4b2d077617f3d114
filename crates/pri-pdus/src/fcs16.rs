/// Polynomial x^16 + x^12 + x^5 + 1, bit reversed
const POLY_REV: u16 = 0x8408;

/// Residue left in the register after running over a frame with a valid FCS
pub const GOOD_FCS: u16 = 0xf0b8;

fn update(mut fcs: u16, data: &[u8]) -> u16 {
    for b in data {
        fcs ^= *b as u16;
        for _ in 0..8 {
            fcs = if fcs & 1 != 0 { (fcs >> 1) ^ POLY_REV } else { fcs >> 1 };
        }
    }
    fcs
}

/// Computes the FCS-16 of `data` as transmitted, i.e. already complemented
pub fn compute_fcs(data: &[u8]) -> u16 {
    !update(0xffff, data)
}

/// Appends the FCS, low octet first
pub fn append_fcs(frame: &mut Vec<u8>) {
    let fcs = compute_fcs(frame);
    frame.push(fcs as u8);
    frame.push((fcs >> 8) as u8);
}

/// Checks a frame that still carries its trailing FCS
pub fn check_fcs(frame: &[u8]) -> bool {
    frame.len() >= 2 && update(0xffff, frame) == GOOD_FCS
}

/// Removes the two FCS octets. The FCS itself is not verified, the HDLC driver has done that.
pub fn strip_fcs(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 2 { None } else { Some(&frame[..frame.len() - 2]) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25_check_value() {
        assert_eq!(compute_fcs(b"123456789"), 0x906e);
    }

    #[test]
    fn appended_fcs_checks_out() {
        let mut frame = vec![0x02, 0x01, 0x7f];
        append_fcs(&mut frame);
        assert_eq!(frame.len(), 5);
        assert!(check_fcs(&frame));
        frame[1] ^= 0x10;
        assert!(!check_fcs(&frame));
        assert_eq!(strip_fcs(&frame), Some(&frame[..3]));
    }
}
