use core::fmt;

use crate::pdu_parse_error::PduParseErr;

/// Octet-oriented cursor used for all D-channel PDUs.
///
/// Reads never go past `end` and report `PduParseErr::BufferEnded` instead.
/// Writes go to `pos`; a buffer created with `new_autoexpand` grows on demand,
/// other buffers fail with `PduParseErr::BufferFull` once `end` is reached.
#[derive(Clone, PartialEq, Eq)]
pub struct OctetBuffer {
    buffer: Vec<u8>,
    start: usize,       // octets before this are out of window
    pos: usize,         // next octet offset for read/write (absolute)
    end: usize,         // octets at or after this are out of window
    flag_autoexpand: bool,
}

impl OctetBuffer {
    /// Create a zeroed buffer holding exactly `len` octets.
    pub fn new(len: usize) -> Self {
        OctetBuffer {
            buffer: vec![0; len],
            start: 0,
            pos: 0,
            end: len,
            flag_autoexpand: false,
        }
    }

    /// Create an empty buffer with an initial capacity. Writes advance the end pointer
    /// and reallocate as needed.
    pub fn new_autoexpand(initial_capacity: usize) -> Self {
        OctetBuffer {
            buffer: Vec::with_capacity(initial_capacity),
            start: 0,
            pos: 0,
            end: 0,
            flag_autoexpand: true,
        }
    }

    /// Wrap an existing byte-vector, all octets readable.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        OctetBuffer {
            buffer: data,
            start: 0,
            pos: 0,
            end: len,
            flag_autoexpand: false,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Parse a string of hex digits, whitespace and ':' are ignored.
    pub fn from_hexstr(hex: &str) -> Option<Self> {
        let digits: Vec<u8> = hex.bytes().filter(|c| !c.is_ascii_whitespace() && *c != b':').collect();
        if digits.len() % 2 != 0 {
            return None;
        }
        let mut data = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks(2) {
            let s = core::str::from_utf8(pair).ok()?;
            data.push(u8::from_str_radix(s, 16).ok()?);
        }
        Some(Self::from_vec(data))
    }

    /// Peek the octet at the current pos without advancing.
    pub fn peek_u8(&self) -> Option<u8> {
        if self.pos < self.end { Some(self.buffer[self.pos]) } else { None }
    }

    /// Peek the octet at `offset` from the current pos without advancing.
    pub fn peek_u8_posoffset(&self, offset: usize) -> Option<u8> {
        let idx = self.pos + offset;
        if idx < self.end { Some(self.buffer[idx]) } else { None }
    }

    /// Read one octet, advancing on success.
    pub fn read_u8(&mut self) -> Option<u8> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Some(v)
    }

    /// Similar to read_u8, but returns PduParseErr::BufferEnded with the given field name if the window is exhausted.
    pub fn read_field(&mut self, field: &'static str) -> Result<u8, PduParseErr> {
        self.read_u8().ok_or(PduParseErr::BufferEnded { field: Some(field) })
    }

    /// Read a big-endian 16 bit value.
    pub fn read_u16_field(&mut self, field: &'static str) -> Result<u16, PduParseErr> {
        let hi = self.read_field(field)? as u16;
        let lo = self.read_field(field)? as u16;
        Ok((hi << 8) | lo)
    }

    /// Read `len` octets, advancing on success.
    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&[u8], PduParseErr> {
        if self.get_len_remaining() < len {
            return Err(PduParseErr::BufferEnded { field: Some(field) });
        }
        let s = &self.buffer[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    /// Read a sub-window of `len` octets as a new buffer. The returned buffer can't read
    /// past its own window, so nested length fields are checked against the enclosing one.
    pub fn read_window(&mut self, len: usize, field: &'static str) -> Result<OctetBuffer, PduParseErr> {
        let data = self.read_bytes(len, field)?;
        Ok(OctetBuffer::from_bytes(data))
    }

    /// Returns all octets from pos to end, advancing to end.
    pub fn read_remaining(&mut self) -> &[u8] {
        let s = &self.buffer[self.pos..self.end];
        self.pos = self.end;
        s
    }

    /// Octets from pos to end, without advancing.
    pub fn remaining(&self) -> &[u8] {
        &self.buffer[self.pos..self.end]
    }

    /// Skip `len` octets.
    pub fn skip(&mut self, len: usize, field: &'static str) -> Result<(), PduParseErr> {
        self.read_bytes(len, field).map(|_| ())
    }

    fn ensure_room(&mut self, len: usize) -> Result<(), PduParseErr> {
        if self.pos + len <= self.end {
            return Ok(());
        }
        if !self.flag_autoexpand {
            return Err(PduParseErr::BufferFull { needed: len, available: self.end - self.pos });
        }
        let new_end = self.pos + len;
        if self.buffer.len() < new_end {
            self.buffer.resize(new_end, 0);
        }
        self.end = new_end;
        Ok(())
    }

    /// Write one octet at pos.
    pub fn write_u8(&mut self, value: u8) -> Result<(), PduParseErr> {
        self.ensure_room(1)?;
        self.buffer[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    /// Write a big-endian 16 bit value.
    pub fn write_u16(&mut self, value: u16) -> Result<(), PduParseErr> {
        self.write_u8((value >> 8) as u8)?;
        self.write_u8(value as u8)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), PduParseErr> {
        self.ensure_room(data.len())?;
        self.buffer[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    /// Overwrite the octet at `offset` (relative to window start) without moving pos.
    pub fn patch_u8(&mut self, offset: usize, value: u8) -> Result<(), PduParseErr> {
        let idx = self.start + offset;
        if idx >= self.end {
            return Err(PduParseErr::BufferEnded { field: Some("patch") });
        }
        self.buffer[idx] = value;
        Ok(())
    }

    /// Insert octets at `offset` (relative to window start), shifting everything after it.
    /// Only valid on autoexpanding buffers; pos moves along if it lies behind the insertion point.
    pub fn insert_at(&mut self, offset: usize, data: &[u8]) -> Result<(), PduParseErr> {
        let idx = self.start + offset;
        if !self.flag_autoexpand || idx > self.end {
            return Err(PduParseErr::BufferFull { needed: data.len(), available: 0 });
        }
        self.buffer.truncate(self.end);
        self.buffer.splice(idx..idx, data.iter().copied());
        self.end += data.len();
        if self.pos >= idx {
            self.pos += data.len();
        }
        Ok(())
    }

    /// Active window length in octets, from start to end.
    pub fn get_len(&self) -> usize {
        self.end - self.start
    }

    /// Number of octets left in the window, from pos to end.
    pub fn get_len_remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Number of octets written (or read), from start to pos.
    pub fn get_len_written(&self) -> usize {
        self.pos - self.start
    }

    /// Get the current position, relative to window start.
    pub fn get_pos(&self) -> usize {
        self.pos - self.start
    }

    /// Seek `pos` to `offset` (relative to window start).
    pub fn seek(&mut self, offset: usize) {
        assert!(self.start + offset <= self.end, "seek beyond end of window");
        self.pos = self.start + offset;
    }

    /// The active window as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[self.start..self.end]
    }

    /// Extract the active window as a byte-vector.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buffer.truncate(self.end);
        self.buffer.drain(..self.start);
        self.buffer
    }

    /// Hex dump of the window, e.g. "08 02 00 01 05".
    pub fn dump_hex(&self) -> String {
        hex_string(self.as_slice())
    }
}

/// Formats octets as space separated lowercase hex.
pub fn hex_string(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push_str(&format!("{:02x}", b));
    }
    s
}

impl fmt::Debug for OctetBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OctetBuffer[{}/{}]: {}", self.get_pos(), self.get_len(), self.dump_hex())
    }
}

impl fmt::Display for OctetBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dump_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fail_closed_at_end_of_window() {
        let mut buf = OctetBuffer::from_bytes(&[0x08, 0x02]);
        assert_eq!(buf.read_field("pd"), Ok(0x08));
        assert_eq!(buf.read_u16_field("cr"), Err(PduParseErr::BufferEnded { field: Some("cr") }));
    }

    #[test]
    fn nested_window_is_bounded() {
        let mut buf = OctetBuffer::from_bytes(&[0x30, 0x02, 0x01, 0x02, 0xff]);
        buf.skip(2, "hdr").unwrap();
        let mut inner = buf.read_window(2, "body").unwrap();
        assert_eq!(inner.read_bytes(2, "x").unwrap(), &[0x01, 0x02]);
        assert!(inner.read_u8().is_none());
        assert_eq!(buf.read_u8(), Some(0xff));
    }

    #[test]
    fn fixed_buffer_rejects_overflow() {
        let mut buf = OctetBuffer::new(2);
        buf.write_u16(0xbeef).unwrap();
        assert!(matches!(buf.write_u8(1), Err(PduParseErr::BufferFull { .. })));
    }

    #[test]
    fn insert_shifts_pos() {
        let mut buf = OctetBuffer::new_autoexpand(8);
        buf.write_bytes(&[0x30, 0x00, 0xaa]).unwrap();
        buf.insert_at(2, &[0x81, 0x05]).unwrap();
        assert_eq!(buf.as_slice(), &[0x30, 0x00, 0x81, 0x05, 0xaa]);
        assert_eq!(buf.get_pos(), 5);
    }

    #[test]
    fn hexstr_parsing() {
        let buf = OctetBuffer::from_hexstr("00 01:7f ").unwrap();
        assert_eq!(buf.as_slice(), &[0x00, 0x01, 0x7f]);
        assert!(OctetBuffer::from_hexstr("abc").is_none());
    }
}
