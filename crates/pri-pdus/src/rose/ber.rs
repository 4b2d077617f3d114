//! Minimal BER (X.690) support for Q.932 APDUs: a bounds checked component reader,
//! a builder that back-patches lengths, and a component dump.

use pri_core::pdu_parse_error::PduParseErr;

/// Universal tags and identifier octet masks
pub mod asn1 {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BITSTRING: u8 = 0x03;
    pub const OCTETSTRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECTIDENTIFIER: u8 = 0x06;
    pub const ENUMERATED: u8 = 0x0a;
    pub const SEQUENCE: u8 = 0x10;
    pub const SET: u8 = 0x11;
    pub const NUMERICSTRING: u8 = 0x12;
    pub const PRINTABLESTRING: u8 = 0x13;
    pub const IA5STRING: u8 = 0x16;

    pub const PC_MASK: u8 = 0x20;
    pub const CONSTRUCTOR: u8 = 0x20;

    pub const CLASS_MASK: u8 = 0xc0;
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const PRIVATE: u8 = 0xc0;

    pub const TYPE_MASK: u8 = 0x1f;

    /// Length octet announcing the indefinite form
    pub const LEN_INDEF: u8 = 0x80;

    /// Constructed SEQUENCE, as it appears on the wire
    pub const SEQUENCE_OF: u8 = CONSTRUCTOR | SEQUENCE;

    /// Primitive context specific tag `[n]`
    pub const fn ctx(n: u8) -> u8 {
        CONTEXT_SPECIFIC | n
    }

    /// Constructed context specific tag `[n]`
    pub const fn ctx_cons(n: u8) -> u8 {
        CONTEXT_SPECIFIC | CONSTRUCTOR | n
    }
}

/// One tag-length-value component borrowed from an APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BerComponent<'a> {
    pub tag: u8,
    /// Contents octets. For the indefinite form the end-of-contents octets are not included.
    pub data: &'a [u8],
    pub indefinite: bool,
}

impl<'a> BerComponent<'a> {
    pub fn is_constructed(&self) -> bool {
        self.tag & asn1::PC_MASK == asn1::CONSTRUCTOR
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reader over the contents of a constructed component
    pub fn reader(&self) -> BerReader<'a> {
        BerReader::new(self.data)
    }

    /// Contents as a two's complement big-endian integer
    pub fn as_int(&self) -> Result<i64, PduParseErr> {
        let Some(&first) = self.data.first() else {
            return Err(PduParseErr::BufferEnded { field: Some("asn1_integer") });
        };
        if self.data.len() > 8 {
            return Err(PduParseErr::InvalidValue { field: "asn1_integer_len", value: self.data.len() as u64 });
        }
        let seed = if first & 0x80 != 0 { -1i64 } else { 0 };
        Ok(self.data.iter().fold(seed, |acc, &b| (acc << 8) | b as i64))
    }

    /// Contents as text, cut at `max` octets
    pub fn as_string(&self, max: usize) -> String {
        let end = self.data.len().min(max);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    /// Checks the tag, for use right after reading a mandatory component
    pub fn expect_tag(&self, tag: u8) -> Result<(), PduParseErr> {
        if self.tag == tag {
            Ok(())
        } else {
            Err(PduParseErr::UnexpectedTag { expected: tag as u64, found: self.tag as u64 })
        }
    }
}

/// Reads the identifier and length octets at the start of `data`.
/// Returns (tag, header length, contents length), the length is None for the indefinite form.
fn read_header(data: &[u8]) -> Result<(u8, usize, Option<usize>), PduParseErr> {
    let Some(&tag) = data.first() else {
        return Err(PduParseErr::BufferEnded { field: Some("asn1_tag") });
    };
    let Some(&l0) = data.get(1) else {
        return Err(PduParseErr::BufferEnded { field: Some("asn1_len") });
    };
    match l0 {
        0..=0x7f => Ok((tag, 2, Some(l0 as usize))),
        asn1::LEN_INDEF => Ok((tag, 2, None)),
        0x81 => {
            let l1 = *data.get(2).ok_or(PduParseErr::BufferEnded { field: Some("asn1_len") })?;
            Ok((tag, 3, Some(l1 as usize)))
        }
        0x82 => {
            let (Some(&hi), Some(&lo)) = (data.get(2), data.get(3)) else {
                return Err(PduParseErr::BufferEnded { field: Some("asn1_len") });
            };
            Ok((tag, 4, Some(((hi as usize) << 8) | lo as usize)))
        }
        _ => Err(PduParseErr::InvalidValue { field: "asn1_len", value: l0 as u64 }),
    }
}

/// Length of the contents of an indefinite-length component, up to (not including)
/// the end-of-contents octets.
fn indefinite_contents_len(tag: u8, data: &[u8]) -> Result<usize, PduParseErr> {
    if tag & asn1::PC_MASK != asn1::CONSTRUCTOR {
        // Primitive contents in indefinite form run up to the first end-of-contents pair
        return data
            .windows(2)
            .position(|w| w == [0, 0])
            .ok_or(PduParseErr::BufferEnded { field: Some("asn1_eoc") });
    }
    let mut pos = 0;
    loop {
        let rest = &data[pos..];
        if rest.len() < 2 {
            return Err(PduParseErr::BufferEnded { field: Some("asn1_eoc") });
        }
        if rest[0] == 0 && rest[1] == 0 {
            return Ok(pos);
        }
        let (inner_tag, hdr, len) = read_header(rest)?;
        let inner_len = match len {
            Some(l) => l,
            None => indefinite_contents_len(inner_tag, &rest[hdr..])? + 2,
        };
        if hdr + inner_len > rest.len() {
            return Err(PduParseErr::InconsistentLength { expected: hdr + inner_len, found: rest.len() });
        }
        pos += hdr + inner_len;
    }
}

/// Walks the components found at one nesting level
#[derive(Debug, Clone)]
pub struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
    ended: bool,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, ended: false }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// No further component at this level
    pub fn is_empty(&self) -> bool {
        self.ended || self.pos >= self.data.len() || self.data[self.pos..].starts_with(&[0, 0])
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Next component, None at the end of the data or at an end-of-contents marker
    pub fn next_component(&mut self) -> Result<Option<BerComponent<'a>>, PduParseErr> {
        if self.is_empty() {
            self.ended = true;
            return Ok(None);
        }
        let rest = &self.data[self.pos..];
        let (tag, hdr, len) = read_header(rest)?;
        let (contents, consumed, indefinite) = match len {
            Some(l) => {
                if hdr + l > rest.len() {
                    return Err(PduParseErr::InconsistentLength { expected: hdr + l, found: rest.len() });
                }
                (&rest[hdr..hdr + l], hdr + l, false)
            }
            None => {
                let l = indefinite_contents_len(tag, &rest[hdr..])?;
                (&rest[hdr..hdr + l], hdr + l + 2, true)
            }
        };
        self.pos += consumed;
        Ok(Some(BerComponent { tag, data: contents, indefinite }))
    }

    /// Next component, which must be present
    pub fn expect_component(&mut self, field: &'static str) -> Result<BerComponent<'a>, PduParseErr> {
        self.next_component()?.ok_or(PduParseErr::FieldNotPresent { field: Some(field) })
    }

    /// Next component, which must be present and carry `tag`
    pub fn expect(&mut self, tag: u8, field: &'static str) -> Result<BerComponent<'a>, PduParseErr> {
        let comp = self.expect_component(field)?;
        comp.expect_tag(tag)?;
        Ok(comp)
    }
}

/// Largest contents length the builder will encode
const MAX_CONTENTS_LEN: usize = 0xff;

/// APDU builder. Constructed components are written through `nested`, which
/// back-patches the length once the closure has written the contents.
#[derive(Debug, Default)]
pub struct BerBuilder {
    buf: Vec<u8>,
}

impl BerBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(64) }
    }

    /// Octets outside any TLV, e.g. the protocol profile
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn add_null(&mut self, tag: u8) {
        self.buf.extend_from_slice(&[tag, 0]);
    }

    pub fn add_byte(&mut self, tag: u8, value: u8) {
        self.buf.extend_from_slice(&[tag, 1, value]);
    }

    /// Non-negative integer in the fewest two's complement octets. A leading
    /// 0x00 stays when the next octet has its top bit set.
    pub fn add_int(&mut self, tag: u8, value: u32) {
        let bytes = u64::from(value).to_be_bytes();
        let mut skip = 0;
        while skip < bytes.len() - 1 && bytes[skip] == 0 && bytes[skip + 1] & 0x80 == 0 {
            skip += 1;
        }
        self.buf.push(tag);
        self.buf.push((bytes.len() - skip) as u8);
        self.buf.extend_from_slice(&bytes[skip..]);
    }

    /// Octet string type, truncated to `max_len` octets
    pub fn add_string(&mut self, tag: u8, data: &[u8], max_len: usize) -> Result<(), PduParseErr> {
        let len = data.len().min(max_len);
        if len > 0x7f {
            return Err(PduParseErr::InvalidValue { field: "asn1_string_len", value: len as u64 });
        }
        self.buf.push(tag);
        self.buf.push(len as u8);
        self.buf.extend_from_slice(&data[..len]);
        Ok(())
    }

    /// Constructed component whose contents are written by `f`
    pub fn nested<F>(&mut self, tag: u8, f: F) -> Result<(), PduParseErr>
    where
        F: FnOnce(&mut Self) -> Result<(), PduParseErr>,
    {
        self.buf.push(tag);
        let len_pos = self.buf.len();
        self.buf.push(0);
        f(self)?;

        let len = self.buf.len() - len_pos - 1;
        if len < 0x80 {
            self.buf[len_pos] = len as u8;
        } else if len <= MAX_CONTENTS_LEN {
            self.buf[len_pos] = 0x81;
            self.buf.insert(len_pos + 1, len as u8);
        } else {
            return Err(PduParseErr::BufferFull { needed: len, available: MAX_CONTENTS_LEN });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

fn asn1_id_name(id: u8) -> String {
    const NAMES: [&str; 24] = [
        "none",
        "Boolean",
        "Integer",
        "Bit String",
        "Octet String",
        "NULL",
        "Object Identifier",
        "Object Descriptor",
        "External Reference",
        "Real Number",
        "Enumerated",
        "Embedded PDV",
        "UTF-8 String",
        "Relative Object ID",
        "Reserved (0e)",
        "Reserved (0f)",
        "Sequence",
        "Set",
        "Numeric String",
        "Printable String",
        "Tele-Text String",
        "IA-5 String",
        "UTC Time",
        "Generalized Time",
    ];
    match id {
        1..=0x17 => NAMES[id as usize].to_string(),
        _ => format!("Unknown ({:02x})", id),
    }
}

fn hex_list(data: &[u8]) -> String {
    data.iter().map(|b| format!(" {:02x}", b)).collect()
}

fn dump_level(data: &[u8], level: usize, out: &mut Vec<String>) {
    let mut pos = 0;
    while pos < data.len() {
        let rest = &data[pos..];
        let Ok((tag, hdr, len)) = read_header(rest) else {
            return;
        };
        let indent = " ".repeat(2 * level);
        let raw_len = len.unwrap_or(asn1::LEN_INDEF as usize);
        if tag == 0 && raw_len == 0 {
            out.push(format!("{}{:02X} {:04X}", indent, tag, raw_len));
            return;
        }
        let contents_len = match len {
            Some(l) => l,
            None => match indefinite_contents_len(tag, &rest[hdr..]) {
                Ok(l) => l,
                Err(_) => return,
            },
        };
        if hdr + contents_len > rest.len() {
            return;
        }
        let contents = &rest[hdr..hdr + contents_len];
        let constructed = tag & asn1::PC_MASK == asn1::CONSTRUCTOR;

        let mut line = format!("{}{:02X} {:04X}", indent, tag, raw_len);
        if !constructed {
            line.push_str(&contents.iter().map(|b| format!(" {:02X}", b)).collect::<String>());
        }
        let value = contents.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64);
        match tag & asn1::CLASS_MASK {
            asn1::UNIVERSAL => match tag & asn1::TYPE_MASK {
                0 => line.push_str(" (none)"),
                asn1::BOOLEAN => line.push_str(&format!(" (BOOLEAN: {})", contents.first().copied().unwrap_or(0))),
                asn1::INTEGER => line.push_str(&format!(" (INTEGER: {})", value)),
                asn1::BITSTRING => line.push_str(&format!(" (BITSTRING:{})", hex_list(contents))),
                asn1::OCTETSTRING => line.push_str(&format!(" (OCTETSTRING:{})", hex_list(contents))),
                asn1::NULL => line.push_str(" (NULL)"),
                asn1::OBJECTIDENTIFIER => line.push_str(&format!(" (OBJECTIDENTIFIER:{})", hex_list(contents))),
                asn1::ENUMERATED => line.push_str(&format!(" (ENUMERATED: {})", value)),
                asn1::SEQUENCE => line.push_str(" (SEQUENCE)"),
                t => line.push_str(&format!(" (component {:02x} - {})", tag, asn1_id_name(t))),
            },
            asn1::CONTEXT_SPECIFIC => line.push_str(&format!(" (CONTEXT SPECIFIC [{}])", tag & asn1::TYPE_MASK)),
            _ => line.push_str(&format!(" (component {:02x})", tag)),
        }
        out.push(line);

        if constructed {
            dump_level(contents, level + 1, out);
            if len.is_none() {
                out.push(format!("{}  00 0000", indent));
            }
        }
        pos += hdr + contents_len + if len.is_none() { 2 } else { 0 };
    }
}

/// One line per component, nested components indented by two spaces per level
pub fn asn1_dump(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    dump_level(data, 0, &mut out);
    out
}

/// Hex and printable rendition of a whole APDU
pub fn apdu_string(data: &[u8]) -> String {
    let hex: String = data.iter().map(|b| format!(" {:02X}", b)).collect();
    let ascii: String = data.iter().map(|&b| if (b' '..=b'~').contains(&b) { b as char } else { '.' }).collect();
    format!(" [{} ] - [{}]", hex, ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_definite_components() {
        // INVOKE { id 5, op 0x24, SEQUENCE { INTEGER 1 } }
        let data = [0xa1, 0x0b, 0x02, 0x01, 0x05, 0x02, 0x01, 0x24, 0x30, 0x03, 0x02, 0x01, 0x01];
        let mut r = BerReader::new(&data);
        let invoke = r.expect(0xa1, "invoke").unwrap();
        assert!(invoke.is_constructed());
        assert!(r.next_component().unwrap().is_none());

        let mut inner = invoke.reader();
        assert_eq!(inner.expect(asn1::INTEGER, "id").unwrap().as_int().unwrap(), 5);
        assert_eq!(inner.expect(asn1::INTEGER, "op").unwrap().as_int().unwrap(), 0x24);
        let seq = inner.expect(asn1::SEQUENCE_OF, "arg").unwrap();
        assert_eq!(seq.reader().expect(asn1::INTEGER, "n").unwrap().as_int().unwrap(), 1);
        assert!(inner.is_empty());
    }

    #[test]
    fn indefinite_length_runs_to_end_of_contents() {
        let data = [0x30, 0x80, 0x02, 0x01, 0x07, 0xa1, 0x80, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00];
        let mut r = BerReader::new(&data);
        let seq = r.expect_component("seq").unwrap();
        assert!(seq.indefinite);
        assert_eq!(seq.len(), 9);
        let mut inner = seq.reader();
        assert_eq!(inner.expect(asn1::INTEGER, "i").unwrap().as_int().unwrap(), 7);
        let nested = inner.expect(0xa1, "nested").unwrap();
        assert_eq!(nested.data, &[0x05, 0x00]);
        assert!(inner.next_component().unwrap().is_none());
        assert_eq!(r.expect(asn1::OCTETSTRING, "tail").unwrap().len(), 0);
    }

    #[test]
    fn truncated_components_are_rejected() {
        let mut r = BerReader::new(&[0x02, 0x05, 0x01]);
        assert!(matches!(r.next_component(), Err(PduParseErr::InconsistentLength { .. })));
        let mut r = BerReader::new(&[0x30, 0x80, 0x02, 0x01, 0x01]);
        assert!(r.next_component().is_err());
        let mut r = BerReader::new(&[0x02, 0x01, 0x01]);
        assert!(matches!(r.expect(asn1::ENUMERATED, "x"), Err(PduParseErr::UnexpectedTag { .. })));
    }

    #[test]
    fn builder_patches_lengths() {
        let mut b = BerBuilder::new();
        b.raw(&[0x91]);
        b.nested(0xa1, |b| {
            b.add_int(asn1::INTEGER, 0x1234);
            b.add_byte(asn1::INTEGER, 0x24);
            b.nested(asn1::SEQUENCE_OF, |b| {
                b.add_null(asn1::ctx(1));
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(b.finish(), vec![0x91, 0xa1, 0x0b, 0x02, 0x02, 0x12, 0x34, 0x02, 0x01, 0x24, 0x30, 0x02, 0x81, 0x00]);
    }

    #[test]
    fn builder_uses_long_form_above_127() {
        let mut b = BerBuilder::new();
        b.nested(asn1::SEQUENCE_OF, |b| {
            for _ in 0..50 {
                b.add_byte(asn1::INTEGER, 1);
            }
            Ok(())
        })
        .unwrap();
        let out = b.finish();
        assert_eq!(&out[..3], &[0x30, 0x81, 150]);
        let comp = BerReader::new(&out).expect_component("seq").unwrap();
        assert_eq!(comp.len(), 150);
    }

    #[test]
    fn add_int_is_minimal() {
        let mut b = BerBuilder::new();
        b.add_int(asn1::INTEGER, 0);
        b.add_int(asn1::INTEGER, 0x01_0000);
        assert_eq!(b.finish(), vec![0x02, 0x01, 0x00, 0x02, 0x03, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn add_int_keeps_the_sign_octet() {
        let mut b = BerBuilder::new();
        b.add_int(asn1::INTEGER, 127);
        b.add_int(asn1::INTEGER, 128);
        b.add_int(asn1::INTEGER, 0x8005);
        b.add_int(asn1::INTEGER, u32::MAX);
        let out = b.finish();
        assert_eq!(
            out,
            vec![
                0x02, 0x01, 0x7f, 0x02, 0x02, 0x00, 0x80, 0x02, 0x03, 0x00, 0x80, 0x05, 0x02, 0x05, 0x00, 0xff, 0xff, 0xff,
                0xff
            ]
        );

        let mut r = BerReader::new(&out);
        let values: Vec<i64> = (0..4).map(|_| r.expect(asn1::INTEGER, "n").unwrap().as_int().unwrap()).collect();
        assert_eq!(values, vec![127, 128, 0x8005, u32::MAX as i64]);
    }

    #[test]
    fn as_int_reads_negative_values() {
        let mut r = BerReader::new(&[0x02, 0x01, 0xff, 0x02, 0x02, 0xff, 0x7f]);
        assert_eq!(r.expect(asn1::INTEGER, "a").unwrap().as_int().unwrap(), -1);
        assert_eq!(r.expect(asn1::INTEGER, "b").unwrap().as_int().unwrap(), -129);
    }

    #[test]
    fn dump_annotates_components() {
        let data = [0xa1, 0x09, 0x02, 0x01, 0x05, 0x0a, 0x01, 0x02, 0x80, 0x01, 0x41];
        let lines = asn1_dump(&data);
        assert_eq!(lines[0], "A1 0009 (CONTEXT SPECIFIC [1])");
        assert_eq!(lines[1], "  02 0001 05 (INTEGER: 5)");
        assert_eq!(lines[2], "  0A 0001 02 (ENUMERATED: 2)");
        assert_eq!(lines[3], "  80 0001 41 (CONTEXT SPECIFIC [0])");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn apdu_string_shows_printables() {
        assert_eq!(apdu_string(&[0x80, 0x41, 0x42]), " [ 80 41 42 ] - [.AB]");
    }
}
