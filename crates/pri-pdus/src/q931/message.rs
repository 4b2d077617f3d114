use pri_core::pdu_parse_error::PduParseErr;
use pri_core::OctetBuffer;

use super::enums::ie_kind::{IeKind, LOCKING_SHIFT, NON_LOCKING_SHIFT};
use super::header::Q931Header;
use super::ie::{CallInfo, IeContext, RawIe, shift_octet, transmit_ie};

/// Largest message we build
pub const MAX_MSG_LEN: usize = 1024;

/// A received Q.931 message: header, message type and the undecoded element area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Q931Message {
    pub header: Q931Header,
    pub msg_type: u8,
    pub body: Vec<u8>,
}

impl Q931Message {
    pub fn from_bytes(data: &[u8]) -> Result<Self, PduParseErr> {
        let mut buf = OctetBuffer::from_bytes(data);
        let header = Q931Header::from_buf(&mut buf)?;
        let msg_type = buf.read_field("msg_type")?;
        let body = buf.read_remaining().to_vec();
        Ok(Self { header, msg_type, body })
    }

    /// Walks the elements, tracking the active codeset
    pub fn walk(&self) -> IeWalker<'_> {
        IeWalker::new(&self.body)
    }

    /// All element events, or the first framing error
    pub fn events(&self) -> Result<Vec<WalkEvent>, PduParseErr> {
        self.walk().collect()
    }

    /// Offset of the message type octet in the encoded message
    pub fn msg_type_offset(&self) -> usize {
        self.header.len()
    }
}

/// One step of the element walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// Locking shift to a codeset above 0
    LockingShift { from: u8, to: u8, after_non_locking: bool },
    /// Locking shift to codeset 0, which no variant allows. The codeset is unchanged.
    InvalidLockingShift,
    NonLockingShift { to: u8 },
    Ie {
        ie: RawIe,
        /// Decoded under a non-locking shift
        temporary: bool,
        /// Identifier lower than an earlier one of the same codeset
        out_of_order: bool,
    },
}

/// Element iterator with the locking codeset and the temporary (non-locking) codeset
pub struct IeWalker<'a> {
    data: &'a [u8],
    pos: usize,
    codeset: u8,
    cur_codeset: u8,
    last_ie: [u8; 8],
    failed: bool,
}

impl<'a> IeWalker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, codeset: 0, cur_codeset: 0, last_ie: [0; 8], failed: false }
    }

    pub fn codeset(&self) -> u8 {
        self.codeset
    }

    fn step(&mut self) -> Result<WalkEvent, PduParseErr> {
        let id = self.data[self.pos];
        let single = id & 0x80 != 0;
        let ielen = if single {
            1
        } else {
            match self.data.get(self.pos + 1) {
                Some(&l) => l as usize + 2,
                None => return Err(PduParseErr::BufferEnded { field: Some("ie_len") }),
            }
        };
        if self.pos + ielen > self.data.len() {
            return Err(PduParseErr::InconsistentLength {
                expected: ielen,
                found: self.data.len() - self.pos,
            });
        }
        let content = if single { &[][..] } else { &self.data[self.pos + 2..self.pos + ielen] };
        self.pos += ielen;

        match id & 0xf8 {
            LOCKING_SHIFT => {
                let to = id & 0x07;
                if to == 0 {
                    return Ok(WalkEvent::InvalidLockingShift);
                }
                let ev = WalkEvent::LockingShift {
                    from: self.codeset,
                    to,
                    after_non_locking: self.cur_codeset != self.codeset,
                };
                self.codeset = to;
                self.cur_codeset = to;
                Ok(ev)
            }
            NON_LOCKING_SHIFT => {
                self.cur_codeset = id & 0x07;
                Ok(WalkEvent::NonLockingShift { to: self.cur_codeset })
            }
            _ => {
                let cs = self.cur_codeset;
                let mut out_of_order = false;
                if !single {
                    let last = &mut self.last_ie[cs as usize];
                    if *last > id {
                        out_of_order = true;
                    } else {
                        *last = id;
                    }
                }
                let temporary = cs != self.codeset;
                self.cur_codeset = self.codeset;
                Ok(WalkEvent::Ie { ie: RawIe { codeset: cs, id, data: content.to_vec() }, temporary, out_of_order })
            }
        }
    }
}

impl Iterator for IeWalker<'_> {
    type Item = Result<WalkEvent, PduParseErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let res = self.step();
        if res.is_err() {
            self.failed = true;
        }
        Some(res)
    }
}

/// Builds an outgoing message element by element
pub struct Q931MessageBuilder {
    buf: Vec<u8>,
    msg_type: u8,
    /// Locking codeset of the message so far
    codeset: u8,
}

impl Q931MessageBuilder {
    pub fn new(header: &Q931Header, msg_type: u8) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.push(header.pd);
        buf.push(header.crv.len() as u8);
        buf.extend_from_slice(&header.crv);
        buf.push(msg_type);
        Self { buf, msg_type, codeset: 0 }
    }

    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Appends every instance of `kind` the call has to send, preceded by a shift
    /// octet if the element lives in another codeset. The shift is dropped again if
    /// nothing was emitted.
    pub fn add_ie(&mut self, kind: IeKind, ctx: &IeContext, call: &mut CallInfo) -> Result<(), PduParseErr> {
        let mark = self.buf.len();
        let cs = kind.codeset();
        let shifted = cs != self.codeset;
        if shifted {
            self.buf.push(shift_octet(cs));
        }
        let max = match kind.max_count() {
            0 => usize::MAX,
            n => n,
        };
        let mut emitted = false;
        let mut order = 0;
        while order < max {
            order += 1;
            let res = transmit_ie(kind, ctx, call, order);
            let content = match res {
                Ok(Some(c)) => c,
                Ok(None) => break,
                Err(e) => {
                    self.buf.truncate(mark);
                    return Err(e);
                }
            };
            if kind.is_single_octet() {
                self.buf.push(kind.id());
            } else {
                if content.len() > 255 {
                    self.buf.truncate(mark);
                    return Err(PduParseErr::InvalidValue { field: "ie_len", value: content.len() as u64 });
                }
                self.buf.push(kind.id());
                self.buf.push(content.len() as u8);
                self.buf.extend_from_slice(&content);
            }
            emitted = true;
            if self.buf.len() > MAX_MSG_LEN {
                let needed = self.buf.len();
                self.buf.truncate(mark);
                return Err(PduParseErr::BufferFull { needed, available: MAX_MSG_LEN });
            }
        }
        if !emitted {
            self.buf.truncate(mark);
        } else if shifted && cs != 0 {
            self.codeset = cs;
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Builds a complete message from an element list. Any element error aborts the message.
pub fn build_message(
    header: &Q931Header,
    msg_type: u8,
    ies: &[IeKind],
    ctx: &IeContext,
    call: &mut CallInfo,
) -> Result<Vec<u8>, PduParseErr> {
    let mut ctx = ctx.clone();
    ctx.msg_type = msg_type;
    let mut builder = Q931MessageBuilder::new(header, msg_type);
    for kind in ies {
        builder.add_ie(*kind, &ctx, call)?;
    }
    Ok(builder.finish())
}
