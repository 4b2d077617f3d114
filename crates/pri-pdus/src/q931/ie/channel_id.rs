use pri_core::pdu_parse_error::PduParseErr;
use pri_core::{OctetBuffer, SwitchType};

use super::IeContext;

/// Whether the peer may pick another channel than the one we name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChanFlags {
    /// No channel identification seen or requested
    #[default]
    None,
    Preferred,
    Exclusive,
}

/// Channel identification, Q.931 4.5.13
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelIdent {
    pub flags: ChanFlags,
    /// B-channel number
    pub channelno: Option<u8>,
    /// Bitmap of timeslots 24/31..1
    pub slotmap: Option<u32>,
    /// DS1 (interface) number for NFAS
    pub ds1no: u8,
    /// The interface is named explicitly. Otherwise it's the one carrying the D-channel.
    pub ds1explicit: bool,
    /// Signalling-only connection, no B-channel
    pub justsignalling: bool,
}

impl ChannelIdent {
    /// Channel as reported to the application, `channel | ds1 << 8 | ds1explicit << 16`.
    /// -1 means no particular channel.
    pub fn event_channel(&self) -> i32 {
        let ch = self.channelno.map_or(-1, |c| c as i32);
        ch | ((self.ds1no as i32) << 8) | ((self.ds1explicit as i32) << 16)
    }

    /// Sets the channel from the application encoding used by `event_channel`
    pub fn set_from_event_channel(&mut self, channel: i32) {
        self.channelno = if channel & 0xff == 0xff { None } else { Some((channel & 0xff) as u8) };
        self.ds1no = ((channel & 0xff00) >> 8) as u8;
        self.ds1explicit = (channel & 0x10000) != 0;
    }

    pub fn decode(&mut self, data: &[u8], ctx: &IeContext) -> Result<(), PduParseErr> {
        let mut buf = OctetBuffer::from_bytes(data);
        let d0 = buf.read_field("chan_octet3")?;

        if ctx.bri {
            if d0 & 0x03 == 0 {
                self.justsignalling = true;
            } else {
                self.channelno = Some(d0 & 0x03);
            }
        } else {
            match d0 & 0x03 {
                0 => self.justsignalling = true,
                1 => {}
                sel => return Err(PduParseErr::InvalidValue { field: "chan_selection", value: sel as u64 }),
            }
        }

        self.flags = if d0 & 0x08 != 0 { ChanFlags::Exclusive } else { ChanFlags::Preferred };

        if d0 & 0x40 != 0 {
            let d1 = buf.read_field("ds1_identifier")?;
            self.ds1no = d1 & 0x7f;
            self.ds1explicit = true;
        } else {
            self.ds1explicit = false;
        }

        let Some(spec) = buf.read_u8() else {
            return Ok(());
        };
        if spec & 0x0f != 3 {
            return Err(PduParseErr::InvalidValue { field: "channel_type", value: (spec & 0x0f) as u64 });
        }
        if spec & 0x60 != 0 {
            return Err(PduParseErr::InvalidValue { field: "coding_standard", value: ((spec & 0x60) >> 5) as u64 });
        }
        if spec & 0x10 != 0 {
            let map = buf.read_bytes(3, "slotmap")?;
            self.slotmap = Some(((map[0] as u32) << 16) | ((map[1] as u32) << 8) | map[2] as u32);
        } else {
            let ch = buf.read_field("channel_number")?;
            self.channelno = Some(ch & 0x7f);
        }
        Ok(())
    }

    /// Encodes the IE contents. Ok(None) leaves the IE off the message.
    pub fn encode(&self, ctx: &IeContext) -> Result<Option<Vec<u8>>, PduParseErr> {
        if self.justsignalling {
            return Ok(Some(vec![0xac]));
        }

        let mut first = if ctx.switch == SwitchType::Gr303Tmc {
            0x69
        } else if ctx.bri {
            0x80 | self.channelno.map_or(0, |c| c & 0x03)
        } else {
            0xa1
        };
        match self.flags {
            ChanFlags::Exclusive => first |= 0x08,
            ChanFlags::Preferred => {}
            ChanFlags::None => return Ok(None),
        }

        let mut out = Vec::with_capacity(6);
        if (ctx.switch != SwitchType::Qsig && self.ds1no > 0) || self.ds1explicit {
            out.push(first | 0x40);
            out.push(0x80 | self.ds1no);
        } else {
            out.push(first);
        }

        if ctx.bri {
            return Ok(Some(out));
        }

        if let Some(ch) = self.channelno {
            out.push(0x83);
            out.push(0x80 | ch);
            return Ok(Some(out));
        }
        if let Some(map) = self.slotmap {
            out.push(0x83 | 0x10);
            out.push((map >> 16) as u8);
            out.push((map >> 8) as u8);
            out.push(map as u8);
            return Ok(Some(out));
        }
        if self.ds1no > 0 {
            return Ok(Some(out));
        }
        Err(PduParseErr::Inconsistency {
            field: "channel_ident",
            reason: "no channel map, no channel and no ds1 to identify",
        })
    }
}

pub(crate) fn dump(data: &[u8], prefix: char) -> Vec<String> {
    const CHAN_SEL: [&str; 8] = [
        "No channel selected",
        "B1 channel",
        "B2 channel",
        "Any channel selected",
        "No channel selected",
        "As indicated in following octets",
        "Reserved",
        "Any channel selected",
    ];
    let mut lines = Vec::new();
    let Some(&d0) = data.first() else {
        return vec![format!("{} Channel ID (len= 2) [ ]", prefix)];
    };
    lines.push(format!(
        "{} Channel ID (len={:2}) [ Ext: {}  IntID: {}  {}  Spare: {}  {}  Dchan: {}",
        prefix,
        data.len() + 2,
        (d0 & 0x80 != 0) as u8,
        if d0 & 0x40 != 0 { "Explicit" } else { "Implicit" },
        if d0 & 0x20 != 0 { "PRI" } else { "Other" },
        (d0 & 0x10 != 0) as u8,
        if d0 & 0x08 != 0 { "Exclusive" } else { "Preferred" },
        (d0 & 0x04 != 0) as u8
    ));
    lines.push(format!(
        "{}                        ChanSel: {}",
        prefix,
        CHAN_SEL[((d0 & 0x03) + ((d0 >> 3) & 0x04)) as usize]
    ));
    let mut pos = 1;
    if d0 & 0x40 != 0 {
        if let Some(&d) = data.get(pos) {
            lines.push(format!("{}                       Ext: {}  DS1 Identifier: {}  ", prefix, d >> 7, d & 0x7f));
        }
        pos += 1;
    }
    match data.get(pos) {
        Some(&spec) => {
            lines.push(format!(
                "{}                       Ext: {}  Coding: {}  {} Specified  Channel Type: {}",
                prefix,
                spec >> 7,
                (spec & 0x60) >> 5,
                if spec & 0x10 != 0 { "Slot Map" } else { "Number" },
                spec & 0x0f
            ));
            if spec & 0x10 == 0 {
                if let Some(&ch) = data.get(pos + 1) {
                    lines.push(format!("{}                       Ext: {}  Channel: {} ]", prefix, ch >> 7, ch & 0x7f));
                }
            } else if data.len() >= pos + 4 {
                let map = ((data[pos + 1] as u32) << 16) | ((data[pos + 2] as u32) << 8) | data[pos + 3] as u32;
                lines.push(format!("{}                       Map: {:024b} ]", prefix, map));
            }
        }
        None => lines.push("                         ]".to_string()),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_core::NodeType;

    fn pri_ctx() -> IeContext {
        IeContext::new(SwitchType::Ni2, NodeType::Cpe)
    }

    #[test]
    fn pri_exclusive_channel() {
        let ch = ChannelIdent { flags: ChanFlags::Exclusive, channelno: Some(5), ..Default::default() };
        let data = ch.encode(&pri_ctx()).unwrap().unwrap();
        assert_eq!(data, vec![0xa9, 0x83, 0x85]);

        let mut rx = ChannelIdent::default();
        rx.decode(&data, &pri_ctx()).unwrap();
        assert_eq!(rx.flags, ChanFlags::Exclusive);
        assert_eq!(rx.channelno, Some(5));
        assert_eq!(rx.event_channel(), 5);
    }

    #[test]
    fn explicit_ds1_and_slotmap() {
        let ch = ChannelIdent { flags: ChanFlags::Preferred, ds1no: 2, slotmap: Some(0x000003), ..Default::default() };
        let data = ch.encode(&pri_ctx()).unwrap().unwrap();
        assert_eq!(data, vec![0xe1, 0x82, 0x93, 0x00, 0x00, 0x03]);

        let mut rx = ChannelIdent::default();
        rx.decode(&data, &pri_ctx()).unwrap();
        assert!(rx.ds1explicit);
        assert_eq!(rx.ds1no, 2);
        assert_eq!(rx.slotmap, Some(3));
        assert_eq!(rx.event_channel(), -1);
    }

    #[test]
    fn nothing_to_identify_is_an_error() {
        let ch = ChannelIdent { flags: ChanFlags::Preferred, ..Default::default() };
        assert!(ch.encode(&pri_ctx()).is_err());
        let ch = ChannelIdent::default();
        assert_eq!(ch.encode(&pri_ctx()).unwrap(), None);
    }

    #[test]
    fn bri_channel_and_signalling_only() {
        let mut ctx = pri_ctx();
        ctx.bri = true;
        let ch = ChannelIdent { flags: ChanFlags::Exclusive, channelno: Some(2), ..Default::default() };
        assert_eq!(ch.encode(&ctx).unwrap(), Some(vec![0x8a]));

        let mut rx = ChannelIdent::default();
        rx.decode(&[0x80], &ctx).unwrap();
        assert!(rx.justsignalling);

        let sig = ChannelIdent { justsignalling: true, ..Default::default() };
        assert_eq!(sig.encode(&pri_ctx()).unwrap(), Some(vec![0xac]));
    }

    #[test]
    fn bad_selection_on_pri() {
        let mut rx = ChannelIdent::default();
        assert!(rx.decode(&[0xa3], &pri_ctx()).is_err());
        assert!(rx.decode(&[0xa1, 0x84, 0x01], &pri_ctx()).is_err());
    }

    #[test]
    fn event_channel_encoding() {
        let mut ch = ChannelIdent::default();
        ch.set_from_event_channel(3 | (1 << 8) | (1 << 16));
        assert_eq!(ch.channelno, Some(3));
        assert_eq!(ch.ds1no, 1);
        assert!(ch.ds1explicit);
        assert_eq!(ch.event_channel(), 0x10103);
    }
}
