use pri_core::pdu_parse_error::PduParseErr;
use pri_core::SwitchType;

use super::IeContext;

pub mod trans_cap {
    pub const SPEECH: u8 = 0x00;
    pub const DIGITAL: u8 = 0x08;
    pub const RESTRICTED_DIGITAL: u8 = 0x09;
    pub const AUDIO_3_1K: u8 = 0x10;
    pub const DIGITAL_W_TONES: u8 = 0x11;
    pub const VIDEO: u8 = 0x18;
}

pub mod trans_mode {
    pub const CIRCUIT_64: u8 = 0x10;
    pub const CIRCUIT_2X64: u8 = 0x11;
    pub const CIRCUIT_384: u8 = 0x13;
    pub const CIRCUIT_1536: u8 = 0x15;
    pub const CIRCUIT_1920: u8 = 0x17;
    pub const MULTIRATE: u8 = 0x18;
    pub const PACKET: u8 = 0x40;
}

pub mod layer1 {
    pub const ITU_RATE_ADAPT: u8 = 0x21;
    pub const ULAW: u8 = 0x22;
    pub const ALAW: u8 = 0x23;
    pub const G721: u8 = 0x24;
    pub const G722_G725: u8 = 0x25;
    pub const H223_H245: u8 = 0x26;
    pub const NON_ITU_ADAPT: u8 = 0x27;
    pub const V120_RATE_ADAPT: u8 = 0x28;
    pub const X31_RATE_ADAPT: u8 = 0x29;
}

pub const LAYER_2_LAPB: u8 = 0x46;
pub const LAYER_3_X25: u8 = 0x66;

/// Bearer capability, Q.931 4.5.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCap {
    pub transcapability: u8,
    pub transmoderate: u8,
    /// Rate multiplier, only with multirate
    pub transmultiple: u8,
    /// User information layer 1, with bits 6 and 7 kept as received
    pub userl1: Option<u8>,
    pub userl2: Option<u8>,
    pub userl3: Option<u8>,
    pub rateadaption: u8,
}

impl Default for BearerCap {
    fn default() -> Self {
        Self {
            transcapability: trans_cap::SPEECH,
            transmoderate: trans_mode::CIRCUIT_64,
            transmultiple: 0,
            userl1: None,
            userl2: None,
            userl3: None,
            rateadaption: 0,
        }
    }
}

impl BearerCap {
    pub fn decode(&mut self, data: &[u8]) -> Result<(), PduParseErr> {
        if data.len() < 2 {
            return Err(PduParseErr::BufferEnded { field: Some("bearer_capability") });
        }
        if data[0] & 0x60 != 0 {
            return Err(PduParseErr::InvalidValue { field: "coding_standard", value: ((data[0] & 0x60) >> 5) as u64 });
        }
        self.transcapability = data[0] & 0x1f;
        self.transmoderate = data[1] & 0x7f;

        let mut pos = 2;
        if self.transmoderate == trans_mode::MULTIRATE {
            let Some(&m) = data.get(pos) else {
                return Err(PduParseErr::BufferEnded { field: Some("rate_multiplier") });
            };
            self.transmultiple = m & 0x7f;
            pos += 1;
        }

        // Octet 5, bits 6-7 = 01
        if pos < data.len() && data[pos] & 0x60 == 0x20 {
            self.userl1 = Some(data[pos] & 0x7f);
            pos += 1;
            // 5a
            if pos < data.len() && data[pos - 1] & 0x80 == 0 {
                self.rateadaption = data[pos] & 0x7f;
                pos += 1;
            }
            // 5b to 5d are skipped
            while pos < data.len() && data[pos - 1] & 0x80 == 0 {
                pos += 1;
            }
        }

        // Octet 6, bits 6-7 = 10
        if pos < data.len() && data[pos] & 0x60 == 0x40 {
            self.userl2 = Some(data[pos] & 0x1f);
            pos += 1;
        }

        // Octet 7, bits 6-7 = 11
        if pos < data.len() && data[pos] & 0x60 == 0x60 {
            self.userl3 = Some(data[pos] & 0x1f);
        }
        Ok(())
    }

    pub fn encode(&self, ctx: &IeContext, justsignalling: bool) -> Vec<u8> {
        // Fixed on GR-303
        if ctx.gr303_sub {
            return vec![0x88, 0x90];
        }
        if justsignalling {
            return vec![0xa8, 0x80];
        }

        let tc = self.transcapability;
        let mut out = vec![0x80 | tc, 0x80 | self.transmoderate];
        if self.transmoderate == trans_mode::MULTIRATE {
            out.push(0x80 | self.transmultiple);
        }

        if tc & trans_cap::DIGITAL != 0
            && ctx.switch == SwitchType::EuroIsdnE1
            && self.transmoderate == trans_mode::PACKET
        {
            return out;
        }

        if self.transmoderate != trans_mode::PACKET {
            // 4ESS takes nothing beyond octet 4
            if ctx.switch != SwitchType::Att4ess {
                if let Some(l1) = self.userl1 {
                    out.push(0x80 | l1);
                    if l1 == layer1::ITU_RATE_ADAPT {
                        out.push(0x80 | self.rateadaption);
                    }
                    return out;
                }
            }
            out.push(0xa0 | self.userl1.map_or(0x1f, |l| l & 0x1f));
            if self.userl1 == Some(layer1::ITU_RATE_ADAPT) {
                if let Some(last) = out.last_mut() {
                    *last &= !0x80;
                }
                out.push(0x80 | self.rateadaption);
            }
        }

        if let Some(l2) = self.userl2 {
            out.push(0xc0 | (l2 & 0x1f));
        }
        if let Some(l3) = self.userl3 {
            out.push(0xe0 | (l3 & 0x1f));
        }
        out
    }

    /// Circuit mode 64 kbit/s, the only bearer calls are accepted for
    pub fn is_64k_circuit(&self) -> bool {
        self.transmoderate == trans_mode::CIRCUIT_64
    }
}

pub fn cap_name(cap: u8) -> &'static str {
    match cap {
        trans_cap::SPEECH => "Speech",
        trans_cap::DIGITAL => "Unrestricted digital information",
        trans_cap::RESTRICTED_DIGITAL => "Restricted digital information",
        trans_cap::AUDIO_3_1K => "3.1kHz audio",
        trans_cap::DIGITAL_W_TONES => "Unrestricted digital information with tones/announcements",
        trans_cap::VIDEO => "Video",
        _ => "Unknown",
    }
}

pub fn mode_name(mode: u8) -> &'static str {
    match mode {
        trans_mode::CIRCUIT_64 => "64kbps, circuit-mode",
        trans_mode::CIRCUIT_2X64 => "2x64kbps, circuit-mode",
        trans_mode::CIRCUIT_384 => "384kbps, circuit-mode",
        trans_mode::CIRCUIT_1536 => "1536kbps, circuit-mode",
        trans_mode::CIRCUIT_1920 => "1920kbps, circuit-mode",
        trans_mode::MULTIRATE => "Multirate (Nx64kbps)",
        trans_mode::PACKET => "Packet Mode",
        _ => "Unknown",
    }
}

pub fn layer1_name(proto: u8) -> &'static str {
    match proto {
        layer1::ITU_RATE_ADAPT => "V.110 Rate Adaption",
        layer1::ULAW => "u-Law",
        layer1::ALAW => "A-Law",
        layer1::G721 => "G.721 ADPCM",
        layer1::G722_G725 => "G.722/G.725 7kHz Audio",
        layer1::H223_H245 => "H.223/H.245 Multimedia",
        layer1::NON_ITU_ADAPT => "Non-ITU Rate Adaption",
        layer1::V120_RATE_ADAPT => "V.120 Rate Adaption",
        layer1::X31_RATE_ADAPT => "X.31 Rate Adaption",
        _ => "Unknown",
    }
}

pub(crate) fn dump(data: &[u8], prefix: char) -> Vec<String> {
    let mut lines = Vec::new();
    if data.len() < 2 {
        lines.push(format!("{} Bearer Capability (len={:2}) [ truncated ]", prefix, data.len() + 2));
        return lines;
    }
    lines.push(format!(
        "{} Bearer Capability (len={:2}) [ Ext: {}  Q.931 Std: {}  Info transfer capability: {} ({})",
        prefix,
        data.len() + 2,
        data[0] >> 7,
        (data[0] & 0x60) >> 5,
        cap_name(data[0] & 0x1f),
        data[0] & 0x1f
    ));
    lines.push(format!(
        "{}                              Ext: {}  Trans mode/rate: {} ({})",
        prefix,
        data[1] >> 7,
        mode_name(data[1] & 0x7f),
        data[1] & 0x7f
    ));
    let mut pos = 2;
    if data[1] & 0x7f == trans_mode::MULTIRATE {
        if let Some(&m) = data.get(2) {
            lines.push(format!("{}                              Ext: {}  Transfer rate multiplier: {} x 64", prefix, m >> 7, m & 0x7f));
        }
        pos += 1;
    }
    if pos < data.len() && data[pos] & 0x60 == 0x20 {
        let l1 = data[pos] & 0x7f;
        lines.push(format!("{}                                User information layer 1: {} ({})", prefix, layer1_name(l1), l1));
        pos += 1;
        while pos < data.len() && data[pos - 1] & 0x80 == 0 {
            pos += 1;
        }
    }
    if pos < data.len() && data[pos] & 0x60 == 0x40 {
        let l2 = data[pos] & 0x1f;
        let name = if l2 == LAYER_2_LAPB & 0x1f { "LAPB" } else { "Unknown" };
        lines.push(format!("{}                                User information layer 2: {} ({})", prefix, name, l2));
        pos += 1;
    }
    if pos < data.len() && data[pos] & 0x60 == 0x60 {
        let l3 = data[pos] & 0x1f;
        let name = if l3 == LAYER_3_X25 & 0x1f { "X.25" } else { "Unknown" };
        lines.push(format!("{}                                User information layer 3: {} ({})", prefix, name, l3));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_core::NodeType;

    #[test]
    fn speech_ulaw_round_trip() {
        let ctx = IeContext::new(SwitchType::Ni2, NodeType::Cpe);
        let bc = BearerCap { userl1: Some(layer1::ULAW), ..Default::default() };
        let data = bc.encode(&ctx, false);
        assert_eq!(data, vec![0x80, 0x90, 0xa2]);

        let mut rx = BearerCap::default();
        rx.decode(&data).unwrap();
        assert_eq!(rx.transcapability, trans_cap::SPEECH);
        assert!(rx.is_64k_circuit());
        assert_eq!(rx.userl1, Some(layer1::ULAW));
    }

    #[test]
    fn att4ess_layer1_uses_short_form() {
        let ctx = IeContext::new(SwitchType::Att4ess, NodeType::Cpe);
        let bc = BearerCap { transcapability: trans_cap::AUDIO_3_1K, userl1: Some(layer1::ULAW), ..Default::default() };
        assert_eq!(bc.encode(&ctx, false), vec![0x90, 0x90, 0xa2]);
    }

    #[test]
    fn gr303_and_signalling_only_are_fixed() {
        let mut ctx = IeContext::new(SwitchType::Gr303TmcSwitching, NodeType::Cpe);
        ctx.gr303_sub = true;
        assert_eq!(BearerCap::default().encode(&ctx, false), vec![0x88, 0x90]);
        let ctx = IeContext::new(SwitchType::Ni2, NodeType::Cpe);
        assert_eq!(BearerCap::default().encode(&ctx, true), vec![0xa8, 0x80]);
    }

    #[test]
    fn multirate_and_layer2() {
        let mut rx = BearerCap::default();
        rx.decode(&[0x88, 0x98, 0x86, 0xc6]).unwrap();
        assert_eq!(rx.transmoderate, trans_mode::MULTIRATE);
        assert_eq!(rx.transmultiple, 6);
        assert_eq!(rx.userl2, Some(LAYER_2_LAPB & 0x1f));
        assert!(!rx.is_64k_circuit());
    }

    #[test]
    fn non_itu_coding_is_rejected() {
        let mut rx = BearerCap::default();
        assert!(rx.decode(&[0xa0, 0x90]).is_err());
        assert!(rx.decode(&[0x80]).is_err());
    }
}
