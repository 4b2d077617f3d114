//! Q.931 information elements
//!
//! Every element the stack understands is a variant of `IeKind`. Decoding and encoding
//! go through `receive_ie` / `transmit_ie`, which move data between the wire form and
//! the call's `CallInfo`. Per-message state the codecs need (switch variant, side,
//! message type being built) travels in an `IeContext`.

pub mod bearer;
pub mod cause;
pub mod channel_id;
pub mod facility;
pub mod misc;
pub mod numbers;
pub mod progress;

use pri_core::pdu_parse_error::PduParseErr;
use pri_core::{NodeType, SwitchType};

use crate::q931::enums::ie_kind::{IeKind, LOCKING_SHIFT, NON_LOCKING_SHIFT, ie_name};

pub use bearer::BearerCap;
pub use cause::CauseInfo;
pub use channel_id::{ChanFlags, ChannelIdent};
pub use facility::ApduEvent;
pub use progress::ProgressInfo;

/// Settings of the sending or receiving instance that influence element coding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IeContext {
    pub switch: SwitchType,
    pub node: NodeType,
    pub bri: bool,
    /// Signalling on a GR-303 subchannel (subchannel of a primary rate instance)
    pub gr303_sub: bool,
    /// Message type being built or parsed
    pub msg_type: u8,
    pub overlapdial: bool,
    pub nsf: Option<u8>,
    /// Our call state, reported in the Call State element
    pub our_state: u8,
}

impl IeContext {
    pub fn new(switch: SwitchType, node: NodeType) -> Self {
        Self {
            switch,
            node,
            bri: false,
            gr303_sub: false,
            msg_type: 0,
            overlapdial: false,
            nsf: None,
            our_state: 0,
        }
    }
}

/// An element as found in a message, content not yet interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIe {
    /// Codeset in effect for this element
    pub codeset: u8,
    /// Identifier octet. For single octet elements the whole octet.
    pub id: u8,
    /// Content after the length octet, empty for single octet elements
    pub data: Vec<u8>,
}

impl RawIe {
    pub fn full_id(&self) -> u16 {
        crate::q931::enums::ie_kind::full_ie(self.codeset, self.id)
    }

    pub fn kind(&self) -> Option<IeKind> {
        // Single octet elements carry their value in the low nibble, except 0xa_
        let id = if self.id & 0x80 != 0 && self.id & 0xf0 != 0xa0 { self.id & 0xf0 } else { self.id };
        IeKind::lookup(self.codeset, id)
    }
}

/// Call data carried in information elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallInfo {
    pub channel: ChannelIdent,
    pub bearer: BearerCap,
    /// Restart class
    pub ri: u8,
    pub progress: ProgressInfo,
    pub cause: CauseInfo,
    pub notify: Option<u8>,
    /// Call state reported by the peer in STATUS
    pub sugcallstate: Option<u8>,

    pub callerplan: u8,
    pub callerpres: u8,
    pub callernum: String,
    pub callerplanani: u8,
    pub callerani: String,
    pub callername: String,
    pub callingsubaddr: String,

    pub calledplan: u8,
    pub callednum: String,

    pub redirectingplan: u8,
    pub redirectingpres: u8,
    pub redirectingreason: u8,
    pub redirectingnum: String,
    pub redirectingname: String,

    pub origcalledplan: Option<u8>,
    pub origcalledpres: Option<u8>,
    pub origredirectingreason: Option<u8>,
    pub origcallednum: String,
    pub origcalledname: String,

    pub useruserprotocoldisc: u8,
    pub useruserinfo: String,
    pub keypad_digits: String,
    /// ANI II digits from line information or generic digits, 0 if absent
    pub ani2: i32,
    /// Sending complete seen or requested
    pub complete: bool,
    /// Far end is not ISDN
    pub nonisdn: bool,

    /// Pending Facility APDUs
    pub apdus: Vec<ApduEvent>,
}

/// Whether `receive_ie` interprets the element. Facility elements are handled by ROSE.
pub fn can_receive(kind: IeKind) -> bool {
    matches!(
        kind,
        IeKind::BearerCapability
            | IeKind::Cause
            | IeKind::CallState
            | IeKind::ChannelIdent
            | IeKind::ProgressIndicator
            | IeKind::NetworkSpecFac
            | IeKind::NotifyInd
            | IeKind::Display
            | IeKind::KeypadFacility
            | IeKind::CallingPartyNumber
            | IeKind::CallingPartySubaddr
            | IeKind::CalledPartyNumber
            | IeKind::OriginalCalledNumber
            | IeKind::RedirectingNumber
            | IeKind::RestartIndicator
            | IeKind::UserUser
            | IeKind::SendingComplete
            | IeKind::OriginatingLineInfo
            | IeKind::GenericDigits
            | IeKind::Facility
            | IeKind::FacilityCs6
    )
}

/// Decodes one element into the call
pub fn receive_ie(kind: IeKind, data: &[u8], ctx: &IeContext, call: &mut CallInfo) -> Result<(), PduParseErr> {
    match kind {
        IeKind::BearerCapability => call.bearer.decode(data),
        IeKind::ChannelIdent => call.channel.decode(data, ctx),
        IeKind::Cause => call.cause.decode(data),
        IeKind::CallState => misc::receive_call_state(call, data),
        IeKind::ProgressIndicator => call.progress.decode(data),
        IeKind::NetworkSpecFac => Ok(()),
        IeKind::NotifyInd => misc::receive_notify(call, data),
        IeKind::Display => misc::receive_display(call, data),
        IeKind::KeypadFacility => misc::receive_keypad(call, data),
        IeKind::CallingPartyNumber => numbers::receive_calling(call, data),
        IeKind::CallingPartySubaddr => numbers::receive_calling_subaddr(call, data),
        IeKind::CalledPartyNumber => numbers::receive_called(call, data),
        IeKind::RedirectingNumber | IeKind::OriginalCalledNumber => numbers::receive_redirecting(call, data),
        IeKind::RestartIndicator => misc::receive_restart(call, data),
        IeKind::UserUser => misc::receive_user_user(call, data),
        IeKind::SendingComplete => {
            call.complete = true;
            Ok(())
        }
        IeKind::OriginatingLineInfo => misc::receive_line_info(call, data),
        IeKind::GenericDigits => misc::receive_generic_digits(call, data),
        // Decoded by the ROSE layer
        IeKind::Facility | IeKind::FacilityCs6 => Ok(()),
        _ => Err(PduParseErr::NotImplemented { field: Some(kind.name()) }),
    }
}

/// Encodes instance `order` (1-based) of an element, returning the content after the
/// length octet. `None` means nothing (more) to send. Single octet elements return
/// an empty content.
pub fn transmit_ie(
    kind: IeKind,
    ctx: &IeContext,
    call: &mut CallInfo,
    order: usize,
) -> Result<Option<Vec<u8>>, PduParseErr> {
    let single_only = order > 1;
    let out = match kind {
        IeKind::BearerCapability if single_only => None,
        IeKind::BearerCapability => Some(call.bearer.encode(ctx, call.channel.justsignalling)),
        IeKind::ChannelIdent if single_only => None,
        IeKind::ChannelIdent => call.channel.encode(ctx)?,
        IeKind::Cause if single_only => None,
        IeKind::Cause => call.cause.encode(),
        IeKind::CallState => Some(vec![ctx.our_state]),
        IeKind::ProgressIndicator => {
            // Never sent on GR-303 subchannels
            if ctx.gr303_sub { None } else { call.progress.encode_next() }
        }
        IeKind::NetworkSpecFac if single_only => None,
        IeKind::NetworkSpecFac => misc::transmit_nsf(ctx),
        IeKind::NotifyInd => misc::transmit_notify(call),
        IeKind::Display => misc::transmit_display(call, ctx),
        IeKind::KeypadFacility => misc::transmit_keypad(call),
        IeKind::CallingPartyNumber => Some(numbers::transmit_calling(call)),
        IeKind::CalledPartyNumber => Some(numbers::transmit_called(call)),
        IeKind::RedirectingNumber | IeKind::OriginalCalledNumber if single_only => None,
        IeKind::RedirectingNumber | IeKind::OriginalCalledNumber => numbers::transmit_redirecting(call),
        IeKind::RestartIndicator => Some(misc::transmit_restart(call)?),
        IeKind::UserUser => misc::transmit_user_user(call, ctx),
        IeKind::SendingComplete => misc::transmit_sending_complete(call, ctx).then(Vec::new),
        IeKind::Facility | IeKind::FacilityCs6 => facility::transmit(&mut call.apdus, ctx.msg_type),
        IeKind::OriginatingLineInfo | IeKind::GenericDigits => None,
        _ => return Err(PduParseErr::NotImplemented { field: Some(kind.name()) }),
    };
    Ok(out)
}

/// Human readable lines for one element. `data` is the content after the length octet.
pub fn dump_ie(codeset: u8, id: u8, data: &[u8], prefix: char) -> Vec<String> {
    if id & 0xf0 == LOCKING_SHIFT {
        return misc::dump_shift(id, prefix);
    }
    if id == IeKind::SendingComplete.id() {
        return misc::dump_sending_complete(prefix);
    }
    let raw = RawIe { codeset, id, data: Vec::new() };
    let Some(kind) = raw.kind() else {
        return vec![format!("{} IE: {} (len = {})", prefix, ie_name(raw.full_id()), data.len() + 2)];
    };
    match kind {
        IeKind::BearerCapability => bearer::dump(data, prefix),
        IeKind::Cause => cause::dump(data, prefix),
        IeKind::CallIdentity => misc::dump_call_identity(data, prefix),
        IeKind::CallState => misc::dump_call_state(data, prefix),
        IeKind::ChannelIdent => channel_id::dump(data, prefix),
        IeKind::Facility | IeKind::FacilityCs6 => facility::dump(data, codeset, prefix),
        IeKind::ProgressIndicator => progress::dump(data, prefix),
        IeKind::NetworkSpecFac => misc::dump_nsf(data, prefix),
        IeKind::NotifyInd => misc::dump_notify(data, prefix),
        IeKind::Display => misc::dump_display(data, prefix),
        IeKind::TimeDate => misc::dump_time_date(data, prefix),
        IeKind::KeypadFacility => misc::dump_keypad(data, prefix),
        IeKind::Signal => misc::dump_signal(data, prefix),
        IeKind::ConnectedNum => numbers::dump_redirecting("Connected Number", data, prefix),
        IeKind::CallingPartyNumber => numbers::dump_calling(data, prefix),
        IeKind::CallingPartySubaddr => numbers::dump_subaddr("Calling Sub-Address", data, prefix),
        IeKind::CalledPartyNumber => numbers::dump_called(data, prefix),
        IeKind::CalledPartySubaddr => numbers::dump_subaddr("Called Sub-Address", data, prefix),
        IeKind::OriginalCalledNumber => numbers::dump_redirecting("Original Called Number", data, prefix),
        IeKind::RedirectingNumber => numbers::dump_redirecting("Redirecting Number", data, prefix),
        IeKind::RedirectingSubaddr => numbers::dump_subaddr("Redirecting Sub-Address", data, prefix),
        IeKind::RestartIndicator => misc::dump_restart(data, prefix),
        IeKind::UserUser => misc::dump_user_user(data, prefix),
        IeKind::TransitCount => misc::dump_transit_count(data, prefix),
        IeKind::OriginatingLineInfo => misc::dump_line_info(data, prefix),
        IeKind::GenericDigits => misc::dump_generic_digits(data, prefix),
        _ => vec![format!("{} IE: {} (len = {})", prefix, kind.name(), data.len() + 2)],
    }
}

/// Shift octet announcing `codeset`: non-locking for codeset 0, locking otherwise
pub fn shift_octet(codeset: u8) -> u8 {
    if codeset == 0 { NON_LOCKING_SHIFT } else { LOCKING_SHIFT | codeset }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_octet_kinds_ignore_value_nibble() {
        let shift = RawIe { codeset: 0, id: 0x96, data: Vec::new() };
        assert_eq!(shift.kind(), Some(IeKind::LockingShift));
        let complete = RawIe { codeset: 0, id: 0xa1, data: Vec::new() };
        assert_eq!(complete.kind(), Some(IeKind::SendingComplete));
        let gd = RawIe { codeset: 6, id: 0x37, data: vec![0x04] };
        assert_eq!(gd.kind(), Some(IeKind::GenericDigits));
    }

    #[test]
    fn unlimited_elements_stop_after_first() {
        let ctx = IeContext::new(SwitchType::Ni2, NodeType::Cpe);
        let mut call = CallInfo { cause: CauseInfo::new(16), ..Default::default() };
        assert_eq!(transmit_ie(IeKind::Cause, &ctx, &mut call, 1).unwrap(), Some(vec![0x81, 0x90]));
        assert_eq!(transmit_ie(IeKind::Cause, &ctx, &mut call, 2).unwrap(), None);
        assert_eq!(transmit_ie(IeKind::CallState, &ctx, &mut call, 1).unwrap(), Some(vec![0]));
        assert!(transmit_ie(IeKind::Signal, &ctx, &mut call, 1).is_err());
    }

    #[test]
    fn sending_complete_is_empty_content() {
        let ctx = IeContext::new(SwitchType::EuroIsdnE1, NodeType::Cpe);
        let mut call = CallInfo::default();
        assert_eq!(transmit_ie(IeKind::SendingComplete, &ctx, &mut call, 1).unwrap(), Some(Vec::new()));
        receive_ie(IeKind::SendingComplete, &[], &ctx, &mut call).unwrap();
        assert!(call.complete);
    }

    #[test]
    fn shift_octets() {
        assert_eq!(shift_octet(0), 0x98);
        assert_eq!(shift_octet(6), 0x96);
    }
}
