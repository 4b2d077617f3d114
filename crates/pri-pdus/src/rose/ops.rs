//! Q.932 supplementary service operations: decoding of ROSE service components and
//! encoders for the APDUs the stack originates.

use pri_core::SwitchType;
use pri_core::pdu_parse_error::PduParseErr;

use super::ber::{BerBuilder, BerComponent, asn1};
use super::component::{comp_type, profile};
use super::party::{
    self, MAX_NAME_LEN, MAX_PARTY_DIGITS, PresentedNumber, decode_name, decode_presented_number_screened,
    decode_presented_number_unscreened, decode_tagged_name, encode_presented_number_unscreened, is_name_tag,
};
use crate::q931::ie::CallInfo;

/// Local operation values
pub mod op {
    pub const CALLING_NAME: i64 = 0;
    pub const PATH_REPLACEMENT: i64 = 4;
    pub const CALL_TRANSFER_IDENTIFY: i64 = 7;
    pub const CALL_TRANSFER_ABANDON: i64 = 8;
    pub const CALL_TRANSFER_INITIATE: i64 = 9;
    pub const CALL_TRANSFER_SETUP: i64 = 10;
    pub const CALL_TRANSFER_ACTIVE: i64 = 11;
    pub const CALL_TRANSFER_COMPLETE: i64 = 12;
    pub const CALL_TRANSFER_UPDATE: i64 = 13;
    pub const SUBADDRESS_TRANSFER: i64 = 14;
    pub const DIVERTING_LEG_INFORMATION1: i64 = 18;
    pub const DIVERTING_LEG_INFORMATION3: i64 = 19;
    pub const DIVERTING_LEG_INFORMATION2: i64 = 0x15;
    pub const AOC_NO_CHARGING_INFO_AVAILABLE: i64 = 26;
    pub const AOC_CHARGING_REQUEST: i64 = 30;
    pub const AOC_AOCS_CURRENCY: i64 = 31;
    pub const AOC_AOCS_SPECIAL_ARR: i64 = 32;
    pub const AOC_AOCD_CURRENCY: i64 = 33;
    pub const AOC_AOCD_CHARGING_UNIT: i64 = 34;
    pub const AOC_AOCE_CURRENCY: i64 = 35;
    pub const AOC_AOCE_CHARGING_UNIT: i64 = 36;
    pub const AOC_IDENTIFICATION_OF_CHARGE: i64 = 37;
    pub const MWI_ACTIVATE: i64 = 80;
    pub const MWI_DEACTIVATE: i64 = 81;
}

/// Global operation values (object identifier contents)
pub mod oid {
    pub const INFORMATION_FOLLOWING: [u8; 7] = [0x2a, 0x86, 0x48, 0xce, 0x15, 0x00, 0x04];
    pub const EXPLICIT_ECT_EXECUTE: [u8; 7] = [0x2a, 0x86, 0x48, 0xce, 0x15, 0x00, 0x08];
}

/// DMS-100 Release Link Trunk
pub mod rlt {
    pub const SERVICE_ID: u8 = 0x3e;
    pub const OPERATION_IND: i64 = 1;
    pub const THIRD_PARTY: i64 = 2;
}

pub fn op_name(op: i64) -> &'static str {
    match op {
        op::CALLING_NAME => "CallingName",
        op::PATH_REPLACEMENT => "PathReplacement",
        op::CALL_TRANSFER_IDENTIFY => "CallTransferIdentify",
        op::CALL_TRANSFER_ABANDON => "CallTransferAbandon",
        op::CALL_TRANSFER_INITIATE => "CallTransferInitiate",
        op::CALL_TRANSFER_SETUP => "CallTransferSetup",
        op::CALL_TRANSFER_ACTIVE => "CallTransferActive",
        op::CALL_TRANSFER_COMPLETE => "CallTransferComplete",
        op::CALL_TRANSFER_UPDATE => "CallTransferUpdate",
        op::SUBADDRESS_TRANSFER => "SubaddressTransfer",
        op::DIVERTING_LEG_INFORMATION1 => "DivertingLegInformation1",
        op::DIVERTING_LEG_INFORMATION2 => "DivertingLegInformation2",
        op::DIVERTING_LEG_INFORMATION3 => "DivertingLegInformation3",
        op::AOC_NO_CHARGING_INFO_AVAILABLE => "AOC No Charging Info Available",
        op::AOC_CHARGING_REQUEST => "AOC Charging Request",
        op::AOC_AOCS_CURRENCY => "AOC-S Currency",
        op::AOC_AOCS_SPECIAL_ARR => "AOC-S Special Arrangement",
        op::AOC_AOCD_CURRENCY => "AOC-D Currency",
        op::AOC_AOCD_CHARGING_UNIT => "AOC-D Charging Unit",
        op::AOC_AOCE_CURRENCY => "AOC-E Currency",
        op::AOC_AOCE_CHARGING_UNIT => "AOC-E Charging Unit",
        op::AOC_IDENTIFICATION_OF_CHARGE => "AOC Identification Of Charge",
        op::MWI_ACTIVATE => "MWIActivate",
        op::MWI_DEACTIVATE => "MWIDeactivate",
        _ => "Unknown",
    }
}

pub fn rlt_operation_name(id: i64) -> &'static str {
    match id {
        rlt::OPERATION_IND => "RLT_OPERATION_IND",
        rlt::THIRD_PARTY => "RLT_THIRD_PARTY",
        _ => "Unknown",
    }
}

pub fn rlt_error_name(err: i64) -> &'static str {
    match err {
        0x10 => "RLT Bridge Fail",
        0x11 => "RLT Call ID Not Found",
        0x12 => "RLT Not Allowed",
        0x13 => "RLT Switch Equip Congs",
        _ => "Unknown",
    }
}

pub fn reject_problem_tag_name(tag: u8) -> &'static str {
    match tag {
        0x80 => "General problem",
        0x81 => "Invoke problem",
        0x82 => "Return result problem",
        0x83 => "Return error problem",
        _ => "Unknown",
    }
}

pub fn reject_problem_name(problem: u8) -> &'static str {
    match problem {
        0x00 => "Unrecognized component",
        0x01 => "Mistyped component",
        0x02 => "Badly structured component",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpCode {
    Local(i64),
    Global(Vec<u8>),
}

impl OpCode {
    fn decode(comp: &BerComponent) -> Result<Self, PduParseErr> {
        if comp.tag == asn1::OBJECTIDENTIFIER {
            Ok(OpCode::Global(comp.data.to_vec()))
        } else {
            Ok(OpCode::Local(comp.as_int()?))
        }
    }
}

impl core::fmt::Display for OpCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OpCode::Local(v) => write!(f, "{} ({})", op_name(*v), v),
            OpCode::Global(oid) => {
                write!(f, "OID")?;
                for b in oid {
                    write!(f, " {:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// DivertingLegInformation2 argument, values already mapped to Q.931
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivertingLegInfo2 {
    pub counter: i64,
    /// Q.931 redirecting reason
    pub reason: u8,
    pub orig_reason: Option<u8>,
    pub diverting: Option<PresentedNumber>,
    pub original_called: Option<PresentedNumber>,
    pub redirecting_name: String,
    pub orig_called_name: String,
}

impl DivertingLegInfo2 {
    fn decode(switch: SwitchType, arg: &BerComponent) -> Result<Self, PduParseErr> {
        arg.expect_tag(asn1::SEQUENCE_OF)?;
        let mut r = arg.reader();
        let counter = r.expect(asn1::INTEGER, "diversion_counter")?.as_int()?;
        let reason = r.expect(asn1::ENUMERATED, "diversion_reason")?.as_int()?;
        let mut out = DivertingLegInfo2 {
            counter,
            reason: party::redirecting_reason_for_q931(switch, reason),
            ..Default::default()
        };

        while let Some(comp) = r.next_component()? {
            match comp.tag {
                t if t == asn1::ctx(0) => {
                    let orig = comp.data.first().copied().unwrap_or(0);
                    out.orig_reason = Some(party::redirecting_reason_for_q931(switch, orig as i64));
                }
                t if t == asn1::ctx_cons(1) => {
                    let inner = comp.reader().expect_component("diverting_nr")?;
                    out.diverting = Some(decode_presented_number_unscreened(&inner)?);
                }
                t if t == asn1::ctx_cons(2) => {
                    let inner = comp.reader().expect_component("original_called_nr")?;
                    out.original_called = Some(decode_presented_number_unscreened(&inner)?);
                }
                t if t == asn1::ctx_cons(3) => out.redirecting_name = decode_tagged_name(&comp)?,
                t if t == asn1::ctx_cons(4) => out.orig_called_name = decode_tagged_name(&comp)?,
                t if t == asn1::ctx_cons(5) => {
                    tracing::debug!("ignoring DivertingLegInformation2 component 0x{:02X}", comp.tag);
                }
                _ => {
                    tracing::warn!("invalid DivertingLegInformation2 component received 0x{:02X}", comp.tag);
                    return Err(PduParseErr::InvalidValue { field: "diverting_leg_info2", value: comp.tag as u64 });
                }
            }
        }
        Ok(out)
    }

    /// Stores the diversion into the call
    pub fn apply(&self, call: &mut CallInfo) {
        if let Some(nr) = &self.diverting {
            call.redirectingplan = nr.plan();
            call.redirectingpres = nr.pres;
            call.redirectingreason = self.reason;
            call.redirectingnum = nr.number.clone();
        }
        if let Some(nr) = &self.original_called {
            call.origcalledplan = Some(nr.plan());
            call.origcalledpres = Some(nr.pres);
            call.origcallednum = nr.number.clone();
        }
        if let Some(r) = self.orig_reason {
            call.origredirectingreason = Some(r);
        }
        call.redirectingname = self.redirecting_name.clone();
        call.origcalledname = self.orig_called_name.clone();
    }
}

/// CallTransferComplete / CallTransferUpdate argument
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallTransferInfo {
    pub end_designation: Option<i64>,
    pub redirection: PresentedNumber,
    pub name: Option<String>,
    pub call_status: Option<i64>,
}

impl CallTransferInfo {
    fn decode(arg: &BerComponent, complete: bool) -> Result<Self, PduParseErr> {
        arg.expect_tag(asn1::SEQUENCE_OF)?;
        let mut r = arg.reader();
        let mut out = CallTransferInfo::default();
        if complete {
            out.end_designation = Some(r.expect(asn1::ENUMERATED, "end_designation")?.as_int()?);
        }
        let nr = r.expect_component("redirection_number")?;
        out.redirection = decode_presented_number_screened(&nr)?;

        let mut next = r.next_component()?;
        if let Some(comp) = next.filter(|c| is_name_tag(c.tag)) {
            out.name = Some(decode_name(&comp)?);
            next = r.next_component()?;
        }
        if complete {
            if let Some(comp) = next.filter(|c| c.tag == asn1::ENUMERATED) {
                out.call_status = Some(comp.as_int()?);
                next = r.next_component()?;
            }
        }
        if next.is_some() {
            tracing::debug!("call transfer argument extension not handled");
        }
        Ok(out)
    }

    /// The transferred party becomes the caller
    pub fn apply(&self, call: &mut CallInfo) {
        call.callernum = self.redirection.number.chars().take(MAX_PARTY_DIGITS).collect();
        call.callername = self.name.clone().unwrap_or_default();
    }
}

/// AOCEChargingUnitInfo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AocECharging {
    /// Sum over all recorded units
    pub units: i64,
    pub free_of_charge: bool,
    pub billing_id: Option<i64>,
    pub charged_number: Option<PresentedNumber>,
    pub charge_id: Option<i64>,
}

impl AocECharging {
    fn decode(arg: &BerComponent) -> Result<Self, PduParseErr> {
        arg.expect_tag(asn1::SEQUENCE_OF)?;
        let mut r = arg.reader();
        let mut out = AocECharging::default();
        let info = r.expect_component("charging_info")?;
        match info.tag {
            asn1::SEQUENCE_OF => {
                let mut specific = info.reader();
                while let Some(comp) = specific.next_component()? {
                    match comp.tag {
                        t if t == asn1::ctx_cons(1) => out.units += Self::recorded_units_list(&comp)?,
                        t if t == asn1::ctx_cons(2) => {
                            let id = comp.reader().expect_component("billing_id")?;
                            out.billing_id = Some(id.as_int()?);
                        }
                        other => tracing::debug!("don't know how to handle 0x{:02X} in AOC-E specific charging units", other),
                    }
                }
            }
            t if t == asn1::ctx(1) => out.free_of_charge = true,
            other => {
                tracing::warn!("invalid AOC-E charging info 0x{:02X}", other);
                return Err(PduParseErr::InvalidValue { field: "aoce_charging_info", value: other as u64 });
            }
        }

        if let Some(assoc) = r.next_component()? {
            match assoc.tag {
                t if t == asn1::ctx_cons(0) => {
                    let inner = assoc.reader().expect_component("charged_number")?;
                    out.charged_number = Some(decode_presented_number_unscreened(&inner)?);
                }
                asn1::INTEGER => out.charge_id = Some(assoc.as_int()?),
                other => tracing::debug!("invalid AOC-E charging association 0x{:02X}", other),
            }
        }
        Ok(out)
    }

    fn recorded_units_list(list: &BerComponent) -> Result<i64, PduParseErr> {
        let mut units = 0;
        let mut r = list.reader();
        while let Some(recorded) = r.next_component()? {
            recorded.expect_tag(asn1::SEQUENCE_OF)?;
            let mut inner = recorded.reader();
            while let Some(comp) = inner.next_component()? {
                match comp.tag {
                    asn1::INTEGER => units += comp.as_int()?,
                    asn1::NULL => {}
                    other => tracing::debug!("don't know how to handle 0x{:02X} in AOC-E recorded units", other),
                }
            }
        }
        Ok(units)
    }
}

/// Invoke argument, by operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeArg {
    CallingName(String),
    DivertingLegInfo2(DivertingLegInfo2),
    CallTransferComplete(CallTransferInfo),
    CallTransferUpdate(CallTransferInfo),
    /// Charging case, None when out of range
    AocChargingRequest(Option<u8>),
    AocECharging(AocECharging),
    /// The whole Facility element is forwarded to the bridged call
    PathReplacement,
    Mwi { activate: bool, number: String, basic_service: Option<i64> },
    InformationFollowing,
    /// Known operation without handling
    NotHandled(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoke {
    pub invoke_id: i64,
    pub op: OpCode,
    pub arg: InvokeArg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnResult {
    pub invoke_id: i64,
    /// Operation value of the result sequence, if any
    pub op: Option<i64>,
    /// RLT call id carried in an RLT_OPERATION_IND result
    pub rlt_call_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnError {
    pub invoke_id: i64,
    pub error: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    /// None when the rejected component had no usable invoke id
    pub invoke_id: Option<i64>,
    pub problem_tag: u8,
    pub problem: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoseComponent {
    Invoke(Invoke),
    ReturnResult(ReturnResult),
    ReturnError(ReturnError),
    Reject(Reject),
}

/// Decodes one service component as split off by `parse_facility`
pub fn decode_component(switch: SwitchType, comp: &BerComponent) -> Result<RoseComponent, PduParseErr> {
    match comp.tag {
        comp_type::INVOKE => decode_invoke(switch, comp).map(RoseComponent::Invoke),
        comp_type::RETURN_RESULT => decode_return_result(comp).map(RoseComponent::ReturnResult),
        comp_type::RETURN_ERROR => decode_return_error(comp).map(RoseComponent::ReturnError),
        comp_type::REJECT => decode_reject(comp).map(RoseComponent::Reject),
        other => Err(PduParseErr::InvalidValue { field: "rose_component", value: other as u64 }),
    }
}

fn decode_invoke(switch: SwitchType, comp: &BerComponent) -> Result<Invoke, PduParseErr> {
    let mut r = comp.reader();
    let invoke_id = r.expect_component("invoke_id")?.as_int()?;
    let op = OpCode::decode(&r.expect_component("operation")?)?;
    let arg = r.next_component()?.ok_or(PduParseErr::FieldNotPresent { field: Some("invoke_argument") })?;
    tracing::trace!("handling operation {}", op);

    let arg = match &op {
        OpCode::Global(oid) if oid.as_slice() == oid::INFORMATION_FOLLOWING => InvokeArg::InformationFollowing,
        OpCode::Global(oid) if oid.as_slice() == oid::EXPLICIT_ECT_EXECUTE => InvokeArg::NotHandled("ExplicitEctExecute"),
        OpCode::Global(_) => return Err(PduParseErr::NotImplemented { field: Some("global_operation") }),
        OpCode::Local(code) => decode_local_arg(switch, *code, &arg)?,
    };
    Ok(Invoke { invoke_id, op, arg })
}

fn decode_local_arg(switch: SwitchType, code: i64, arg: &BerComponent) -> Result<InvokeArg, PduParseErr> {
    Ok(match code {
        op::CALLING_NAME => InvokeArg::CallingName(decode_name(arg)?),
        op::DIVERTING_LEG_INFORMATION2 => InvokeArg::DivertingLegInfo2(DivertingLegInfo2::decode(switch, arg)?),
        op::CALL_TRANSFER_COMPLETE => InvokeArg::CallTransferComplete(CallTransferInfo::decode(arg, true)?),
        op::CALL_TRANSFER_UPDATE => InvokeArg::CallTransferUpdate(CallTransferInfo::decode(arg, false)?),
        op::AOC_CHARGING_REQUEST => {
            arg.expect_tag(asn1::ENUMERATED)?;
            let case = arg.as_int()?;
            if (0..=2).contains(&case) {
                InvokeArg::AocChargingRequest(Some(case as u8))
            } else {
                tracing::debug!("unknown AOC charging case 0x{:02X}", case);
                InvokeArg::AocChargingRequest(None)
            }
        }
        op::AOC_AOCE_CHARGING_UNIT => InvokeArg::AocECharging(AocECharging::decode(arg)?),
        op::PATH_REPLACEMENT => InvokeArg::PathReplacement,
        op::MWI_ACTIVATE | op::MWI_DEACTIVATE => {
            arg.expect_tag(asn1::SEQUENCE_OF)?;
            let mut r = arg.reader();
            let number = r.expect(asn1::ctx(0), "served_user_nr")?.as_string(MAX_PARTY_DIGITS);
            let basic_service = match r.next_component()? {
                Some(c) if c.tag == asn1::ENUMERATED => Some(c.as_int()?),
                _ => None,
            };
            InvokeArg::Mwi { activate: code == op::MWI_ACTIVATE, number, basic_service }
        }
        op::CALL_TRANSFER_IDENTIFY
        | op::CALL_TRANSFER_ABANDON
        | op::CALL_TRANSFER_INITIATE
        | op::CALL_TRANSFER_SETUP
        | op::CALL_TRANSFER_ACTIVE
        | op::SUBADDRESS_TRANSFER
        | op::DIVERTING_LEG_INFORMATION1
        | op::DIVERTING_LEG_INFORMATION3
        | op::AOC_NO_CHARGING_INFO_AVAILABLE
        | op::AOC_AOCS_CURRENCY
        | op::AOC_AOCS_SPECIAL_ARR
        | op::AOC_AOCD_CURRENCY
        | op::AOC_AOCD_CHARGING_UNIT
        | op::AOC_AOCE_CURRENCY
        | op::AOC_IDENTIFICATION_OF_CHARGE => InvokeArg::NotHandled(op_name(code)),
        _ => return Err(PduParseErr::InvalidValue { field: "rose_operation", value: code as u64 }),
    })
}

fn decode_return_result(comp: &BerComponent) -> Result<ReturnResult, PduParseErr> {
    let mut r = comp.reader();
    let invoke_id = r.expect(asn1::INTEGER, "invoke_id")?.as_int()?;
    let mut out = ReturnResult { invoke_id, op: None, rlt_call_id: None };
    if let Some(seq) = r.next_component()? {
        seq.expect_tag(asn1::SEQUENCE_OF)?;
        let mut inner = seq.reader();
        let op = inner.expect(asn1::INTEGER, "result_operation")?.as_int()?;
        out.op = Some(op);
        if let Some(id) = inner.next_component()? {
            // Seen both as [0] and as an untagged zero tag
            if id.tag & asn1::TYPE_MASK != 0 {
                return Err(PduParseErr::InvalidValue { field: "rlt_call_id", value: id.tag as u64 });
            }
            out.rlt_call_id = Some((id.as_int()? & 0xff_ffff) as u32);
        }
    }
    Ok(out)
}

fn decode_return_error(comp: &BerComponent) -> Result<ReturnError, PduParseErr> {
    let mut r = comp.reader();
    let invoke_id = r.expect(asn1::INTEGER, "invoke_id")?.as_int()?;
    let error = r.expect(asn1::INTEGER, "error_value")?.as_int()?;
    Ok(ReturnError { invoke_id, error })
}

fn decode_reject(comp: &BerComponent) -> Result<Reject, PduParseErr> {
    let mut r = comp.reader();
    let id = r.expect_component("invoke_id")?;
    let invoke_id = match id.tag {
        asn1::INTEGER => Some(id.as_int()?),
        asn1::NULL => None,
        other => return Err(PduParseErr::InvalidValue { field: "invoke_id", value: other as u64 }),
    };
    let problem = r.expect_component("problem")?;
    let code = *problem.data.first().ok_or(PduParseErr::BufferEnded { field: Some("problem") })?;
    Ok(Reject { invoke_id, problem_tag: problem.tag, problem: code })
}

// Encoders

/// Network facility extension saying the APDU comes from and goes to the end PINX
fn add_qsig_nfe(b: &mut BerBuilder) -> Result<(), PduParseErr> {
    b.nested(comp_type::NFE, |b| {
        b.add_byte(asn1::ctx(0), 0);
        b.add_byte(asn1::ctx(2), 0);
        Ok(())
    })
}

/// Interpretation: discard unrecognized invokes
const INTERPRETATION_DISCARD: u8 = 0;
/// Interpretation: reject unrecognized invokes
const INTERPRETATION_REJECT: u8 = 2;

pub fn encode_dli2(switch: SwitchType, invoke_id: u8, call: &CallInfo) -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::EXTENSIONS)]);
    b.add_byte(comp_type::INTERPRETATION, INTERPRETATION_DISCARD);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, invoke_id);
        b.add_byte(asn1::INTEGER, op::DIVERTING_LEG_INFORMATION2 as u8);
        b.nested(asn1::SEQUENCE_OF, |b| {
            // Only one diversion is known to us
            b.add_byte(asn1::INTEGER, 1);
            b.add_byte(asn1::ENUMERATED, party::redirecting_reason_from_q931(switch, call.redirectingreason));
            // The original called number is not tracked separately, the diverting number is repeated
            for tag in [asn1::ctx_cons(1), asn1::ctx_cons(2)] {
                b.nested(tag, |b| {
                    encode_presented_number_unscreened(b, call.redirectingpres, call.redirectingplan, &call.redirectingnum)
                })?;
            }
            Ok(())
        })
    })?;
    Ok(b.finish())
}

pub fn encode_information_following(qsig: bool, invoke_id: u8) -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::EXTENSIONS)]);
    if qsig {
        add_qsig_nfe(&mut b)?;
    }
    b.add_byte(comp_type::INTERPRETATION, INTERPRETATION_DISCARD);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, invoke_id);
        b.add_string(asn1::OBJECTIDENTIFIER, &oid::INFORMATION_FOLLOWING, oid::INFORMATION_FOLLOWING.len())?;
        b.add_byte(asn1::ENUMERATED, 0);
        Ok(())
    })?;
    Ok(b.finish())
}

pub fn encode_calling_name(qsig: bool, invoke_id: u8, name: &str) -> Result<Vec<u8>, PduParseErr> {
    if name.is_empty() {
        return Err(PduParseErr::FieldNotPresent { field: Some("callername") });
    }
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::EXTENSIONS)]);
    if qsig {
        add_qsig_nfe(&mut b)?;
    }
    b.add_byte(comp_type::INTERPRETATION, INTERPRETATION_DISCARD);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, invoke_id);
        b.add_byte(asn1::INTEGER, op::CALLING_NAME as u8);
        b.add_string(asn1::ctx(0), name.as_bytes(), MAX_NAME_LEN)
    })?;
    Ok(b.finish())
}

/// RLT transfer capability, the invoke id equals the operation
pub fn encode_rlt_operation_ind() -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::ROSE, 0x80 | rlt::SERVICE_ID]);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, rlt::OPERATION_IND as u8);
        b.add_byte(asn1::INTEGER, rlt::OPERATION_IND as u8);
        Ok(())
    })?;
    Ok(b.finish())
}

pub fn encode_rlt_third_party(rlt_call_id: u32) -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::ROSE, 0x80 | rlt::SERVICE_ID]);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, rlt::THIRD_PARTY as u8);
        b.add_byte(asn1::INTEGER, rlt::THIRD_PARTY as u8);
        b.nested(asn1::SEQUENCE_OF, |b| {
            b.add_int(asn1::ctx(0), rlt_call_id & 0xff_ffff);
            // Reason for redirect, unused
            b.add_byte(asn1::ctx(1), 0);
            Ok(())
        })
    })?;
    Ok(b.finish())
}

pub fn encode_mwi(invoke_id: u8, activate: bool, called: &str) -> Result<Vec<u8>, PduParseErr> {
    if called.is_empty() {
        return Err(PduParseErr::FieldNotPresent { field: Some("called") });
    }
    let op = if activate { op::MWI_ACTIVATE } else { op::MWI_DEACTIVATE };
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::EXTENSIONS)]);
    add_qsig_nfe(&mut b)?;
    b.add_byte(comp_type::INTERPRETATION, INTERPRETATION_DISCARD);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, invoke_id);
        b.add_byte(asn1::INTEGER, op as u8);
        b.nested(asn1::SEQUENCE_OF, |b| {
            b.add_string(asn1::ctx(0), called.as_bytes(), MAX_PARTY_DIGITS)?;
            // Basic service: speech
            b.add_byte(asn1::ENUMERATED, 1);
            Ok(())
        })
    })?;
    Ok(b.finish())
}

/// Explicit ECT execute towards the call with reference `peer_cr`
pub fn encode_eect(invoke_id: u8, peer_cr: u16) -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::ROSE)]);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, invoke_id);
        b.add_string(asn1::OBJECTIDENTIFIER, &oid::EXPLICIT_ECT_EXECUTE, oid::EXPLICIT_ECT_EXECUTE.len())?;
        b.nested(asn1::SEQUENCE_OF, |b| {
            // Call reference as seen from the far end
            b.add_int(asn1::INTEGER, (peer_cr ^ 0x8000) as u32);
            Ok(())
        })
    })?;
    Ok(b.finish())
}

/// Path replacement propose. `end` is 0 for the primary and 1 for the secondary leg.
pub fn encode_anfpr(invoke_id: u8, end: u8, peer_cr: u16) -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::EXTENSIONS)]);
    add_qsig_nfe(&mut b)?;
    b.add_byte(comp_type::INTERPRETATION, INTERPRETATION_REJECT);
    b.nested(comp_type::INVOKE, |b| {
        b.add_byte(asn1::INTEGER, invoke_id);
        b.add_byte(asn1::INTEGER, op::CALL_TRANSFER_COMPLETE as u8);
        b.nested(asn1::SEQUENCE_OF, |b| {
            b.add_byte(asn1::ENUMERATED, end);
            b.add_null(asn1::ctx(1));
            b.add_byte(asn1::ENUMERATED, 1);
            b.add_int(asn1::INTEGER, peer_cr as u32);
            Ok(())
        })
    })?;
    Ok(b.finish())
}

pub fn encode_aoce_charging_unit(invoke_id: u16, units: i64) -> Result<Vec<u8>, PduParseErr> {
    let mut b = BerBuilder::new();
    b.raw(&[profile::octet(profile::ROSE)]);
    b.nested(comp_type::INVOKE, |b| {
        b.add_int(asn1::INTEGER, invoke_id as u32);
        b.add_byte(asn1::INTEGER, op::AOC_AOCE_CHARGING_UNIT as u8);
        b.nested(asn1::SEQUENCE_OF, |b| {
            if units > 0 {
                b.nested(asn1::SEQUENCE_OF, |b| {
                    b.nested(asn1::ctx_cons(1), |b| {
                        b.nested(asn1::SEQUENCE_OF, |b| {
                            b.add_int(asn1::INTEGER, units.min(u32::MAX as i64) as u32);
                            Ok(())
                        })
                    })
                })
            } else {
                b.add_null(asn1::ctx(1));
                Ok(())
            }
        })
    })?;
    Ok(b.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q931::ie::numbers::pres;
    use crate::rose::component::parse_facility;

    fn decode_all(switch: SwitchType, data: &[u8]) -> Vec<RoseComponent> {
        let apdu = parse_facility(data).unwrap();
        apdu.components.iter().map(|c| decode_component(switch, c).unwrap()).collect()
    }

    fn single_invoke(switch: SwitchType, data: &[u8]) -> Invoke {
        match decode_all(switch, data).pop() {
            Some(RoseComponent::Invoke(inv)) => inv,
            other => panic!("expected invoke, got {:?}", other),
        }
    }

    #[test]
    fn aoce_charging_units_from_the_wire() {
        let data = [
            0x91, 0xa1, 0x12, 0x02, 0x02, 0x3a, 0x78, 0x02, 0x01, 0x24, 0x30, 0x09, 0x30, 0x07, 0xa1, 0x05, 0x30, 0x03, 0x02,
            0x01, 0x01,
        ];
        let inv = single_invoke(SwitchType::EuroIsdnE1, &data);
        assert_eq!(inv.invoke_id, 0x3a78);
        assert_eq!(inv.op, OpCode::Local(op::AOC_AOCE_CHARGING_UNIT));
        let InvokeArg::AocECharging(aoc) = inv.arg else { panic!("wrong argument") };
        assert_eq!(aoc.units, 1);
        assert!(!aoc.free_of_charge);
    }

    #[test]
    fn aoce_encoder_output_decodes() {
        let data = encode_aoce_charging_unit(0x3a78, 1).unwrap();
        assert_eq!(
            data,
            vec![
                0x91, 0xa1, 0x12, 0x02, 0x02, 0x3a, 0x78, 0x02, 0x01, 0x24, 0x30, 0x09, 0x30, 0x07, 0xa1, 0x05, 0x30, 0x03, 0x02,
                0x01, 0x01
            ]
        );
        let free = encode_aoce_charging_unit(3, 0).unwrap();
        let InvokeArg::AocECharging(aoc) = single_invoke(SwitchType::EuroIsdnE1, &free).arg else { panic!() };
        assert!(aoc.free_of_charge);
        assert_eq!(aoc.units, 0);
    }

    #[test]
    fn aoce_units_are_summed_with_charge_id() {
        // Two recorded units entries, one not available, then a charge identifier
        let data = [
            0x91, 0xa1, 0x1b, 0x02, 0x01, 0x01, 0x02, 0x01, 0x24, 0x30, 0x13, 0x30, 0x0e, 0xa1, 0x0c, 0x30, 0x03, 0x02, 0x01,
            0x05, 0x30, 0x05, 0x02, 0x01, 0x07, 0x05, 0x00, 0x02, 0x01, 0x09,
        ];
        let InvokeArg::AocECharging(aoc) = single_invoke(SwitchType::EuroIsdnE1, &data).arg else { panic!() };
        assert_eq!(aoc.units, 12);
        assert_eq!(aoc.charge_id, Some(9));
    }

    #[test]
    fn dli2_round_trip_for_qsig() {
        let call = CallInfo {
            redirectingnum: "5551000".into(),
            redirectingplan: 0x21,
            redirectingpres: pres::ALLOWED_USER_NUMBER_NOT_SCREENED,
            redirectingreason: 0x1,
            ..Default::default()
        };
        let data = encode_dli2(SwitchType::Qsig, 7, &call).unwrap();
        assert_eq!(&data[..6], &[0x9f, 0x8b, 0x01, 0x00, 0xa1, (data.len() - 6) as u8]);

        let inv = single_invoke(SwitchType::Qsig, &data);
        assert_eq!(inv.invoke_id, 7);
        let InvokeArg::DivertingLegInfo2(dli) = inv.arg else { panic!() };
        assert_eq!(dli.counter, 1);
        assert_eq!(dli.reason, 0x1);

        let mut rx = CallInfo::default();
        dli.apply(&mut rx);
        assert_eq!(rx.redirectingnum, "5551000");
        assert_eq!(rx.redirectingplan, 0x21);
        assert_eq!(rx.redirectingpres, pres::ALLOWED_USER_NUMBER_NOT_SCREENED);
        assert_eq!(rx.origcallednum, "5551000");
    }

    #[test]
    fn dli2_with_restricted_number() {
        let call = CallInfo {
            redirectingnum: "100".into(),
            redirectingpres: pres::PROHIB_USER_NUMBER_NOT_SCREENED,
            redirectingreason: 0x3,
            ..Default::default()
        };
        let data = encode_dli2(SwitchType::EuroIsdnE1, 1, &call).unwrap();
        assert!(data.ends_with(&[0xa1, 0x02, 0x81, 0x00, 0xa2, 0x02, 0x81, 0x00]));
        let InvokeArg::DivertingLegInfo2(dli) = single_invoke(SwitchType::EuroIsdnE1, &data).arg else { panic!() };
        assert_eq!(dli.reason, 0x3);
        assert_eq!(dli.diverting.unwrap().pres, pres::PROHIB_USER_NUMBER_NOT_SCREENED);
    }

    #[test]
    fn calling_name_apdus() {
        let info = encode_information_following(false, 2).unwrap();
        assert_eq!(
            info,
            vec![0x9f, 0x8b, 0x01, 0x00, 0xa1, 0x0f, 0x02, 0x01, 0x02, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x15, 0x00, 0x04, 0x0a, 0x01, 0x00]
        );
        assert_eq!(single_invoke(SwitchType::Ni2, &info).arg, InvokeArg::InformationFollowing);

        let name = encode_calling_name(true, 3, "Alice").unwrap();
        assert_eq!(&name[1..9], &[0xaa, 0x06, 0x80, 0x01, 0x00, 0x82, 0x01, 0x00]);
        assert_eq!(single_invoke(SwitchType::Qsig, &name).arg, InvokeArg::CallingName("Alice".into()));
        assert!(encode_calling_name(false, 3, "").is_err());
    }

    #[test]
    fn rlt_apdus() {
        assert_eq!(
            encode_rlt_operation_ind().unwrap(),
            vec![0x11, 0xbe, 0xa1, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]
        );
        assert_eq!(
            encode_rlt_third_party(0x123456).unwrap(),
            vec![0x11, 0xbe, 0xa1, 0x10, 0x02, 0x01, 0x02, 0x02, 0x01, 0x02, 0x30, 0x08, 0x80, 0x03, 0x12, 0x34, 0x56, 0x81, 0x01, 0x00]
        );
    }

    #[test]
    fn rlt_operation_ind_result_carries_call_id() {
        let data = [0x91, 0xa2, 0x0c, 0x02, 0x01, 0x01, 0x30, 0x07, 0x02, 0x01, 0x01, 0x80, 0x02, 0x12, 0x34];
        let comps = decode_all(SwitchType::Dms100, &data);
        assert_eq!(
            comps,
            vec![RoseComponent::ReturnResult(ReturnResult { invoke_id: 1, op: Some(1), rlt_call_id: Some(0x1234) })]
        );
    }

    #[test]
    fn errors_and_rejects() {
        let data = [0x91, 0xa3, 0x06, 0x02, 0x01, 0x02, 0x02, 0x01, 0x11, 0xa4, 0x06, 0x02, 0x01, 0x05, 0x81, 0x01, 0x01];
        let comps = decode_all(SwitchType::Dms100, &data);
        assert_eq!(comps[0], RoseComponent::ReturnError(ReturnError { invoke_id: 2, error: 0x11 }));
        assert_eq!(rlt_error_name(0x11), "RLT Call ID Not Found");
        assert_eq!(comps[1], RoseComponent::Reject(Reject { invoke_id: Some(5), problem_tag: 0x81, problem: 1 }));
        assert_eq!(reject_problem_tag_name(0x81), "Invoke problem");
        assert_eq!(reject_problem_name(1), "Mistyped component");
    }

    #[test]
    fn mwi_encodes_served_number() {
        let data = encode_mwi(9, true, "2001").unwrap();
        let inv = single_invoke(SwitchType::Qsig, &data);
        assert_eq!(inv.op, OpCode::Local(op::MWI_ACTIVATE));
        assert_eq!(inv.arg, InvokeArg::Mwi { activate: true, number: "2001".into(), basic_service: Some(1) });
        assert!(encode_mwi(9, false, "").is_err());
    }

    #[test]
    fn eect_and_anfpr() {
        let eect = encode_eect(4, 0x0005).unwrap();
        assert_eq!(&eect[..2], &[0x91, 0xa1]);
        assert!(eect.ends_with(&[0x30, 0x05, 0x02, 0x03, 0x00, 0x80, 0x05]));
        let inv = single_invoke(SwitchType::Ni2, &eect);
        assert_eq!(inv.arg, InvokeArg::NotHandled("ExplicitEctExecute"));

        let pr = encode_anfpr(6, 1, 0x8003).unwrap();
        assert_eq!(&pr[..12], &[0x9f, 0xaa, 0x06, 0x80, 0x01, 0x00, 0x82, 0x01, 0x00, 0x8b, 0x01, 0x02]);
        assert!(pr.ends_with(&[0x0a, 0x01, 0x01, 0x81, 0x00, 0x0a, 0x01, 0x01, 0x02, 0x03, 0x00, 0x80, 0x03]));
    }

    #[test]
    fn unknown_operation_and_missing_argument() {
        let unknown = [0x91, 0xa1, 0x09, 0x02, 0x01, 0x01, 0x02, 0x01, 0x63, 0x0a, 0x01, 0x00];
        let apdu = parse_facility(&unknown).unwrap();
        assert!(decode_component(SwitchType::Ni2, &apdu.components[0]).is_err());

        let no_arg = [0x91, 0xa1, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00];
        let apdu = parse_facility(&no_arg).unwrap();
        assert_eq!(
            decode_component(SwitchType::Ni2, &apdu.components[0]),
            Err(PduParseErr::FieldNotPresent { field: Some("invoke_argument") })
        );
    }

    #[test]
    fn call_transfer_complete_sets_caller() {
        // endDesignation, presentationAllowedAddress { unknown "2000", screening 1 }, name "Bob", callStatus
        let data = [
            0x91, 0xa1, 0x1e, 0x02, 0x01, 0x01, 0x02, 0x01, 0x0c, 0x30, 0x16, 0x0a, 0x01, 0x00, 0xa0, 0x09, 0x80, 0x04, b'2',
            b'0', b'0', b'0', 0x0a, 0x01, 0x01, 0x80, 0x03, b'B', b'o', b'b', 0x0a, 0x01, 0x00,
        ];
        let inv = single_invoke(SwitchType::Qsig, &data);
        let InvokeArg::CallTransferComplete(ct) = inv.arg else { panic!() };
        assert_eq!(ct.end_designation, Some(0));
        assert_eq!(ct.redirection.number, "2000");
        assert_eq!(ct.call_status, Some(0));

        let mut call = CallInfo { callernum: "1".into(), ..Default::default() };
        ct.apply(&mut call);
        assert_eq!(call.callernum, "2000");
        assert_eq!(call.callername, "Bob");
    }
}
