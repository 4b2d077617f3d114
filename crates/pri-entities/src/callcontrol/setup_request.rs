use pri_pdus::q931::ie::bearer::{layer1, trans_cap};
use pri_pdus::q931::ie::numbers::pres;

/// Parameters of an outgoing SETUP. Start from `SetupRequest::new` and chain the
/// setters for what the call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    /// Information transfer capability
    pub transmode: u8,
    /// `channel | ds1 << 8 | ds1explicit << 16`, 0 for any channel
    pub channel: i32,
    pub exclusive: bool,
    pub nonisdn: bool,
    pub caller: Option<String>,
    pub callername: String,
    pub callerplan: u8,
    pub callerpres: u8,
    pub called: String,
    pub calledplan: u8,
    pub userl1: u8,
    pub numcomplete: bool,
    pub redirectingnum: Option<String>,
    pub redirectingplan: u8,
    pub redirectingpres: u8,
    pub redirectingreason: u8,
    /// Call independent signalling connection, no B-channel
    pub justsignalling: bool,
    pub useruserinfo: Option<String>,
}

impl Default for SetupRequest {
    fn default() -> Self {
        Self {
            transmode: trans_cap::SPEECH,
            channel: 0,
            exclusive: false,
            nonisdn: false,
            caller: None,
            callername: String::new(),
            callerplan: 0,
            callerpres: pres::ALLOWED_USER_NUMBER_NOT_SCREENED,
            called: String::new(),
            calledplan: 0,
            userl1: layer1::ULAW,
            numcomplete: false,
            redirectingnum: None,
            redirectingplan: 0,
            redirectingpres: pres::ALLOWED_USER_NUMBER_NOT_SCREENED,
            redirectingreason: 0,
            justsignalling: false,
            useruserinfo: None,
        }
    }
}

impl SetupRequest {
    pub fn new(called: &str, calledplan: u8) -> Self {
        Self { called: called.to_string(), calledplan, ..Default::default() }
    }

    pub fn channel(mut self, channel: i32, exclusive: bool, nonisdn: bool) -> Self {
        self.channel = channel;
        self.exclusive = exclusive;
        self.nonisdn = nonisdn;
        self
    }

    /// Transfer capability and user layer 1 protocol. A zero layer 1 keeps mu-law.
    pub fn bearer(mut self, transmode: u8, userl1: u8) -> Self {
        self.transmode = transmode;
        if userl1 != 0 {
            self.userl1 = userl1;
        }
        self
    }

    pub fn called(mut self, called: &str, calledplan: u8, numcomplete: bool) -> Self {
        self.called = called.to_string();
        self.calledplan = calledplan;
        self.numcomplete = numcomplete;
        self
    }

    pub fn caller(mut self, caller: &str, callername: &str, callerplan: u8, callerpres: u8) -> Self {
        self.caller = Some(caller.to_string());
        self.callername = callername.to_string();
        self.callerplan = callerplan;
        self.callerpres = callerpres;
        self
    }

    pub fn redirecting(mut self, num: &str, plan: u8, pres: u8, reason: u8) -> Self {
        self.redirectingnum = Some(num.to_string());
        self.redirectingplan = plan;
        self.redirectingpres = pres;
        self.redirectingreason = reason;
        self
    }

    pub fn useruser(mut self, info: &str) -> Self {
        self.useruserinfo = Some(info.to_string());
        self
    }

    pub fn call_independent(mut self) -> Self {
        self.justsignalling = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_defaults_for_unset_fields() {
        let req = SetupRequest::new("5551234", 0x21).channel(5, true, false).bearer(trans_cap::DIGITAL, 0);
        assert_eq!(req.called, "5551234");
        assert_eq!(req.calledplan, 0x21);
        assert_eq!(req.channel, 5);
        assert!(req.exclusive);
        assert_eq!(req.transmode, trans_cap::DIGITAL);
        assert_eq!(req.userl1, layer1::ULAW);
        assert!(req.caller.is_none());
        assert!(!req.justsignalling);
    }

    #[test]
    fn call_independent_with_caller() {
        let req = SetupRequest::new("100", 0)
            .caller("200", "Alice", 0x21, pres::ALLOWED_NETWORK_NUMBER)
            .useruser("hello")
            .call_independent();
        assert_eq!(req.caller.as_deref(), Some("200"));
        assert_eq!(req.callername, "Alice");
        assert_eq!(req.useruserinfo.as_deref(), Some("hello"));
        assert!(req.justsignalling);
    }
}
