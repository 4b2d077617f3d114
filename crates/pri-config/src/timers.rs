/// Q.921 / Q.931 timers and counters, indexed the way the host API numbers them.
/// Timer values are milliseconds, counters are plain counts. A negative value means
/// the timer is not in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerIdx {
    /// Maximum number of Q.921 retransmissions
    N200 = 0,
    /// Maximum number of octets in an information field
    N201 = 1,
    /// Maximum number of TEI identity requests
    N202 = 2,
    /// Maximum number of outstanding I-frames
    K = 3,
    /// Retransmission timer
    T200 = 4,
    /// TEI identity check retransmission
    T201 = 5,
    /// TEI identity request retransmission
    T202 = 6,
    /// Maximum time without frame exchange
    T203 = 7,
    T300 = 8,
    T301 = 9,
    T302 = 10,
    /// SETUP without response
    T303 = 11,
    T304 = 12,
    /// DISCONNECT without RELEASE
    T305 = 13,
    T306 = 14,
    T307 = 15,
    /// RELEASE without RELEASE COMPLETE
    T308 = 16,
    /// Active call surviving a data link failure
    T309 = 17,
    T310 = 18,
    /// CONNECT without CONNECT ACKNOWLEDGE
    T313 = 19,
    T314 = 20,
    T316 = 21,
    T317 = 22,
    T318 = 23,
    T319 = 24,
    T320 = 25,
    T321 = 26,
    T322 = 27,
    /// XID response wait
    TM20 = 28,
    /// XID retransmissions
    NM20 = 29,
}

pub const PRI_MAX_TIMERS: usize = 32;

const ALL_TIMERS: [TimerIdx; 30] = [
    TimerIdx::N200, TimerIdx::N201, TimerIdx::N202, TimerIdx::K,
    TimerIdx::T200, TimerIdx::T201, TimerIdx::T202, TimerIdx::T203,
    TimerIdx::T300, TimerIdx::T301, TimerIdx::T302, TimerIdx::T303,
    TimerIdx::T304, TimerIdx::T305, TimerIdx::T306, TimerIdx::T307,
    TimerIdx::T308, TimerIdx::T309, TimerIdx::T310, TimerIdx::T313,
    TimerIdx::T314, TimerIdx::T316, TimerIdx::T317, TimerIdx::T318,
    TimerIdx::T319, TimerIdx::T320, TimerIdx::T321, TimerIdx::T322,
    TimerIdx::TM20, TimerIdx::NM20,
];

impl std::convert::TryFrom<u64> for TimerIdx {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        ALL_TIMERS.iter().copied().find(|t| *t as u64 == x).ok_or(())
    }
}

impl TimerIdx {
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn all() -> &'static [TimerIdx] {
        &ALL_TIMERS
    }

    /// Case-insensitive lookup by name, e.g. "t200" or "K"
    pub fn from_name(name: &str) -> Option<TimerIdx> {
        ALL_TIMERS.iter().copied().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            TimerIdx::N200 => "N200",
            TimerIdx::N201 => "N201",
            TimerIdx::N202 => "N202",
            TimerIdx::K => "K",
            TimerIdx::T200 => "T200",
            TimerIdx::T201 => "T201",
            TimerIdx::T202 => "T202",
            TimerIdx::T203 => "T203",
            TimerIdx::T300 => "T300",
            TimerIdx::T301 => "T301",
            TimerIdx::T302 => "T302",
            TimerIdx::T303 => "T303",
            TimerIdx::T304 => "T304",
            TimerIdx::T305 => "T305",
            TimerIdx::T306 => "T306",
            TimerIdx::T307 => "T307",
            TimerIdx::T308 => "T308",
            TimerIdx::T309 => "T309",
            TimerIdx::T310 => "T310",
            TimerIdx::T313 => "T313",
            TimerIdx::T314 => "T314",
            TimerIdx::T316 => "T316",
            TimerIdx::T317 => "T317",
            TimerIdx::T318 => "T318",
            TimerIdx::T319 => "T319",
            TimerIdx::T320 => "T320",
            TimerIdx::T321 => "T321",
            TimerIdx::T322 => "T322",
            TimerIdx::TM20 => "TM20",
            TimerIdx::NM20 => "NM20",
        }
    }
}

impl core::fmt::Display for TimerIdx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Timer value table. Every switch type currently shares the same defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTable {
    values: [i32; PRI_MAX_TIMERS],
}

impl Default for TimerTable {
    fn default() -> Self {
        let mut values = [-1; PRI_MAX_TIMERS];
        values[TimerIdx::N200 as usize] = 3;
        values[TimerIdx::N202 as usize] = 3;
        values[TimerIdx::K as usize] = 7;
        values[TimerIdx::T200 as usize] = 1000;
        values[TimerIdx::T202 as usize] = 10000;
        values[TimerIdx::T203 as usize] = 10000;
        values[TimerIdx::T303 as usize] = 4000;
        values[TimerIdx::T305 as usize] = 30000;
        values[TimerIdx::T308 as usize] = 4000;
        values[TimerIdx::T313 as usize] = 4000;
        values[TimerIdx::TM20 as usize] = 2500;
        values[TimerIdx::NM20 as usize] = 3;
        Self { values }
    }
}

impl TimerTable {
    pub fn get(&self, idx: TimerIdx) -> i32 {
        self.values[idx as usize]
    }

    /// Raw index access as used by the host API. Out of range indices return None.
    pub fn get_raw(&self, idx: usize) -> Option<i32> {
        self.values.get(idx).copied()
    }

    /// Sets a timer value. Negative values are rejected, use `disable` to turn a timer off.
    pub fn set(&mut self, idx: TimerIdx, value: i32) -> Result<(), &'static str> {
        if value < 0 {
            return Err("timer value must not be negative");
        }
        self.values[idx as usize] = value;
        Ok(())
    }

    pub fn disable(&mut self, idx: TimerIdx) {
        self.values[idx as usize] = -1;
    }

    /// Timer value as a delay, None if the timer is not in use
    pub fn delay_ms(&self, idx: TimerIdx) -> Option<u64> {
        let v = self.get(idx);
        if v < 0 { None } else { Some(v as u64) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(TimerIdx::from_name("t309"), Some(TimerIdx::T309));
        assert_eq!(TimerIdx::from_name("k"), Some(TimerIdx::K));
        assert_eq!(TimerIdx::from_name("T315"), None);
        assert_eq!(TimerIdx::try_from(19), Ok(TimerIdx::T313));
    }

    #[test]
    fn defaults_and_negative_rejection() {
        let mut t = TimerTable::default();
        assert_eq!(t.get(TimerIdx::T200), 1000);
        assert_eq!(t.delay_ms(TimerIdx::T309), None);
        assert!(t.set(TimerIdx::T309, -5).is_err());
        t.set(TimerIdx::T309, 6000).unwrap();
        assert_eq!(t.delay_ms(TimerIdx::T309), Some(6000));
        assert_eq!(t.get_raw(40), None);
    }
}
