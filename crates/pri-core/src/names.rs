//! Human readable names of the numbering and clearing values seen by the application

/// Textual name of a Q.931 cause value
pub fn cause_name(cause: i32) -> &'static str {
    match cause {
        1 => "Unallocated (unassigned) number",
        2 => "No route to specified transmit network",
        3 => "No route to destination",
        6 => "Channel unacceptable",
        7 => "Call awarded and being delivered in an established channel",
        16 => "Normal Clearing",
        17 => "User busy",
        18 => "No user responding",
        19 => "User alerting, no answer",
        21 => "Call Rejected",
        22 => "Number changed",
        27 => "Destination out of order",
        28 => "Invalid number format",
        29 => "Facility rejected",
        30 => "Response to STATus ENQuiry",
        31 => "Normal, unspecified",
        34 => "Circuit/channel congestion",
        38 => "Network out of order",
        41 => "Temporary failure",
        42 => "Switching equipment congestion",
        43 => "Access information discarded",
        44 => "Requested channel not available",
        45 => "Pre-empted",
        50 => "Facility not subscribed",
        52 => "Outgoing call barred",
        54 => "Incoming call barred",
        57 => "Bearer capability not authorized",
        58 => "Bearer capability not available",
        63 => "Service or option not available, unspecified",
        65 => "Bearer capability not implemented",
        66 => "Channel not implemented",
        69 => "Facility not implemented",
        81 => "Invalid call reference value",
        82 => "Identified channel does not exist",
        88 => "Incompatible destination",
        95 => "Invalid message unspecified",
        96 => "Mandatory information element is missing",
        97 => "Message type nonexist.",
        98 => "Wrong message",
        99 => "Info. element nonexist or not implemented",
        100 => "Invalid information element contents",
        101 => "Message not compatible with call state",
        102 => "Recover on timer expiry",
        103 => "Mandatory IE length error",
        111 => "Protocol error, unspecified",
        127 => "Interworking, unspecified",
        _ => "Unknown",
    }
}


pub fn pres_name(pres: i32) -> &'static str {
    match pres {
        0x00 => "Presentation permitted, user number not screened",
        0x01 => "Presentation permitted, user number passed network screening",
        0x02 => "Presentation permitted, user number failed network screening",
        0x03 => "Presentation allowed of network provided number",
        0x20 => "Presentation prohibited, user number not screened",
        0x21 => "Presentation prohibited, user number passed network screening",
        0x22 => "Presentation prohibited, user number failed network screening",
        0x23 => "Presentation prohibited of network provided number",
        0x43 => "Number not available",
        _ => "Unknown",
    }
}

pub fn plan_name(plan: i32) -> &'static str {
    match plan {
        0x11 => "International number in ISDN",
        0x21 => "National number in ISDN",
        0x41 => "Local number in ISDN",
        0x49 => "Private numbering plan",
        0x00 => "Unknown numbering plan",
        _ => "Unknown",
    }
}

/// Numbering plan identification, as carried in the number IEs
pub fn npi_name(npi: u8) -> &'static str {
    match npi {
        0x0 => "Unknown Number Plan",
        0x1 => "ISDN/Telephony Numbering Plan (E.164/E.163)",
        0x3 => "Data Numbering Plan (X.121)",
        0x4 => "Telex Numbering Plan (F.69)",
        0x8 => "National Standard Numbering Plan",
        0x9 => "Private Numbering Plan",
        0xf => "Reserved Number Plan",
        _ => "Unknown",
    }
}

/// Type of number, as carried in the number IEs
pub fn ton_name(ton: u8) -> &'static str {
    match ton {
        0x0 => "Unknown Number Type",
        0x1 => "International Number",
        0x2 => "National Number",
        0x3 => "Network Specific Number",
        0x4 => "Subscriber Number",
        0x6 => "Abbreviated number",
        0x7 => "Reserved Number",
        _ => "Unknown",
    }
}
