use clap::Parser;

use std::io::{self, BufRead};

use pri_core::octet_buffer::{OctetBuffer, hex_string};
use pri_core::sapi;
use pri_pdus::fcs16;
use pri_pdus::q921::{Q921Control, Q921Frame, TeiMgmtMsg, UFrameKind};
use pri_pdus::q931::dump::dump_message;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Q.921/Q.931 Frame Decoder",
    long_about = "Decodes raw D-channel frames given as hex, from the command line or one per line on stdin"
)]
struct Args {
    /// Frames to decode
    #[arg(help = "Frames as hex digits, spaces and ':' allowed. Reads stdin when none are given")]
    frames: Vec<String>,

    #[arg(long, help = "Frames were received by us (default: sent)")]
    rx: bool,

    #[arg(long = "no-fcs", help = "Frames do not end with the 2-octet FCS")]
    no_fcs: bool,
}

/// Decodes one frame into dump lines
fn decode(data: &[u8], tx: bool, has_fcs: bool) -> Result<Vec<String>, String> {
    let body = if has_fcs {
        if !fcs16::check_fcs(data) {
            return Err(format!("bad FCS on {}", hex_string(data)));
        }
        fcs16::strip_fcs(data).ok_or_else(|| "frame too short for an FCS".to_string())?
    } else {
        data
    };
    let frame = Q921Frame::from_bytes(body).map_err(|e| format!("not a Q.921 frame ({}): {}", e, hex_string(body)))?;
    let mut lines: Vec<String> = frame.dump(tx).lines().map(str::to_string).collect();

    match frame.control {
        Q921Control::I { .. } if !frame.payload.is_empty() => lines.extend(dump_message(&frame.payload, tx)),
        Q921Control::U { kind: UFrameKind::Ui, .. } if frame.header.sapi == sapi::LAYER2_MANAGEMENT => {
            match TeiMgmtMsg::from_bytes(&frame.payload) {
                Ok(msg) => lines.push(format!("{} {}", if tx { '>' } else { '<' }, msg)),
                Err(e) => lines.push(format!("Undecodable TEI management message: {}", e)),
            }
        }
        Q921Control::U { kind: UFrameKind::Ui, .. } if !frame.payload.is_empty() => {
            lines.extend(dump_message(&frame.payload, tx))
        }
        _ => {}
    }
    Ok(lines)
}

fn decode_hex(hex: &str, tx: bool, has_fcs: bool) -> bool {
    let Some(buf) = OctetBuffer::from_hexstr(hex) else {
        eprintln!("Error: '{}' is not a hex string", hex);
        return false;
    };
    match decode(buf.as_slice(), tx, has_fcs) {
        Ok(lines) => {
            for l in lines {
                println!("{}", l);
            }
            println!();
            true
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}

fn main() {
    eprintln!("[+] Q.921/Q.931 frame decoder");

    let args = Args::parse();
    let tx = !args.rx;
    let has_fcs = !args.no_fcs;

    let mut ok = true;
    if args.frames.is_empty() {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            ok &= decode_hex(&line, tx, has_fcs);
        }
    } else {
        for hex in &args.frames {
            ok &= decode_hex(hex, tx, has_fcs);
        }
    }
    if !ok {
        std::process::exit(1);
    }
}
