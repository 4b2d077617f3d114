use clap::Parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use pri_config::{InterfaceKind, IoBackend, SharedConfig, StackConfig, toml_config};
use pri_core::{DebugFlags, NodeType, SwitchType, debug};
use pri_entities::Pri;
use pri_entities::phy::linked_pair;

mod responder;
use responder::Responder;

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

fn parse_switch(name: &str) -> Option<SwitchType> {
    let sw = match name.to_lowercase().as_str() {
        "ni2" => SwitchType::Ni2,
        "ni1" => SwitchType::Ni1,
        "dms100" => SwitchType::Dms100,
        "lucent5e" => SwitchType::Lucent5e,
        "att4ess" => SwitchType::Att4ess,
        "euroisdn" | "euroisdn_e1" => SwitchType::EuroIsdnE1,
        "euroisdn_t1" => SwitchType::EuroIsdnT1,
        "qsig" => SwitchType::Qsig,
        _ => return None,
    };
    Some(sw)
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ISDN D-channel node",
    long_about = "Runs one side of an ISDN D-channel, answering incoming calls, or a network/user pair connected back to back"
)]
struct Args {
    /// Config file
    #[arg(help = "TOML config with node, switch and frame transport", required_unless_present = "loopback")]
    config: Option<String>,

    #[arg(long, help = "Run a network and a user side connected back to back, ignoring the config file")]
    loopback: bool,

    #[arg(
        short = 's',
        long = "switch",
        default_value = "ni2",
        help = "Switch type for --loopback: [ ni2 | ni1 | dms100 | lucent5e | att4ess | euroisdn | euroisdn_t1 | qsig ]"
    )]
    switch: String,

    #[arg(short = 'd', long = "dial", help = "Number to call once the D-channel is up")]
    dial: Option<String>,
}

/// Runs the stack until stopped, or until the call we placed is over
fn run_node(mut pri: Pri, mut app: Responder, running: Arc<AtomicBool>, name: &'static str) {
    while running.load(Ordering::SeqCst) {
        match pri.dchannel_run(true) {
            Ok(Some(ev)) => {
                print!("[{}] {}", name, pri.dump_event(&ev));
                if let Err(e) = app.handle(&mut pri, &ev) {
                    tracing::warn!("[{}] unable to act on {}: {}", name, ev, e);
                }
                if app.finished() {
                    println!("[{}] Call completed", name);
                    print!("{}", pri.dump_info_str());
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("[{}] D-channel failed: {}", name, e);
                return;
            }
        }
    }
}

fn run_configured(cfg: SharedConfig, dial: Option<String>, running: Arc<AtomicBool>) {
    let pri = match Pri::open(cfg) {
        Ok(p) => p,
        Err(e) => {
            println!("Failed to open the D-channel: {}", e);
            std::process::exit(1);
        }
    };
    run_node(pri, Responder::new(dial), running, "node");
}

fn run_loopback(switch: SwitchType, dial: Option<String>, running: Arc<AtomicBool>) {
    let config = |node| {
        let mut cfg = StackConfig::new(node, switch, InterfaceKind::Pri);
        cfg.io.backend = IoBackend::None;
        SharedConfig::from_config(cfg)
    };
    let (net_io, cpe_io) = linked_pair();
    let net = Pri::new(config(NodeType::Network), Box::new(net_io));
    let cpe = Pri::new(config(NodeType::Cpe), Box::new(cpe_io));

    let r = running.clone();
    thread::spawn(move || run_node(net, Responder::new(None), r, "net"));
    let user = thread::spawn(move || run_node(cpe, Responder::new(dial), running, "cpe"));
    if user.join().is_err() {
        eprintln!("User side panicked");
    }
}

fn main() {
    eprintln!("[+] ISDN D-channel node");

    let args = Args::parse();

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    if args.loopback {
        let Some(switch) = parse_switch(&args.switch) else {
            eprintln!("Error: Unsupported switch type '{}'", args.switch);
            std::process::exit(1);
        };
        let _log_guard = debug::setup_logging_default(None, DebugFlags::default());
        eprintln!(" -> {} loopback, network and user side", switch);
        run_loopback(switch, args.dial, running);
        return;
    }

    // Clap guarantees the path without --loopback
    let cfg_path = args.config.unwrap_or_default();
    let cfg = load_config_from_toml(&cfg_path);
    let _log_guard = match debug::setup_logging_default(cfg.config().debug_log.clone(), cfg.debug()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to open the debug log: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!(" -> {} {} on {:?}", cfg.config().switch, cfg.config().node, cfg.config().interface);
    run_configured(cfg, args.dial, running);
}
