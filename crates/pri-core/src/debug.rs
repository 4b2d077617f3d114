use core::fmt;
use std::fs::OpenOptions;
use std::io;
use std::sync::Once;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt as tracingfmt, EnvFilter};

use crate::DebugFlags;

/// Column at which the message text starts
const MSG_COLUMN: usize = 44;

/// Short protocol layer tag for a tracing target such as `pri_entities::lapd::instance`
pub fn layer_tag(target: &str) -> &'static str {
    let mut parts = target.split("::");
    let krate = parts.next().unwrap_or("");
    let module = parts.next().unwrap_or("");
    match (krate, module) {
        (_, "phy") => "PHY",
        (_, "lapd") | ("pri_pdus", "q921") => "Q921",
        (_, "callcontrol") if target.ends_with("facility") => "ROSE",
        (_, "callcontrol") | ("pri_pdus", "q931") => "Q931",
        ("pri_pdus", "rose") | ("pri_pdus", "ber") => "ROSE",
        (_, "scheduler") | (_, "messagerouter") => "SCHED",
        (_, "pri") | (_, "host") => "HOST",
        ("pri_config", _) => "CONF",
        _ => "----",
    }
}

/// One line per event: level, layer tag, source line, then the message in a fixed column.
struct LayerFormatter;

impl<S, N> FormatEvent<S, N> for LayerFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &tracing::Event<'_>) -> fmt::Result {
        let meta = event.metadata();
        let color = if writer.has_ansi_escapes() {
            match *meta.level() {
                Level::ERROR => "\x1b[31m",
                Level::WARN => "\x1b[33m",
                Level::INFO => "\x1b[32m",
                Level::DEBUG => "\x1b[36m",
                Level::TRACE => "\x1b[90m",
            }
        } else {
            ""
        };
        let reset = if color.is_empty() { "" } else { "\x1b[0m" };

        let file = meta.file().unwrap_or("?");
        let file = file.rsplit('/').next().unwrap_or(file);
        let source = format!("[{}] {}:{}", layer_tag(meta.target()), file, meta.line().unwrap_or(0));

        write!(writer, "{}{:<5}{} {:<width$} ", color, meta.level(), reset, source, width = MSG_COLUMN - 6)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Adds a directive, skipping it if the text does not parse
fn with_directive(filter: EnvFilter, directive: &str) -> EnvFilter {
    match directive.parse() {
        Ok(d) => filter.add_directive(d),
        Err(_) => filter,
    }
}

/// Stdout filter: info everywhere, plumbing quiet, and each class of
/// application debug flags raising its layer to debug (or trace for raw frames).
pub fn stdout_filter(flags: DebugFlags) -> EnvFilter {
    let mut filter = EnvFilter::new("info");
    for quiet in ["pri_entities::messagerouter", "pri_entities::scheduler", "pri_core::octet_buffer"] {
        filter = with_directive(filter, &format!("{}=warn", quiet));
    }

    let raise: [(u32, &str, &str); 5] = [
        (DebugFlags::Q921_RAW, "pri_entities::phy", "trace"),
        (DebugFlags::Q921_DUMP | DebugFlags::Q921_STATE, "pri_entities::lapd", "debug"),
        (DebugFlags::Q931_DUMP | DebugFlags::Q931_STATE | DebugFlags::Q931_ANOMALY, "pri_entities::callcontrol", "debug"),
        (DebugFlags::APDU | DebugFlags::AOC, "pri_entities::callcontrol::facility", "debug"),
        (DebugFlags::CONFIG, "pri_config", "debug"),
    ];
    for (mask, target, level) in raise {
        if flags.has(mask) {
            filter = with_directive(filter, &format!("{}={}", target, level));
        }
    }
    filter
}

static INIT_LOG: Once = Once::new();

/// Everything at trace level to stdout. Used by unit tests; repeated calls are no-ops.
pub fn setup_logging_verbose() {
    INIT_LOG.call_once(|| {
        let layer = tracingfmt::layer().event_format(LayerFormatter).with_test_writer();
        let _ = tracing_subscriber::registry().with(layer.with_filter(EnvFilter::new("trace"))).try_init();
    });
}

/// Stdout logging filtered by `flags`, plus everything at debug level appended to
/// `logfile` when given. The returned guard flushes the file writer and must be kept alive.
pub fn setup_logging_default(logfile: Option<String>, flags: DebugFlags) -> io::Result<Option<WorkerGuard>> {
    let stdout_layer = tracingfmt::layer().event_format(LayerFormatter).with_filter(stdout_filter(flags));

    let Some(path) = logfile else {
        INIT_LOG.call_once(|| {
            let _ = tracing_subscriber::registry().with(stdout_layer).try_init();
        });
        return Ok(None);
    };

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);
    INIT_LOG.call_once(|| {
        let file_layer = tracingfmt::layer()
            .event_format(LayerFormatter)
            .with_writer(file_writer)
            .with_ansi(false)
            .with_filter(EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry().with(stdout_layer).with(file_layer).try_init();
    });
    Ok(Some(guard))
}
