use std::{fs, io, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter, prelude::*, EnvFilter};

/// Installs the global subscriber.
///
/// Events with target `consensus` go only to `<log_dir>/audit-<node>.log`;
/// everything else goes to stdout, filtered by `RUST_LOG`. The returned guard
/// must stay alive for the audit file to be flushed.
pub fn init(node_name: &str, log_dir: &Path) -> io::Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, format!("audit-{}.log", node_name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let consensus_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|metadata| metadata.target() == "consensus"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,synod=debug".into()))
        .with_filter(filter::filter_fn(|metadata| metadata.target() != "consensus"));

    tracing_subscriber::registry()
        .with(consensus_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}

/// Writes panics to stderr and `<log_dir>/panic.log` before the process dies.
pub fn install_panic_hook(log_dir: &Path) {
    let crash_file = log_dir.join("panic.log");
    std::panic::set_hook(Box::new(move |info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Box<Any>");
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let report = format!("CRASH: {} at {}\n", payload, location);
        eprintln!("{}", report);
        let _ = fs::write(&crash_file, report);
    }));
}
