use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use log::{error, info, LevelFilter};
use showroom::ShowroomConfig;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const CRASH_LOG: &str = "showroom_crash.log";

fn main() {
    setup_diagnostics();

    if let Err(e) = run() {
        error!("Showroom terminated: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => ShowroomConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ShowroomConfig::default(),
    };

    // winit must own the main thread; model loading runs on this runtime's workers.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("showroom-loader")
        .enable_all()
        .build()
        .context("failed to start the loader runtime")?;

    info!(
        "Starting showroom (assets from {})...",
        config.asset_root.display()
    );
    showroom::run_native(config, runtime.handle().clone())
}

/// Sets up logging and crash reporting
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info.location().map_or("Unknown location".to_string(), |loc| {
            format!("{}:{}", loc.file(), loc.line())
        });

        let crash_msg = format!(
            "=== SHOWROOM CRASH ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );

        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create(CRASH_LOG) {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to {}", CRASH_LOG);
        }
    }));
}
