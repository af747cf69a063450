//! recmenu daemon entry point.
//!
//! Startup order mirrors what the menu needs to come alive: configuration,
//! then a binding table (loaded or freshly calibrated), then one listener
//! task per bound device, then the home frame. After that the process idles
//! until a terminal interrupt.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use recmenu::bindings::{self, BindingTable};
use recmenu::calibrate;
use recmenu::cli::Cli;
use recmenu::config::MenuConfig;
use recmenu::engine::MenuEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = MenuConfig::load(&cli.menu)?;
    let menus = config.build_menus()?;

    let v_lines = cli.v_lines.max(0) as usize;
    let mut engine = MenuEngine::new(Box::new(console_sink(v_lines)));
    for (name, value) in &config.environment {
        engine.set_env(name, value);
    }
    engine.set_env("WORKINGDIR", &cli.working_dir);
    for (key, menu) in menus {
        engine.add_menu(key, menu);
    }
    engine.set_home_menu(&config.home_menu);
    let engine = Arc::new(Mutex::new(engine));

    let table = match acquire_bindings(&cli, &config).await? {
        Some(table) => table,
        None => {
            info!("Calibration cancelled, exiting");
            return Ok(());
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    bindings::spawn_listeners(&table, &engine, &stop)?;

    bindings::lock_engine(&engine).home();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for interrupt")?;
    info!("Interrupted, shutting down");
    stop.store(true, Ordering::SeqCst);
    Ok(())
}

/// Produce the active binding table: the persisted calibration merged over
/// the config's deprecated embedded bindings, running the first-run
/// calibrator when no table exists yet. `None` means the user cancelled
/// calibration.
async fn acquire_bindings(cli: &Cli, config: &MenuConfig) -> Result<Option<BindingTable>> {
    if let Some(calibrated) = bindings::load_table(&cli.calibration)? {
        return Ok(Some(bindings::merge_tables(
            config.keyboards.clone(),
            calibrated,
        )));
    }

    let devices = recmenu_input::list_event_devices(&cli.input_dir)
        .context("Failed to scan for input devices")?;
    info!(
        "No calibration table at {}, calibrating {} devices",
        cli.calibration.display(),
        devices.len()
    );

    let mut prompt = console_sink(cli.v_lines.max(0) as usize);
    match calibrate::run_calibration(&devices, &cli.calibration, &mut prompt).await? {
        Some(calibrated) => Ok(Some(bindings::merge_tables(
            config.keyboards.clone(),
            calibrated,
        ))),
        None => Ok(None),
    }
}

/// Console render sink: scroll the previous frame away, then print the new
/// one indented, the way dumb recovery consoles expect.
fn console_sink(v_lines: usize) -> impl FnMut(&str) + Send {
    move |frame: &str| {
        let mut out = std::io::stdout().lock();
        for _ in 0..v_lines {
            let _ = writeln!(out);
        }
        let _ = write!(out, "  {frame}\n\n\n");
        let _ = out.flush();
    }
}
