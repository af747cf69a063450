//! Logical actions, the persisted binding table, and the router wiring
//! bound keys to a shared engine.
//!
//! Two sources feed one table at startup: the deprecated embedded
//! `keyboards` section of the menu config, and the calibration file. They
//! merge deterministically: embedded entries first in config order, then
//! calibration entries, with a calibration entry replacing an embedded one
//! for the same `(keycode, onRelease)` pair. Calibration results are never
//! silently shadowed.

use std::collections::BTreeMap;
use std::path::Path;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use recmenu_input::KeycodeListener;

use crate::engine::{Flow, MenuEngine};

/// The three semantic inputs the menu understands, independent of the
/// physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalAction {
    #[serde(rename = "selectItem")]
    Select,
    #[serde(rename = "prevItem")]
    Previous,
    #[serde(rename = "nextItem")]
    Next,
}

/// One raw key bound to a logical action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBinding {
    pub keycode: u16,
    pub action: LogicalAction,
    #[serde(default)]
    pub on_release: bool,
}

/// Device node path -> bindings, in activation order.
pub type BindingTable = BTreeMap<String, Vec<KeyBinding>>;

/// Shared handle to the engine used by every device task.
pub type SharedEngine = Arc<Mutex<MenuEngine>>;

/// Pause after a successful external command so its final output stays
/// readable before the menu redraws.
const EXEC_SETTLE: Duration = Duration::from_secs(3);

/// Read a persisted binding table.
///
/// `Ok(None)` when the file does not exist yet (first run, calibration
/// pending); a present-but-unparseable file is a configuration error.
pub fn load_table(path: &Path) -> Result<Option<BindingTable>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("Failed to read calibration file: {}", path.display())
            })
        }
    };
    let table = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse calibration file: {}", path.display()))?;
    Ok(Some(table))
}

/// Merge the deprecated embedded bindings with a calibrated table.
pub fn merge_tables(embedded: BindingTable, calibrated: BindingTable) -> BindingTable {
    let mut merged = embedded;
    for (device, bindings) in calibrated {
        let slot = merged.entry(device).or_default();
        for binding in bindings {
            slot.retain(|b| !(b.keycode == binding.keycode && b.on_release == binding.on_release));
            slot.push(binding);
        }
    }
    merged
}

/// Lock the shared engine, recovering the guard if a task died mid-update.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, MenuEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply one logical action to the shared engine, performing whatever
/// follow-up the dispatch hands back.
pub fn dispatch(engine: &SharedEngine, action: LogicalAction) {
    match action {
        LogicalAction::Previous => lock_engine(engine).prev_item(),
        LogicalAction::Next => lock_engine(engine).next_item(),
        LogicalAction::Select => {
            let flow = lock_engine(engine).action();
            match flow {
                Flow::Continue => {}
                Flow::Exit(code) => {
                    info!("Menu requested exit ({code})");
                    process::exit(code);
                }
                Flow::Exec { cmdline, done_msg } => run_exec(engine, &cmdline, &done_msg),
            }
        }
    }
}

/// Run an external command with inherited stdio.
///
/// The engine's `locked` flag is already set; the mutex itself is not held
/// while the child runs, so other device tasks stay responsive (their
/// navigation no-ops against the lock flag).
fn run_exec(engine: &SharedEngine, cmdline: &[String], done_msg: &str) {
    info!("Executing: {}", cmdline.join(" "));
    let status = process::Command::new(&cmdline[0]).args(&cmdline[1..]).status();
    match status {
        Ok(status) if status.success() => {
            std::thread::sleep(EXEC_SETTLE);
            lock_engine(engine).exec_finished(done_msg);
        }
        Ok(status) => {
            error!("Command {:?} exited with {status}", cmdline[0]);
            process::exit(1);
        }
        Err(err) => {
            error!("Failed to launch {:?}: {err}", cmdline[0]);
            process::exit(1);
        }
    }
}

/// Open one listener per bound device and spawn its blocking read loop.
///
/// Failing to open a bound device at startup is fatal; a listener that
/// stops later only logs, the remaining devices keep the menu usable.
pub fn spawn_listeners(
    table: &BindingTable,
    engine: &SharedEngine,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    for (device, bindings) in table {
        let mut listener = KeycodeListener::open(device)
            .with_context(|| format!("Failed to listen on input device {device}"))?;
        for binding in bindings {
            let engine = Arc::clone(engine);
            let action = binding.action;
            listener.bind(
                binding.keycode,
                binding.on_release,
                Box::new(move || dispatch(&engine, action)),
            );
        }
        info!("Bound {} keys on {device}", bindings.len());

        let stop = Arc::clone(stop);
        let device = device.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = listener.run(stop) {
                warn!("Input device {device} stopped: {err}");
            }
        });
    }
    Ok(())
}
