//! First-run key calibration.
//!
//! Walks the user through pressing one key per logical action on whatever
//! raw devices exist, then persists the learned table. Each stage records
//! the first press it sees; concurrent presses from other devices lose the
//! tie-break and are silently dropped.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::Notify;
use tracing::{info, warn};

use recmenu_input::KeycodeListener;

use crate::bindings::{BindingTable, KeyBinding, LogicalAction};

/// Time the user has to abort before the first learn stage arms.
const ARM_COUNTDOWN: Duration = Duration::from_secs(3);

struct CalibrationSession {
    ready: bool,
    pending: Option<LogicalAction>,
    table: BindingTable,
}

/// Shared between the staged controller and every device task's root
/// callback.
struct Calibrator {
    session: Mutex<CalibrationSession>,
    recorded: Notify,
    cancel: Arc<AtomicBool>,
}

impl Calibrator {
    fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            session: Mutex::new(CalibrationSession {
                ready: false,
                pending: None,
                table: BindingTable::new(),
            }),
            recorded: Notify::new(),
            cancel,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CalibrationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Root callback: fed every raw event from every armed device.
    ///
    /// Before arming completes, any event requests cancellation. Armed with
    /// no stage pending, or after the pending stage has been satisfied,
    /// events are discarded; releases never record.
    fn input(&self, device: &str, keycode: u16, released: bool) {
        let mut session = self.lock();
        if !session.ready {
            self.cancel.store(true, Ordering::SeqCst);
            return;
        }
        if released {
            return;
        }
        let Some(action) = session.pending.take() else {
            return;
        };
        session.table.entry(device.to_string()).or_default().push(KeyBinding {
            keycode,
            action,
            on_release: false,
        });
        info!("Learned key {keycode} on {device} for {action:?}");
        drop(session);
        self.recorded.notify_one();
    }

    fn set_ready(&self) {
        self.lock().ready = true;
    }

    fn arm(&self, action: LogicalAction) {
        self.lock().pending = Some(action);
    }

    /// Wait until the armed stage has recorded its key.
    async fn wait_recorded(&self) {
        loop {
            let notified = self.recorded.notified();
            if self.lock().pending.is_none() {
                return;
            }
            notified.await;
        }
    }

    fn take_table(&self) -> BindingTable {
        std::mem::take(&mut self.lock().table)
    }
}

/// Run the full staged workflow against `devices`, persisting the learned
/// table to `out_path`.
///
/// Returns `Ok(None)` when the user cancelled during the countdown; a
/// table write failure is fatal. The returned table is ready for the caller
/// to bind immediately, without a restart.
pub async fn run_calibration(
    devices: &[String],
    out_path: &Path,
    prompt: &mut (dyn FnMut(&str) + Send),
) -> Result<Option<BindingTable>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let calibrator = Arc::new(Calibrator::new(Arc::clone(&cancel)));

    // Arm every device with only the root callback bound. Devices that
    // refuse to open are skipped; calibration proceeds with the rest.
    let mut armed = 0;
    for device in devices {
        let mut listener = match KeycodeListener::open(device) {
            Ok(listener) => listener,
            Err(err) => {
                warn!("Skipping {device}: {err}");
                continue;
            }
        };
        let shared = Arc::clone(&calibrator);
        listener.set_root(Box::new(move |device, keycode, released| {
            shared.input(device, keycode, released);
        }));

        let stop = Arc::clone(&cancel);
        let name = device.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = listener.run(stop) {
                warn!("Calibration listener {name} stopped: {err}");
            }
        });
        armed += 1;
    }
    if armed == 0 {
        bail!("No usable input devices found for calibration");
    }
    info!("Calibrating against {armed} input devices");

    prompt(
        "Welcome to the keyboard calibrator!\n\
         Press any key in the next 3 seconds to cancel, or wait to continue.\n",
    );
    tokio::time::sleep(ARM_COUNTDOWN).await;
    if cancel.load(Ordering::SeqCst) {
        info!("Calibration cancelled by user");
        return Ok(None);
    }
    calibrator.set_ready();

    let stages: [(LogicalAction, &str); 3] = [
        (
            LogicalAction::Select,
            "Press any key to use to select a menu item.\n\
             If you have a touch screen or a fingerprint sensor, tap it!\n",
        ),
        (
            LogicalAction::Previous,
            "Press any key to use to navigate up in a menu.\n",
        ),
        (
            LogicalAction::Next,
            "Press any key to use to navigate down in a menu.\n",
        ),
    ];
    for (action, text) in stages {
        calibrator.arm(action);
        prompt(text);
        calibrator.wait_recorded().await;
    }

    prompt("Calibration complete!\nSaving calibration results...\n");
    let table = calibrator.take_table();
    let json =
        serde_json::to_string_pretty(&table).context("Failed to encode calibration results")?;
    std::fs::write(out_path, json)
        .with_context(|| format!("Failed to write calibration file: {}", out_path.display()))?;
    prompt(&format!("Saved results: {}\n", out_path.display()));

    // Wind the calibration listeners down; the binding phase opens its own.
    cancel.store(true, Ordering::SeqCst);
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn armed_calibrator() -> (Arc<Calibrator>, Arc<AtomicBool>) {
        let cancel = Arc::new(AtomicBool::new(false));
        let calibrator = Arc::new(Calibrator::new(Arc::clone(&cancel)));
        calibrator.set_ready();
        (calibrator, cancel)
    }

    fn recorded_count(calibrator: &Calibrator) -> usize {
        calibrator.lock().table.values().map(Vec::len).sum()
    }

    #[test]
    fn test_event_before_ready_cancels() {
        let cancel = Arc::new(AtomicBool::new(false));
        let calibrator = Calibrator::new(Arc::clone(&cancel));

        calibrator.input("/dev/input/event0", 28, false);
        assert!(cancel.load(Ordering::SeqCst));
        assert_eq!(recorded_count(&calibrator), 0);

        // Releases count as activity during the countdown too.
        let cancel = Arc::new(AtomicBool::new(false));
        let calibrator = Calibrator::new(Arc::clone(&cancel));
        calibrator.input("/dev/input/event0", 28, true);
        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_no_pending_stage_discards() {
        let (calibrator, cancel) = armed_calibrator();
        calibrator.input("/dev/input/event0", 28, false);
        assert_eq!(recorded_count(&calibrator), 0);
        assert!(!cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_release_events_never_record() {
        let (calibrator, _) = armed_calibrator();
        calibrator.arm(LogicalAction::Select);
        calibrator.input("/dev/input/event0", 28, true);
        assert_eq!(recorded_count(&calibrator), 0);
        assert!(calibrator.lock().pending.is_some());
    }

    #[test]
    fn test_first_press_wins_sequential() {
        let (calibrator, _) = armed_calibrator();
        calibrator.arm(LogicalAction::Select);
        calibrator.input("/dev/input/event0", 28, false);
        calibrator.input("/dev/input/event1", 57, false);

        let session = calibrator.lock();
        assert!(session.pending.is_none());
        let total: usize = session.table.values().map(Vec::len).sum();
        assert_eq!(total, 1);
        let recorded = &session.table["/dev/input/event0"][0];
        assert_eq!(recorded.keycode, 28);
        assert_eq!(recorded.action, LogicalAction::Select);
        assert!(!recorded.on_release);
    }

    #[test]
    fn test_first_press_wins_concurrent() {
        let (calibrator, _) = armed_calibrator();
        calibrator.arm(LogicalAction::Next);

        let mut handles = Vec::new();
        for keycode in 0..16u16 {
            let shared = Arc::clone(&calibrator);
            handles.push(thread::spawn(move || {
                shared.input(&format!("/dev/input/event{keycode}"), keycode, false);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorded_count(&calibrator), 1);
        assert!(calibrator.lock().pending.is_none());
    }

    #[test]
    fn test_three_stages_accumulate_per_device() {
        let (calibrator, _) = armed_calibrator();
        for (action, keycode) in [
            (LogicalAction::Select, 28u16),
            (LogicalAction::Previous, 103),
            (LogicalAction::Next, 108),
        ] {
            calibrator.arm(action);
            calibrator.input("/dev/input/event0", keycode, false);
        }

        let session = calibrator.lock();
        let slot = &session.table["/dev/input/event0"];
        assert_eq!(slot.len(), 3);
        assert_eq!(slot[0].action, LogicalAction::Select);
        assert_eq!(slot[1].action, LogicalAction::Previous);
        assert_eq!(slot[2].action, LogicalAction::Next);
    }

    #[tokio::test]
    async fn test_recorded_wakes_after_press() {
        let (calibrator, _) = armed_calibrator();
        calibrator.arm(LogicalAction::Select);

        let presser = Arc::clone(&calibrator);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            presser.input("/dev/input/event0", 28, false);
        });

        calibrator.wait_recorded().await;
        handle.join().unwrap();
        assert_eq!(recorded_count(&calibrator), 1);
    }

    #[tokio::test]
    async fn test_recorded_returns_immediately_when_satisfied() {
        let (calibrator, _) = armed_calibrator();
        calibrator.arm(LogicalAction::Select);
        calibrator.input("/dev/input/event0", 28, false);
        calibrator.wait_recorded().await;
    }

    #[tokio::test]
    async fn test_no_usable_devices_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("calibration.json");
        let mut prompts = Vec::new();
        let mut prompt = |text: &str| prompts.push(text.to_string());

        let result = run_calibration(&[], &out, &mut prompt).await;
        assert!(result.is_err());

        let ghost = dir.path().join("event-ghost").display().to_string();
        let result = run_calibration(&[ghost], &out, &mut prompt).await;
        assert!(result.is_err());
        assert!(!out.exists());
    }

    #[test]
    fn test_take_table_drains_session() {
        let (calibrator, _) = armed_calibrator();
        calibrator.arm(LogicalAction::Select);
        calibrator.input("/dev/input/event0", 28, false);

        let table = calibrator.take_table();
        assert_eq!(table.values().map(Vec::len).sum::<usize>(), 1);
        assert_eq!(recorded_count(&calibrator), 0);
    }
}
