//! Blocking keycode listener over evdev.
//!
//! One listener per device node. Callers register per-keycode callbacks
//! and/or a root callback that receives every key event unfiltered, then
//! hand the listener to a blocking task via [`KeycodeListener::run`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evdev::{Device, EventType};
use tracing::{debug, trace};

use crate::error::InputError;

/// Callback fired when a bound keycode matches.
pub type KeyCallback = Box<dyn Fn() + Send>;

/// Callback fired for every key event: `(device path, keycode, released)`.
pub type RootCallback = Box<dyn Fn(&str, u16, bool) + Send>;

struct Binding {
    keycode: u16,
    on_release: bool,
    callback: KeyCallback,
}

/// Reads key events from a single evdev node and dispatches to callbacks.
pub struct KeycodeListener {
    path: String,
    device: Device,
    bindings: Vec<Binding>,
    root: Option<RootCallback>,
}

impl KeycodeListener {
    /// Open a device node for listening.
    pub fn open(path: &str) -> Result<Self, InputError> {
        let device = Device::open(path).map_err(|source| InputError::OpenDevice {
            path: path.to_string(),
            source,
        })?;
        debug!(
            "Opened input device {} ({})",
            path,
            device.name().unwrap_or("unnamed")
        );
        Ok(Self {
            path: path.to_string(),
            device,
            bindings: Vec::new(),
            root: None,
        })
    }

    /// The device node path this listener reads from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fire `callback` whenever `keycode` is pressed, or released when
    /// `on_release` is set.
    pub fn bind(&mut self, keycode: u16, on_release: bool, callback: KeyCallback) {
        self.bindings.push(Binding {
            keycode,
            on_release,
            callback,
        });
    }

    /// Receive every key event, before binding dispatch.
    pub fn set_root(&mut self, callback: RootCallback) {
        self.root = Some(callback);
    }

    /// Block reading events until `stop` is set or the device goes away.
    ///
    /// Key autorepeat events are dropped; only presses and releases
    /// dispatch. The stop flag is checked between event batches, so a set
    /// flag takes effect on the next event the device delivers.
    pub fn run(mut self, stop: Arc<AtomicBool>) -> Result<(), InputError> {
        while !stop.load(Ordering::SeqCst) {
            let events: Vec<_> = self
                .device
                .fetch_events()
                .map_err(|source| InputError::ReadEvents {
                    path: self.path.clone(),
                    source,
                })?
                .collect();

            for event in events {
                if stop.load(Ordering::SeqCst) {
                    return Ok(());
                }
                if event.event_type() != EventType::KEY {
                    continue;
                }
                let released = match event.value() {
                    0 => true,
                    1 => false,
                    _ => continue,
                };
                trace!(
                    "{}: keycode {} {}",
                    self.path,
                    event.code(),
                    if released { "released" } else { "pressed" }
                );
                if let Some(root) = &self.root {
                    root(&self.path, event.code(), released);
                }
                for binding in &self.bindings {
                    if binding.keycode == event.code() && binding.on_release == released {
                        (binding.callback)();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DEFAULT_INPUT_DIR;

    #[test]
    fn test_open_missing_device() {
        let err = KeycodeListener::open("/dev/input/event-does-not-exist");
        assert!(matches!(err, Err(InputError::OpenDevice { .. })));
    }

    #[test]
    #[ignore] // Requires a real input device (run with: cargo test -- --ignored)
    fn test_open_first_event_device() {
        let devices =
            crate::discovery::list_event_devices(std::path::Path::new(DEFAULT_INPUT_DIR)).unwrap();
        if let Some(first) = devices.first() {
            let listener = KeycodeListener::open(first).unwrap();
            assert_eq!(listener.path(), first);
        }
    }
}
