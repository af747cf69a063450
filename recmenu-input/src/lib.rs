//! Raw input device access for recmenu.
//!
//! Wraps kernel evdev nodes behind a small listener surface: discovery of
//! `/dev/input/event*` nodes, per-keycode callback bindings, and an
//! unfiltered root callback used by the key calibrator.

pub mod discovery;
pub mod error;
pub mod listener;

pub use discovery::{list_event_devices, DEFAULT_INPUT_DIR};
pub use error::InputError;
pub use listener::{KeyCallback, KeycodeListener, RootCallback};
