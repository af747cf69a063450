//! Menu navigation engine.
//!
//! Owns the menu graph and all navigation state: the loaded node, the item
//! cursor, the parallel menu/cursor history stacks, and the environment used
//! for `$NAME` substitution. Every mutating operation ends by pushing
//! exactly one freshly computed frame to the render sink.

use std::collections::HashMap;

use tracing::debug;

use crate::menu::{ItemKind, MenuItem, MenuList};

/// Menu keys starting with this prefix are reserved for engine internals.
pub const RESERVED_MENU_PREFIX: &str = "INTERNAL";

/// Key of the single node reused for every error / message display.
pub const ERROR_MENU_KEY: &str = "INTERNAL_ERROR_TEXT";

/// Titles of generated file-browser nodes start with this; the return
/// action unwinds history while it keeps seeing them.
pub const EXPLORER_TITLE_PREFIX: &str = "Explorer";

/// Completion message shown after an external command unless the item
/// overrides it.
pub const DEFAULT_DONE_MSG: &str = "Task finished successfully!";

/// Receives every rendered frame.
pub type RenderSink = Box<dyn FnMut(&str) + Send>;

/// Follow-up work a select dispatch hands back to the caller.
///
/// Process exits and external-command launches happen outside the engine so
/// they never run under the engine mutex.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    /// Nothing further; the engine already applied the action.
    Continue,
    /// Run an external command while the engine stays locked, then report
    /// completion through [`MenuEngine::exec_finished`].
    Exec {
        cmdline: Vec<String>,
        done_msg: String,
    },
    /// Terminate the process with this status.
    Exit(i32),
}

/// The menu graph plus all navigation state, driving a caller-supplied
/// render sink.
pub struct MenuEngine {
    menus: HashMap<String, MenuList>,
    home_menu: String,
    loaded_menu: String,
    menu_history: Vec<String>,
    item_history: Vec<i32>,
    environment: HashMap<String, String>,
    item_cursor: i32,
    locked: bool,
    return_var: Option<String>,
    sink: RenderSink,
}

impl MenuEngine {
    pub fn new(sink: RenderSink) -> Self {
        Self {
            menus: HashMap::new(),
            home_menu: String::new(),
            loaded_menu: String::new(),
            menu_history: Vec::new(),
            item_history: Vec::new(),
            environment: HashMap::new(),
            item_cursor: 0,
            locked: false,
            return_var: None,
            sink,
        }
    }

    /// Insert or replace a menu node.
    pub fn add_menu(&mut self, key: impl Into<String>, menu: MenuList) {
        self.menus.insert(key.into(), menu);
    }

    pub fn remove_menu(&mut self, key: &str) {
        self.menus.remove(key);
    }

    pub fn set_home_menu(&mut self, key: impl Into<String>) {
        self.home_menu = key.into();
    }

    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.environment.insert(name.into(), value.into());
    }

    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment.get(name).map(String::as_str)
    }

    pub fn loaded_menu(&self) -> &str {
        &self.loaded_menu
    }

    pub fn cursor(&self) -> i32 {
        self.item_cursor
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Depth of the navigation history. The menu and cursor stacks move in
    /// lockstep; this asserts the invariant on every read.
    pub fn history_depth(&self) -> usize {
        debug_assert_eq!(self.menu_history.len(), self.item_history.len());
        self.menu_history.len()
    }

    fn back_visible(&self) -> bool {
        !self.menu_history.is_empty()
    }

    fn current_menu(&self) -> Option<&MenuList> {
        self.menus.get(&self.loaded_menu)
    }

    fn current_item(&self) -> Option<&MenuItem> {
        if self.item_cursor < 0 {
            return None;
        }
        self.current_menu()?.items.get(self.item_cursor as usize)
    }

    /// Enter the home menu. The first call renders the initial frame.
    pub fn home(&mut self) {
        let home = self.home_menu.clone();
        self.change_menu(&home);
    }

    /// Navigate to `key`, pushing the current position onto history.
    ///
    /// An unknown key lands on the error node instead; the engine stays
    /// interactive.
    pub fn change_menu(&mut self, key: &str) {
        if !self.menus.contains_key(key) {
            self.error_text(&format!("Unknown menu: {key}"));
            return;
        }

        if !self.loaded_menu.is_empty() {
            self.menu_history.push(std::mem::take(&mut self.loaded_menu));
            self.item_history.push(self.item_cursor);
        }

        self.loaded_menu = key.to_string();
        self.item_cursor = if self.back_visible() { -1 } else { 0 };
        debug!("Loaded menu {key}");
        self.render();
    }

    /// Return to the previous menu in history, restoring its cursor.
    ///
    /// A popped key that no longer exists is recoverable: the current
    /// position is pushed back so the error node offers a way home. A
    /// restored cursor beyond the menu's item count (the node may have been
    /// regenerated smaller, e.g. by the explorer) clamps to 0.
    pub fn prev_menu(&mut self) {
        let (key, cursor) = match (self.menu_history.pop(), self.item_history.pop()) {
            (Some(key), Some(cursor)) => (key, cursor),
            _ => {
                self.render();
                return;
            }
        };

        if !self.menus.contains_key(&key) {
            self.menu_history.push(self.loaded_menu.clone());
            self.item_history.push(self.item_cursor);
            self.error_text(&format!("Unknown menu: {key}"));
            return;
        }

        let count = self.menus.get(&key).map_or(0, |m| m.items.len() as i32);
        self.item_cursor = if cursor >= count { 0 } else { cursor };
        self.loaded_menu = key;
        self.render();
    }

    /// Move the cursor to the previous selectable row, wrapping circularly.
    pub fn prev_item(&mut self) {
        if self.locked {
            return;
        }
        self.step_cursor(false);
        self.render();
    }

    /// Move the cursor to the next selectable row, wrapping circularly.
    pub fn next_item(&mut self) {
        if self.locked {
            return;
        }
        self.step_cursor(true);
        self.render();
    }

    /// One cursor step, skipping dividers. The wrap passes through the
    /// synthetic back row (-1) whenever history is non-empty. Bounded to a
    /// single full cycle so an all-divider menu terminates with the cursor
    /// back where it started.
    fn step_cursor(&mut self, forward: bool) {
        let count = self.current_menu().map_or(0, |m| m.items.len() as i32);
        let back = self.back_visible();
        let positions = count + i32::from(back);
        if positions == 0 {
            return;
        }

        let start = self.item_cursor;
        for _ in 0..positions {
            self.item_cursor = if forward {
                if self.item_cursor + 1 >= count {
                    if back {
                        -1
                    } else {
                        0
                    }
                } else {
                    self.item_cursor + 1
                }
            } else {
                match self.item_cursor {
                    -1 => count - 1,
                    0 if !back => count - 1,
                    0 => -1,
                    cursor => cursor - 1,
                }
            };

            let on_divider = self.current_item().map_or(false, MenuItem::is_divider);
            if !on_divider {
                return;
            }
        }
        self.item_cursor = start;
    }

    /// Activate the selected row.
    ///
    /// Navigation effects apply immediately; process-level effects (exit,
    /// external commands) come back as [`Flow`] for the caller to perform
    /// outside the engine.
    pub fn action(&mut self) -> Flow {
        if self.locked {
            return Flow::Continue;
        }
        if self.item_cursor == -1 {
            self.prev_menu();
            return Flow::Continue;
        }
        let Some(item) = self.current_item().cloned() else {
            return Flow::Continue;
        };
        let payload = self.substitute(&item.action);

        match item.kind {
            ItemKind::Navigate => self.change_menu(&payload),
            ItemKind::Internal => match payload.as_str() {
                "exit" => return Flow::Exit(0),
                _ => self.error_text(&format!("Unknown internal action: {payload}")),
            },
            ItemKind::Execute { done_msg } => {
                let cmdline: Vec<String> =
                    payload.split_whitespace().map(str::to_string).collect();
                if cmdline.is_empty() {
                    self.error_text("Nothing to execute");
                    return Flow::Continue;
                }
                self.locked = true;
                return Flow::Exec {
                    cmdline,
                    done_msg: done_msg.unwrap_or_else(|| DEFAULT_DONE_MSG.to_string()),
                };
            }
            ItemKind::Explorer { start } => {
                let start = self.substitute(&start);
                self.explore(&start, &payload);
            }
            ItemKind::Return => {
                if let Some(var) = self.return_var.take() {
                    self.environment.insert(var, payload);
                }
                self.prev_menu();
                // A file pick unwinds the whole browsing chain, not one level.
                while self.back_visible()
                    && self
                        .current_menu()
                        .map_or(false, |m| m.title.starts_with(EXPLORER_TITLE_PREFIX))
                {
                    self.prev_menu();
                }
            }
            ItemKind::SetReturnVar { var } => {
                let mut parts = payload.splitn(2, ' ');
                let head = parts.next().unwrap_or("");
                if head == "explorer" {
                    self.return_var = Some(var);
                    let start = parts.next().unwrap_or("").trim();
                    let start = if start.is_empty() { "/" } else { start };
                    self.explore(start, "");
                } else {
                    self.return_var = Some(var.clone());
                    self.error_text(&format!("Unknown action for var {var}: {payload}"));
                }
            }
            ItemKind::Note => {
                if !payload.is_empty() {
                    self.error_text(&payload);
                }
            }
            ItemKind::Divider => {}
            ItemKind::Unknown(kind) => {
                self.error_text(&format!("Unknown action: {kind}:{payload}"));
            }
        }
        Flow::Continue
    }

    /// Called after an [`Flow::Exec`] child finished successfully: releases
    /// the navigation lock and shows the completion message.
    pub fn exec_finished(&mut self, done_msg: &str) {
        self.locked = false;
        self.error_text(done_msg);
    }

    /// Show a message through the reserved error node and navigate to it.
    pub fn error_text(&mut self, message: &str) {
        self.menus
            .insert(ERROR_MENU_KEY.to_string(), MenuList::new(message));
        self.change_menu(ERROR_MENU_KEY);
    }

    /// Replace every `$NAME` with the environment value for `NAME`.
    ///
    /// Names are maximal runs of `[A-Za-z0-9_]`; unset names stay literal,
    /// as does a `$` followed by a non-name character (so `$?` program
    /// templates survive).
    pub fn substitute(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let name_len = after
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            if name_len > 0 {
                let name = &after[..name_len];
                match self.environment.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push_str(name);
                    }
                }
            } else {
                out.push('$');
            }
            rest = &after[name_len..];
        }
        out.push_str(rest);
        out
    }

    /// Compute the full textual frame for the current state.
    pub fn frame(&self) -> String {
        let Some(menu) = self.current_menu() else {
            return String::new();
        };

        let mut frame = String::new();
        frame.push_str("- ");
        frame.push_str(&menu.title);
        frame.push_str("\n\n\n");

        if self.back_visible() {
            if self.item_cursor == -1 {
                frame.push_str("   --> Go back\n");
            } else {
                frame.push_str("      Go back\n");
            }
            frame.push('\n');
        }

        for (index, item) in menu.items.iter().enumerate() {
            if item.is_divider() {
                let blanks = item.action.parse::<usize>().unwrap_or(1);
                for _ in 0..blanks {
                    frame.push('\n');
                }
                continue;
            }
            if self.item_cursor == index as i32 {
                frame.push_str("   --> ");
            } else {
                frame.push_str("      ");
            }
            frame.push_str(&item.name);
            frame.push('\n');
        }

        self.substitute(&frame)
    }

    fn render(&mut self) {
        let frame = self.frame();
        (self.sink)(&frame);
    }
}
