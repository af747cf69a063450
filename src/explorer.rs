//! Filesystem-browser node generation.
//!
//! Every visit synthesizes a fresh node keyed by the directory path, so a
//! revisit replaces the previous listing instead of going stale. Filesystem
//! failures become note rows; the browser itself never fails.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::engine::{MenuEngine, EXPLORER_TITLE_PREFIX};
use crate::menu::{ItemKind, MenuList};

impl MenuEngine {
    /// Generate a browser node for `dir` and navigate into it.
    ///
    /// `program` is the command template applied to picked files, with `$?`
    /// marking the chosen path; when empty, picking a file produces a
    /// return action carrying the path instead.
    pub fn explore(&mut self, dir: &str, program: &str) {
        let dir = normalize_dir(dir);
        let node = build_listing(&dir, program);
        debug!("Explorer node for {} with {} rows", dir, node.items.len());
        self.add_menu(dir.clone(), node);
        self.change_menu(&dir);
    }
}

/// Directory paths are keyed and joined with a trailing slash.
fn normalize_dir(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    }
}

fn title_for(dir: &str, program: &str) -> String {
    if program.is_empty() {
        format!("{EXPLORER_TITLE_PREFIX} - {dir}")
    } else {
        format!("{EXPLORER_TITLE_PREFIX} - {}", program.replace("$?", dir))
    }
}

/// Build the menu node for one directory listing.
pub fn build_listing(dir: &str, program: &str) -> MenuList {
    let mut node = MenuList::new(title_for(dir, program));
    let path = Path::new(dir);

    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            node.push(format!("Path {dir} does not exist!"), ItemKind::Note, "");
            return node;
        }
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            node.push(format!("Path {dir} is not accessible!"), ItemKind::Note, "");
            return node;
        }
        Err(err) => {
            node.push(
                format!("Path {dir} has unknown errors!"),
                ItemKind::Note,
                err.to_string(),
            );
            return node;
        }
    };

    if !meta.is_dir() {
        node.push(format!("Path {dir} is not a directory!"), ItemKind::Note, "");
        return node;
    }

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            node.push(
                format!("Path {dir} has unreadable file contents!"),
                ItemKind::Note,
                err.to_string(),
            );
            return node;
        }
    };

    // Entries whose own stat fails are dropped from the listing.
    let mut listing: Vec<(String, bool)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let meta = fs::metadata(entry.path()).ok()?;
            Some((name, meta.is_dir()))
        })
        .collect();
    listing.sort();

    for (name, is_dir) in listing {
        let joined = format!("{dir}{name}");
        if is_dir {
            node.push(
                format!("{name}/"),
                ItemKind::Explorer {
                    start: format!("{joined}/"),
                },
                program,
            );
        } else if program.is_empty() {
            node.push(name, ItemKind::Return, joined);
        } else {
            node.push(
                name,
                ItemKind::Execute { done_msg: None },
                program.replace("$?", &joined),
            );
        }
    }
    node
}
