//! Menu data model: items, item kinds, and menu nodes.

/// What selecting an item does.
///
/// Decided once at configuration load; the engine never dispatches on raw
/// kind strings. A kind string the loader does not recognize survives as
/// [`ItemKind::Unknown`] and is reported through the error node when the
/// user actually selects it, so a hand-edited config stays navigable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// Navigate to another menu node; the payload is its key.
    Navigate,
    /// Built-in action; the payload names it (`exit`).
    Internal,
    /// Run the payload as an external command. `done_msg` overrides the
    /// completion message shown afterwards.
    Execute { done_msg: Option<String> },
    /// Open the file browser at `start`; the payload is a program template
    /// applied to picked files, with `$?` marking the chosen path.
    Explorer { start: String },
    /// Hand the payload back through the pending return variable, then
    /// unwind out of the browsing chain.
    Return,
    /// Record `var` as the pending return target, then run the payload as a
    /// nested action.
    SetReturnVar { var: String },
    /// Informational row; a non-empty payload shows as a message.
    Note,
    /// Blank separation between rows; the payload is the line count.
    Divider,
    /// Unrecognized kind string, kept verbatim for the error report.
    Unknown(String),
}

impl ItemKind {
    /// Parse a config `type` string, e.g. `"menu"`, `"exec Flash done!"`,
    /// `"explorer /sdcard"`, `"setvar TWRP"`.
    ///
    /// Recognized-but-malformed kinds are errors (configuration-fatal at
    /// load time); an unrecognized leading token becomes [`ItemKind::Unknown`].
    pub fn parse(kind: &str) -> Result<ItemKind, String> {
        let mut parts = kind.splitn(2, ' ');
        let head = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();
        Ok(match head {
            "menu" => ItemKind::Navigate,
            "internal" => ItemKind::Internal,
            "exec" => ItemKind::Execute {
                done_msg: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "explorer" => ItemKind::Explorer {
                start: if rest.is_empty() { "/".to_string() } else { rest.to_string() },
            },
            "return" => ItemKind::Return,
            "setvar" => match rest.split_whitespace().next() {
                Some(var) => ItemKind::SetReturnVar {
                    var: var.to_string(),
                },
                None => return Err(format!("setvar item is missing a variable name: {kind:?}")),
            },
            "note" => ItemKind::Note,
            "divider" => ItemKind::Divider,
            _ => ItemKind::Unknown(kind.to_string()),
        })
    }
}

/// One selectable (or decorative) row of a menu node.
#[derive(Debug, Clone)]
pub struct MenuItem {
    /// Display text, subject to variable substitution at render time.
    pub name: String,
    pub kind: ItemKind,
    /// Action payload, interpreted per kind after variable substitution.
    pub action: String,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, kind: ItemKind, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            action: action.into(),
        }
    }

    pub fn is_divider(&self) -> bool {
        self.kind == ItemKind::Divider
    }
}

/// A single menu node: a titled, ordered list of items.
#[derive(Debug, Clone, Default)]
pub struct MenuList {
    pub title: String,
    pub items: Vec<MenuItem>,
}

impl MenuList {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    /// Append an item to the node.
    pub fn push(&mut self, name: impl Into<String>, kind: ItemKind, action: impl Into<String>) {
        self.items.push(MenuItem::new(name, kind, action));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_kinds() {
        assert_eq!(ItemKind::parse("menu").unwrap(), ItemKind::Navigate);
        assert_eq!(ItemKind::parse("internal").unwrap(), ItemKind::Internal);
        assert_eq!(ItemKind::parse("return").unwrap(), ItemKind::Return);
        assert_eq!(ItemKind::parse("note").unwrap(), ItemKind::Note);
        assert_eq!(ItemKind::parse("divider").unwrap(), ItemKind::Divider);
    }

    #[test]
    fn test_parse_exec_message() {
        assert_eq!(
            ItemKind::parse("exec").unwrap(),
            ItemKind::Execute { done_msg: None }
        );
        assert_eq!(
            ItemKind::parse("exec Flash complete!").unwrap(),
            ItemKind::Execute {
                done_msg: Some("Flash complete!".to_string())
            }
        );
    }

    #[test]
    fn test_parse_explorer_start() {
        assert_eq!(
            ItemKind::parse("explorer").unwrap(),
            ItemKind::Explorer {
                start: "/".to_string()
            }
        );
        assert_eq!(
            ItemKind::parse("explorer /sdcard/My Files").unwrap(),
            ItemKind::Explorer {
                start: "/sdcard/My Files".to_string()
            }
        );
    }

    #[test]
    fn test_parse_setvar() {
        assert_eq!(
            ItemKind::parse("setvar TWRP").unwrap(),
            ItemKind::SetReturnVar {
                var: "TWRP".to_string()
            }
        );
        assert!(ItemKind::parse("setvar").is_err());
        assert!(ItemKind::parse("setvar   ").is_err());
    }

    #[test]
    fn test_parse_unknown_is_recoverable() {
        assert_eq!(
            ItemKind::parse("checkbox opts").unwrap(),
            ItemKind::Unknown("checkbox opts".to_string())
        );
    }
}
