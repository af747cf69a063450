//! Menu configuration loading.
//!
//! A single JSON document supplies environment defaults, the named menu
//! nodes, the home menu key, and a deprecated embedded keyboard-binding
//! section kept for installations that predate the calibrator. Everything
//! structural (kind strings, the home reference, reserved keys) is
//! validated here at load time, so the engine never starts on a config it
//! cannot honor.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::bindings::BindingTable;
use crate::engine::RESERVED_MENU_PREFIX;
use crate::menu::{ItemKind, MenuItem, MenuList};

#[derive(Debug, Clone, Deserialize)]
pub struct RawMenuItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMenuList {
    pub title: String,
    #[serde(default)]
    pub items: Vec<RawMenuItem>,
}

/// The parsed configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuConfig {
    #[serde(default)]
    pub environment: HashMap<String, String>,
    pub home_menu: String,
    pub menus: HashMap<String, RawMenuList>,
    /// Deprecated: embedded per-device bindings, superseded by (and merged
    /// beneath) the calibrator's table.
    #[serde(default)]
    pub keyboards: BindingTable,
}

impl MenuConfig {
    /// Load and validate a configuration file. Any failure here is
    /// configuration-fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.menus.contains_key(&self.home_menu) {
            bail!("Home menu {:?} is not defined", self.home_menu);
        }
        for key in self.menus.keys() {
            if key.starts_with(RESERVED_MENU_PREFIX) {
                bail!("Menu key {key:?} uses the reserved {RESERVED_MENU_PREFIX:?} prefix");
            }
        }
        Ok(())
    }

    /// Convert the raw menu section into engine nodes, parsing every item's
    /// kind string eagerly.
    pub fn build_menus(&self) -> Result<HashMap<String, MenuList>> {
        let mut menus = HashMap::new();
        for (key, raw) in &self.menus {
            let mut list = MenuList::new(&raw.title);
            for item in &raw.items {
                let kind = ItemKind::parse(&item.kind)
                    .map_err(|err| anyhow!("Menu {key:?}, item {:?}: {err}", item.name))?;
                list.items.push(MenuItem::new(&item.name, kind, &item.action));
            }
            menus.insert(key.clone(), list);
        }
        Ok(menus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::LogicalAction;

    const SAMPLE: &str = r#"{
        "environment": {"TWRP": ""},
        "homeMenu": "home",
        "menus": {
            "home": {
                "title": "Recovery Toolbox",
                "items": [
                    {"name": "Install", "type": "menu", "action": "install"},
                    {"name": "", "type": "divider", "action": "1"},
                    {"name": "Exit", "type": "internal", "action": "exit"}
                ]
            },
            "install": {
                "title": "Installer",
                "items": [
                    {"name": "Pick image", "type": "setvar TWRP", "action": "explorer /sdcard"},
                    {"name": "Flash", "type": "exec Flashed!", "action": "installer --twrp $TWRP"}
                ]
            }
        },
        "keyboards": {
            "/dev/input/event0": [
                {"keycode": 103, "action": "prevItem"},
                {"keycode": 108, "action": "nextItem"},
                {"keycode": 28, "action": "selectItem"}
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = MenuConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.home_menu, "home");
        assert_eq!(config.environment["TWRP"], "");
        assert_eq!(config.menus.len(), 2);
        assert_eq!(config.keyboards["/dev/input/event0"].len(), 3);
        assert_eq!(
            config.keyboards["/dev/input/event0"][2].action,
            LogicalAction::Select
        );
    }

    #[test]
    fn test_build_menus_parses_kinds() {
        let config = MenuConfig::from_json(SAMPLE).unwrap();
        let menus = config.build_menus().unwrap();

        let home = &menus["home"];
        assert_eq!(home.title, "Recovery Toolbox");
        assert_eq!(home.items[0].kind, ItemKind::Navigate);
        assert_eq!(home.items[1].kind, ItemKind::Divider);
        assert_eq!(home.items[2].kind, ItemKind::Internal);

        let install = &menus["install"];
        assert_eq!(
            install.items[0].kind,
            ItemKind::SetReturnVar {
                var: "TWRP".to_string()
            }
        );
        assert_eq!(
            install.items[1].kind,
            ItemKind::Execute {
                done_msg: Some("Flashed!".to_string())
            }
        );
    }

    #[test]
    fn test_missing_sections_default() {
        let config = MenuConfig::from_json(
            r#"{"homeMenu": "home", "menus": {"home": {"title": "Home"}}}"#,
        )
        .unwrap();
        assert!(config.environment.is_empty());
        assert!(config.keyboards.is_empty());
        assert!(config.menus["home"].items.is_empty());
    }

    #[test]
    fn test_undefined_home_menu_rejected() {
        let err = MenuConfig::from_json(
            r#"{"homeMenu": "missing", "menus": {"home": {"title": "Home"}}}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_reserved_key_rejected() {
        let err = MenuConfig::from_json(
            r#"{"homeMenu": "home", "menus": {
                "home": {"title": "Home"},
                "INTERNAL_ERROR_TEXT": {"title": "Trap"}
            }}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_malformed_setvar_fails_build() {
        let config = MenuConfig::from_json(
            r#"{"homeMenu": "home", "menus": {"home": {"title": "Home", "items": [
                {"name": "Broken", "type": "setvar", "action": "explorer /"}
            ]}}}"#,
        )
        .unwrap();
        assert!(config.build_menus().is_err());
    }

    #[test]
    fn test_unrecognized_kind_survives_load() {
        let config = MenuConfig::from_json(
            r#"{"homeMenu": "home", "menus": {"home": {"title": "Home", "items": [
                {"name": "Odd", "type": "checkbox", "action": "a,b"}
            ]}}}"#,
        )
        .unwrap();
        let menus = config.build_menus().unwrap();
        assert_eq!(
            menus["home"].items[0].kind,
            ItemKind::Unknown("checkbox".to_string())
        );
    }

    #[test]
    fn test_unknown_binding_action_rejected() {
        let err = MenuConfig::from_json(
            r#"{"homeMenu": "home", "menus": {"home": {"title": "Home"}},
                "keyboards": {"kb": [{"keycode": 1, "action": "warpItem"}]}}"#,
        );
        assert!(err.is_err());
    }
}
