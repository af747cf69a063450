//! CLI definitions using clap

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "recmenu")]
#[command(author, version, about = "Text-mode recovery menu for embedded Linux")]
pub struct Cli {
    /// Path to the menu configuration
    #[arg(long, value_name = "FILE", default_value = "/etc/recmenu/menu.json")]
    pub menu: PathBuf,

    /// Path to the key calibration table, generated on first run if missing
    #[arg(
        long,
        value_name = "FILE",
        default_value = "/etc/recmenu/calibration.json"
    )]
    pub calibration: PathBuf,

    /// Vertical lines available to the virtual screen (<= 0: unlimited)
    #[arg(long, default_value_t = 0)]
    pub v_lines: i32,

    /// Root directory of menu assets, exported as $WORKINGDIR
    #[arg(long, value_name = "DIR", default_value = "/")]
    pub working_dir: String,

    /// Directory scanned for raw input devices
    #[arg(long, value_name = "DIR", default_value = recmenu_input::DEFAULT_INPUT_DIR)]
    pub input_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
