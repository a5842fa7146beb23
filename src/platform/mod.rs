// SmartMarks platform paths
// Selects the per-OS config and data directories at compile time.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as os;
#[cfg(target_os = "macos")]
use macos as os;
#[cfg(target_os = "windows")]
use windows as os;

/// Directory holding `settings.json`.
///
/// - **Linux**: `$XDG_CONFIG_HOME/smartmarks` or `~/.config/smartmarks`
/// - **macOS**: `~/Library/Application Support/SmartMarks`
/// - **Windows**: `%APPDATA%\SmartMarks`
pub fn get_config_dir() -> PathBuf {
    os::get_config_dir()
}

/// Directory holding the local bookmark database and the sealed hosted session.
///
/// - **Linux**: `$XDG_DATA_HOME/smartmarks` or `~/.local/share/smartmarks`
/// - **macOS**: `~/Library/Application Support/SmartMarks/data`
/// - **Windows**: `%LOCALAPPDATA%\SmartMarks`
pub fn get_data_dir() -> PathBuf {
    os::get_data_dir()
}
