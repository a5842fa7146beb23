// SmartMarks paths on Windows
// Config: %APPDATA%\SmartMarks (roaming)
// Data:   %LOCALAPPDATA%\SmartMarks

use std::env;
use std::path::PathBuf;

fn known_folder(var: &str) -> PathBuf {
    env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}

pub fn get_config_dir() -> PathBuf {
    known_folder("APPDATA").join("SmartMarks")
}

pub fn get_data_dir() -> PathBuf {
    known_folder("LOCALAPPDATA").join("SmartMarks")
}
