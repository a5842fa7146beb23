// SmartMarks paths on Linux, following the XDG base directory layout.

use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "smartmarks";

fn home() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Resolves an XDG directory: the variable when set and absolute, otherwise
/// `fallback` under the home directory.
fn xdg_dir(var: Option<String>, home: &Path, fallback: &[&str]) -> PathBuf {
    match var.filter(|v| Path::new(v).is_absolute()) {
        Some(dir) => PathBuf::from(dir).join(APP_DIR),
        None => fallback
            .iter()
            .fold(home.to_path_buf(), |path, part| path.join(part))
            .join(APP_DIR),
    }
}

pub fn get_config_dir() -> PathBuf {
    xdg_dir(env::var("XDG_CONFIG_HOME").ok(), &home(), &[".config"])
}

pub fn get_data_dir() -> PathBuf {
    xdg_dir(env::var("XDG_DATA_HOME").ok(), &home(), &[".local", "share"])
}
