//! Platform path resolution for data, keystore and configuration files

use std::path::PathBuf;

const APP_DIR: &str = "epic_crm";

fn base_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Directory holding the embedded databases
pub fn default_data_dir() -> PathBuf {
    base_data_dir().join(APP_DIR).join("data")
}

/// Directory holding file-backed keystore entries
pub fn default_keystore_dir() -> PathBuf {
    base_data_dir().join(APP_DIR).join("keystore")
}

/// Default location of `config.toml`
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(base_data_dir)
        .join(APP_DIR)
        .join("config.toml")
}
