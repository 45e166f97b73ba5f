use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "docextract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the application config directory
/// `$XDG_CONFIG_HOME/docextract` on Linux, the platform equivalent elsewhere.
/// Falls back to the working directory when no config dir can be determined.
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the extractor configuration file.
pub fn default_config_path() -> PathBuf {
    app_config_dir().join(CONFIG_FILE_NAME)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter(debug: bool) -> String {
    if debug {
        format!("{APP_NAME}=debug,warn")
    } else {
        format!("{APP_NAME}=info,warn")
    }
}
