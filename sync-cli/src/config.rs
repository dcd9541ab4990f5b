//! Settings file location and loading for the CLI.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use sync_core::Settings;

/// File name of the settings file inside the config directory.
pub const CONFIG_FILE: &str = "peersync.toml";

/// `<config dir>/peersync/peersync.toml` for the current user.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "peersync", "peersync")
        .context("Could not determine home directory")?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}

/// Default sync root: `~/sync_folder`.
pub fn default_local_dir() -> Result<PathBuf> {
    let dirs = directories::UserDirs::new().context("Could not determine home directory")?;
    Ok(dirs.home_dir().join("sync_folder"))
}

/// Defaults for a fresh settings file at `config_path`.
///
/// Certificate paths point next to the settings file.
pub fn default_settings(config_path: &Path, local_dir: PathBuf) -> Settings {
    let mut settings = Settings::new(local_dir);
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    settings.certs.cert = base.join("local.crt");
    settings.certs.key = base.join("local.key");
    settings.certs.peer_cert = base.join("peer.crt");
    settings
}

/// Read the settings file without checking it, for editing.
pub fn load_raw(config_path: &Path) -> Result<Settings> {
    if !config_path.exists() {
        anyhow::bail!(
            "No settings at {}. Run 'peersync init' first.",
            config_path.display()
        );
    }
    Settings::from_file(config_path).context("Invalid settings file")
}

/// Read and validate the settings file.
pub fn load(config_path: &Path) -> Result<Settings> {
    let settings = load_raw(config_path)?;
    settings
        .validate()
        .with_context(|| format!("Invalid settings in {}", config_path.display()))?;
    Ok(settings)
}

/// Make `path` absolute against the current directory.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    Ok(cwd.join(path))
}
