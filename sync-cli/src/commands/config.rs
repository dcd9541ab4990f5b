//! Show and edit the settings file.

use anyhow::Result;
use std::path::Path;
use sync_core::Settings;

use crate::config::{absolute, default_local_dir, default_settings, load_raw};

/// Print the settings file as TOML.
pub fn show(config_path: &Path) -> Result<()> {
    let settings = load_raw(config_path)?;
    println!("# {}", config_path.display());
    print!("{}", settings.to_toml_string()?);
    Ok(())
}

/// Change the sync root.
pub fn set_dir(config_path: &Path, dir: &Path) -> Result<()> {
    edit(config_path, |s| {
        s.local_dir = absolute(dir)?;
        println!("Sync dir set to {}", s.local_dir.display());
        Ok(())
    })
}

/// Change the peer endpoint.
pub fn set_peer(config_path: &Path, host: &str, port: u16) -> Result<()> {
    if host.trim().is_empty() {
        anyhow::bail!("Peer host must not be empty");
    }
    edit(config_path, |s| {
        s.peer.host = host.to_string();
        s.peer.port = port;
        println!("Peer set to {}", s.peer_address());
        Ok(())
    })
}

/// Change the certificate paths.
pub fn set_certs(config_path: &Path, cert: &Path, key: &Path, peer_cert: &Path) -> Result<()> {
    edit(config_path, |s| {
        s.certs.cert = absolute(cert)?;
        s.certs.key = absolute(key)?;
        s.certs.peer_cert = absolute(peer_cert)?;
        println!("Certificates set:");
        println!("  cert:      {}", s.certs.cert.display());
        println!("  key:       {}", s.certs.key.display());
        println!("  peer_cert: {}", s.certs.peer_cert.display());
        Ok(())
    })
}

/// Overwrite the settings file with defaults.
pub fn reset(config_path: &Path) -> Result<()> {
    default_settings(config_path, default_local_dir()?).save(config_path)?;
    println!("Settings reset to defaults at {}", config_path.display());
    Ok(())
}

fn edit(config_path: &Path, change: impl FnOnce(&mut Settings) -> Result<()>) -> Result<()> {
    let mut settings = load_raw(config_path)?;
    change(&mut settings)?;
    settings.save(config_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn initialized() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("peersync.toml");
        init::run(&path, Some(Path::new("/data")), false).unwrap();
        (dir, path)
    }

    #[test]
    fn set_peer_updates_file() {
        let (_dir, path) = initialized();
        set_peer(&path, "10.0.0.7", 6000).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.peer_address(), "10.0.0.7:6000");
        assert_eq!(settings.local_dir, PathBuf::from("/data"));
    }

    #[test]
    fn set_peer_rejects_empty_host() {
        let (_dir, path) = initialized();
        assert!(set_peer(&path, "  ", 6000).is_err());
    }

    #[test]
    fn set_dir_and_certs_store_absolute_paths() {
        let (_dir, path) = initialized();
        set_dir(&path, Path::new("relative/root")).unwrap();
        set_certs(&path, Path::new("a.crt"), Path::new("/k/a.key"), Path::new("b.crt")).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert!(settings.local_dir.is_absolute());
        assert!(settings.local_dir.ends_with("relative/root"));
        assert!(settings.certs.cert.is_absolute());
        assert_eq!(settings.certs.key, PathBuf::from("/k/a.key"));
    }

    #[test]
    fn edit_without_init_fails() {
        let dir = tempdir().unwrap();
        let err = set_peer(&dir.path().join("none.toml"), "h", 1).unwrap_err();
        assert!(err.to_string().contains("peersync init"));
    }
}
