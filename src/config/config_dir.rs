use std::path::{Path, PathBuf};

use super::error::{ConfigError, ConfigResult};

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV: &str = "TIEUHOC_CONFIG";

const LOCAL_CONFIG: &str = "./config.toml";

/// Picks the configuration file: `$TIEUHOC_CONFIG` when set, then the working
/// directory for local runs, then `$HOME/.config/tieuhoc/config.toml`.
pub fn find_config_file(use_local: bool) -> PathBuf {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(explicit);
    }
    if use_local {
        return PathBuf::from(LOCAL_CONFIG);
    }

    std::env::var_os("HOME")
        .map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join(crate::APPLICATION_NAME)
                .join("config.toml")
        })
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG))
}

pub fn read_config(use_local: bool) -> ConfigResult<Vec<u8>> {
    read_config_from(&find_config_file(use_local))
}

fn read_config_from(filename: &Path) -> ConfigResult<Vec<u8>> {
    if !filename.exists() {
        tracing::debug!("no configuration at {}", filename.display());
        return Err(ConfigError::ConfigNotFound);
    }

    let filename = filename.canonicalize()?;
    tracing::debug!("using {} as configuration file", filename.display());
    Ok(std::fs::read(filename)?)
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn local_runs_use_working_directory() {
        if std::env::var_os(CONFIG_ENV).is_none() {
            assert_eq!(find_config_file(true), PathBuf::from(LOCAL_CONFIG));
        }
    }

    #[test]
    fn reads_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("config.toml");
        fs::write(&file_path, b"[host]\nbindto = '0.0.0.0:5000'").unwrap();

        let bytes = read_config_from(&file_path).unwrap();
        assert!(bytes.starts_with(b"[host]"));
    }

    #[test]
    fn missing_file_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join(crate::APPLICATION_NAME).join("config.toml");

        assert!(matches!(read_config_from(&file_path), Err(ConfigError::ConfigNotFound)));
    }
}
