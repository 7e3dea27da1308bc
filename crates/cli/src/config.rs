//! Settings and kubeconfig discovery for the CLI

use anyhow::{Context, Result};
use gateway_lib::Settings;
use std::path::{Path, PathBuf};

/// Default settings file, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("gwenv").join("config.toml"))
}

/// Resolve the settings file: explicit path first, then the default location
///
/// The default file is optional; an explicit path must exist.
pub fn config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }
    default_config_path().filter(|path| path.exists())
}

/// Load settings from the resolved file plus `GWENV_*` overrides
pub fn load_settings(override_path: Option<&Path>) -> Result<Settings> {
    let path = config_path(override_path);
    Settings::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Failed to load settings from {}", path.display()),
        None => "Failed to load settings from the environment".to_string(),
    })
}

/// Get kubeconfig path
///
/// `None` means no file was found and in-cluster configuration should be
/// tried instead.
pub fn kubeconfig_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("KUBECONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs_next::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_config_path_wins() {
        let path = Path::new("/tmp/gwenv-test.toml");
        assert_eq!(config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_explicit_kubeconfig_wins() {
        let path = Path::new("/tmp/kubeconfig");
        assert_eq!(kubeconfig_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "pod_port = 4600\ntotal_ingestion_rate = 500.0").unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.pod_port, 4600);
        assert_eq!(settings.total_ingestion_rate, 500.0);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_settings(Some(Path::new("/nonexistent/gwenv.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gwenv.toml"));
    }
}
