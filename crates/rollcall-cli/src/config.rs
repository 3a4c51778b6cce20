use anyhow::{Context, Result};
use rollcall_core::encode::DEFAULT_JPEG_QUALITY;
use rollcall_http::DEFAULT_TIMEOUT_SECS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000/";

/// Client configuration: defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables. Command-line flags are applied on
/// top by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the attendance service.
    pub server_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// JPEG quality used when a photo has to be re-encoded.
    pub jpeg_quality: u8,
    /// File the settings were read from, if any.
    pub source: Option<PathBuf>,
}

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    timeout_secs: Option<u64>,
    jpeg_quality: Option<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            source: None,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` for variable lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        let (path, explicit) = match env("ROLLCALL_CONFIG") {
            Some(path) => (Some(PathBuf::from(path)), true),
            None => (default_config_path(&env), false),
        };
        if let Some(path) = path {
            if explicit || path.exists() {
                config.apply_file(&path)?;
            }
        }

        if let Some(url) = env("ROLLCALL_SERVER_URL") {
            config.server_url = url;
        }
        config.timeout_secs = env_parse(&env, "ROLLCALL_TIMEOUT_SECS", config.timeout_secs);
        config.jpeg_quality = env_parse(&env, "ROLLCALL_JPEG_QUALITY", config.jpeg_quality);
        // A zero timeout would fail every request before it is sent.
        config.timeout_secs = config.timeout_secs.max(1);
        config.jpeg_quality = config.jpeg_quality.clamp(1, 100);
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let file: FileConfig =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;

        if let Some(url) = file.server_url {
            self.server_url = url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(quality) = file.jpeg_quality {
            self.jpeg_quality = quality;
        }
        self.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_config_path(env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let base = env("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("rollcall").join("config.toml"))
}

fn env_parse<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rollcall-config-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn lookup(vars: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = scratch_dir("defaults");
        let config = Config::load_with(lookup(&[("HOME", dir.display().to_string())])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.jpeg_quality, 90);
    }

    #[test]
    fn test_file_then_env_layering() {
        let dir = scratch_dir("layering");
        let path = dir.join("rollcall.toml");
        std::fs::write(
            &path,
            "server_url = \"http://10.0.2.2:5000/\"\ntimeout_secs = 15\njpeg_quality = 70\n",
        )
        .unwrap();

        let config = Config::load_with(lookup(&[
            ("ROLLCALL_CONFIG", path.display().to_string()),
            ("ROLLCALL_TIMEOUT_SECS", "30".into()),
        ]))
        .unwrap();
        assert_eq!(config.server_url, "http://10.0.2.2:5000/");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_xdg_default_file_is_read() {
        let dir = scratch_dir("xdg");
        std::fs::create_dir_all(dir.join("rollcall")).unwrap();
        std::fs::write(dir.join("rollcall/config.toml"), "server_url = \"http://school:8080\"\n")
            .unwrap();

        let config =
            Config::load_with(lookup(&[("XDG_CONFIG_HOME", dir.display().to_string())])).unwrap();
        assert_eq!(config.server_url, "http://school:8080");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = scratch_dir("missing");
        let result = Config::load_with(lookup(&[(
            "ROLLCALL_CONFIG",
            dir.join("nope.toml").display().to_string(),
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_key_is_error() {
        let dir = scratch_dir("unknown");
        let path = dir.join("bad.toml");
        std::fs::write(&path, "serverurl = \"typo\"\n").unwrap();
        let result = Config::load_with(lookup(&[("ROLLCALL_CONFIG", path.display().to_string())]));
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_env_values_fall_back() {
        let dir = scratch_dir("badenv");
        let config = Config::load_with(lookup(&[
            ("HOME", dir.display().to_string()),
            ("ROLLCALL_TIMEOUT_SECS", "soon".into()),
            ("ROLLCALL_JPEG_QUALITY", "0".into()),
        ]))
        .unwrap();
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.jpeg_quality, 1);
    }

    #[test]
    fn test_zero_timeout_is_raised_to_one_second() {
        let dir = scratch_dir("zero-timeout");
        let path = dir.join("rollcall.toml");
        std::fs::write(&path, "timeout_secs = 0\n").unwrap();

        let from_file =
            Config::load_with(lookup(&[("ROLLCALL_CONFIG", path.display().to_string())])).unwrap();
        assert_eq!(from_file.timeout(), Duration::from_secs(1));

        let from_env = Config::load_with(lookup(&[
            ("HOME", dir.display().to_string()),
            ("ROLLCALL_TIMEOUT_SECS", "0".into()),
        ]))
        .unwrap();
        assert_eq!(from_env.timeout_secs, 1);
    }
}
