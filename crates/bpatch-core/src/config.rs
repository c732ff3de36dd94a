use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Backoff parameters between transfer attempts (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Digest used by the integrity verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    #[default]
    Crc32,
    Sha256,
}

/// Deployment mode: host mode talks to the patch server, offline mode only
/// serves what ships inside the application package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Host,
    Offline,
}

/// Global configuration loaded from `~/.config/bpatch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Primary patch server, e.g. `https://cdn.example.com/patch`.
    pub primary_host: String,
    /// Fallback patch server used when the primary fails.
    pub fallback_host: String,
    /// Maximum concurrent bundle transfers.
    pub max_concurrent: usize,
    /// Maximum attempts per bundle across both hosts (including the first).
    pub max_retry_per_task: u32,
    /// Per-attempt timeout in seconds.
    pub task_timeout_secs: u64,
    /// Omit the resource version segment from download URLs.
    #[serde(default)]
    pub ignore_resource_version: bool,
    /// Purge the cache index when the app version changes.
    #[serde(default)]
    pub clear_cache_on_version_change: bool,
    /// Tags selected for DLC downloads when no explicit request is given.
    #[serde(default)]
    pub dlc_tags: Vec<String>,
    #[serde(default)]
    pub checksum: ChecksumKind,
    #[serde(default)]
    pub play_mode: PlayMode,
    /// File name of the manifest, both on the server and in the sandbox.
    #[serde(default = "default_manifest_file_name")]
    pub manifest_file_name: String,
    /// Optional backoff policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Override for the mutable sandbox directory (default: XDG data dir).
    #[serde(default)]
    pub sandbox_dir: Option<PathBuf>,
    /// Override for the read-only builtin bundle directory.
    #[serde(default)]
    pub builtin_dir: Option<PathBuf>,
}

fn default_manifest_file_name() -> String {
    "patch_manifest.json".to_string()
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            primary_host: "http://127.0.0.1:8000/patch".to_string(),
            fallback_host: "http://127.0.0.1:8001/patch".to_string(),
            max_concurrent: 4,
            max_retry_per_task: 3,
            task_timeout_secs: 60,
            ignore_resource_version: false,
            clear_cache_on_version_change: false,
            dlc_tags: Vec::new(),
            checksum: ChecksumKind::default(),
            play_mode: PlayMode::default(),
            manifest_file_name: default_manifest_file_name(),
            retry: None,
            sandbox_dir: None,
            builtin_dir: None,
        }
    }
}

impl PatchConfig {
    /// Retry policy built from `max_retry_per_task` and the `[retry]` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = self.retry.clone().unwrap_or_default();
        RetryPolicy {
            max_attempts: self.max_retry_per_task.max(1),
            base_delay: Duration::from_secs_f64(backoff.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(backoff.max_delay_secs),
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bpatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PatchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PatchConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = PatchConfig::default();
        assert_eq!(cfg.max_concurrent, 4);
        assert_eq!(cfg.max_retry_per_task, 3);
        assert_eq!(cfg.checksum, ChecksumKind::Crc32);
        assert_eq!(cfg.play_mode, PlayMode::Host);
        assert_eq!(cfg.manifest_file_name, "patch_manifest.json");
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = PatchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PatchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.primary_host, cfg.primary_host);
        assert_eq!(parsed.fallback_host, cfg.fallback_host);
        assert_eq!(parsed.max_concurrent, cfg.max_concurrent);
        assert_eq!(parsed.max_retry_per_task, cfg.max_retry_per_task);
    }

    #[test]
    fn config_toml_minimal_uses_defaults() {
        let toml = r#"
            primary_host = "https://a.example.com"
            fallback_host = "https://b.example.com"
            max_concurrent = 8
            max_retry_per_task = 4
            task_timeout_secs = 30
        "#;
        let cfg: PatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent, 8);
        assert!(!cfg.ignore_resource_version);
        assert!(!cfg.clear_cache_on_version_change);
        assert!(cfg.dlc_tags.is_empty());
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.manifest_file_name, "patch_manifest.json");
    }

    #[test]
    fn config_toml_modes_and_retry() {
        let toml = r#"
            primary_host = "https://a.example.com"
            fallback_host = "https://b.example.com"
            max_concurrent = 2
            max_retry_per_task = 6
            task_timeout_secs = 10
            ignore_resource_version = true
            dlc_tags = ["chapter2", "voice_jp"]
            checksum = "sha256"
            play_mode = "offline"

            [retry]
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: PatchConfig = toml::from_str(toml).unwrap();
        assert!(cfg.ignore_resource_version);
        assert_eq!(cfg.dlc_tags, vec!["chapter2", "voice_jp"]);
        assert_eq!(cfg.checksum, ChecksumKind::Sha256);
        assert_eq!(cfg.play_mode, PlayMode::Offline);

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }
}
