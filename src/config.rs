use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::xmp::webp::SIDECAR_EXTENSION;

/// Top-level configuration for the booru-xmp library and CLI.
///
/// # Loading
///
/// ```rust,no_run
/// use booru_xmp::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.embed.overwrite_existing = true;
/// config.resize.enabled = false;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How packets are embedded during a batch.
    pub embed: EmbedConfig,
    /// Which extra terms are appended to tag payloads.
    pub annotation: AnnotationConfig,
    /// Resize-and-pad to fixed target resolutions.
    pub resize: ResizeConfig,
    /// Output behavior (dry run, backups).
    pub output: OutputConfig,
}

/// Batch embedding behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// If `true`, re-embed into images that already carry a packet.
    pub overwrite_existing: bool,
    /// Extension of the per-image tag file read during a batch (`<stem>.<ext>`).
    pub text_extension: String,
}

/// Payload options when building text from board annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Append `rating:<name>` when a rating is known.
    pub include_rating: bool,
    /// Append `score:<n>` when a score is known.
    pub include_score: bool,
}

/// Resize-and-pad settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    pub enabled: bool,
    /// JPEG re-encode quality (1–100).
    pub jpeg_quality: u8,
    /// Candidate output sizes; the one closest in aspect ratio wins.
    pub resolutions: Vec<(u32, u32)>,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, report what would be written without modifying any files.
    pub dry_run: bool,
    /// If `true`, copy an image to `<name>.<ext>.bak` before first modifying it.
    pub backup_originals: bool,
}

/// ~1 megapixel buckets used by SDXL-family models.
pub const SDXL_RESOLUTIONS: &[(u32, u32)] = &[
    (1024, 1024),
    (1152, 896),
    (896, 1152),
    (1216, 832),
    (832, 1216),
    (1344, 768),
    (768, 1344),
    (1536, 640),
    (640, 1536),
];

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            text_extension: "txt".to_string(),
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            include_rating: true,
            include_score: true,
        }
    }
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jpeg_quality: 95,
            resolutions: SDXL_RESOLUTIONS.to_vec(),
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Reject values the pipeline can't act on.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.resize.jpeg_quality) {
            anyhow::bail!(
                "resize.jpeg_quality must be 1-100, got {}",
                self.resize.jpeg_quality
            );
        }
        if self.resize.enabled && self.resize.resolutions.is_empty() {
            anyhow::bail!("resize.enabled is set but resize.resolutions is empty");
        }
        if let Some(&(w, h)) = self.resize.resolutions.iter().find(|(w, h)| *w == 0 || *h == 0) {
            anyhow::bail!("resize.resolutions contains a zero dimension: {w}x{h}");
        }
        if self.embed.text_extension.is_empty() {
            anyhow::bail!("embed.text_extension must not be empty");
        }
        if self.embed.text_extension.eq_ignore_ascii_case(SIDECAR_EXTENSION) {
            anyhow::bail!("embed.text_extension collides with the .{SIDECAR_EXTENSION} sidecar");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.embed.overwrite_existing);
        assert_eq!(config.embed.text_extension, "txt");
        assert_eq!(config.resize.jpeg_quality, 95);
        assert_eq!(config.resize.resolutions.len(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.embed.overwrite_existing = true;
        config.resize.resolutions = vec![(512, 512)];
        config.save(Some(path.as_path())).unwrap();

        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert!(loaded.embed.overwrite_existing);
        assert_eq!(loaded.resize.resolutions, vec![(512, 512)]);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(dir.path().join("absent.json").as_path())).unwrap();
        assert_eq!(config.embed.text_extension, "txt");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"output": {"dry_run": true}}"#).unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert!(config.output.dry_run);
        assert!(!config.output.backup_originals);
        assert_eq!(config.resize.jpeg_quality, 95);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Config::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn validate_rejects_bad_quality() {
        let mut config = Config::default();
        config.resize.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_sidecar_extension() {
        let mut config = Config::default();
        config.embed.text_extension = "XMP".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_resolution() {
        let mut config = Config::default();
        config.resize.resolutions.push((0, 10));
        assert!(config.validate().is_err());
    }
}
