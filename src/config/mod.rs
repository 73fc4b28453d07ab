// src/config/mod.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sentiment::inference::DEFAULT_INFERENCE_ENDPOINT;

pub const ENV_CONFIG_PATH: &str = "STREAM_CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "STREAM_DATA_DIR";
pub const ENV_BACKOFF_SECS: &str = "STREAM_BACKOFF_SECS";
pub const ENV_INFERENCE_TOKEN: &str = "HF_API_TOKEN";

pub const DEFAULT_FEED_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_endpoint() -> String {
    DEFAULT_FEED_ENDPOINT.to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_backoff_secs() -> u64 {
    5
}
fn default_inference_endpoint() -> String {
    DEFAULT_INFERENCE_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    #[default]
    Lexicon,
    Inference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub kind: ClassifierKind,
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from HF_API_TOKEN.
    #[serde(default)]
    pub api_key: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Lexicon,
            endpoint: default_inference_endpoint(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Directory holding one `<collection>.jsonl` per collection.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Filter-stream endpoint of the feed.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Fixed pause after a rate-limit signal.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            endpoint: default_endpoint(),
            language: default_language(),
            backoff_secs: default_backoff_secs(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading stream config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)?;
        cfg.resolved()
    }

    /// Load using env var + fallbacks:
    /// 1) $STREAM_CONFIG_PATH
    /// 2) config/stream.toml
    /// 3) config/stream.json
    /// 4) defaults
    ///
    /// Env overrides (`STREAM_DATA_DIR`, `STREAM_BACKOFF_SECS`) apply on top.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new("config/stream.toml").exists() {
            Self::load_from(Path::new("config/stream.toml"))?
        } else if Path::new("config/stream.json").exists() {
            Self::load_from(Path::new("config/stream.json"))?
        } else {
            Self::default().resolved()?
        };

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                cfg.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(secs) = std::env::var(ENV_BACKOFF_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            cfg.backoff_secs = secs;
        }
        Ok(cfg)
    }

    /// Resolve the "ENV" api key marker and sanitize values.
    fn resolved(mut self) -> Result<Self> {
        // The token only matters for the hosted model.
        if self.classifier.api_key.trim().eq_ignore_ascii_case("env") {
            self.classifier.api_key = match self.classifier.kind {
                ClassifierKind::Inference => std::env::var(ENV_INFERENCE_TOKEN)
                    .map_err(|_| anyhow!("Missing {ENV_INFERENCE_TOKEN} env var"))?,
                ClassifierKind::Lexicon => String::new(),
            };
        }
        self.language = self.language.trim().to_ascii_lowercase();
        if self.language.is_empty() {
            self.language = default_language();
        }
        Ok(self)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<StreamConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing stream config json");
    }
    toml::from_str(s).context("parsing stream config toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_fills_defaults() {
        let cfg = parse_config(
            r#"
data_dir = "/tmp/x"
[classifier]
kind = "inference"
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/x"));
        assert_eq!(cfg.backoff_secs, 5);
        assert_eq!(cfg.language, "en");
        assert_eq!(cfg.classifier.kind, ClassifierKind::Inference);
        assert_eq!(cfg.classifier.endpoint, DEFAULT_INFERENCE_ENDPOINT);
    }

    #[test]
    fn json_is_accepted() {
        let cfg = parse_config(r#"{"backoff_secs": 1, "language": "EN "}"#, "json").unwrap();
        let cfg = cfg.resolved().unwrap();
        assert_eq!(cfg.backoff_secs, 1);
        assert_eq!(cfg.language, "en");
    }

    #[serial_test::serial]
    #[test]
    fn shipped_config_loads_without_inference_token() {
        env::remove_var(ENV_INFERENCE_TOKEN);
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/stream.toml");
        let cfg = StreamConfig::load_from(&path).unwrap();
        assert_eq!(cfg.classifier.kind, ClassifierKind::Lexicon);
        assert!(cfg.classifier.api_key.is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn inference_requires_token_behind_env_marker() {
        env::remove_var(ENV_INFERENCE_TOKEN);
        let cfg = parse_config(
            "[classifier]\nkind = \"inference\"\napi_key = \"ENV\"\n",
            "toml",
        )
        .unwrap();
        assert!(cfg.clone().resolved().is_err());

        env::set_var(ENV_INFERENCE_TOKEN, "hf_test");
        assert_eq!(cfg.resolved().unwrap().classifier.api_key, "hf_test");
        env::remove_var(ENV_INFERENCE_TOKEN);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_DATA_DIR);
        env::remove_var(ENV_BACKOFF_SECS);

        let v = StreamConfig::load_default().unwrap();
        assert_eq!(v.data_dir, PathBuf::from("data"));

        fs::create_dir_all("config").unwrap();
        fs::write("config/stream.toml", "backoff_secs = 9\n").unwrap();
        assert_eq!(StreamConfig::load_default().unwrap().backoff_secs, 9);

        let p_json = tmp.path().join("other.json");
        fs::write(&p_json, r#"{"backoff_secs": 2}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_json.display().to_string());
        env::set_var(ENV_DATA_DIR, "/srv/posts");
        let v = StreamConfig::load_default().unwrap();
        assert_eq!(v.backoff_secs, 2);
        assert_eq!(v.data_dir, PathBuf::from("/srv/posts"));

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_DATA_DIR);
        env::set_current_dir(&old).unwrap();
    }
}
