use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::ai::codec::SPEECH_SAMPLE_RATE;

pub const LOCALES: [&str; 2] = ["zh-CN", "en"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_print_delay_ms")]
    pub print_delay_ms: u64,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_speech_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_voice() -> String {
    "Kore".to_string()
}
fn default_sample_rate() -> u32 {
    SPEECH_SAMPLE_RATE
}
fn default_print_delay_ms() -> u64 {
    500
}
fn default_export_dir() -> String {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .to_string_lossy()
        .to_string()
}
fn default_theme() -> String {
    "indigo".to_string()
}
fn default_locale() -> String {
    "zh-CN".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            text_model: default_text_model(),
            speech_model: default_speech_model(),
            voice: default_voice(),
            sample_rate: default_sample_rate(),
            print_delay_ms: default_print_delay_ms(),
            export_dir: default_export_dir(),
            theme: default_theme(),
            locale: default_locale(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ai-tutor")
            .join("config.toml")
    }

    /// Environment variables win over the file so keys need not be stored on disk.
    pub fn resolved_api_key(&self) -> Option<String> {
        ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn export_path(&self) -> PathBuf {
        crate::image::expand_home(&self.export_dir)
    }

    /// Clamp numeric fields and reset unknown locales.
    pub fn validate(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 48_000);
        self.print_delay_ms = self.print_delay_ms.min(10_000);
        if !LOCALES.contains(&self.locale.as_str()) {
            self.locale = default_locale();
        }
        if self.api_base.trim().is_empty() {
            self.api_base = default_api_base();
        }
    }
}
