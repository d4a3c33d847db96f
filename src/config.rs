use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_models() -> Vec<String> {
    vec![
        "llama-3.1-8b-instant".to_string(),
        "llama-3.3-70b-versatile".to_string(),
    ]
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Seeds the session when local storage holds no token yet.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                models: default_models(),
                default_model: default_model(),
                token: None,
            },
            window: WindowConfig {
                width: 1280,
                height: 800,
                min_width: 900,
                min_height: 600,
            },
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Error parsing {}: {}. Using defaults.", config_path.display(), e);
                    Config::default()
                }),
                Err(e) => {
                    tracing::warn!("Error reading {}: {}. Using defaults.", config_path.display(), e);
                    Config::default()
                }
            }
        } else {
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// `LUMIN_API_URL` and `LUMIN_TOKEN` win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LUMIN_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("LUMIN_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.api.token = Some(token);
        }
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/lumin")
        } else {
            PathBuf::from(".")
        }
    }
}
