use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    /// Unordered list bullets by nesting depth; the last one repeats for deeper levels.
    pub bullets: Vec<String>,
    /// Repeated once per heading level in front of the heading text.
    pub heading_mark: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bullets: vec!["•".to_string(), "◦".to_string(), "▪".to_string()],
            heading_mark: "▎".to_string(),
        }
    }
}

impl RenderConfig {
    /// Bullet for an unordered item at `depth`, clamped to the last configured one.
    pub fn bullet(&self, depth: usize) -> Option<&str> {
        self.bullets
            .get(depth)
            .or_else(|| self.bullets.last())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    pub allowed_users: Vec<i64>,
    pub edit_interval_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            allowed_users: Vec::new(),
            edit_interval_ms: 100,
        }
    }
}

impl Config {
    /// The configuration bundled with the crate (`src/default_config.toml`).
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file, or return defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::compiled_default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.render.bullets.is_empty() {
            return Err(Error::Config("render.bullets must not be empty".to_string()));
        }
        if self.render.bullets.iter().any(|bullet| bullet.trim().is_empty()) {
            return Err(Error::Config("render.bullets must not contain blank entries".to_string()));
        }
        if self.render.heading_mark.is_empty() {
            return Err(Error::Config("render.heading_mark must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_default_matches_default() {
        assert_eq!(Config::compiled_default(), Config::default());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = Config::from_toml_str("[bot]\nallowed_users = [1, 2]\n").unwrap();
        assert_eq!(config.bot.allowed_users, vec![1, 2]);
        assert_eq!(config.bot.edit_interval_ms, 100);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn custom_glyphs() {
        let config =
            Config::from_toml_str("[render]\nbullets = [\"-\", \"~\"]\nheading_mark = \"#\"\n")
                .unwrap();
        assert_eq!(config.render.bullet(0), Some("-"));
        assert_eq!(config.render.bullet(1), Some("~"));
        assert_eq!(config.render.bullet(5), Some("~"));
        assert_eq!(config.render.heading_mark, "#");
    }

    #[test]
    fn rejects_empty_bullets() {
        let err = Config::from_toml_str("[render]\nbullets = []\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = Config::from_toml_str("[render\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/tgmark.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn default_bullets() {
        let render = RenderConfig::default();
        assert_eq!(render.bullet(0), Some("•"));
        assert_eq!(render.bullet(1), Some("◦"));
        assert_eq!(render.bullet(2), Some("▪"));
        assert_eq!(render.bullet(3), Some("▪"));
    }
}
