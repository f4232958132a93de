use std::{env, path::PathBuf};

use thiserror::Error;
use url::Url;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_TRANSCRIPT_LANGUAGES: [&str; 2] = ["ja", "en"];
const CONFIG_DIR_NAME: &str = ".youtube_mcp";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub slack_bot_token: Option<String>,
    pub slack_api_url: String,
    pub youtube_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub youtube_credentials_path: PathBuf,
    pub youtube_token_path: PathBuf,
    pub transcript_languages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine a configuration directory: set YOUTUBE_MCP_DIR or HOME")]
    MissingConfigDir,
    #[error("{var} must be a valid absolute URL")]
    InvalidUrl { var: &'static str },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let config_dir = non_empty("YOUTUBE_MCP_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME)))
            .ok_or(ConfigError::MissingConfigDir)?;

        let github_api_url = validated_url(
            "GITHUB_API_URL",
            non_empty("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        )?;
        let slack_api_url = validated_url(
            "SLACK_API_URL",
            non_empty("SLACK_API_URL").unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
        )?;

        let transcript_languages = non_empty("TRANSCRIPT_LANGUAGES")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|language| !language.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|languages| !languages.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_TRANSCRIPT_LANGUAGES
                    .iter()
                    .map(|language| language.to_string())
                    .collect()
            });

        Ok(Self {
            github_token: non_empty("GITHUB_TOKEN"),
            github_api_url,
            slack_bot_token: non_empty("SLACK_BOT_TOKEN"),
            slack_api_url,
            youtube_api_key: non_empty("YOUTUBE_API_KEY"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            youtube_credentials_path: non_empty("YOUTUBE_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.join("credentials.json")),
            youtube_token_path: non_empty("YOUTUBE_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.join("token.json")),
            transcript_languages,
        })
    }
}

fn validated_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    Url::parse(&value).map_err(|_| ConfigError::InvalidUrl { var })?;
    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_defaults() {
        let config = Config::from_lookup(lookup(&[("YOUTUBE_MCP_DIR", "/tmp/mcp")]))
            .expect("config should parse");

        assert_eq!(config.github_api_url, DEFAULT_GITHUB_API_URL);
        assert_eq!(config.slack_api_url, DEFAULT_SLACK_API_URL);
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.github_token, None);
        assert_eq!(config.transcript_languages, vec!["ja", "en"]);
        assert_eq!(
            config.youtube_token_path,
            PathBuf::from("/tmp/mcp/token.json")
        );
        assert_eq!(
            config.youtube_credentials_path,
            PathBuf::from("/tmp/mcp/credentials.json")
        );
    }

    #[test]
    fn blank_tokens_are_treated_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("YOUTUBE_MCP_DIR", "/tmp/mcp"),
            ("GITHUB_TOKEN", "   "),
            ("SLACK_BOT_TOKEN", "xoxb-1"),
        ]))
        .expect("config should parse");

        assert_eq!(config.github_token, None);
        assert_eq!(config.slack_bot_token.as_deref(), Some("xoxb-1"));
    }

    #[test]
    fn explicit_paths_and_languages_win() {
        let config = Config::from_lookup(lookup(&[
            ("YOUTUBE_MCP_DIR", "/tmp/mcp"),
            ("YOUTUBE_TOKEN_PATH", "/var/lib/token.json"),
            ("TRANSCRIPT_LANGUAGES", "en, de ,"),
            ("GITHUB_API_URL", "http://127.0.0.1:9000/"),
        ]))
        .expect("config should parse");

        assert_eq!(
            config.youtube_token_path,
            PathBuf::from("/var/lib/token.json")
        );
        assert_eq!(config.transcript_languages, vec!["en", "de"]);
        assert_eq!(config.github_api_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn invalid_api_url_fails() {
        let err = Config::from_lookup(lookup(&[
            ("YOUTUBE_MCP_DIR", "/tmp/mcp"),
            ("SLACK_API_URL", "not a url"),
        ]))
        .expect_err("expected invalid url error");

        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                var: "SLACK_API_URL"
            }
        ));
    }
}
