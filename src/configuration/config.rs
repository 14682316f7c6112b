#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::BackendName;
use crate::infrastructure::backends::DEFAULT_REQUEST_TIMEOUT_MS;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    Provider,
    Model,
    SystemPrompt,
    ConfigFile,
    RequestTimeout,
    OllamaURL,
    #[strum(to_string = "lmstudio-url")]
    LmStudioURL,
    #[strum(to_string = "openai-url")]
    OpenAiURL,
    #[strum(to_string = "openai-token")]
    OpenAiToken,
    AnthropicURL,
    AnthropicToken,
    GeminiURL,
    GeminiToken,
    #[strum(to_string = "openrouter-url")]
    OpenRouterURL,
    #[strum(to_string = "openrouter-token")]
    OpenRouterToken,
    FallbackBackend,
    FallbackModel,
}

impl ConfigKey {
    /// Environment variable that can set this key, e.g. `VIBE_OLLAMA_URL`.
    pub fn env_var(&self) -> String {
        return format!("VIBE_{}", self.to_string().replace('-', "_").to_uppercase());
    }

    /// Keys holding credentials, kept out of debug logs.
    pub fn is_secret(&self) -> bool {
        return matches!(
            self,
            ConfigKey::OpenAiToken
                | ConfigKey::AnthropicToken
                | ConfigKey::GeminiToken
                | ConfigKey::OpenRouterToken
        );
    }
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        #[cfg(not(target_os = "macos"))]
        let config_path = dirs::config_dir()
            .unwrap_or_default()
            .join("vibe-studio/config.toml");
        #[cfg(target_os = "macos")]
        let config_path = path::PathBuf::from(std::env::var("HOME").unwrap_or_default())
            .join(".config/vibe-studio/config.toml");

        let res = match key {
            ConfigKey::Provider => BackendName::Ollama.id().to_string(),
            ConfigKey::Model => "".to_string(),
            ConfigKey::SystemPrompt => "".to_string(),
            ConfigKey::RequestTimeout => DEFAULT_REQUEST_TIMEOUT_MS.to_string(),
            ConfigKey::OllamaURL => BackendName::Ollama.default_url().to_string(),
            ConfigKey::LmStudioURL => BackendName::LmStudio.default_url().to_string(),
            ConfigKey::OpenAiURL => BackendName::OpenAI.default_url().to_string(),
            ConfigKey::AnthropicURL => BackendName::Anthropic.default_url().to_string(),
            ConfigKey::GeminiURL => BackendName::Gemini.default_url().to_string(),
            ConfigKey::OpenRouterURL => BackendName::OpenRouter.default_url().to_string(),
            ConfigKey::OpenAiToken
            | ConfigKey::AnthropicToken
            | ConfigKey::GeminiToken
            | ConfigKey::OpenRouterToken => "".to_string(),
            ConfigKey::FallbackBackend => "".to_string(),
            ConfigKey::FallbackModel => "".to_string(),

            // Special
            ConfigKey::ConfigFile => config_path.to_string_lossy().to_string(),
        };

        return res;
    }

    /// Long names accepted for a key, taken from the matching clap argument.
    fn possible_values(cmd: &Command, key: ConfigKey) -> Vec<String> {
        let Some(arg) = cmd
            .get_arguments()
            .find(|e| return e.get_long() == Some(key.to_string().as_str()))
        else {
            return vec![];
        };

        return arg
            .get_possible_values()
            .iter()
            .map(|e| return e.get_name().to_string())
            .collect::<Vec<String>>();
    }

    /// Applies a `config.toml` document on top of the current values.
    pub fn load_toml(cmd: &Command, toml_str: &str) -> Result<()> {
        let doc = toml_str.parse::<toml_edit::Document>()?;

        for key in ConfigKey::iter() {
            let Some(val) = doc.get(&key.to_string()) else {
                continue;
            };

            if let Some(val_int) = val.as_integer() {
                Config::set(key, &val_int.to_string());
                continue;
            }

            let Some(val_str) = val.as_str() else {
                continue;
            };
            if val_str.is_empty() {
                continue;
            }

            // Use clap value parsers to do validation.
            let possible_values = Config::possible_values(cmd, key);
            if !possible_values.is_empty() && !possible_values.contains(&val_str.to_string()) {
                bail!(format!(
                    "config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}",
                    possible_values.join(", ")
                ));
            }

            Config::set(key, val_str);
        }

        return Ok(());
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            Config::load_toml(&cmd, &toml_str)?;
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            provider = Config::get(ConfigKey::Provider),
            model = Config::get(ConfigKey::Model),
            fallback_backend = Config::get(ConfigKey::FallbackBackend),
            fallback_model = Config::get(ConfigKey::FallbackModel),
            request_timeout = Config::get(ConfigKey::RequestTimeout),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let possible_values = Config::possible_values(&cmd, key);
                if !possible_values.is_empty() {
                    description = format!(
                        "{description} [possible values: {}]",
                        possible_values.join(", ")
                    );
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i64>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
