use anyhow::Result;
use strum::IntoEnumIterator;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

#[test]
fn it_serializes_to_valid_toml() {
    let res = Config::serialize_default(cli::build());
    let toml_res = res.parse::<toml_edit::Document>();
    assert!(toml_res.is_ok());

    assert!(res.contains("provider = \"ollama\""));
    assert!(res.contains("request-timeout = 120000"));
    assert!(res.contains("# openai-token = \"\""));
    assert!(res.contains("[possible values: ollama, lmstudio, openai, anthropic, gemini, openrouter]"));
    assert!(!res.contains("config-file"));
}

#[test]
fn it_loads_toml_values() -> Result<()> {
    let toml_str = r#"
fallback-backend = "openrouter"
fallback-model = "openai/gpt-4-turbo"
"#;
    Config::load_toml(&cli::build(), toml_str)?;

    assert_eq!(Config::get(ConfigKey::FallbackBackend), "openrouter");
    assert_eq!(Config::get(ConfigKey::FallbackModel), "openai/gpt-4-turbo");

    return Ok(());
}

#[test]
fn it_rejects_unknown_providers_in_toml() {
    let res = Config::load_toml(&cli::build(), "provider = \"skynet\"");

    let err = res.unwrap_err();
    assert!(err.to_string().starts_with("config.toml has an invalid value for key 'provider': skynet"));
}

#[test]
fn it_names_keys_in_kebab_case() {
    let keys = ConfigKey::iter()
        .map(|key| return key.to_string())
        .collect::<Vec<String>>();

    insta::assert_snapshot!(keys.join("\n"), @r###"
    provider
    model
    system-prompt
    config-file
    request-timeout
    ollama-url
    lmstudio-url
    openai-url
    openai-token
    anthropic-url
    anthropic-token
    gemini-url
    gemini-token
    openrouter-url
    openrouter-token
    fallback-backend
    fallback-model
    "###);
}

#[test]
fn it_maps_keys_to_env_vars() {
    assert_eq!(ConfigKey::OllamaURL.env_var(), "VIBE_OLLAMA_URL");
    assert_eq!(ConfigKey::OpenRouterToken.env_var(), "VIBE_OPENROUTER_TOKEN");
    assert_eq!(ConfigKey::ConfigFile.env_var(), "VIBE_CONFIG_FILE");
}

#[test]
fn it_flags_secret_keys() {
    let secrets = ConfigKey::iter()
        .filter(|key| return key.is_secret())
        .collect::<Vec<ConfigKey>>();

    assert_eq!(
        secrets,
        vec![
            ConfigKey::OpenAiToken,
            ConfigKey::AnthropicToken,
            ConfigKey::GeminiToken,
            ConfigKey::OpenRouterToken,
        ]
    );
}
