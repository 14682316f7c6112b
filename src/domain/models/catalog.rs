#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::BackendName;
use super::Usage;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModelPrice {
    pub input_per_thousand: f64,
    pub output_per_thousand: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub backend: BackendName,
    pub context_window: u32,
    pub price: Option<ModelPrice>,
}

fn model(
    backend: BackendName,
    id: &'static str,
    name: &'static str,
    context_window: u32,
) -> ModelInfo {
    return ModelInfo {
        id,
        name,
        backend,
        context_window,
        price: None,
    };
}

fn priced(
    backend: BackendName,
    id: &'static str,
    name: &'static str,
    context_window: u32,
    input_per_thousand: f64,
    output_per_thousand: f64,
) -> ModelInfo {
    return ModelInfo {
        id,
        name,
        backend,
        context_window,
        price: Some(ModelPrice {
            input_per_thousand,
            output_per_thousand,
        }),
    };
}

static CATALOG: Lazy<Vec<ModelInfo>> = Lazy::new(|| {
    return vec![
        model(BackendName::Ollama, "qwen2.5-coder:1.5b", "Qwen 2.5 Coder 1.5B", 32768),
        model(BackendName::Ollama, "qwen2.5-coder:7b", "Qwen 2.5 Coder 7B", 32768),
        model(BackendName::Ollama, "deepseek-coder-v2:16b", "DeepSeek Coder V2 16B", 16384),
        model(BackendName::Ollama, "codellama:7b", "Code Llama 7B", 16384),
        model(BackendName::LmStudio, "local-model", "Local Model", 8192),
        priced(BackendName::OpenAI, "gpt-4-turbo-preview", "GPT-4 Turbo", 128000, 0.01, 0.03),
        priced(BackendName::OpenAI, "gpt-4", "GPT-4", 8192, 0.03, 0.06),
        priced(BackendName::OpenAI, "gpt-3.5-turbo", "GPT-3.5 Turbo", 16385, 0.0005, 0.0015),
        priced(BackendName::Anthropic, "claude-3-opus-20240229", "Claude 3 Opus", 200000, 0.015, 0.075),
        priced(BackendName::Anthropic, "claude-3-sonnet-20240229", "Claude 3 Sonnet", 200000, 0.003, 0.015),
        priced(BackendName::Anthropic, "claude-3-haiku-20240307", "Claude 3 Haiku", 200000, 0.00025, 0.00125),
        priced(BackendName::Gemini, "gemini-pro", "Gemini Pro", 32768, 0.00025, 0.0005),
        priced(BackendName::Gemini, "gemini-pro-vision", "Gemini Pro Vision", 16384, 0.00025, 0.0005),
        model(BackendName::OpenRouter, "anthropic/claude-3-opus", "Claude 3 Opus (OpenRouter)", 200000),
        model(BackendName::OpenRouter, "openai/gpt-4-turbo", "GPT-4 Turbo (OpenRouter)", 128000),
        model(BackendName::OpenRouter, "google/gemini-pro", "Gemini Pro (OpenRouter)", 32768),
        model(BackendName::OpenRouter, "meta-llama/llama-3-70b-instruct", "Llama 3 70B (OpenRouter)", 8192),
    ];
});

static PRICES: Lazy<HashMap<&'static str, ModelPrice>> = Lazy::new(|| {
    return CATALOG
        .iter()
        .filter_map(|info| return info.price.map(|price| return (info.id, price)))
        .collect();
});

/// All known models for a backend, in catalog order.
pub fn models_for(backend: BackendName) -> Vec<ModelInfo> {
    return CATALOG
        .iter()
        .filter(|info| return info.backend == backend)
        .cloned()
        .collect();
}

pub fn model_price(model_id: &str) -> Option<ModelPrice> {
    return PRICES.get(model_id).copied();
}

/// Best-effort cost estimate in dollars. Zero whenever the model has no price
/// or the backend reported no usage.
pub fn estimate_cost(model_id: &str, usage: Option<&Usage>) -> f64 {
    let (Some(price), Some(usage)) = (model_price(model_id), usage) else {
        return 0.0;
    };

    return (usage.prompt_tokens as f64 / 1000.0) * price.input_per_thousand
        + (usage.completion_tokens as f64 / 1000.0) * price.output_per_thousand;
}
