//! Built-in model registry with a public lookup API.
//!
//! The entries cover the Gemini models the application is expected to run
//! against. Unknown identifiers are still usable via [`custom_model`], so a
//! new model name in the config does not require a code change.

use crate::types::{InputType, Model};

/// Default base URL for the Generative Language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default primary model identifier
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default fallback model identifier
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-1.5-pro";

struct ModelEntry {
    id: &'static str,
    name: &'static str,
    input_image: bool,
    context_window: u32,
    max_tokens: u32,
}

const MODEL_ENTRIES: &[ModelEntry] = &[
    ModelEntry {
        id: "gemini-1.5-flash",
        name: "Gemini 1.5 Flash",
        input_image: true,
        context_window: 1_000_000,
        max_tokens: 8192,
    },
    ModelEntry {
        id: "gemini-1.5-pro",
        name: "Gemini 1.5 Pro",
        input_image: true,
        context_window: 2_000_000,
        max_tokens: 8192,
    },
    ModelEntry {
        id: "gemini-2.0-flash",
        name: "Gemini 2.0 Flash",
        input_image: true,
        context_window: 1_000_000,
        max_tokens: 8192,
    },
    ModelEntry {
        id: "gemini-pro-vision",
        name: "Gemini Pro Vision",
        input_image: true,
        context_window: 16_384,
        max_tokens: 2048,
    },
];

impl ModelEntry {
    fn to_model(&self) -> Model {
        Model {
            id: self.id.to_string(),
            name: self.name.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            input_types: if self.input_image {
                vec![InputType::Text, InputType::Image]
            } else {
                vec![InputType::Text]
            },
            context_window: self.context_window,
            max_tokens: self.max_tokens,
        }
    }
}

/// Look up a model by ID.
pub fn get_model(id: &str) -> Option<Model> {
    MODEL_ENTRIES.iter().find(|e| e.id == id).map(|e| e.to_model())
}

/// Get all registered models.
pub fn get_all_models() -> Vec<Model> {
    MODEL_ENTRIES.iter().map(|e| e.to_model()).collect()
}

/// Construct a model for an identifier not present in the registry.
pub fn custom_model(id: &str) -> Model {
    Model {
        id: id.to_string(),
        name: id.to_string(),
        base_url: DEFAULT_BASE_URL.to_string(),
        input_types: vec![InputType::Text, InputType::Image],
        context_window: 128_000,
        max_tokens: 8192,
    }
}

/// Resolve an identifier via the registry, falling back to a custom model.
pub fn resolve_model(id: &str) -> Model {
    get_model(id).unwrap_or_else(|| custom_model(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let model = get_model(DEFAULT_MODEL).unwrap();
        assert_eq!(model.id, "gemini-1.5-flash");
        assert!(model.supports_images());
    }

    #[test]
    fn test_unknown_id_resolves_to_custom() {
        let model = resolve_model("gemini-9.9-experimental");
        assert_eq!(model.id, "gemini-9.9-experimental");
        assert_eq!(model.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_default_chain_is_registered() {
        assert!(get_model(DEFAULT_MODEL).is_some());
        assert!(get_model(DEFAULT_FALLBACK_MODEL).is_some());
    }
}
