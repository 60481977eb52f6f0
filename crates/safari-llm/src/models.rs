//! Selectable reasoning models, keyed by the `modelId` observers send with a mission.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use safari_core::provider::ReasoningService;
use safari_settings::ModelSettings;

use crate::gemini::GeminiReasoner;
use crate::openai::OpenAiReasoner;
use crate::reliable::{ReliableConfig, ReliableReasoner};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAiCompatible,
    Mock,
}

#[derive(Clone)]
pub struct ModelEntry {
    pub id: String,
    pub label: String,
    pub provider: ProviderKind,
    /// Whether runs on this model feed the training dataset.
    pub collect_data: bool,
    pub service: Arc<dyn ReasoningService>,
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("provider", &self.provider)
            .field("collect_data", &self.collect_data)
            .finish()
    }
}

/// Public view served by `/api/models`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub label: String,
}

#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry. A later entry with the same id replaces the earlier one.
    pub fn register(&mut self, entry: ModelEntry) {
        self.entries.retain(|e| e.id != entry.id);
        self.entries.push(entry);
    }

    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn list(&self) -> Vec<ModelInfo> {
        self.entries
            .iter()
            .map(|e| ModelInfo {
                id: e.id.clone(),
                label: e.label.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build every configured model, each behind the retry wrapper.
    pub fn from_settings(settings: &ModelSettings) -> Self {
        let mut registry = Self::new();
        let retry = ReliableConfig::from(&settings.retry);
        let timeout = Duration::from_millis(settings.retry.request_timeout_ms);

        let gemini = &settings.gemini;
        match gemini.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                let reasoner = GeminiReasoner::new(
                    &gemini.base_url,
                    &gemini.model,
                    SecretString::from(key.to_string()),
                    timeout,
                );
                registry.register(ModelEntry {
                    id: "gemini".into(),
                    label: format!("Gemini ({})", gemini.model),
                    provider: ProviderKind::Gemini,
                    collect_data: gemini.collect_data,
                    service: Arc::new(ReliableReasoner::new(reasoner, retry.clone())),
                });
            }
            None => warn!("no gemini api key configured, gemini model unavailable"),
        }

        for endpoint in &settings.openai_compatible {
            let reasoner = OpenAiReasoner::new(
                &endpoint.base_url,
                &endpoint.model,
                endpoint
                    .api_key
                    .as_ref()
                    .map(|k| SecretString::from(k.clone())),
                endpoint.max_tokens,
                timeout,
            );
            registry.register(ModelEntry {
                id: endpoint.id.clone(),
                label: endpoint.label.clone(),
                provider: ProviderKind::OpenAiCompatible,
                collect_data: endpoint.collect_data,
                service: Arc::new(ReliableReasoner::new(reasoner, retry.clone())),
            });
        }

        info!(count = registry.len(), "model registry built");
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockReasoner;
    use safari_settings::OpenAiEndpointSettings;

    fn mock_entry(id: &str) -> ModelEntry {
        ModelEntry {
            id: id.into(),
            label: format!("Mock {id}"),
            provider: ProviderKind::Mock,
            collect_data: false,
            service: Arc::new(MockReasoner::new(vec![])),
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ModelRegistry::new();
        registry.register(mock_entry("a"));
        registry.register(mock_entry("b"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("b").unwrap().label, "Mock b");
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn register_replaces_same_id() {
        let mut registry = ModelRegistry::new();
        registry.register(mock_entry("a"));
        let mut again = mock_entry("a");
        again.label = "second".into();
        registry.register(again);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().label, "second");
    }

    #[test]
    fn list_preserves_order() {
        let mut registry = ModelRegistry::new();
        registry.register(mock_entry("x"));
        registry.register(mock_entry("y"));
        let ids: Vec<_> = registry.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn settings_without_gemini_key_skip_gemini() {
        let settings = ModelSettings::default();
        let registry = ModelRegistry::from_settings(&settings);
        assert!(registry.get("gemini").is_none());
    }

    #[test]
    fn settings_build_gemini_and_endpoints() {
        let mut settings = ModelSettings::default();
        settings.gemini.api_key = Some("key".into());
        settings.openai_compatible.push(OpenAiEndpointSettings::default());

        let registry = ModelRegistry::from_settings(&settings);
        let gemini = registry.get("gemini").unwrap();
        assert_eq!(gemini.label, "Gemini (gemini-3-flash-preview)");
        assert!(gemini.collect_data);
        assert_eq!(gemini.provider, ProviderKind::Gemini);

        let vllm = registry.get("vllm-Qwen3-VL-2B-Thinking-FP8").unwrap();
        assert!(!vllm.collect_data);
        assert_eq!(vllm.service.model(), "Qwen3-VL-2B-Thinking-FP8");
    }

    #[test]
    fn model_info_serializes_id_and_label() {
        let info = ModelInfo {
            id: "gemini".into(),
            label: "Gemini".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json, serde_json::json!({"id": "gemini", "label": "Gemini"}));
    }
}
