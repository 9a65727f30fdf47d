use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Enabled,
    Disabled,
}

/// A configured upstream provider account (spec §3).
///
/// Credentials and the attached transformer/HTTP-client capabilities are
/// deliberately not modeled here as data — they are runtime-only
/// dependencies injected into the dispatcher (see `crate::dispatch`), the
/// same split the teacher keeps between `ProviderConfig` (data,
/// `daemon/llm_gateway/config.rs`) and `Provider` (behavior,
/// `daemon/llm_gateway/providers/mod.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub type_tag: String,
    pub status: ChannelStatus,
    pub supported_models: Vec<String>,
    pub tags: Vec<String>,
    pub base_url: Option<String>,
    pub models_list_url: Option<String>,
}

impl Channel {
    pub fn is_enabled(&self) -> bool {
        self.status == ChannelStatus::Enabled
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }

    /// Merge provider-listed models into the admin-supplied list: set union,
    /// order-preserving, case-sensitive, deduped (spec §3 lifecycle note).
    pub fn merge_supported_models(&mut self, provider_listed: &[String]) {
        for model in provider_listed {
            if !self.supported_models.iter().any(|m| m == model) {
                self.supported_models.push(model.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel {
            id: 1,
            name: "primary".into(),
            type_tag: "openai".into(),
            status: ChannelStatus::Enabled,
            supported_models: vec!["gpt-4".into(), "gpt-4o".into()],
            tags: vec![],
            base_url: None,
            models_list_url: None,
        }
    }

    #[test]
    fn merge_is_order_preserving_and_deduped() {
        let mut c = channel();
        c.merge_supported_models(&["gpt-4".into(), "gpt-4-turbo".into()]);
        assert_eq!(
            c.supported_models,
            vec!["gpt-4".to_string(), "gpt-4o".to_string(), "gpt-4-turbo".to_string()]
        );
    }

    #[test]
    fn merge_is_case_sensitive() {
        let mut c = channel();
        c.merge_supported_models(&["GPT-4".into()]);
        assert_eq!(c.supported_models.len(), 3);
    }
}
