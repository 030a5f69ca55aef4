use super::models::AiAgent;
use crate::catalogue_store::AgentStore;
use crate::config::LlmSettings;
use anyhow::Result;
use tracing::info;

/// Stores the configured agent and activates it when no agent is active yet.
/// An agent activated through the admin API stays active across restarts.
pub fn seed_agent(store: &dyn AgentStore, settings: &LlmSettings) -> Result<String> {
    let now = chrono::Utc::now().timestamp_millis();
    let id = store.upsert_agent(&AiAgent {
        id: uuid::Uuid::new_v4().to_string(),
        name: settings.agent_name.clone(),
        description: Some("Seeded from configuration".to_string()),
        prompt_template: settings.prompt_template.clone(),
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        max_concurrent_requests: settings.max_concurrent_requests,
        api_key: settings.api_key.clone(),
        is_active: false,
        created_at: now,
        updated_at: now,
    })?;

    if store.get_active_agent()?.is_none() {
        store.set_active_agent(&id)?;
        info!("Agent {} ({}) is now active", settings.agent_name, settings.model);
    }
    Ok(id)
}
