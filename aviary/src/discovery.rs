//! Discovery cards: service- and agent-level capability descriptors served at
//! well-known URLs.
//!
//! The service card carries one skill per discoverable agent plus one per
//! declared capability (capability skill ids are `"<agentId>:<capabilityId>"`).
//! Agent cards use bare capability ids. Non-existent or non-discoverable
//! paths yield no card.

use serde::{Deserialize, Serialize};

use crate::agent_config::AgentConfig;
use crate::registry::Registry;

/// A2A protocol version advertised on every card.
pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCard {
    pub name: String,
    pub description: String,
    pub protocol_version: String,
    pub version: String,
    pub url: String,
    pub skills: Vec<Skill>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub protocol_version: String,
    pub version: String,
    pub url: String,
    pub skills: Vec<Skill>,
}

fn display_name(config: &AgentConfig) -> String {
    if config.name.is_empty() {
        config.id.clone()
    } else {
        config.name.clone()
    }
}

/// Builds the service card over every discoverable agent in the registry.
pub fn service_card(
    registry: &Registry,
    name: &str,
    description: &str,
    base_url: &str,
    version: &str,
) -> ServiceCard {
    let url = base_url.trim_end_matches('/').to_string();
    let mut skills = Vec::new();
    for config in registry.configs() {
        if !config.discovery.discoverable {
            continue;
        }
        skills.push(Skill {
            id: config.id.clone(),
            name: display_name(&config),
            description: config.description.clone(),
        });
        for capability in &config.discovery.capabilities {
            skills.push(Skill {
                id: format!("{}:{}", config.id, capability.id),
                name: if capability.name.is_empty() {
                    capability.id.clone()
                } else {
                    capability.name.clone()
                },
                description: capability.description.clone(),
            });
        }
    }
    ServiceCard {
        name: name.to_string(),
        description: description.to_string(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        version: version.to_string(),
        url,
        skills,
    }
}

/// Builds the card for one agent; `None` for unknown or non-discoverable
/// paths.
pub fn agent_card(
    registry: &Registry,
    path: &str,
    base_url: &str,
    version: &str,
) -> Option<AgentCard> {
    let config = registry.get_config(path).ok()?;
    if !config.discovery.discoverable {
        return None;
    }
    let base = base_url.trim_end_matches('/');
    let skills = config
        .discovery
        .capabilities
        .iter()
        .map(|capability| Skill {
            id: capability.id.clone(),
            name: if capability.name.is_empty() {
                capability.id.clone()
            } else {
                capability.name.clone()
            },
            description: capability.description.clone(),
        })
        .collect();
    Some(AgentCard {
        name: display_name(&config),
        description: config.description.clone(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        version: version.to_string(),
        url: format!("{}/agents/{}", base, path),
        skills,
    })
}
