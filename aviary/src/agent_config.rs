//! Declarative agent definitions.
//!
//! One JSON object per file in the agent config directory; unknown fields are
//! ignored. [`AgentConfig::validate`] enforces the invariants the runtime
//! relies on; the registry calls it for every file at load time and reports
//! the offending file alongside the reason.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// URL path segments are lowercase, digits, and hyphens only.
static PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new("^[a-z0-9-]+$").expect("valid regex"));

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TOP_K: usize = 5;

/// Which model API an agent speaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    #[default]
    Native,
    OpenaiCompatible,
}

/// Connection details for an OpenAI-compatible endpoint. Required iff
/// `provider == openai-compatible`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Transport used to reach an external tool source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTransport {
    Stdio,
    Sse,
    Http,
}

/// One external tool provider attached to an agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSourceConfig {
    pub id: String,
    pub transport: ToolTransport,
    /// Command to spawn (stdio only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the spawned process (stdio only).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Endpoint URL (sse/http only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// A capability advertised on discovery cards.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Discovery-card visibility and advertised capabilities.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub discoverable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discoverable: true,
            capabilities: Vec::new(),
        }
    }
}

/// Vector store backend for retrieval-augmented generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalProvider {
    Pinecone,
    Chroma,
    Pgvector,
}

/// Retrieval policy for an agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default)]
    pub enabled: bool,
    pub provider: RetrievalProvider,
    /// Index / collection / table name, depending on the backend.
    pub index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f32,
    /// Template with a `{{context}}` placeholder; default header applied when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_template: Option<String>,
}

/// One agent this agent may delegate to, exposed to the model as a tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTarget {
    pub agent_path: String,
    pub tool_name: String,
    pub description: String,
}

/// Delegation policy for an agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<DelegationTarget>,
}

/// A complete agent definition, immutable after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub id: String,
    /// URL segment the agent is served under; unique across the registry.
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<ProviderConfig>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub system_prompt: String,
    #[serde(default = "default_true")]
    pub enable_tools: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_sources: Vec<ToolSourceConfig>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<DelegationConfig>,
}

fn default_true() -> bool {
    true
}

// The process-wide defaults are configurable (AVIARY_DEFAULT_MODEL etc.);
// an agent file that names its own value always wins.

fn default_model() -> String {
    std::env::var("AVIARY_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

fn default_temperature() -> f32 {
    std::env::var("AVIARY_DEFAULT_TEMPERATURE")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_TEMPERATURE)
}

fn default_max_tokens() -> u32 {
    std::env::var("AVIARY_DEFAULT_MAX_TOKENS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_MAX_TOKENS)
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl AgentConfig {
    /// Minimal config for tests and embedding: native provider, defaults elsewhere.
    pub fn minimal(
        id: impl Into<String>,
        path: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            name: String::new(),
            description: String::new(),
            provider: Provider::Native,
            model: default_model(),
            provider_config: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: system_prompt.into(),
            enable_tools: true,
            tool_sources: Vec::new(),
            discovery: DiscoveryConfig::default(),
            retrieval: None,
            delegation: None,
        }
    }

    /// Checks every load-time invariant. Returns the first violation as a
    /// human-readable reason; the registry attaches the file name.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must be non-empty".into());
        }
        if !PATH_RE.is_match(&self.path) {
            return Err(format!(
                "path {:?} must match ^[a-z0-9-]+$ (lowercase, digits, hyphens)",
                self.path
            ));
        }
        if self.system_prompt.trim().is_empty() {
            return Err("systemPrompt must be non-empty".into());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            return Err("maxTokens must be greater than 0".into());
        }
        if self.provider == Provider::OpenaiCompatible && self.provider_config.is_none() {
            return Err("providerConfig is required for provider \"openai-compatible\"".into());
        }
        for source in &self.tool_sources {
            if source.id.trim().is_empty() {
                return Err("toolSources[].id must be non-empty".into());
            }
            match source.transport {
                ToolTransport::Stdio => {
                    if source.command.as_deref().unwrap_or("").is_empty() {
                        return Err(format!(
                            "tool source {:?}: stdio transport requires a command",
                            source.id
                        ));
                    }
                }
                ToolTransport::Sse | ToolTransport::Http => {
                    if source.url.as_deref().unwrap_or("").is_empty() {
                        return Err(format!(
                            "tool source {:?}: sse/http transport requires a url",
                            source.id
                        ));
                    }
                }
            }
        }
        if let Some(retrieval) = &self.retrieval {
            if retrieval.top_k < 1 {
                return Err("retrieval.topK must be at least 1".into());
            }
            if !(0.0..=1.0).contains(&retrieval.min_score) {
                return Err(format!(
                    "retrieval.minScore {} outside [0, 1]",
                    retrieval.min_score
                ));
            }
            if let Some(template) = &retrieval.context_template {
                if !template.contains("{{context}}") {
                    return Err(
                        "retrieval.contextTemplate must contain the {{context}} placeholder"
                            .into(),
                    );
                }
            }
        }
        if let Some(delegation) = &self.delegation {
            let mut seen = HashSet::new();
            for target in &delegation.targets {
                if target.agent_path.trim().is_empty() || target.tool_name.trim().is_empty() {
                    return Err(
                        "delegation targets need a non-empty agentPath and toolName".into(),
                    );
                }
                if !seen.insert(target.tool_name.as_str()) {
                    return Err(format!(
                        "delegation tool name {:?} declared twice",
                        target.tool_name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Delegation targets when delegation is enabled, empty slice otherwise.
    pub fn delegation_targets(&self) -> &[DelegationTarget] {
        match &self.delegation {
            Some(d) if d.enabled => &d.targets,
            _ => &[],
        }
    }

    /// Retrieval config when retrieval is enabled.
    pub fn retrieval_enabled(&self) -> Option<&RetrievalConfig> {
        self.retrieval.as_ref().filter(|r| r.enabled)
    }
}
