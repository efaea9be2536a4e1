//! Agent registry: loads definitions from a directory, owns the agents,
//! sequences shutdown.
//!
//! The agent map is read-mostly: writes happen during load and shutdown only.
//! Agents are created lazy (uninitialized) so startup stays fast and
//! unreachable tool sources delay nothing. Delegation tools reach back into
//! the registry through `Weak` references; the registry is shut down last.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::agent::RuntimeAgent;
use crate::agent_config::AgentConfig;
use crate::error::AgentError;
use crate::llm::LlmClient;

/// Metadata projection of one agent, suitable for public discovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub path: String,
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Process-wide agent registry. Constructed once and passed to request
/// handlers; never a hidden global.
pub struct Registry {
    agents: DashMap<String, Arc<RuntimeAgent>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("agents", &self.agents.iter().map(|e| e.key().clone()).collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// An empty registry. Agents are added by [`Registry::load_all`] or
    /// [`Registry::insert_with_llm`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            agents: DashMap::new(),
        })
    }

    /// Loads every `*.json` file in `dir`. A missing directory yields an
    /// empty registry; a file that fails to parse or validate fails the load
    /// with an error naming the file; duplicate paths across files are fatal.
    pub fn load_all(dir: &Path) -> Result<Arc<Self>, AgentError> {
        let registry = Self::new();
        if !dir.exists() {
            tracing::info!(dir = %dir.display(), "agent config directory missing, starting empty");
            return Ok(registry);
        }
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| AgentError::Config {
                file: dir.display().to_string(),
                reason: format!("read dir: {e}"),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        for path in paths {
            let file = path.display().to_string();
            let content = std::fs::read_to_string(&path).map_err(|e| AgentError::Config {
                file: file.clone(),
                reason: format!("read: {e}"),
            })?;
            let config: AgentConfig =
                serde_json::from_str(&content).map_err(|e| AgentError::Config {
                    file: file.clone(),
                    reason: format!("parse: {e}"),
                })?;
            config.validate().map_err(|reason| AgentError::Config {
                file: file.clone(),
                reason,
            })?;
            if registry.agents.contains_key(&config.path) {
                return Err(AgentError::Config {
                    file,
                    reason: format!("duplicate agent path {:?}", config.path),
                });
            }
            let agent = RuntimeAgent::from_config(config, Arc::downgrade(&registry))?;
            tracing::info!(path = %agent.path(), file = %path.display(), "agent loaded");
            registry
                .agents
                .insert(agent.path().to_string(), Arc::new(agent));
        }
        Ok(registry)
    }

    /// Registers an agent around an explicit model client. Primarily for
    /// tests and embedders; production agents come from [`Registry::load_all`].
    pub fn insert_with_llm(
        self: &Arc<Self>,
        config: AgentConfig,
        llm: Arc<dyn LlmClient>,
    ) -> Arc<RuntimeAgent> {
        let agent = Arc::new(RuntimeAgent::with_llm(
            config,
            Arc::downgrade(self),
            llm,
        ));
        self.agents.insert(agent.path().to_string(), Arc::clone(&agent));
        agent
    }

    /// The runtime agent at `path`.
    pub fn get(&self, path: &str) -> Result<Arc<RuntimeAgent>, AgentError> {
        self.agents
            .get(path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AgentError::NotFound(path.to_string()))
    }

    /// The validated config at `path`, exactly as loaded from disk.
    pub fn get_config(&self, path: &str) -> Result<AgentConfig, AgentError> {
        self.get(path).map(|agent| agent.config().clone())
    }

    pub fn has(&self, path: &str) -> bool {
        self.agents.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Metadata projection of every agent, ordered by path.
    pub fn list(&self) -> Vec<AgentSummary> {
        let mut summaries: Vec<AgentSummary> = self
            .agents
            .iter()
            .map(|entry| {
                let config = entry.value().config();
                AgentSummary {
                    path: config.path.clone(),
                    id: config.id.clone(),
                    name: config.name.clone(),
                    description: config.description.clone(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.path.cmp(&b.path));
        summaries
    }

    /// Every config, ordered by path. Used by discovery-card generation.
    pub fn configs(&self) -> Vec<AgentConfig> {
        let mut configs: Vec<AgentConfig> = self
            .agents
            .iter()
            .map(|entry| entry.value().config().clone())
            .collect();
        configs.sort_by(|a, b| a.path.cmp(&b.path));
        configs
    }

    /// Shuts down every agent, logging and swallowing individual failures;
    /// the map is cleared only after all attempts complete.
    pub async fn shutdown_all(&self) {
        let agents: Vec<Arc<RuntimeAgent>> = self
            .agents
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for agent in agents {
            if let Err(e) = agent.shutdown().await {
                tracing::warn!(agent = %agent.config().id, error = %e, "agent shutdown failed");
            }
        }
        self.agents.clear();
    }
}
