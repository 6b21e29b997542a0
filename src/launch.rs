// ABOUTME: Launch collaborator: turns (branch, worktree, agent) into the command a pane runs
//
// The orchestration core treats `LaunchResolver` as an opaque factory. The
// config-driven resolver here is the default; embedders can supply their own.

use crate::config::AgentCommand;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Environment variable through which a pane learns its session marker
pub const SESSION_MARKER_ENV: &str = "GWT_SESSION_MARKER";

/// Everything needed to start one agent process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Render as a single shell command line
    ///
    /// With `inline_env` the environment is prefixed through `env K=V`, for
    /// multiplexers that cannot set a pane's environment themselves.
    pub fn shell_command(&self, inline_env: bool) -> String {
        let mut words: Vec<String> = Vec::new();

        if inline_env && !self.env.is_empty() {
            words.push("env".to_string());
            for (key, value) in &self.env {
                words.push(escape(&format!("{key}={value}")));
            }
        }

        words.push(escape(&self.program));
        words.extend(self.args.iter().map(|a| escape(a)));
        words.join(" ")
    }
}

fn escape(word: &str) -> String {
    shell_escape::unix::escape(word.into()).into_owned()
}

/// Supplies the command line for an agent; never inspected by the core
pub trait LaunchResolver: Send + Sync {
    fn resolve_launch(&self, branch: &str, worktree_path: &Path, agent_id: &str) -> LaunchSpec;
}

/// Resolves agents from the `[agents.<id>]` config tables
///
/// An agent id without a table runs a program of the same name.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLauncher {
    agents: HashMap<String, AgentCommand>,
}

impl ConfiguredLauncher {
    pub fn new(agents: HashMap<String, AgentCommand>) -> Self {
        Self { agents }
    }
}

impl LaunchResolver for ConfiguredLauncher {
    fn resolve_launch(&self, branch: &str, worktree_path: &Path, agent_id: &str) -> LaunchSpec {
        let mut spec = LaunchSpec::new(agent_id, worktree_path);

        if let Some(agent) = self.agents.get(agent_id) {
            spec.program.clone_from(&agent.program);
            spec.args.clone_from(&agent.args);
            spec.env.extend(agent.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        spec.env.insert("GWT_BRANCH".to_string(), branch.to_string());
        spec
    }
}
