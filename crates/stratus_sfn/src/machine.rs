//! Compile entry point: validate, serialize and collect permissions in one
//! pass from the root of a workflow.

use crate::config::MachineConfig;
use crate::error::BuildResult;
use crate::graph::StateGraph;
use crate::serialize::{self, Definition};
use crate::state::StateKind;
use crate::traverse;
use crate::workflow::Workflow;
use serde_json::Value;
use stratus_core::{Permission, StateId};

/// Compilation warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// Choice with no default fails at runtime when no rule matches
    ChoiceWithoutDefault {
        /// Choice state name
        state: String,
    },
    /// `next` on a Succeed or Fail state is never emitted
    TerminalNextIgnored {
        /// Terminal state name
        state: String,
    },
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChoiceWithoutDefault { state } => write!(
                f,
                "Choice state \"{state}\" has no default and fails with States.NoChoiceMatched when no rule matches"
            ),
            Self::TerminalNextIgnored { state } => {
                write!(f, "State \"{state}\" ends execution, its next state is ignored")
            }
        }
    }
}

/// Result of compiling a workflow
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMachine {
    /// Top-level definition
    pub definition: Definition,
    /// Access-policy statements, in structural order and not deduplicated
    pub permissions: Vec<Permission>,
    /// Compilation warnings
    pub warnings: Vec<CompileWarning>,
}

impl CompiledMachine {
    /// Name of the first state
    #[must_use]
    pub fn start_at(&self) -> &str {
        &self.definition.start_at
    }

    /// Definition as a JSON value
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_value(&self) -> BuildResult<Value> {
        Ok(serde_json::to_value(&self.definition)?)
    }

    /// Definition as JSON text
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> BuildResult<String> {
        Ok(serde_json::to_string(&self.definition)?)
    }

    /// Definition as indented JSON text
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> BuildResult<String> {
        Ok(serde_json::to_string_pretty(&self.definition)?)
    }
}

/// Compiler for workflows
pub struct StateMachine {
    config: MachineConfig,
}

impl StateMachine {
    /// Create a compiler with a configuration
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Compile the machine containing `state`
    ///
    /// The root is found from any state of the composed graph. Any failure
    /// aborts the whole compile; no partial definition is produced.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration or graph is invalid
    pub fn compile(&self, workflow: &Workflow, state: StateId) -> BuildResult<CompiledMachine> {
        self.config.check()?;
        let graph = workflow.graph();
        let root = workflow.root(state)?;
        tracing::debug!(root = %graph.name_of(root), machine_type = %self.config.machine_type, "compiling state machine");

        self.config.validator().validate(graph, root)?;
        let definition = serialize::definition(graph, root, &self.config)?;
        let permissions = traverse::permissions(graph, root);
        let warnings = collect_warnings(graph, root);
        for warning in &warnings {
            tracing::warn!(%warning, "state machine warning");
        }

        tracing::debug!(
            root = %definition.start_at,
            states = definition.states.len(),
            permissions = permissions.len(),
            "compiled state machine"
        );
        Ok(CompiledMachine {
            definition,
            permissions,
            warnings,
        })
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

fn collect_warnings(graph: &StateGraph, root: StateId) -> Vec<CompileWarning> {
    traverse::composed(graph, root)
        .into_iter()
        .filter_map(|id| {
            let node = graph.node(id)?;
            match node.kind {
                StateKind::Choice if graph.default_of(id).is_none() => {
                    Some(CompileWarning::ChoiceWithoutDefault {
                        state: node.name.clone(),
                    })
                }
                _ if node.kind.is_terminal() && graph.successor(id).is_some() => {
                    Some(CompileWarning::TerminalNextIgnored {
                        state: node.name.clone(),
                    })
                }
                _ => None,
            }
        })
        .collect()
}
