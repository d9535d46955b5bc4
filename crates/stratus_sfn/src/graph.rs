//! Node table and edge list for a workflow.
//!
//! The graph is the single owner of every state. Links between states are
//! plain records in an ordered edge list, so the traversal, validation and
//! serialization passes are functions over this structure rather than
//! methods reaching through shared pointers.

use crate::error::{BuildError, BuildResult};
use crate::state::{ChoiceRuleArgs, StateArgs, StateKind, StateNode};
use indexmap::IndexMap;
use stratus_core::{Jsonata, StateId};

/// Relationship an edge expresses
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    /// Unconditional successor
    Next,
    /// Fallback when one of the errors is raised
    Catch {
        /// Matched error names
        errors: Vec<String>,
    },
    /// Choice rule, taken when the condition holds
    Choice {
        /// Rule condition
        condition: Jsonata,
        /// Output and variables applied when taken
        rule: ChoiceRuleArgs,
    },
    /// Choice default
    Default,
    /// Map item processor (child graph head)
    Processor,
    /// Parallel branch (child graph head)
    Branch,
}

impl EdgeKind {
    /// Whether the edge enters a child graph rather than staying in the current one
    #[must_use]
    pub fn is_child_graph(&self) -> bool {
        matches!(self, Self::Processor | Self::Branch)
    }
}

/// An edge between two states
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Source state
    pub from: StateId,
    /// Target state
    pub to: StateId,
    /// Relationship
    pub kind: EdgeKind,
}

impl Edge {
    /// Create a new edge
    #[must_use]
    pub fn new(from: StateId, to: StateId, kind: EdgeKind) -> Self {
        Self { from, to, kind }
    }
}

/// A workflow graph: states in creation order plus edges in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct StateGraph {
    nodes: IndexMap<StateId, StateNode>,
    edges: Vec<Edge>,
    next_id: StateId,
}

impl StateGraph {
    /// Create a new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: Vec::new(),
            next_id: StateId::from_raw(0),
        }
    }

    /// Add a state and return its handle
    pub fn add_node(&mut self, args: StateArgs, kind: StateKind) -> StateId {
        let id = self.next_id;
        self.next_id = id.successor();
        self.nodes.insert(id, StateNode::new(id, args, kind));
        id
    }

    /// Add an edge
    ///
    /// # Errors
    ///
    /// Returns error if either end is not a state of this graph
    pub fn add_edge(&mut self, edge: Edge) -> BuildResult<()> {
        self.require(edge.from)?;
        self.require(edge.to)?;
        self.edges.push(edge);
        Ok(())
    }

    /// Get node by ID
    #[must_use]
    pub fn node(&self, id: StateId) -> Option<&StateNode> {
        self.nodes.get(&id)
    }

    /// Get node by ID, failing for unknown handles
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownState`] if the handle was not issued by this graph
    pub fn require(&self, id: StateId) -> BuildResult<&StateNode> {
        self.nodes.get(&id).ok_or(BuildError::UnknownState { id })
    }

    /// Mutable form of [`StateGraph::require`]
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownState`] if the handle was not issued by this graph
    pub fn require_mut(&mut self, id: StateId) -> BuildResult<&mut StateNode> {
        self.nodes.get_mut(&id).ok_or(BuildError::UnknownState { id })
    }

    /// Name of a state, or its handle text if unknown
    #[must_use]
    pub fn name_of(&self, id: StateId) -> String {
        self.nodes
            .get(&id)
            .map_or_else(|| id.to_string(), |node| node.name.clone())
    }

    /// First state created with the given name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.nodes
            .values()
            .find(|node| node.name == name)
            .map(|node| node.id)
    }

    /// Edges leaving a state, in insertion order
    pub fn edges_from(&self, id: StateId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Unconditional successor
    #[must_use]
    pub fn successor(&self, id: StateId) -> Option<StateId> {
        self.edges_from(id)
            .find(|e| e.kind == EdgeKind::Next)
            .map(|e| e.to)
    }

    /// State whose `next` most recently pointed here
    ///
    /// A successor recorded on a Succeed or Fail state is not a transition,
    /// so its source is never a predecessor.
    #[must_use]
    pub fn predecessor(&self, id: StateId) -> Option<StateId> {
        self.edges
            .iter()
            .rev()
            .filter(|e| e.to == id && e.kind == EdgeKind::Next)
            .find(|e| self.node(e.from).is_some_and(|node| !node.kind.is_terminal()))
            .map(|e| e.from)
    }

    /// Composite state that registered this state as a child graph head
    #[must_use]
    pub fn parent(&self, id: StateId) -> Option<StateId> {
        self.edges
            .iter()
            .find(|e| e.to == id && e.kind.is_child_graph())
            .map(|e| e.from)
    }

    /// Child graph heads in registration order
    #[must_use]
    pub fn children(&self, id: StateId) -> Vec<StateId> {
        self.edges_from(id)
            .filter(|e| e.kind.is_child_graph())
            .map(|e| e.to)
            .collect()
    }

    /// Catch edges in the order added
    pub fn catches(&self, id: StateId) -> impl Iterator<Item = (&[String], StateId)> {
        self.edges_from(id).filter_map(|e| match &e.kind {
            EdgeKind::Catch { errors } => Some((errors.as_slice(), e.to)),
            _ => None,
        })
    }

    /// Choice rules in the order added
    pub fn choices(&self, id: StateId) -> impl Iterator<Item = (&Jsonata, &ChoiceRuleArgs, StateId)> {
        self.edges_from(id).filter_map(|e| match &e.kind {
            EdgeKind::Choice { condition, rule } => Some((condition, rule, e.to)),
            _ => None,
        })
    }

    /// Choice default
    #[must_use]
    pub fn default_of(&self, id: StateId) -> Option<StateId> {
        self.edges_from(id)
            .find(|e| e.kind == EdgeKind::Default)
            .map(|e| e.to)
    }

    /// Targets that stay in the same graph context, in structural order:
    /// next, choice rules, choice default, then catches
    ///
    /// A successor recorded on a Succeed or Fail state is not a transition.
    #[must_use]
    pub fn transitions(&self, id: StateId) -> Vec<StateId> {
        let mut targets: Vec<StateId> = self
            .node(id)
            .filter(|node| !node.kind.is_terminal())
            .and_then(|_| self.successor(id))
            .into_iter()
            .collect();
        targets.extend(self.choices(id).map(|(_, _, to)| to));
        targets.extend(self.default_of(id));
        targets.extend(self.catches(id).map(|(_, to)| to));
        targets
    }

    /// Get total node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get total edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}
