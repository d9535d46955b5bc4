//! Whole-graph validation run once, from the root, before serialization.

use crate::config::MachineType;
use crate::error::{BuildError, BuildResult};
use crate::graph::StateGraph;
use crate::integration::IntegrationPattern;
use crate::state::StateKind;
use crate::traverse::composed;
use indexmap::IndexMap;
use stratus_core::{GraphContext, StateId};

/// Fail if two distinct states in the composed graph share a name
///
/// # Errors
///
/// Returns [`BuildError::DuplicateName`] naming the first clash found in preorder
pub fn assert_names_unique(graph: &StateGraph, root: StateId) -> BuildResult<()> {
    let mut names: IndexMap<&str, StateId> = IndexMap::new();

    for id in composed(graph, root) {
        let node = graph.require(id)?;
        match names.get(node.name.as_str()) {
            Some(existing) if *existing != id => {
                return Err(BuildError::DuplicateName {
                    name: node.name.clone(),
                });
            }
            _ => {
                names.insert(node.name.as_str(), id);
            }
        }
    }

    Ok(())
}

/// Entry on the reuse-check work stack
#[derive(Clone, Copy)]
enum Scope {
    /// Same context as the state that led here
    Inherit(GraphContext),
    /// Head of a child graph; gets the next context number when reached
    Fresh,
}

/// Fail if a state is reachable from more than one graph context
///
/// Contexts are numbered top-down: the main chain is
/// [`GraphContext::MAIN`] and each child graph takes the next number as the
/// walk enters it. Reaching a state again from its own context is fine.
/// Returns the context every state was assigned to.
///
/// # Errors
///
/// Returns [`BuildError::StateReuse`] naming the shared state
pub fn assert_not_reused(
    graph: &StateGraph,
    root: StateId,
) -> BuildResult<IndexMap<StateId, GraphContext>> {
    let mut seen: IndexMap<StateId, GraphContext> = IndexMap::new();
    let mut last_context = GraphContext::MAIN;
    let mut stack = vec![(root, Scope::Inherit(GraphContext::MAIN))];

    while let Some((current, scope)) = stack.pop() {
        let context = match scope {
            Scope::Inherit(context) => context,
            Scope::Fresh => {
                last_context = GraphContext::from_raw(last_context.as_u32() + 1);
                last_context
            }
        };

        match seen.get(&current) {
            Some(existing) if *existing == context => continue,
            Some(_) => {
                return Err(BuildError::StateReuse {
                    name: graph.name_of(current),
                });
            }
            None => {
                tracing::trace!(state = %graph.name_of(current), %context, "assigned graph context");
                seen.insert(current, context);
            }
        }

        let mut work: Vec<(StateId, Scope)> = graph
            .transitions(current)
            .into_iter()
            .map(|id| (id, Scope::Inherit(context)))
            .collect();
        work.extend(graph.children(current).into_iter().map(|id| (id, Scope::Fresh)));
        stack.extend(work.into_iter().rev());
    }

    Ok(seen)
}

/// Fail if a state is missing structure its kind requires
///
/// # Errors
///
/// Returns [`BuildError::Construction`] for a Parallel without branches, a Map
/// without a processor, or a Choice without rules
pub fn check_structure(graph: &StateGraph, id: StateId) -> BuildResult<()> {
    let node = graph.require(id)?;
    match node.kind {
        StateKind::Parallel(_) if graph.children(id).is_empty() => Err(BuildError::construction(
            &node.name,
            "Parallel states must have at least one branch",
        )),
        StateKind::Map(_) if graph.children(id).is_empty() => Err(BuildError::construction(
            &node.name,
            "Map states must have an item processor",
        )),
        StateKind::Choice if graph.choices(id).next().is_none() => Err(
            BuildError::construction(&node.name, "Choice states must have at least one rule"),
        ),
        _ => Ok(()),
    }
}

/// Validator for composed workflow graphs
pub struct Validator {
    /// Maximum states in the composed graph (0 = no limit)
    pub max_states: usize,
    /// Kind of machine the graph will run on
    pub machine_type: MachineType,
}

impl Validator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_states: 0,
            machine_type: MachineType::Standard,
        }
    }

    /// Validate the graph composed under `root`
    ///
    /// Names are checked first, then reuse, then per-state structure. The
    /// first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns error if the graph is invalid
    pub fn validate(&self, graph: &StateGraph, root: StateId) -> BuildResult<()> {
        assert_names_unique(graph, root)?;
        let contexts = assert_not_reused(graph, root)?;

        if self.max_states > 0 && contexts.len() > self.max_states {
            return Err(BuildError::Limit {
                count: contexts.len(),
                max: self.max_states,
            });
        }

        for &id in contexts.keys() {
            check_structure(graph, id)?;
            self.check_machine_type(graph, id)?;
        }

        tracing::debug!(
            root = %graph.name_of(root),
            states = contexts.len(),
            "validated state machine graph"
        );
        Ok(())
    }

    /// Express machines cannot wait on jobs or task tokens
    fn check_machine_type(&self, graph: &StateGraph, id: StateId) -> BuildResult<()> {
        if self.machine_type != MachineType::Express {
            return Ok(());
        }
        let node = graph.require(id)?;
        match node.as_task().map(|task| task.pattern) {
            Some(pattern @ (IntegrationPattern::Sync | IntegrationPattern::Token)) => {
                Err(BuildError::construction(
                    &node.name,
                    format!("Express state machines do not support the {pattern} integration pattern"),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Set maximum state count
    #[must_use]
    pub fn with_max_states(mut self, max: usize) -> Self {
        self.max_states = max;
        self
    }

    /// Set machine type
    #[must_use]
    pub fn with_machine_type(mut self, machine_type: MachineType) -> Self {
        self.machine_type = machine_type;
        self
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind};
    use crate::state::{CatchArgs, StateArgs, TaskArgs};

    fn pass(graph: &mut StateGraph, name: &str) -> StateId {
        graph.add_node(StateArgs::new(name), StateKind::Pass)
    }

    fn link(graph: &mut StateGraph, from: StateId, to: StateId, kind: EdgeKind) {
        graph.add_edge(Edge::new(from, to, kind)).unwrap();
    }

    #[test]
    fn test_validator_new() {
        let validator = Validator::new();
        assert_eq!(validator.max_states, 0);
        assert_eq!(validator.machine_type, MachineType::Standard);
    }

    #[test]
    fn test_validator_with_options() {
        let validator = Validator::new()
            .with_max_states(10)
            .with_machine_type(MachineType::Express);
        assert_eq!(validator.max_states, 10);
        assert_eq!(validator.machine_type, MachineType::Express);
    }

    #[test]
    fn test_names_unique_ok() {
        let mut graph = StateGraph::new();
        let a = pass(&mut graph, "A");
        let b = pass(&mut graph, "B");
        link(&mut graph, a, b, EdgeKind::Next);
        assert!(assert_names_unique(&graph, a).is_ok());
    }

    #[test]
    fn test_names_unique_duplicate() {
        let mut graph = StateGraph::new();
        let a = pass(&mut graph, "X");
        let b = pass(&mut graph, "X");
        link(&mut graph, a, b, EdgeKind::Next);
        assert_eq!(
            assert_names_unique(&graph, a),
            Err(BuildError::DuplicateName {
                name: "X".to_string()
            })
        );
    }

    #[test]
    fn test_names_unique_ignores_unreachable() {
        let mut graph = StateGraph::new();
        let a = pass(&mut graph, "X");
        pass(&mut graph, "X");
        assert!(assert_names_unique(&graph, a).is_ok());
    }

    #[test]
    fn test_names_unique_across_child_graph() {
        let mut graph = StateGraph::new();
        let map = graph.add_node(StateArgs::new("Dup"), StateKind::Map(Default::default()));
        let inner = pass(&mut graph, "Dup");
        link(&mut graph, map, inner, EdgeKind::Processor);
        assert!(matches!(
            assert_names_unique(&graph, map),
            Err(BuildError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_not_reused_assigns_contexts_top_down() {
        let mut graph = StateGraph::new();
        let parallel = graph.add_node(
            StateArgs::new("Parallel"),
            StateKind::Parallel(Default::default()),
        );
        let left = pass(&mut graph, "Left");
        let right = pass(&mut graph, "Right");
        let after = pass(&mut graph, "After");
        link(&mut graph, parallel, left, EdgeKind::Branch);
        link(&mut graph, parallel, right, EdgeKind::Branch);
        link(&mut graph, parallel, after, EdgeKind::Next);

        let contexts = assert_not_reused(&graph, parallel).unwrap();
        assert_eq!(contexts[&parallel], GraphContext::MAIN);
        assert_eq!(contexts[&after], GraphContext::MAIN);
        assert_eq!(contexts[&left], GraphContext::from_raw(1));
        assert_eq!(contexts[&right], GraphContext::from_raw(2));
    }

    #[test]
    fn test_not_reused_allows_converging_paths() {
        let mut graph = StateGraph::new();
        let task = graph.add_node(StateArgs::new("Task"), StateKind::Task(TaskArgs::new("arn")));
        let handler = pass(&mut graph, "Handler");
        link(&mut graph, task, handler, EdgeKind::Next);
        link(
            &mut graph,
            task,
            handler,
            EdgeKind::Catch {
                errors: CatchArgs::new().errors,
            },
        );
        assert!(assert_not_reused(&graph, task).is_ok());
    }

    #[test]
    fn test_not_reused_detects_branch_jumping_to_main() {
        let mut graph = StateGraph::new();
        let parallel = graph.add_node(
            StateArgs::new("Parallel"),
            StateKind::Parallel(Default::default()),
        );
        let inner = pass(&mut graph, "Inner");
        let shared = pass(&mut graph, "Shared");
        link(&mut graph, parallel, shared, EdgeKind::Next);
        link(&mut graph, parallel, inner, EdgeKind::Branch);
        link(&mut graph, inner, shared, EdgeKind::Next);

        assert_eq!(
            assert_not_reused(&graph, parallel).unwrap_err(),
            BuildError::StateReuse {
                name: "Shared".to_string()
            }
        );
    }

    #[test]
    fn test_check_structure_empty_parallel() {
        let mut graph = StateGraph::new();
        let parallel = graph.add_node(
            StateArgs::new("Fanout"),
            StateKind::Parallel(Default::default()),
        );
        let err = check_structure(&graph, parallel).unwrap_err();
        assert!(matches!(err, BuildError::Construction { ref state, .. } if state == "Fanout"));
    }

    #[test]
    fn test_check_structure_empty_choice() {
        let mut graph = StateGraph::new();
        let choice = graph.add_node(StateArgs::new("Route"), StateKind::Choice);
        assert!(check_structure(&graph, choice).is_err());
    }

    #[test]
    fn test_validate_limit() {
        let mut graph = StateGraph::new();
        let a = pass(&mut graph, "A");
        let b = pass(&mut graph, "B");
        link(&mut graph, a, b, EdgeKind::Next);

        let result = Validator::new().with_max_states(1).validate(&graph, a);
        assert_eq!(result, Err(BuildError::Limit { count: 2, max: 1 }));
        assert!(Validator::new().with_max_states(2).validate(&graph, a).is_ok());
    }

    #[test]
    fn test_validate_express_rejects_token_tasks() {
        let mut graph = StateGraph::new();
        let task = graph.add_node(
            StateArgs::new("Wait for approval"),
            StateKind::Task(TaskArgs::new("arn:aws:states:::sqs:sendMessage.waitForTaskToken")),
        );

        assert!(Validator::new().validate(&graph, task).is_ok());
        let err = Validator::new()
            .with_machine_type(MachineType::Express)
            .validate(&graph, task)
            .unwrap_err();
        assert!(err.to_string().contains("Wait for approval"));
    }
}
