//! Workflow builder: state factories and linking calls over a [`StateGraph`].
//!
//! States are created by the factory methods, which hand back a [`StateId`].
//! Links are added through the same builder, or through the chaining cursor
//! returned by [`Workflow::state`]. Construction only rejects edges that can
//! never be valid; whole-graph rules (unique names, no reuse across child
//! graphs) are checked once by [`Workflow::validate`].

use crate::error::{BuildError, BuildResult};
use crate::graph::{Edge, EdgeKind, StateGraph};
use crate::serialize::{self, StateDocument};
use crate::state::{
    CatchArgs, ChoiceRuleArgs, FailArgs, MapArgs, ParallelArgs, RetryPolicy, StateArgs, StateKind,
    TaskArgs, WaitFor,
};
use crate::traverse;
use crate::validate::Validator;
use indexmap::IndexMap;
use stratus_core::{Jsonata, Permission, StateId};

/// Builder owning every state of one state machine
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    graph: StateGraph,
}

impl Workflow {
    /// Create an empty workflow
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: StateGraph::new(),
        }
    }

    /// Underlying graph
    #[must_use]
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// First state created with the given name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.graph.find(name)
    }

    /// Name of a state
    #[must_use]
    pub fn name_of(&self, id: StateId) -> String {
        self.graph.name_of(id)
    }

    fn add(&mut self, state: impl Into<StateArgs>, kind: StateKind) -> StateId {
        let args = state.into();
        let state_type = kind.state_type();
        let id = self.graph.add_node(args, kind);
        tracing::trace!(state = %self.graph.name_of(id), %state_type, %id, "created state");
        id
    }

    /// Create a Pass state
    pub fn pass(&mut self, state: impl Into<StateArgs>) -> StateId {
        self.add(state, StateKind::Pass)
    }

    /// Create a Succeed state
    pub fn succeed(&mut self, state: impl Into<StateArgs>) -> StateId {
        self.add(state, StateKind::Succeed)
    }

    /// Create a Wait state
    pub fn wait(&mut self, state: impl Into<StateArgs>, wait: WaitFor) -> StateId {
        self.add(state, StateKind::Wait(wait))
    }

    /// Create a Fail state
    pub fn fail(&mut self, state: impl Into<StateArgs>, args: FailArgs) -> StateId {
        self.add(state, StateKind::Fail(args))
    }

    /// Create a Task state
    pub fn task(&mut self, state: impl Into<StateArgs>, args: TaskArgs) -> StateId {
        self.add(state, StateKind::Task(args))
    }

    /// Create a Choice state; add rules with [`Workflow::when`]
    pub fn choice(&mut self, state: impl Into<StateArgs>) -> StateId {
        self.add(state, StateKind::Choice)
    }

    /// Create a Map state running `processor` for every item
    ///
    /// A mid-chain `processor` is resolved to the head of its chain, so the
    /// whole chain becomes the item processor.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::StateReuse`] if the processor chain already
    /// belongs to another Map or Parallel
    pub fn map(
        &mut self,
        state: impl Into<StateArgs>,
        processor: StateId,
        args: MapArgs,
    ) -> BuildResult<StateId> {
        let head = self.child_head(processor)?;
        let id = self.add(state, StateKind::Map(args));
        self.graph.add_edge(Edge::new(id, head, EdgeKind::Processor))?;
        Ok(id)
    }

    /// Create a Parallel state; add branches with [`Workflow::branch`]
    pub fn parallel(&mut self, state: impl Into<StateArgs>, args: ParallelArgs) -> StateId {
        self.add(state, StateKind::Parallel(args))
    }

    /// Set the unconditional successor of `from`
    ///
    /// Returns `to`, so chains continue from the state just attached.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] if `from` already has a successor
    /// or is a Choice state
    pub fn next(&mut self, from: StateId, to: StateId) -> BuildResult<StateId> {
        let node = self.graph.require(from)?;
        self.graph.require(to)?;

        if matches!(node.kind, StateKind::Choice) {
            return Err(BuildError::construction(
                &node.name,
                "Choice states cannot have a next state, use when or otherwise",
            ));
        }
        if let Some(existing) = self.graph.successor(from) {
            return Err(BuildError::construction(
                &node.name,
                format!(
                    "the next state is already set to \"{}\"",
                    self.graph.name_of(existing)
                ),
            ));
        }

        self.graph.add_edge(Edge::new(from, to, EdgeKind::Next))?;
        Ok(to)
    }

    /// Append a retry policy
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] unless the state is a Task, Map or
    /// Parallel
    pub fn retry(&mut self, id: StateId, policy: RetryPolicy) -> BuildResult<()> {
        let node = self.graph.require_mut(id)?;
        if !node.kind.can_fail_over() {
            return Err(BuildError::construction(
                &node.name,
                format!("{} states do not support retry", node.state_type()),
            ));
        }
        node.retries.push(policy);
        Ok(())
    }

    /// Route matching errors to `target`
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] unless the state is a Task, Map or
    /// Parallel
    pub fn catch(&mut self, id: StateId, target: StateId, args: CatchArgs) -> BuildResult<()> {
        let node = self.graph.require(id)?;
        if !node.kind.can_fail_over() {
            return Err(BuildError::construction(
                &node.name,
                format!("{} states do not support catch", node.state_type()),
            ));
        }
        self.graph.add_edge(Edge::new(
            id,
            target,
            EdgeKind::Catch {
                errors: args.errors,
            },
        ))
    }

    /// Add a branch to a Parallel state
    ///
    /// Branches run in registration order. The branch is resolved to the head
    /// of its chain.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] if `parallel` is not a Parallel
    /// state, or [`BuildError::StateReuse`] if the branch already belongs to
    /// another Map or Parallel
    pub fn branch(&mut self, parallel: StateId, state: StateId) -> BuildResult<()> {
        let node = self.graph.require(parallel)?;
        if !matches!(node.kind, StateKind::Parallel(_)) {
            return Err(BuildError::construction(
                &node.name,
                format!("{} states do not accept branches", node.state_type()),
            ));
        }
        let head = self.child_head(state)?;
        self.graph
            .add_edge(Edge::new(parallel, head, EdgeKind::Branch))
    }

    /// Add a choice rule taken when `condition` holds
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] if `choice` is not a Choice state
    pub fn when(&mut self, choice: StateId, condition: Jsonata, target: StateId) -> BuildResult<()> {
        self.when_with(choice, condition, target, ChoiceRuleArgs::new())
    }

    /// Add a choice rule that also sets output or variables
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] if `choice` is not a Choice state
    pub fn when_with(
        &mut self,
        choice: StateId,
        condition: Jsonata,
        target: StateId,
        rule: ChoiceRuleArgs,
    ) -> BuildResult<()> {
        self.require_choice(choice)?;
        self.graph.add_edge(Edge::new(
            choice,
            target,
            EdgeKind::Choice { condition, rule },
        ))
    }

    /// Set the state a Choice takes when no rule matches
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] if `choice` is not a Choice state
    /// or already has a default
    pub fn otherwise(&mut self, choice: StateId, target: StateId) -> BuildResult<()> {
        self.require_choice(choice)?;
        if let Some(existing) = self.graph.default_of(choice) {
            return Err(BuildError::construction(
                &self.graph.name_of(choice),
                format!(
                    "the default state is already set to \"{}\"",
                    self.graph.name_of(existing)
                ),
            ));
        }
        self.graph
            .add_edge(Edge::new(choice, target, EdgeKind::Default))
    }

    /// First state of the chain containing `id`
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownState`] for a handle this workflow did not issue
    pub fn head(&self, id: StateId) -> BuildResult<StateId> {
        self.graph.require(id)?;
        Ok(traverse::head(&self.graph, id))
    }

    /// Outermost state of the composed graph containing `id`
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownState`] for a handle this workflow did not issue
    pub fn root(&self, id: StateId) -> BuildResult<StateId> {
        self.graph.require(id)?;
        Ok(traverse::root(&self.graph, id))
    }

    /// Access-policy statements required by `id` and everything it reaches
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownState`] for a handle this workflow did not issue
    pub fn permissions(&self, id: StateId) -> BuildResult<Vec<Permission>> {
        self.graph.require(id)?;
        Ok(traverse::permissions(&self.graph, id))
    }

    /// Validate the composed graph containing `id`, starting from its root
    ///
    /// # Errors
    ///
    /// Returns the first naming, reuse, or structure error found
    pub fn validate(&self, id: StateId) -> BuildResult<()> {
        let root = self.root(id)?;
        Validator::new().validate(&self.graph, root)
    }

    /// Serialize `id` and every state reachable from it in the same graph
    /// context, keyed by name
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] for a composite without child
    /// graphs or a Choice without rules
    pub fn serialize(&self, id: StateId) -> BuildResult<IndexMap<String, StateDocument>> {
        serialize::serialize_states(&self.graph, id)
    }

    /// Chaining cursor positioned on `id`
    #[must_use]
    pub fn state(&mut self, id: StateId) -> StateMut<'_> {
        StateMut { workflow: self, id }
    }

    fn require_choice(&self, id: StateId) -> BuildResult<()> {
        let node = self.graph.require(id)?;
        if matches!(node.kind, StateKind::Choice) {
            Ok(())
        } else {
            Err(BuildError::construction(
                &node.name,
                format!("{} states do not accept choice rules", node.state_type()),
            ))
        }
    }

    /// Resolve a child graph argument to its head and make sure no other
    /// composite owns it
    fn child_head(&self, state: StateId) -> BuildResult<StateId> {
        self.graph.require(state)?;
        let head = traverse::head(&self.graph, state);
        if head != state {
            tracing::warn!(
                state = %self.graph.name_of(state),
                head = %self.graph.name_of(head),
                "child graph starts mid-chain, using the head of the chain"
            );
        }
        if self.graph.parent(head).is_some() {
            return Err(BuildError::StateReuse {
                name: self.graph.name_of(head),
            });
        }
        Ok(head)
    }
}

/// Cursor for chained construction
///
/// `next` moves the cursor to the state just attached; every other call
/// keeps it where it is.
pub struct StateMut<'a> {
    workflow: &'a mut Workflow,
    id: StateId,
}

impl<'a> StateMut<'a> {
    /// State the cursor is on
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Set the successor and move to it
    ///
    /// # Errors
    ///
    /// See [`Workflow::next`]
    pub fn next(self, to: StateId) -> BuildResult<StateMut<'a>> {
        let to = self.workflow.next(self.id, to)?;
        Ok(StateMut {
            workflow: self.workflow,
            id: to,
        })
    }

    /// Append a retry policy
    ///
    /// # Errors
    ///
    /// See [`Workflow::retry`]
    pub fn retry(self, policy: RetryPolicy) -> BuildResult<Self> {
        self.workflow.retry(self.id, policy)?;
        Ok(self)
    }

    /// Route matching errors to `target`
    ///
    /// # Errors
    ///
    /// See [`Workflow::catch`]
    pub fn catch(self, target: StateId, args: CatchArgs) -> BuildResult<Self> {
        self.workflow.catch(self.id, target, args)?;
        Ok(self)
    }

    /// Add a Parallel branch
    ///
    /// # Errors
    ///
    /// See [`Workflow::branch`]
    pub fn branch(self, state: StateId) -> BuildResult<Self> {
        self.workflow.branch(self.id, state)?;
        Ok(self)
    }

    /// Add a choice rule
    ///
    /// # Errors
    ///
    /// See [`Workflow::when`]
    pub fn when(self, condition: Jsonata, target: StateId) -> BuildResult<Self> {
        self.workflow.when(self.id, condition, target)?;
        Ok(self)
    }

    /// Set the choice default
    ///
    /// # Errors
    ///
    /// See [`Workflow::otherwise`]
    pub fn otherwise(self, target: StateId) -> BuildResult<Self> {
        self.workflow.otherwise(self.id, target)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stratus_core::Duration;

    #[test]
    fn test_next_returns_argument() {
        let mut wf = Workflow::new();
        let a = wf.pass("A");
        let b = wf.pass("B");
        assert_eq!(wf.next(a, b), Ok(b));
        assert_eq!(wf.graph().successor(a), Some(b));
    }

    #[test]
    fn test_next_twice_fails() {
        let mut wf = Workflow::new();
        let a = wf.pass("A");
        let b = wf.pass("B");
        let c = wf.pass("C");
        wf.next(a, b).unwrap();

        let err = wf.next(a, c).unwrap_err();
        assert!(matches!(err, BuildError::Construction { ref state, .. } if state == "A"));
        assert_eq!(wf.graph().successor(a), Some(b));
    }

    #[test]
    fn test_next_on_choice_fails() {
        let mut wf = Workflow::new();
        let choice = wf.choice("Route");
        let a = wf.pass("A");
        assert!(matches!(
            wf.next(choice, a),
            Err(BuildError::Construction { .. })
        ));
    }

    #[test]
    fn test_unknown_state() {
        let mut wf = Workflow::new();
        let a = wf.pass("A");
        let ghost = StateId::from_raw(42);
        assert_eq!(wf.next(a, ghost), Err(BuildError::UnknownState { id: ghost }));
        assert_eq!(wf.head(ghost), Err(BuildError::UnknownState { id: ghost }));
    }

    #[test]
    fn test_chained_cursor_continues_from_argument() {
        let mut wf = Workflow::new();
        let a = wf.pass("A");
        let b = wf.pass("B");
        let c = wf.succeed("C");

        let cursor = wf.state(a).next(b).unwrap().next(c).unwrap();
        assert_eq!(cursor.id(), c);
        assert_eq!(wf.graph().successor(a), Some(b));
        assert_eq!(wf.graph().successor(b), Some(c));
        assert_eq!(wf.head(c), Ok(a));
    }

    #[test]
    fn test_retry_only_on_failable_states() {
        let mut wf = Workflow::new();
        let task = wf.task("Charge", TaskArgs::new("arn:aws:states:::lambda:invoke"));
        let pass = wf.pass("Log");

        wf.retry(task, RetryPolicy::new().with_max_attempts(5)).unwrap();
        wf.retry(task, RetryPolicy::new()).unwrap();
        let retries = &wf.graph().node(task).unwrap().retries;
        assert_eq!(retries.len(), 2);
        assert_eq!(retries[0].max_attempts, 5);
        assert_eq!(retries[1].max_attempts, 3);

        let err = wf.retry(pass, RetryPolicy::new()).unwrap_err();
        assert!(err.to_string().contains("Log"));
    }

    #[test]
    fn test_catch_adds_edge() {
        let mut wf = Workflow::new();
        let task = wf.task("Charge", TaskArgs::new("arn"));
        let failed = wf.fail("Failed", FailArgs::new().with_error("PaymentFailed"));
        let wait = wf.wait("Pause", WaitFor::duration(Duration::from_secs(1)));

        wf.state(task)
            .catch(failed, CatchArgs::new().with_errors(["States.Timeout"]))
            .unwrap();
        let catches: Vec<_> = wf.graph().catches(task).collect();
        assert_eq!(catches.len(), 1);
        assert_eq!(catches[0].0, ["States.Timeout".to_string()]);
        assert_eq!(catches[0].1, failed);

        assert!(wf.catch(wait, failed, CatchArgs::new()).is_err());
    }

    #[test]
    fn test_map_resolves_processor_head() {
        let mut wf = Workflow::new();
        let x = wf.pass("X");
        let y = wf.pass("Y");
        wf.next(x, y).unwrap();

        let map = wf.map("Map", y, MapArgs::new()).unwrap();
        assert_eq!(wf.graph().children(map), vec![x]);
        assert_eq!(wf.root(y), Ok(map));
    }

    #[test]
    fn test_map_rejects_registered_processor() {
        let mut wf = Workflow::new();
        let shared = wf.pass("Shared");
        wf.map("M1", shared, MapArgs::new()).unwrap();

        let err = wf.map("M2", shared, MapArgs::new()).unwrap_err();
        assert_eq!(
            err,
            BuildError::StateReuse {
                name: "Shared".to_string()
            }
        );
        assert!(wf.find("M2").is_none());
    }

    #[test]
    fn test_branch_order_and_kind() {
        let mut wf = Workflow::new();
        let parallel = wf.parallel("Fanout", ParallelArgs::new());
        let p1 = wf.pass("P1");
        let p2 = wf.pass("P2");
        let p3 = wf.pass("P3");
        wf.state(parallel)
            .branch(p1)
            .unwrap()
            .branch(p2)
            .unwrap()
            .branch(p3)
            .unwrap();
        assert_eq!(wf.graph().children(parallel), vec![p1, p2, p3]);

        let pass = wf.pass("NotParallel");
        let other = wf.pass("Other");
        assert!(matches!(
            wf.branch(pass, other),
            Err(BuildError::Construction { .. })
        ));
        assert!(matches!(
            wf.branch(parallel, p1),
            Err(BuildError::StateReuse { .. })
        ));
    }

    #[test]
    fn test_choice_rules_and_default() {
        let mut wf = Workflow::new();
        let choice = wf.choice("Route");
        let big = wf.pass("Big");
        let small = wf.pass("Small");
        let other = wf.pass("Other");

        wf.state(choice)
            .when(Jsonata::wrap("$states.input.total > 100"), big)
            .unwrap()
            .otherwise(small)
            .unwrap();
        assert_eq!(wf.graph().choices(choice).count(), 1);
        assert_eq!(wf.graph().default_of(choice), Some(small));

        assert!(wf.otherwise(choice, other).is_err());
        assert!(wf.when(big, Jsonata::wrap("true"), other).is_err());
    }

    #[test]
    fn test_validate_from_any_state() {
        let mut wf = Workflow::new();
        let a = wf.pass("X");
        let b = wf.pass("X");
        wf.next(a, b).unwrap();

        assert_eq!(
            wf.validate(b),
            Err(BuildError::DuplicateName {
                name: "X".to_string()
            })
        );
    }

    #[test]
    fn test_permissions_include_children() {
        let mut wf = Workflow::new();
        let inner = wf.task(
            "Inner",
            TaskArgs::new("arn").with_permission(Permission::single("s3:GetObject", "*")),
        );
        let map = wf.map("Map", inner, MapArgs::new()).unwrap();
        let perms = wf.permissions(map).unwrap();
        assert_eq!(perms.len(), 1);
        assert!(perms[0].has_action("s3:GetObject"));
    }

    proptest! {
        #[test]
        fn test_next_twice_always_fails(len in 2usize..20, extra in 0usize..20) {
            let mut wf = Workflow::new();
            let ids: Vec<StateId> = (0..len).map(|i| wf.pass(format!("S{i}"))).collect();
            for pair in ids.windows(2) {
                wf.next(pair[0], pair[1]).unwrap();
            }
            let stray = wf.pass("Stray");
            let from = ids[extra % (len - 1)];
            let is_construction = matches!(
                wf.next(from, stray),
                Err(BuildError::Construction { .. })
            );
            prop_assert!(is_construction);
            prop_assert_eq!(wf.head(ids[len - 1]).unwrap(), ids[0]);
        }
    }
}
