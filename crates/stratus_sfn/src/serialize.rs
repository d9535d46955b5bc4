//! Declarative JSON documents for states, child graphs and whole machines.
//!
//! Each state becomes one [`StateDocument`] keyed by its name. Composite
//! states nest their child graphs as [`GraphDocument`]s. The document field
//! order follows the workflow runtime's own examples, and `serde_json` keeps
//! it because the workspace enables `preserve_order`.

use crate::config::MachineConfig;
use crate::error::{BuildError, BuildResult};
use crate::graph::StateGraph;
use crate::state::{StateKind, StateType, WaitFor};
use crate::traverse::reachable;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use stratus_core::{Dynamic, StateId};

/// Query language declared at the top of every definition
pub const QUERY_LANGUAGE: &str = "JSONata";

/// `Credentials` block of a Task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialsDocument {
    /// Role assumed before invoking the resource
    pub role_arn: String,
}

/// One entry of a `Retry` list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryDocument {
    /// Matched errors
    pub error_equals: Vec<String>,
    /// First retry delay in seconds
    pub interval_seconds: u64,
    /// Maximum retries
    pub max_attempts: u32,
    /// Delay multiplier
    pub backoff_rate: f64,
}

/// One entry of a `Catch` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatchDocument {
    /// Matched errors
    pub error_equals: Vec<String>,
    /// Fallback state name
    pub next: String,
}

/// One entry of a `Choices` list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceDocument {
    /// Rule condition
    pub condition: String,
    /// Target state name
    pub next: String,
    /// Output override when taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Variables assigned when taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign: Option<IndexMap<String, Value>>,
}

/// A chain of states with its entry point
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphDocument {
    /// Name of the first state
    pub start_at: String,
    /// States keyed by name, in structural order
    pub states: IndexMap<String, StateDocument>,
}

/// `ProcessorConfig` of a Map item processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorConfig {
    /// Processing mode
    pub mode: String,
}

/// Map item processor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorDocument {
    /// Processing mode block
    pub processor_config: ProcessorConfig,
    /// Processor graph
    #[serde(flatten)]
    pub graph: GraphDocument,
}

/// Declarative fragment for one state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(missing_docs)]
pub struct StateDocument {
    #[serde(rename = "Type")]
    pub state_type: StateType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<Dynamic<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<Dynamic<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChoiceDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Dynamic<Vec<Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_processor: Option<ProcessorDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<Dynamic<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<GraphDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<Vec<RetryDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catch: Option<Vec<CatchDocument>>,
}

impl StateDocument {
    fn new(state_type: StateType) -> Self {
        Self {
            state_type,
            comment: None,
            resource: None,
            credentials: None,
            timeout_seconds: None,
            arguments: None,
            seconds: None,
            timestamp: None,
            error: None,
            cause: None,
            choices: None,
            default: None,
            items: None,
            item_selector: None,
            item_processor: None,
            max_concurrency: None,
            branches: None,
            output: None,
            assign: None,
            next: None,
            end: None,
            retry: None,
            catch: None,
        }
    }
}

/// Top-level state machine definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Definition {
    /// Machine comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Expression language of every field
    pub query_language: &'static str,
    /// Name of the first state
    pub start_at: String,
    /// Top-level states
    pub states: IndexMap<String, StateDocument>,
    /// Execution timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

/// Composites currently being serialized, innermost last
type Ancestors = Vec<StateId>;

fn state_document(
    graph: &StateGraph,
    id: StateId,
    ancestors: &mut Ancestors,
) -> BuildResult<StateDocument> {
    let node = graph.require(id)?;
    let mut doc = StateDocument::new(node.state_type());
    doc.comment = node.comment.clone();
    doc.output = node.output.clone();
    if !node.assign.is_empty() {
        doc.assign = Some(node.assign.clone());
    }

    match &node.kind {
        StateKind::Pass | StateKind::Succeed => {}
        StateKind::Wait(WaitFor::Seconds(delay)) => {
            doc.seconds = Some(delay.map_ref(|d| d.as_secs()));
        }
        StateKind::Wait(WaitFor::Timestamp(instant)) => {
            doc.timestamp = Some(instant.clone());
        }
        StateKind::Fail(fail) => {
            doc.error = fail.error.clone();
            doc.cause = fail.cause.clone();
        }
        StateKind::Task(task) => {
            doc.resource = Some(task.resource.clone());
            doc.credentials = task.role.as_ref().map(|role| CredentialsDocument {
                role_arn: role.clone(),
            });
            doc.timeout_seconds = task.timeout.as_ref().map(|t| t.map_ref(|d| d.as_secs()));
            doc.arguments = task.arguments.clone();
        }
        StateKind::Choice => {
            let choices: Vec<ChoiceDocument> = graph
                .choices(id)
                .map(|(condition, rule, target)| ChoiceDocument {
                    condition: condition.to_string(),
                    next: graph.name_of(target),
                    output: rule.output.clone(),
                    assign: if rule.assign.is_empty() {
                        None
                    } else {
                        Some(rule.assign.clone())
                    },
                })
                .collect();
            if choices.is_empty() {
                return Err(BuildError::construction(
                    &node.name,
                    "Choice states must have at least one rule",
                ));
            }
            doc.choices = Some(choices);
            doc.default = graph.default_of(id).map(|target| graph.name_of(target));
        }
        StateKind::Map(map) => {
            let processor = graph.children(id).first().copied().ok_or_else(|| {
                BuildError::construction(&node.name, "Map states must have an item processor")
            })?;
            ancestors.push(id);
            let processor = graph_document(graph, processor, ancestors)?;
            ancestors.pop();

            doc.items = map.items.clone();
            doc.item_selector = map.item_selector.clone();
            doc.item_processor = Some(ProcessorDocument {
                processor_config: ProcessorConfig {
                    mode: "INLINE".to_string(),
                },
                graph: processor,
            });
            doc.max_concurrency = map.max_concurrency.clone();
        }
        StateKind::Parallel(parallel) => {
            let heads = graph.children(id);
            if heads.is_empty() {
                return Err(BuildError::construction(
                    &node.name,
                    "Parallel states must have at least one branch",
                ));
            }
            ancestors.push(id);
            let branches = heads
                .into_iter()
                .map(|head| graph_document(graph, head, ancestors))
                .collect::<BuildResult<Vec<_>>>()?;
            ancestors.pop();

            doc.arguments = parallel.arguments.clone();
            doc.branches = Some(branches);
        }
    }

    // Succeed and Fail end execution by themselves; Choice routes through its rules
    if !node.kind.is_terminal() && !matches!(node.kind, StateKind::Choice) {
        match graph.successor(id) {
            Some(next) => doc.next = Some(graph.name_of(next)),
            None => doc.end = Some(true),
        }
    }

    doc.retry = non_empty(
        node.retries
            .iter()
            .map(|policy| RetryDocument {
                error_equals: policy.errors.clone(),
                interval_seconds: policy.interval.as_secs(),
                max_attempts: policy.max_attempts,
                backoff_rate: policy.backoff_rate,
            })
            .collect(),
    );
    doc.catch = non_empty(
        graph
            .catches(id)
            .map(|(errors, target)| CatchDocument {
                error_equals: errors.to_vec(),
                next: graph.name_of(target),
            })
            .collect(),
    );

    tracing::trace!(state = %node.name, state_type = %node.state_type(), "serialized state");
    Ok(doc)
}

fn states_from(
    graph: &StateGraph,
    start: StateId,
    ancestors: &mut Ancestors,
) -> BuildResult<IndexMap<String, StateDocument>> {
    let mut states = IndexMap::new();
    for id in reachable(graph, start) {
        if ancestors.contains(&id) {
            return Err(BuildError::construction(
                &graph.name_of(id),
                "a Map or Parallel state cannot be part of its own child graph",
            ));
        }
        let doc = state_document(graph, id, ancestors)?;
        states.insert(graph.name_of(id), doc);
    }
    Ok(states)
}

fn graph_document(
    graph: &StateGraph,
    head: StateId,
    ancestors: &mut Ancestors,
) -> BuildResult<GraphDocument> {
    Ok(GraphDocument {
        start_at: graph.name_of(head),
        states: states_from(graph, head, ancestors)?,
    })
}

/// Serialize `start` and every state reachable from it in its graph context
///
/// # Errors
///
/// Returns [`BuildError::Construction`] for a composite without child
/// graphs, a Choice without rules, or a composite reachable from inside its
/// own child graph
pub fn serialize_states(
    graph: &StateGraph,
    start: StateId,
) -> BuildResult<IndexMap<String, StateDocument>> {
    graph.require(start)?;
    let states = states_from(graph, start, &mut Vec::new())?;
    tracing::debug!(start = %graph.name_of(start), states = states.len(), "serialized states");
    Ok(states)
}

/// Serialize the chain starting at `head` as a child graph document
///
/// # Errors
///
/// See [`serialize_states`]
pub fn serialize_graph(graph: &StateGraph, head: StateId) -> BuildResult<GraphDocument> {
    graph.require(head)?;
    graph_document(graph, head, &mut Vec::new())
}

/// Build the top-level definition for the machine rooted at `root`
///
/// # Errors
///
/// See [`serialize_states`]
pub fn definition(
    graph: &StateGraph,
    root: StateId,
    config: &MachineConfig,
) -> BuildResult<Definition> {
    let GraphDocument { start_at, states } = serialize_graph(graph, root)?;
    Ok(Definition {
        comment: config.comment.clone(),
        query_language: QUERY_LANGUAGE,
        start_at,
        states,
        timeout_seconds: config.timeout.map(|t| t.as_secs()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        FailArgs, MapArgs, ParallelArgs, RetryPolicy, StateArgs, TaskArgs, WaitFor,
    };
    use crate::workflow::Workflow;
    use serde_json::json;
    use stratus_core::{Duration, Jsonata};

    fn to_json<T: Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap()
    }

    #[test]
    fn test_chain_scenario() {
        let mut wf = Workflow::new();
        let a = wf.pass("A");
        let b = wf.wait("B", WaitFor::duration(Duration::from_secs(10)));
        let c = wf.succeed("C");
        wf.state(a).next(b).unwrap().next(c).unwrap();

        let states = wf.serialize(a).unwrap();
        assert_eq!(
            to_json(&states),
            json!({
                "A": {"Type": "Pass", "Next": "B"},
                "B": {"Type": "Wait", "Seconds": 10, "Next": "C"},
                "C": {"Type": "Succeed"}
            })
        );
        assert_eq!(states.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_terminal_states_never_emit_next_or_end() {
        let mut wf = Workflow::new();
        let done = wf.succeed("Done");
        let failed = wf.fail("Failed", FailArgs::new().with_error("Boom").with_cause("bad"));
        let after = wf.pass("After");
        wf.next(done, after).unwrap();

        let states = wf.serialize(done).unwrap();
        assert_eq!(to_json(&states["Done"]), json!({"Type": "Succeed"}));
        assert!(!states.contains_key("After"));

        let states = wf.serialize(failed).unwrap();
        assert_eq!(
            to_json(&states["Failed"]),
            json!({"Type": "Fail", "Error": "Boom", "Cause": "bad"})
        );
    }

    #[test]
    fn test_task_fields() {
        let mut wf = Workflow::new();
        let task = wf.task(
            StateArgs::new("Charge").with_comment("charge the card"),
            TaskArgs::new("arn:aws:states:::lambda:invoke")
                .with_arguments(json!({"FunctionName": "arn:fn"}))
                .with_role("arn:role")
                .with_timeout(Duration::from_mins(1)),
        );
        let failed = wf.fail("Failed", FailArgs::new());
        wf.retry(task, RetryPolicy::new().with_max_attempts(5)).unwrap();
        wf.retry(task, RetryPolicy::new()).unwrap();
        wf.catch(task, failed, Default::default()).unwrap();

        let states = wf.serialize(task).unwrap();
        assert_eq!(
            to_json(&states["Charge"]),
            json!({
                "Type": "Task",
                "Comment": "charge the card",
                "Resource": "arn:aws:states:::lambda:invoke",
                "Credentials": {"RoleArn": "arn:role"},
                "TimeoutSeconds": 60,
                "Arguments": {"FunctionName": "arn:fn"},
                "End": true,
                "Retry": [
                    {"ErrorEquals": ["States.ALL"], "IntervalSeconds": 1, "MaxAttempts": 5, "BackoffRate": 2.0},
                    {"ErrorEquals": ["States.ALL"], "IntervalSeconds": 1, "MaxAttempts": 3, "BackoffRate": 2.0}
                ],
                "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Failed"}]
            })
        );
        assert_eq!(states.keys().collect::<Vec<_>>(), vec!["Charge", "Failed"]);
    }

    #[test]
    fn test_dynamic_fields_keep_expressions() {
        let mut wf = Workflow::new();
        let wait = wf.wait("Until", WaitFor::timestamp("{% $states.input.at %}"));
        let delay = wf.wait("Delay", WaitFor::duration(Jsonata::wrap("$states.input.delay")));
        wf.next(wait, delay).unwrap();

        let states = wf.serialize(wait).unwrap();
        assert_eq!(
            to_json(&states["Until"]),
            json!({"Type": "Wait", "Timestamp": "{% $states.input.at %}", "Next": "Delay"})
        );
        assert_eq!(
            to_json(&states["Delay"]),
            json!({"Type": "Wait", "Seconds": "{% $states.input.delay %}", "End": true})
        );
    }

    #[test]
    fn test_map_scenario() {
        let mut wf = Workflow::new();
        let x = wf.pass("X");
        let y = wf.pass("Y");
        wf.next(x, y).unwrap();
        let map = wf
            .map(
                "Map",
                x,
                MapArgs::new()
                    .with_items(vec![json!(1), json!(2), json!(3)])
                    .with_max_concurrency(2u32),
            )
            .unwrap();

        let states = wf.serialize(map).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(
            to_json(&states["Map"]),
            json!({
                "Type": "Map",
                "Items": [1, 2, 3],
                "ItemProcessor": {
                    "ProcessorConfig": {"Mode": "INLINE"},
                    "StartAt": "X",
                    "States": {
                        "X": {"Type": "Pass", "Next": "Y"},
                        "Y": {"Type": "Pass", "End": true}
                    }
                },
                "MaxConcurrency": 2,
                "End": true
            })
        );
    }

    #[test]
    fn test_parallel_branches_in_order() {
        let mut wf = Workflow::new();
        let parallel = wf.parallel(
            "Fanout",
            ParallelArgs::new().with_arguments(json!({"id": "{% $states.input.id %}"})),
        );
        let names = ["P1", "P2", "P3"];
        for name in names {
            let branch = wf.pass(name);
            wf.branch(parallel, branch).unwrap();
        }

        let doc = to_json(&wf.serialize(parallel).unwrap()["Fanout"]);
        let starts: Vec<&str> = doc["Branches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["StartAt"].as_str().unwrap())
            .collect();
        assert_eq!(starts, names);
        assert_eq!(doc["Arguments"], json!({"id": "{% $states.input.id %}"}));
    }

    #[test]
    fn test_parallel_without_branches_fails() {
        let mut wf = Workflow::new();
        let parallel = wf.parallel("Empty", ParallelArgs::new());
        let err = wf.serialize(parallel).unwrap_err();
        assert!(matches!(err, BuildError::Construction { ref state, .. } if state == "Empty"));
    }

    #[test]
    fn test_choice_document() {
        let mut wf = Workflow::new();
        let choice = wf.choice("Route");
        let big = wf.pass("Big");
        let small = wf.pass("Small");
        wf.when_with(
            choice,
            Jsonata::wrap("$states.input.total > 100"),
            big,
            crate::state::ChoiceRuleArgs::new().with_assign("tier", json!("gold")),
        )
        .unwrap();
        wf.otherwise(choice, small).unwrap();

        let states = wf.serialize(choice).unwrap();
        assert_eq!(
            to_json(&states["Route"]),
            json!({
                "Type": "Choice",
                "Choices": [{
                    "Condition": "{% $states.input.total > 100 %}",
                    "Next": "Big",
                    "Assign": {"tier": "gold"}
                }],
                "Default": "Small"
            })
        );
        assert_eq!(states.keys().collect::<Vec<_>>(), vec!["Route", "Big", "Small"]);
    }

    #[test]
    fn test_choice_loop_terminates() {
        let mut wf = Workflow::new();
        let poll = wf.task("Poll", TaskArgs::new("arn"));
        let check = wf.choice("Check");
        let done = wf.succeed("Done");
        wf.next(poll, check).unwrap();
        wf.when(check, Jsonata::wrap("$states.input.ready"), done).unwrap();
        wf.otherwise(check, poll).unwrap();

        let states = wf.serialize(poll).unwrap();
        assert_eq!(states.keys().collect::<Vec<_>>(), vec!["Poll", "Check", "Done"]);
    }

    #[test]
    fn test_composite_inside_own_child_graph_fails() {
        let mut wf = Workflow::new();
        let inner = wf.pass("Inner");
        let map = wf.map("Map", inner, MapArgs::new()).unwrap();
        wf.next(inner, map).unwrap();

        assert!(matches!(
            wf.serialize(map),
            Err(BuildError::Construction { .. })
        ));
    }

    #[test]
    fn test_definition() {
        let mut wf = Workflow::new();
        let a = wf.pass("A");
        let config = MachineConfig::new()
            .with_comment("demo")
            .with_timeout(Duration::from_mins(5));

        let definition = definition(wf.graph(), a, &config).unwrap();
        assert_eq!(
            serde_json::to_string(&definition).unwrap(),
            r#"{"Comment":"demo","QueryLanguage":"JSONata","StartAt":"A","States":{"A":{"Type":"Pass","End":true}},"TimeoutSeconds":300}"#
        );
    }
}
