//! State kinds and the arguments used to create them.
//!
//! A state is one node of the workflow graph. Everything a node owns by
//! itself lives here; everything that points at another node (next, catch,
//! choice rules, child graphs) is an edge in [`crate::graph`].

use crate::integration::IntegrationPattern;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stratus_core::{Duration, Dynamic, Permission, StateId};

/// Error name matching every runtime error
pub const ALL_ERRORS: &str = "States.ALL";

/// Predefined runtime error names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatesError {
    /// Any error
    #[serde(rename = "States.ALL")]
    All,
    /// Output exceeded the payload size limit
    #[serde(rename = "States.DataLimitExceeded")]
    DataLimitExceeded,
    /// Map run failed more items than tolerated
    #[serde(rename = "States.ExceedToleratedFailureThreshold")]
    ExceedToleratedFailureThreshold,
    /// Task missed its heartbeat
    #[serde(rename = "States.HeartbeatTimeout")]
    HeartbeatTimeout,
    /// HTTP task socket failure
    #[serde(rename = "States.Http.Socket")]
    HttpSocket,
    /// Intrinsic function failed
    #[serde(rename = "States.IntrinsicFailure")]
    IntrinsicFailure,
    /// Map item reader failed
    #[serde(rename = "States.ItemReaderFailed")]
    ItemReaderFailed,
    /// No choice rule matched and there is no default
    #[serde(rename = "States.NoChoiceMatched")]
    NoChoiceMatched,
    /// Parameter path did not resolve
    #[serde(rename = "States.ParameterPathFailure")]
    ParameterPathFailure,
    /// Insufficient privileges
    #[serde(rename = "States.Permissions")]
    Permissions,
    /// Result path could not be applied
    #[serde(rename = "States.ResultPathMatchFailure")]
    ResultPathMatchFailure,
    /// Map result writer failed
    #[serde(rename = "States.ResultWriterFailed")]
    ResultWriterFailed,
    /// Runtime exception
    #[serde(rename = "States.Runtime")]
    Runtime,
    /// Task failed
    #[serde(rename = "States.TaskFailed")]
    TaskFailed,
    /// Task timed out
    #[serde(rename = "States.Timeout")]
    Timeout,
}

impl StatesError {
    /// Get the runtime error name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => ALL_ERRORS,
            Self::DataLimitExceeded => "States.DataLimitExceeded",
            Self::ExceedToleratedFailureThreshold => "States.ExceedToleratedFailureThreshold",
            Self::HeartbeatTimeout => "States.HeartbeatTimeout",
            Self::HttpSocket => "States.Http.Socket",
            Self::IntrinsicFailure => "States.IntrinsicFailure",
            Self::ItemReaderFailed => "States.ItemReaderFailed",
            Self::NoChoiceMatched => "States.NoChoiceMatched",
            Self::ParameterPathFailure => "States.ParameterPathFailure",
            Self::Permissions => "States.Permissions",
            Self::ResultPathMatchFailure => "States.ResultPathMatchFailure",
            Self::ResultWriterFailed => "States.ResultWriterFailed",
            Self::Runtime => "States.Runtime",
            Self::TaskFailed => "States.TaskFailed",
            Self::Timeout => "States.Timeout",
        }
    }
}

impl std::fmt::Display for StatesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StatesError> for String {
    fn from(value: StatesError) -> Self {
        value.as_str().to_string()
    }
}

/// Fields every state accepts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateArgs {
    /// State name, unique across the composed graph
    pub name: String,
    /// Human-readable description
    pub comment: Option<String>,
    /// Output override: any JSON value, or a JSONata expression string
    pub output: Option<Value>,
    /// Workflow variables to assign
    pub assign: IndexMap<String, Value>,
}

impl StateArgs {
    /// Create arguments for a named state
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set comment
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set output
    #[must_use]
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Assign one variable
    #[must_use]
    pub fn with_assign(mut self, variable: impl Into<String>, value: Value) -> Self {
        self.assign.insert(variable.into(), value);
        self
    }
}

impl From<&str> for StateArgs {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StateArgs {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Retry policy, evaluated by the runtime in the order added
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Errors that trigger the retry
    pub errors: Vec<String>,
    /// Wait before the first retry
    pub interval: Duration,
    /// Maximum number of retries
    pub max_attempts: u32,
    /// Multiplier applied to the interval after each attempt
    pub backoff_rate: f64,
}

impl RetryPolicy {
    /// Create a policy with the defaults: all errors, 1 second, 3 attempts, rate 2
    #[must_use]
    pub fn new() -> Self {
        Self {
            errors: vec![ALL_ERRORS.to_string()],
            interval: Duration::from_secs(1),
            max_attempts: 3,
            backoff_rate: 2.0,
        }
    }

    /// Set matched errors
    #[must_use]
    pub fn with_errors<I>(mut self, errors: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }

    /// Set interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set max attempts
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set backoff rate
    #[must_use]
    pub fn with_backoff_rate(mut self, backoff_rate: f64) -> Self {
        self.backoff_rate = backoff_rate;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Catch arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchArgs {
    /// Errors routed to the fallback state
    pub errors: Vec<String>,
}

impl CatchArgs {
    /// Catch everything
    #[must_use]
    pub fn new() -> Self {
        Self {
            errors: vec![ALL_ERRORS.to_string()],
        }
    }

    /// Set matched errors
    #[must_use]
    pub fn with_errors<I>(mut self, errors: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for CatchArgs {
    fn default() -> Self {
        Self::new()
    }
}

/// What a Wait state waits for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    /// Relative delay
    Seconds(Dynamic<Duration>),
    /// Absolute ISO-8601 instant
    Timestamp(Dynamic<String>),
}

impl WaitFor {
    /// Wait for a fixed or computed delay
    #[must_use]
    pub fn duration(delay: impl Into<Dynamic<Duration>>) -> Self {
        Self::Seconds(delay.into())
    }

    /// Wait until an instant
    #[must_use]
    pub fn timestamp(instant: impl Into<Dynamic<String>>) -> Self {
        Self::Timestamp(instant.into())
    }
}

/// Fail state fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailArgs {
    /// Error name
    pub error: Option<Dynamic<String>>,
    /// Human-readable cause
    pub cause: Option<Dynamic<String>>,
}

impl FailArgs {
    /// Create empty fail arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error name
    #[must_use]
    pub fn with_error(mut self, error: impl Into<Dynamic<String>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set cause
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<Dynamic<String>>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Task state fields
#[derive(Debug, Clone, PartialEq)]
pub struct TaskArgs {
    /// Resource ARN the task invokes
    pub resource: String,
    /// Arguments passed to the resource
    pub arguments: Option<Value>,
    /// Role to assume before invoking the resource
    pub role: Option<String>,
    /// Maximum run time
    pub timeout: Option<Dynamic<Duration>>,
    /// Statements the machine role needs for this task
    pub permissions: Vec<Permission>,
    /// How the runtime waits for the resource
    pub pattern: IntegrationPattern,
}

impl TaskArgs {
    /// Create a task for a resource ARN
    ///
    /// The integration pattern is read from the resource suffix.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let pattern = IntegrationPattern::from_resource(&resource);
        Self {
            resource,
            arguments: None,
            role: None,
            timeout: None,
            permissions: Vec::new(),
            pattern,
        }
    }

    /// Set arguments
    #[must_use]
    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Set role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Dynamic<Duration>>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Add a required permission
    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }
}

/// Map state fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapArgs {
    /// Items to iterate: a JSON array or an expression yielding one
    pub items: Option<Dynamic<Vec<Value>>>,
    /// Transform applied to each item
    pub item_selector: Option<Value>,
    /// Upper bound on parallel iterations, 0 or unset means unlimited
    pub max_concurrency: Option<Dynamic<u32>>,
}

impl MapArgs {
    /// Create empty map arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set items
    #[must_use]
    pub fn with_items(mut self, items: impl Into<Dynamic<Vec<Value>>>) -> Self {
        self.items = Some(items.into());
        self
    }

    /// Set item selector
    #[must_use]
    pub fn with_item_selector(mut self, selector: Value) -> Self {
        self.item_selector = Some(selector);
        self
    }

    /// Set max concurrency
    #[must_use]
    pub fn with_max_concurrency(mut self, max: impl Into<Dynamic<u32>>) -> Self {
        self.max_concurrency = Some(max.into());
        self
    }
}

/// Parallel state fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParallelArgs {
    /// Arguments passed to every branch
    pub arguments: Option<Value>,
}

impl ParallelArgs {
    /// Create empty parallel arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set arguments
    #[must_use]
    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

/// Output and variables applied when a choice rule matches
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChoiceRuleArgs {
    /// Output override
    pub output: Option<Value>,
    /// Variables to assign
    pub assign: IndexMap<String, Value>,
}

impl ChoiceRuleArgs {
    /// Create empty rule arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output
    #[must_use]
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Assign one variable
    #[must_use]
    pub fn with_assign(mut self, variable: impl Into<String>, value: Value) -> Self {
        self.assign.insert(variable.into(), value);
        self
    }
}

/// Serialized `Type` tag of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateType {
    /// Pass input to output
    Pass,
    /// Delay
    Wait,
    /// Stop with an error
    Fail,
    /// Stop successfully
    Succeed,
    /// Invoke a resource
    Task,
    /// Branch on conditions
    Choice,
    /// Iterate a child graph over items
    Map,
    /// Run child graphs concurrently
    Parallel,
}

impl StateType {
    /// Get the tag text
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Wait => "Wait",
            Self::Fail => "Fail",
            Self::Succeed => "Succeed",
            Self::Task => "Task",
            Self::Choice => "Choice",
            Self::Map => "Map",
            Self::Parallel => "Parallel",
        }
    }
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a state node
#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    /// Pass state
    Pass,
    /// Succeed state
    Succeed,
    /// Wait state
    Wait(WaitFor),
    /// Fail state
    Fail(FailArgs),
    /// Task state
    Task(TaskArgs),
    /// Choice state; rules and default are edges
    Choice,
    /// Map state; the processor is an edge
    Map(MapArgs),
    /// Parallel state; branches are edges
    Parallel(ParallelArgs),
}

impl StateKind {
    /// Get the type tag
    #[must_use]
    pub fn state_type(&self) -> StateType {
        match self {
            Self::Pass => StateType::Pass,
            Self::Succeed => StateType::Succeed,
            Self::Wait(_) => StateType::Wait,
            Self::Fail(_) => StateType::Fail,
            Self::Task(_) => StateType::Task,
            Self::Choice => StateType::Choice,
            Self::Map(_) => StateType::Map,
            Self::Parallel(_) => StateType::Parallel,
        }
    }

    /// Whether the kind supports retry and catch
    #[must_use]
    pub fn can_fail_over(&self) -> bool {
        matches!(self, Self::Task(_) | Self::Map(_) | Self::Parallel(_))
    }

    /// Whether the kind ends execution and never emits `Next` or `End`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeed | Self::Fail(_))
    }
}

/// One record of the node table
#[derive(Debug, Clone, PartialEq)]
pub struct StateNode {
    /// Handle of this node
    pub id: StateId,
    /// State name
    pub name: String,
    /// Comment
    pub comment: Option<String>,
    /// Output override
    pub output: Option<Value>,
    /// Variables to assign
    pub assign: IndexMap<String, Value>,
    /// Kind-specific payload
    pub kind: StateKind,
    /// Retry policies in evaluation order
    pub retries: Vec<RetryPolicy>,
}

impl StateNode {
    /// Create a node record
    #[must_use]
    pub fn new(id: StateId, args: StateArgs, kind: StateKind) -> Self {
        Self {
            id,
            name: args.name,
            comment: args.comment,
            output: args.output,
            assign: args.assign,
            kind,
            retries: Vec::new(),
        }
    }

    /// Get the type tag
    #[must_use]
    pub fn state_type(&self) -> StateType {
        self.kind.state_type()
    }

    /// Get the task payload, if this is a task
    #[must_use]
    pub fn as_task(&self) -> Option<&TaskArgs> {
        match &self.kind {
            StateKind::Task(task) => Some(task),
            _ => None,
        }
    }
}
