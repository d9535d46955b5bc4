//! Service integrations: Task factories that fill in the resource ARN,
//! arguments and access-policy statements for a target resource.

use crate::error::{BuildError, BuildResult};
use crate::resource::{Bus, Function, Queue, ServiceTask, Topic};
use crate::state::{StateArgs, TaskArgs};
use crate::workflow::Workflow;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stratus_core::{Duration, Dynamic, Permission, StateId};

const SYNC_SUFFIX: &str = ".sync";
const TOKEN_SUFFIX: &str = ".waitForTaskToken";

/// How the runtime waits for an integrated service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationPattern {
    /// Continue as soon as the service responds
    #[default]
    Response,
    /// Wait for the started job to finish
    Sync,
    /// Wait until a task token is sent back
    Token,
}

impl IntegrationPattern {
    /// Read the pattern from a resource ARN suffix
    #[must_use]
    pub fn from_resource(resource: &str) -> Self {
        if resource.ends_with(TOKEN_SUFFIX) {
            Self::Token
        } else if resource.ends_with(SYNC_SUFFIX) {
            Self::Sync
        } else {
            Self::Response
        }
    }

    /// Suffix appended to the service ARN
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Response => "",
            Self::Sync => SYNC_SUFFIX,
            Self::Token => TOKEN_SUFFIX,
        }
    }

    /// Get the pattern name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Sync => "sync",
            Self::Token => "token",
        }
    }
}

impl std::fmt::Display for IntegrationPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integrated service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Lambda,
    Sns,
    Sqs,
    Ecs,
    EventBridge,
}

impl Service {
    fn arn(&self) -> &'static str {
        match self {
            Self::Lambda => "arn:aws:states:::lambda:invoke",
            Self::Sns => "arn:aws:states:::sns:publish",
            Self::Sqs => "arn:aws:states:::sqs:sendMessage",
            Self::Ecs => "arn:aws:states:::ecs:runTask",
            Self::EventBridge => "arn:aws:states:::events:putEvents",
        }
    }

    fn supports(&self, pattern: IntegrationPattern) -> bool {
        match pattern {
            IntegrationPattern::Response | IntegrationPattern::Token => true,
            IntegrationPattern::Sync => *self == Self::Ecs,
        }
    }

    fn resource(&self, state: &str, pattern: IntegrationPattern) -> BuildResult<String> {
        if !self.supports(pattern) {
            return Err(BuildError::construction(
                state,
                format!(
                    "the {pattern} integration pattern is not supported by {}",
                    self.arn()
                ),
            ));
        }
        Ok(format!("{}{}", self.arn(), pattern.suffix()))
    }
}

/// Options shared by every integration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskOptions {
    /// Role to assume before calling the service
    pub role: Option<String>,
    /// Maximum run time
    pub timeout: Option<Dynamic<Duration>>,
    /// How to wait for the service
    pub pattern: IntegrationPattern,
}

impl TaskOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    /// Set integration pattern
    #[must_use]
    pub fn with_pattern(mut self, pattern: IntegrationPattern) -> Self {
        self.pattern = pattern;
        self
    }

    fn apply(self, mut task: TaskArgs) -> TaskArgs {
        task.role = self.role;
        task.timeout = self.timeout;
        task
    }
}

/// Lambda invocation arguments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LambdaInvokeArgs {
    /// Payload sent to the function
    pub payload: Option<Value>,
    /// Shared task options
    pub options: TaskOptions,
}

impl LambdaInvokeArgs {
    /// Create empty arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set payload
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set shared options
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

/// Fields common to topic and queue messages
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageFields {
    /// Message attributes
    pub attributes: IndexMap<String, String>,
    /// Deduplication ID for FIFO destinations
    pub deduplication_id: Option<String>,
    /// Group ID for FIFO destinations
    pub group_id: Option<String>,
}

impl MessageFields {
    fn write(self, arguments: &mut Map<String, Value>) {
        if !self.attributes.is_empty() {
            let attributes = self
                .attributes
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            arguments.insert("MessageAttributes".to_string(), Value::Object(attributes));
        }
        insert_opt(arguments, "MessageDeduplicationId", self.deduplication_id);
        insert_opt(arguments, "MessageGroupId", self.group_id);
    }
}

/// Topic publish arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnsPublishArgs {
    /// Message text
    pub message: String,
    /// Subject line
    pub subject: Option<String>,
    /// Attributes and FIFO fields
    pub fields: MessageFields,
    /// Shared task options
    pub options: TaskOptions,
}

impl SnsPublishArgs {
    /// Create arguments for a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Set subject
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add a message attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.attributes.insert(key.into(), value.into());
        self
    }

    /// Set deduplication ID
    #[must_use]
    pub fn with_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.fields.deduplication_id = Some(id.into());
        self
    }

    /// Set group ID
    #[must_use]
    pub fn with_group_id(mut self, id: impl Into<String>) -> Self {
        self.fields.group_id = Some(id.into());
        self
    }

    /// Set shared options
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

/// Queue send arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqsSendMessageArgs {
    /// Message body, text or a JSON document
    pub message_body: Value,
    /// Attributes and FIFO fields
    pub fields: MessageFields,
    /// Shared task options
    pub options: TaskOptions,
}

impl SqsSendMessageArgs {
    /// Create arguments for a message body
    #[must_use]
    pub fn new(message_body: impl Into<Value>) -> Self {
        Self {
            message_body: message_body.into(),
            ..Self::default()
        }
    }

    /// Add a message attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.attributes.insert(key.into(), value.into());
        self
    }

    /// Set deduplication ID
    #[must_use]
    pub fn with_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.fields.deduplication_id = Some(id.into());
        self
    }

    /// Set group ID
    #[must_use]
    pub fn with_group_id(mut self, id: impl Into<String>) -> Self {
        self.fields.group_id = Some(id.into());
        self
    }

    /// Set shared options
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

/// Container task arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EcsRunTaskArgs {
    /// Environment applied to every container
    pub environment: IndexMap<String, String>,
    /// Shared task options
    pub options: TaskOptions,
}

impl EcsRunTaskArgs {
    /// Create empty arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set shared options
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

/// One event for [`Workflow::event_bridge_put_events`]
#[derive(Debug, Clone, PartialEq)]
pub struct PutEvent {
    bus_arn: String,
    bus_name: String,
    /// Event source
    pub source: Option<String>,
    /// Detail type
    pub detail_type: Option<String>,
    /// Event payload
    pub detail: Option<Value>,
}

impl PutEvent {
    /// Create an event for a bus
    #[must_use]
    pub fn new<B: Bus + ?Sized>(bus: &B) -> Self {
        Self {
            bus_arn: bus.arn().to_string(),
            bus_name: bus.name().to_string(),
            source: None,
            detail_type: None,
            detail: None,
        }
    }

    /// Set source
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set detail type
    #[must_use]
    pub fn with_detail_type(mut self, detail_type: impl Into<String>) -> Self {
        self.detail_type = Some(detail_type.into());
        self
    }

    /// Set detail
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    fn entry(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("EventBusName".to_string(), Value::String(self.bus_name.clone()));
        insert_opt(&mut entry, "Source", self.source.clone());
        insert_opt(&mut entry, "DetailType", self.detail_type.clone());
        if let Some(detail) = &self.detail {
            entry.insert("Detail".to_string(), detail.clone());
        }
        Value::Object(entry)
    }
}

/// Event bus arguments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventBridgePutEventsArgs {
    /// Events to put, at least one
    pub events: Vec<PutEvent>,
    /// Shared task options
    pub options: TaskOptions,
}

impl EventBridgePutEventsArgs {
    /// Create empty arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event
    #[must_use]
    pub fn with_event(mut self, event: PutEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Set shared options
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

fn insert_opt(arguments: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        arguments.insert(key.to_string(), Value::String(value));
    }
}

impl Workflow {
    /// Invoke a function
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] for the `Sync` pattern
    pub fn lambda_invoke<F: Function + ?Sized>(
        &mut self,
        state: impl Into<StateArgs>,
        function: &F,
        args: LambdaInvokeArgs,
    ) -> BuildResult<StateId> {
        let state = state.into();
        let resource = Service::Lambda.resource(&state.name, args.options.pattern)?;

        let mut arguments = Map::new();
        arguments.insert(
            "FunctionName".to_string(),
            Value::String(function.arn().to_string()),
        );
        if let Some(payload) = args.payload {
            arguments.insert("Payload".to_string(), payload);
        }

        let task = TaskArgs::new(resource)
            .with_arguments(Value::Object(arguments))
            .with_permission(Permission::single("lambda:InvokeFunction", function.arn()));
        Ok(self.task(state, args.options.apply(task)))
    }

    /// Publish a message to a topic
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] for the `Sync` pattern
    pub fn sns_publish<T: Topic + ?Sized>(
        &mut self,
        state: impl Into<StateArgs>,
        topic: &T,
        args: SnsPublishArgs,
    ) -> BuildResult<StateId> {
        let state = state.into();
        let resource = Service::Sns.resource(&state.name, args.options.pattern)?;

        let mut arguments = Map::new();
        arguments.insert("TopicArn".to_string(), Value::String(topic.arn().to_string()));
        arguments.insert("Message".to_string(), Value::String(args.message));
        args.fields.write(&mut arguments);
        insert_opt(&mut arguments, "Subject", args.subject);

        let task = TaskArgs::new(resource)
            .with_arguments(Value::Object(arguments))
            .with_permission(Permission::single("sns:Publish", topic.arn()));
        Ok(self.task(state, args.options.apply(task)))
    }

    /// Send a message to a queue
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] for the `Sync` pattern
    pub fn sqs_send_message<Q: Queue + ?Sized>(
        &mut self,
        state: impl Into<StateArgs>,
        queue: &Q,
        args: SqsSendMessageArgs,
    ) -> BuildResult<StateId> {
        let state = state.into();
        let resource = Service::Sqs.resource(&state.name, args.options.pattern)?;

        let mut arguments = Map::new();
        arguments.insert("QueueUrl".to_string(), Value::String(queue.url().to_string()));
        arguments.insert("MessageBody".to_string(), args.message_body);
        args.fields.write(&mut arguments);

        let task = TaskArgs::new(resource)
            .with_arguments(Value::Object(arguments))
            .with_permission(Permission::single("sqs:SendMessage", queue.arn()));
        Ok(self.task(state, args.options.apply(task)))
    }

    /// Run a container task on Fargate
    ///
    /// With the `Sync` pattern the machine also needs to stop and describe
    /// the task and manage the rule that reports its completion.
    ///
    /// # Errors
    ///
    /// Every pattern is supported, so this only fails if the service table
    /// changes
    pub fn ecs_run_task<S: ServiceTask + ?Sized>(
        &mut self,
        state: impl Into<StateArgs>,
        service: &S,
        args: EcsRunTaskArgs,
    ) -> BuildResult<StateId> {
        let state = state.into();
        let pattern = args.options.pattern;
        let resource = Service::Ecs.resource(&state.name, pattern)?;

        let environment: Vec<Value> = args
            .environment
            .iter()
            .map(|(name, value)| serde_json::json!({ "Name": name, "Value": value }))
            .collect();
        let overrides: Vec<Value> = service
            .containers()
            .iter()
            .map(|name| serde_json::json!({ "Name": name, "Environment": environment }))
            .collect();
        let assign_public_ip = if service.assign_public_ip() {
            "ENABLED"
        } else {
            "DISABLED"
        };

        let arguments = serde_json::json!({
            "Cluster": service.cluster_arn(),
            "TaskDefinition": service.task_definition_arn(),
            "LaunchType": "FARGATE",
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "AssignPublicIp": assign_public_ip,
                    "SecurityGroups": service.security_groups(),
                    "Subnets": service.subnets(),
                }
            },
            "Overrides": { "ContainerOverrides": overrides },
        });

        let mut task = TaskArgs::new(resource)
            .with_arguments(arguments)
            .with_permission(Permission::single("ecs:RunTask", service.task_definition_arn()))
            .with_permission(Permission::new(
                ["iam:PassRole"],
                [service.execution_role_arn(), service.task_role_arn()],
            ));
        if pattern == IntegrationPattern::Sync {
            task = task
                .with_permission(Permission::new(["ecs:StopTask", "ecs:DescribeTasks"], ["*"]))
                .with_permission(Permission::new(
                    ["events:PutTargets", "events:PutRule", "events:DescribeRule"],
                    ["arn:aws:events:*:*:rule/StepFunctionsGetEventsForECSTaskRule"],
                ));
        }
        Ok(self.task(state, args.options.apply(task)))
    }

    /// Put events on one or more buses
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Construction`] when no events are given or for
    /// the `Sync` pattern
    pub fn event_bridge_put_events(
        &mut self,
        state: impl Into<StateArgs>,
        args: EventBridgePutEventsArgs,
    ) -> BuildResult<StateId> {
        let state = state.into();
        if args.events.is_empty() {
            return Err(BuildError::construction(
                &state.name,
                "at least one event is required",
            ));
        }
        let resource = Service::EventBridge.resource(&state.name, args.options.pattern)?;

        let entries: Vec<Value> = args.events.iter().map(PutEvent::entry).collect();
        let buses: Vec<&str> = args.events.iter().map(|e| e.bus_arn.as_str()).collect();

        let task = TaskArgs::new(resource)
            .with_arguments(serde_json::json!({ "Entries": entries }))
            .with_permission(Permission::new(["events:PutEvents"], buses));
        Ok(self.task(state, args.options.apply(task)))
    }
}
