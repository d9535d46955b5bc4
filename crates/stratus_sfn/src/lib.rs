//! Stratus Step Functions builder
//!
//! Typed construction of workflow state graphs (Pass, Wait, Fail, Succeed,
//! Task, Choice, Map, Parallel), whole-graph validation, and serialization
//! into the declarative JSON state-machine definition together with the
//! access-policy statements the machine needs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod graph;
pub mod integration;
pub mod machine;
pub mod resource;
pub mod serialize;
pub mod state;
pub mod traverse;
pub mod validate;
pub mod workflow;

pub use config::{MachineConfig, MachineType};
pub use error::{BuildError, BuildResult};
pub use graph::{Edge, EdgeKind, StateGraph};
pub use integration::{
    EcsRunTaskArgs, EventBridgePutEventsArgs, IntegrationPattern, LambdaInvokeArgs, PutEvent,
    SnsPublishArgs, SqsSendMessageArgs, TaskOptions,
};
pub use machine::{CompileWarning, CompiledMachine, StateMachine};
pub use resource::{Bus, BusRef, Function, FunctionRef, Queue, QueueRef, ServiceTask, ServiceTaskRef, Topic, TopicRef};
pub use serialize::{Definition, GraphDocument, StateDocument};
pub use state::{
    CatchArgs, ChoiceRuleArgs, FailArgs, MapArgs, ParallelArgs, RetryPolicy, StateArgs, StateKind,
    StateNode, StateType, StatesError, TaskArgs, WaitFor,
};
pub use validate::Validator;
pub use workflow::{StateMut, Workflow};
