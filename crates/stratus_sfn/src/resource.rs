//! Read-only views of the resources a task can target.
//!
//! The builder never creates or manages these resources. It only reads the
//! identifiers it has to put into task arguments and access-policy
//! statements. The `*Ref` structs are plain owned implementations for
//! callers that already hold the identifiers.

use serde::{Deserialize, Serialize};

/// A function that can be invoked
pub trait Function {
    /// Function ARN
    fn arn(&self) -> &str;
}

/// A notification topic
pub trait Topic {
    /// Topic ARN
    fn arn(&self) -> &str;
}

/// A message queue
pub trait Queue {
    /// Queue ARN
    fn arn(&self) -> &str;
    /// Queue URL messages are sent to
    fn url(&self) -> &str;
}

/// An event bus
pub trait Bus {
    /// Bus ARN
    fn arn(&self) -> &str;
    /// Bus name
    fn name(&self) -> &str;
}

/// A container task definition and the network it runs in
pub trait ServiceTask {
    /// Cluster the task runs on
    fn cluster_arn(&self) -> &str;
    /// Task definition ARN
    fn task_definition_arn(&self) -> &str;
    /// Container names, in definition order
    fn containers(&self) -> &[String];
    /// Subnets for the task network interface
    fn subnets(&self) -> &[String];
    /// Security groups for the task network interface
    fn security_groups(&self) -> &[String];
    /// Whether the task gets a public IP
    fn assign_public_ip(&self) -> bool;
    /// Role the task containers assume
    fn task_role_arn(&self) -> &str;
    /// Role the agent uses to start the task
    fn execution_role_arn(&self) -> &str;
}

/// Function reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRef {
    /// Function ARN
    pub arn: String,
}

impl FunctionRef {
    /// Create a function reference
    #[must_use]
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into() }
    }
}

impl Function for FunctionRef {
    fn arn(&self) -> &str {
        &self.arn
    }
}

/// Topic reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRef {
    /// Topic ARN
    pub arn: String,
}

impl TopicRef {
    /// Create a topic reference
    #[must_use]
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into() }
    }
}

impl Topic for TopicRef {
    fn arn(&self) -> &str {
        &self.arn
    }
}

/// Queue reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRef {
    /// Queue ARN
    pub arn: String,
    /// Queue URL
    pub url: String,
}

impl QueueRef {
    /// Create a queue reference
    #[must_use]
    pub fn new(arn: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            url: url.into(),
        }
    }
}

impl Queue for QueueRef {
    fn arn(&self) -> &str {
        &self.arn
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Bus reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusRef {
    /// Bus ARN
    pub arn: String,
    /// Bus name
    pub name: String,
}

impl BusRef {
    /// Create a bus reference
    #[must_use]
    pub fn new(arn: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            name: name.into(),
        }
    }
}

impl Bus for BusRef {
    fn arn(&self) -> &str {
        &self.arn
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Container task reference
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceTaskRef {
    /// Cluster ARN
    pub cluster_arn: String,
    /// Task definition ARN
    pub task_definition_arn: String,
    /// Container names
    pub containers: Vec<String>,
    /// Subnets
    pub subnets: Vec<String>,
    /// Security groups
    pub security_groups: Vec<String>,
    /// Assign a public IP
    pub assign_public_ip: bool,
    /// Task role ARN
    pub task_role_arn: String,
    /// Execution role ARN
    pub execution_role_arn: String,
}

impl ServiceTaskRef {
    /// Create a reference for a task definition on a cluster
    #[must_use]
    pub fn new(cluster_arn: impl Into<String>, task_definition_arn: impl Into<String>) -> Self {
        Self {
            cluster_arn: cluster_arn.into(),
            task_definition_arn: task_definition_arn.into(),
            ..Self::default()
        }
    }

    /// Add a container
    #[must_use]
    pub fn with_container(mut self, name: impl Into<String>) -> Self {
        self.containers.push(name.into());
        self
    }

    /// Add a subnet
    #[must_use]
    pub fn with_subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnets.push(subnet.into());
        self
    }

    /// Add a security group
    #[must_use]
    pub fn with_security_group(mut self, group: impl Into<String>) -> Self {
        self.security_groups.push(group.into());
        self
    }

    /// Set public IP assignment
    #[must_use]
    pub fn with_public_ip(mut self, assign: bool) -> Self {
        self.assign_public_ip = assign;
        self
    }

    /// Set task and execution roles
    #[must_use]
    pub fn with_roles(
        mut self,
        task_role_arn: impl Into<String>,
        execution_role_arn: impl Into<String>,
    ) -> Self {
        self.task_role_arn = task_role_arn.into();
        self.execution_role_arn = execution_role_arn.into();
        self
    }
}

impl ServiceTask for ServiceTaskRef {
    fn cluster_arn(&self) -> &str {
        &self.cluster_arn
    }

    fn task_definition_arn(&self) -> &str {
        &self.task_definition_arn
    }

    fn containers(&self) -> &[String] {
        &self.containers
    }

    fn subnets(&self) -> &[String] {
        &self.subnets
    }

    fn security_groups(&self) -> &[String] {
        &self.security_groups
    }

    fn assign_public_ip(&self) -> bool {
        self.assign_public_ip
    }

    fn task_role_arn(&self) -> &str {
        &self.task_role_arn
    }

    fn execution_role_arn(&self) -> &str {
        &self.execution_role_arn
    }
}
