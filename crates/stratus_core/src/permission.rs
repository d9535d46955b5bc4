//! Access-policy statements required by deployed workflows.

use serde::{Deserialize, Serialize};

/// One access-policy statement: these actions are allowed on these resources
///
/// Statements are reported in the order they are discovered. Merging and
/// deduplication is left to whoever attaches them to a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Allowed actions, e.g. `lambda:InvokeFunction`
    pub actions: Vec<String>,
    /// Resources the actions apply to, usually ARNs
    pub resources: Vec<String>,
}

impl Permission {
    /// Create a statement from action and resource lists
    #[must_use]
    pub fn new<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a statement for a single action on a single resource
    #[must_use]
    pub fn single(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            actions: vec![action.into()],
            resources: vec![resource.into()],
        }
    }

    /// Add another action
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Add another resource
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }

    /// Check if the statement names an action
    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.actions.join(","), self.resources.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_new() {
        let p = Permission::new(["sqs:SendMessage"], ["arn:aws:sqs:us-east-1:123:q"]);
        assert_eq!(p.actions, vec!["sqs:SendMessage".to_string()]);
        assert_eq!(p.resources, vec!["arn:aws:sqs:us-east-1:123:q".to_string()]);
    }

    #[test]
    fn test_permission_builders() {
        let p = Permission::single("ecs:RunTask", "task-def")
            .with_action("ecs:StopTask")
            .with_resource("other");
        assert!(p.has_action("ecs:StopTask"));
        assert!(!p.has_action("ecs:DescribeTasks"));
        assert_eq!(p.resources.len(), 2);
    }

    #[test]
    fn test_permission_display() {
        let p = Permission::new(["a:One", "a:Two"], ["r1", "r2"]);
        assert_eq!(p.to_string(), "a:One,a:Two -> r1,r2");
    }

    #[test]
    fn test_permission_serde() {
        let p = Permission::single("sns:Publish", "topic");
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"actions": ["sns:Publish"], "resources": ["topic"]})
        );
    }
}
