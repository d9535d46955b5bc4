//! JSONata expressions and values that may be computed at runtime.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

const OPEN: &str = "{%";
const CLOSE: &str = "%}";

/// Check whether a string is a JSONata expression (`{% ... %}`)
#[must_use]
pub fn is_jsonata(value: &str) -> bool {
    value.len() >= OPEN.len() + CLOSE.len() && value.starts_with(OPEN) && value.ends_with(CLOSE)
}

/// A JSONata expression evaluated by the workflow runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jsonata(String);

impl Jsonata {
    /// Wrap an expression string
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidExpression`] unless the text is wrapped in `{% %}`
    pub fn new(expression: impl Into<String>) -> CoreResult<Self> {
        let expression = expression.into();
        if is_jsonata(&expression) {
            Ok(Self(expression))
        } else {
            Err(CoreError::InvalidExpression { input: expression })
        }
    }

    /// Wrap a bare expression body in `{% %}`
    #[must_use]
    pub fn wrap(body: &str) -> Self {
        Self(format!("{} {} {}", OPEN, body.trim(), CLOSE))
    }

    /// Get the full expression text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the expression body without the delimiters
    #[must_use]
    pub fn body(&self) -> &str {
        self.0[OPEN.len()..self.0.len() - CLOSE.len()].trim()
    }
}

impl TryFrom<String> for Jsonata {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Jsonata {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Jsonata> for String {
    fn from(value: Jsonata) -> Self {
        value.0
    }
}

impl std::fmt::Display for Jsonata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A literal value or an expression resolved by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dynamic<T> {
    /// Expression evaluated per execution
    Expression(Jsonata),
    /// Value fixed at definition time
    Literal(T),
}

impl<T> Dynamic<T> {
    /// Map the literal side, leaving expressions untouched
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Dynamic<U> {
        match self {
            Self::Literal(value) => Dynamic::Literal(f(value)),
            Self::Expression(expr) => Dynamic::Expression(expr),
        }
    }

    /// Borrowing form of [`Dynamic::map`]
    pub fn map_ref<U>(&self, f: impl FnOnce(&T) -> U) -> Dynamic<U> {
        match self {
            Self::Literal(value) => Dynamic::Literal(f(value)),
            Self::Expression(expr) => Dynamic::Expression(expr.clone()),
        }
    }
}

impl<T> From<Jsonata> for Dynamic<T> {
    fn from(value: Jsonata) -> Self {
        Self::Expression(value)
    }
}

impl From<crate::time::Duration> for Dynamic<crate::time::Duration> {
    fn from(value: crate::time::Duration) -> Self {
        Self::Literal(value)
    }
}

impl From<u32> for Dynamic<u32> {
    fn from(value: u32) -> Self {
        Self::Literal(value)
    }
}

impl<T> From<Vec<T>> for Dynamic<Vec<T>> {
    fn from(value: Vec<T>) -> Self {
        Self::Literal(value)
    }
}

impl From<String> for Dynamic<String> {
    fn from(value: String) -> Self {
        if is_jsonata(&value) {
            Self::Expression(Jsonata(value))
        } else {
            Self::Literal(value)
        }
    }
}

impl From<&str> for Dynamic<String> {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}
