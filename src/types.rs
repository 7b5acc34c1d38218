//! Data types describing intercepted calls and their results.
//!
//! This module contains the per-call descriptor handed to the
//! [`Interceptor`](crate::Interceptor) and the classification used to log the
//! result of an HTTP exchange.

use std::fmt;

/// One intercepted call: its qualified operation name and its arguments.
///
/// Descriptors borrow from the call site and only live for the duration of
/// one interception.
///
/// # Examples
///
/// ```rust
/// use loggable::Invocation;
/// use std::fmt::Debug;
///
/// let id = 42;
/// let title = "write docs";
/// let args: [&dyn Debug; 2] = [&id, &title];
/// let invocation = Invocation::new("TaskService::update", &args);
/// assert_eq!(invocation.operation(), "TaskService::update");
/// assert_eq!(invocation.arguments().to_string(), r#"[42, "write docs"]"#);
/// ```
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    operation: &'a str,
    arguments: &'a [&'a dyn fmt::Debug],
}

impl<'a> Invocation<'a> {
    pub fn new(operation: &'a str, arguments: &'a [&'a dyn fmt::Debug]) -> Self {
        Self {
            operation,
            arguments,
        }
    }

    /// A call without arguments.
    pub fn named(operation: &'a str) -> Self {
        Self::new(operation, &[])
    }

    pub fn operation(&self) -> &'a str {
        self.operation
    }

    pub fn arguments(&self) -> Arguments<'a> {
        Arguments(self.arguments)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("operation", &self.operation)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// Argument list of an [`Invocation`], displayed as `[a, b, ...]`.
#[derive(Clone, Copy)]
pub struct Arguments<'a>(&'a [&'a dyn fmt::Debug]);

impl Arguments<'_> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Arguments<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// How a result is written out when an HTTP exchange completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// No result
    Null,
    /// A sequence, one rendered string per element
    List(Vec<String>),
    /// Any other value, rendered as a string
    Value(String),
}

/// Results that can be logged by [`HttpInstrumentation`](crate::HttpInstrumentation).
///
/// The shape is only computed when the response record will be emitted.
pub trait LoggedResult {
    fn shape(&self) -> ResponseShape;
}

impl LoggedResult for () {
    fn shape(&self) -> ResponseShape {
        ResponseShape::Null
    }
}

impl<T: LoggedResult> LoggedResult for Option<T> {
    fn shape(&self) -> ResponseShape {
        match self {
            Some(value) => value.shape(),
            None => ResponseShape::Null,
        }
    }
}

impl<T: fmt::Debug> LoggedResult for Vec<T> {
    fn shape(&self) -> ResponseShape {
        ResponseShape::List(self.iter().map(|item| format!("{item:?}")).collect())
    }
}

impl LoggedResult for str {
    fn shape(&self) -> ResponseShape {
        ResponseShape::Value(self.to_owned())
    }
}

impl LoggedResult for String {
    fn shape(&self) -> ResponseShape {
        self.as_str().shape()
    }
}

impl<T: LoggedResult + ?Sized> LoggedResult for &T {
    fn shape(&self) -> ResponseShape {
        (**self).shape()
    }
}

impl LoggedResult for serde_json::Value {
    fn shape(&self) -> ResponseShape {
        match self {
            serde_json::Value::Null => ResponseShape::Null,
            serde_json::Value::Array(items) => {
                ResponseShape::List(items.iter().map(|item| item.to_string()).collect())
            }
            serde_json::Value::String(text) => ResponseShape::Value(text.clone()),
            other => ResponseShape::Value(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arguments_display_as_list() {
        let invocation = Invocation::named("Clock::now");
        assert_eq!(invocation.arguments().to_string(), "[]");
        assert!(invocation.arguments().is_empty());

        let pair = (1, "x");
        let args: [&dyn fmt::Debug; 2] = [&pair, &Some(3.5)];
        let invocation = Invocation::new("op", &args);
        assert_eq!(invocation.arguments().len(), 2);
        assert_eq!(invocation.arguments().to_string(), r#"[(1, "x"), Some(3.5)]"#);
    }

    #[test]
    fn test_plain_shapes() {
        assert_eq!(().shape(), ResponseShape::Null);
        assert_eq!(None::<String>.shape(), ResponseShape::Null);
        assert_eq!(
            Some("done".to_string()).shape(),
            ResponseShape::Value("done".into())
        );
        assert_eq!(
            vec![1, 2, 3].shape(),
            ResponseShape::List(vec!["1".into(), "2".into(), "3".into()])
        );
    }

    #[test]
    fn test_json_shapes() {
        assert_eq!(json!(null).shape(), ResponseShape::Null);
        assert_eq!(
            json!([{"id": 1}, "two"]).shape(),
            ResponseShape::List(vec![r#"{"id":1}"#.into(), r#""two""#.into()])
        );
        assert_eq!(json!("plain").shape(), ResponseShape::Value("plain".into()));
        assert_eq!(
            json!({"id": 7}).shape(),
            ResponseShape::Value(r#"{"id":7}"#.into())
        );
    }
}
