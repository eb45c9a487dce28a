//! Dynamic value types
//!
//! Settlement payloads are dynamically typed: a deferred value can be fulfilled
//! with a number, an array of results, another deferred value, or any object
//! that happens to expose a callable `then`. This module defines that value
//! model and the small amount of introspection the resolver needs to tell a
//! plain value from a thenable.

use crate::deferred::{self, DeferredValue};
use crate::error::{messages, Error, ErrorKind, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Type alias for native function implementations.
///
/// The first argument is the receiver (`this`), the second the call arguments.
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value>>;

/// A callable value
pub struct NativeFunction {
    /// Function name, used for display only
    pub name: String,
    /// The implementation
    pub func: NativeFn,
}

/// An object property
#[derive(Clone)]
pub enum Property {
    /// A plain stored value
    Data(Value),
    /// A getter invoked with the receiver on every read; it may raise
    Accessor(NativeFn),
}

/// A plain object: a bag of named properties
#[derive(Clone, Default)]
pub struct Object {
    properties: HashMap<String, Property>,
}

impl Object {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data property
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Add a method (a data property holding a function)
    pub fn with_method<F>(self, key: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        let key = key.into();
        let method = Value::function(key.clone(), func);
        self.with(key, method)
    }

    /// Add an accessor property whose getter runs on every read
    pub fn with_accessor<F>(mut self, key: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        self.properties
            .insert(key.into(), Property::Accessor(Rc::new(getter)));
        self
    }

    /// Set a data property
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), Property::Data(value.into()));
    }

    /// Look up an own property without invoking accessors
    pub fn get_own(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Number of own properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the object has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property names in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Wrap into a shared value
    pub fn into_value(self) -> Value {
        Value::Object(Rc::new(RefCell::new(self)))
    }
}

/// An error value, used as a rejection reason for typed errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: String,
}

/// A dynamically typed value
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Ordered sequence of values
    Array(Vec<Value>),
    /// Shared mutable object
    Object(Rc<RefCell<Object>>),
    /// Callable
    Function(Rc<NativeFunction>),
    /// A deferred value; exposes `then` and `catch`
    Deferred(DeferredValue),
    /// Error value
    Error(Rc<ErrorValue>),
}

impl Value {
    /// Create a callable value
    pub fn function<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        Value::Function(Rc::new(NativeFunction {
            name: name.into(),
            func: Rc::new(func),
        }))
    }

    /// Create an error value
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Value {
        Value::Error(Rc::new(ErrorValue {
            kind,
            message: message.into(),
        }))
    }

    /// Create an object from key/value pairs
    pub fn object_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
    {
        entries
            .into_iter()
            .fold(Object::new(), |object, (key, value)| object.with(key, value))
            .into_value()
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is nullish (null or undefined)
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Check if value can be called
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Whether the value is an object or a callable, i.e. a candidate thenable.
    /// Primitives are always plain values.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Value::Array(_)
                | Value::Object(_)
                | Value::Function(_)
                | Value::Deferred(_)
                | Value::Error(_)
        )
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Deferred(_) => "deferred",
            Value::Error(_) => "error",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_deferred(&self) -> Option<&DeferredValue> {
        match self {
            Value::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }

    /// Error kind, if this is an error value
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(err) => Some(err.kind),
            _ => None,
        }
    }

    /// Read a property, running accessors.
    ///
    /// Reading can fail: an accessor may raise. Values without properties
    /// answer `undefined`.
    pub fn get_property(&self, key: &str) -> Result<Value> {
        match self {
            Value::Object(object) => {
                // Release the borrow before running a getter; it may touch the object.
                let property = object.borrow().get_own(key).cloned();
                match property {
                    Some(Property::Data(value)) => Ok(value),
                    Some(Property::Accessor(getter)) => getter(self, &[]),
                    None => Ok(Value::Undefined),
                }
            }
            Value::Deferred(_) => Ok(deferred::method(key).unwrap_or(Value::Undefined)),
            Value::Error(err) => Ok(match key {
                "name" => Value::String(err.kind.to_string()),
                "message" => Value::String(err.message.clone()),
                _ => Value::Undefined,
            }),
            Value::Array(items) if key == "length" => Ok(Value::Number(items.len() as f64)),
            Value::Function(func) if key == "name" => Ok(Value::String(func.name.clone())),
            _ => Ok(Value::Undefined),
        }
    }

    /// Call this value with the given receiver and arguments
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        match self {
            Value::Function(func) => (func.func)(this, args),
            other => Err(Error::type_error(messages::not_a_function(other.type_name()))),
        }
    }

    /// Convert to a JSON value for display. Functions, deferred values and
    /// accessor properties have no JSON form and become `null` or are skipped.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(object) => {
                let object = object.borrow();
                let mut map = serde_json::Map::new();
                for key in object.keys() {
                    if let Some(Property::Data(value)) = object.get_own(key) {
                        map.insert(key.to_string(), value.to_json());
                    }
                }
                serde_json::Value::Object(map)
            }
            Value::Deferred(deferred) => serde_json::json!({
                "status": deferred.status().as_str(),
            }),
            Value::Error(err) => serde_json::Value::String(format!("{}: {}", err.kind, err.message)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                let object = object.borrow();
                write!(f, "{{")?;
                for (i, key) in object.keys().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match object.get_own(key) {
                        Some(Property::Data(value)) => write!(f, " {}: {}", key, value)?,
                        _ => write!(f, " {}: [Getter]", key)?,
                    }
                }
                if object.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            Value::Function(func) => write!(f, "[Function: {}]", func.name),
            Value::Deferred(deferred) => write!(f, "{}", deferred),
            Value::Error(err) => write!(f, "{}: {}", err.kind, err.message),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            other => write!(f, "{}", other),
        }
    }
}

/// Primitives, arrays and error values compare structurally; objects,
/// functions and deferred values compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Deferred(a), Value::Deferred(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        object.into_value()
    }
}

impl From<DeferredValue> for Value {
    fn from(deferred: DeferredValue) -> Self {
        Value::Deferred(deferred)
    }
}
