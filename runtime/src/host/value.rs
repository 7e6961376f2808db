//! Tagged value model for the host's object graph.
//!
//! Objects are shared, identity-bearing handles so that cyclic graphs and
//! in-place mutation behave the way the host application observes them.

use crate::error::{HostError, HostResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// A value reachable from the host application.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Object(ObjectRef),
    Function(HostFunction),
    Deferred(Deferred),
}

impl HostValue {
    /// Build an object value from `(key, value)` pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        HostValue::Object(ObjectRef::from_entries(entries))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Host truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Null => false,
            HostValue::Bool(b) => *b,
            HostValue::Number(n) => *n != 0.0 && !n.is_nan(),
            HostValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Number(n) => write!(f, "{n}"),
            HostValue::String(s) => write!(f, "{s:?}"),
            HostValue::Array(items) => f.debug_list().entries(items).finish(),
            HostValue::Object(o) => o.fmt(f),
            HostValue::Function(func) => func.fmt(f),
            HostValue::Deferred(d) => d.fmt(f),
        }
    }
}

/// Objects and functions compare by identity, everything else by value.
impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
            (HostValue::Function(a), HostValue::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Number(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Number(v as f64)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(v: Vec<HostValue>) -> Self {
        HostValue::Array(v)
    }
}

impl From<ObjectRef> for HostValue {
    fn from(v: ObjectRef) -> Self {
        HostValue::Object(v)
    }
}

impl From<HostFunction> for HostValue {
    fn from(v: HostFunction) -> Self {
        HostValue::Function(v)
    }
}

/// Backing storage of an object: ordered own properties plus a frozen flag.
#[derive(Default)]
struct HostObject {
    props: Vec<(String, HostValue)>,
    frozen: bool,
}

impl HostObject {
    fn position(&self, key: &str) -> Option<usize> {
        self.props.iter().position(|(k, _)| k == key)
    }
}

/// Shared handle to a host object. Clones alias the same object.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<HostObject>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        let obj = Self::new();
        if let Ok(mut inner) = obj.0.write() {
            for (k, v) in entries {
                let key = k.into();
                match inner.position(&key) {
                    Some(i) => inner.props[i].1 = v,
                    None => inner.props.push((key, v)),
                }
            }
        }
        obj
    }

    /// Stable identity of the underlying allocation.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, key: &str) -> HostResult<Option<HostValue>> {
        let inner = self.0.read().map_err(|_| HostError::Poisoned)?;
        Ok(inner.position(key).map(|i| inner.props[i].1.clone()))
    }

    /// Write a property, appending it if new. Fails on frozen objects.
    pub fn set(&self, key: &str, value: HostValue) -> HostResult<()> {
        let mut inner = self.0.write().map_err(|_| HostError::Poisoned)?;
        if inner.frozen {
            return Err(HostError::Frozen(key.to_string()));
        }
        match inner.position(key) {
            Some(i) => inner.props[i].1 = value,
            None => inner.props.push((key.to_string(), value)),
        }
        Ok(())
    }

    pub fn keys(&self) -> HostResult<Vec<String>> {
        let inner = self.0.read().map_err(|_| HostError::Poisoned)?;
        Ok(inner.props.iter().map(|(k, _)| k.clone()).collect())
    }

    /// Snapshot of own properties. Nested objects in the snapshot still alias.
    pub fn entries(&self) -> HostResult<Vec<(String, HostValue)>> {
        let inner = self.0.read().map_err(|_| HostError::Poisoned)?;
        Ok(inner.props.clone())
    }

    pub fn len(&self) -> usize {
        self.0.read().map(|inner| inner.props.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freeze(&self) -> HostResult<()> {
        let mut inner = self.0.write().map_err(|_| HostError::Poisoned)?;
        inner.frozen = true;
        Ok(())
    }
}

impl fmt::Debug for ObjectRef {
    // Only keys are printed so cyclic graphs cannot recurse.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.keys().unwrap_or_default();
        write!(f, "Object#{:x}{keys:?}", self.id())
    }
}

type NativeFn = dyn Fn(&[HostValue]) -> HostResult<HostValue> + Send + Sync;

/// A callable member of a host object.
#[derive(Clone)]
pub struct HostFunction {
    name: Arc<str>,
    call: Arc<NativeFn>,
    wrapped: bool,
}

impl HostFunction {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            call: Arc::new(f),
            wrapped: false,
        }
    }

    /// A function that routes through a capability wrapper.
    pub(crate) fn wrapper<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        Self {
            wrapped: true,
            ..Self::new(name, f)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[HostValue]) -> HostResult<HostValue> {
        (self.call)(args)
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}()", self.name)
    }
}

/// Settled outcome of a deferred value.
pub type Settled = HostResult<HostValue>;

/// An asynchronous host result. Clones observe the same settlement.
#[derive(Clone)]
pub struct Deferred(Shared<BoxFuture<'static, Settled>>);

impl Deferred {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Settled> + Send + 'static,
    {
        Self(fut.boxed().shared())
    }

    pub fn resolved(value: HostValue) -> Self {
        Self::new(futures::future::ready(Ok(value)))
    }

    pub fn rejected(err: HostError) -> Self {
        Self::new(futures::future::ready(Err(err)))
    }

    /// Chain a continuation over the fulfilled value; rejections pass through.
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(HostValue) -> HostValue + Send + 'static,
    {
        Self::new(async move { self.0.await.map(f) })
    }

    /// Wait for the value to settle.
    pub async fn settle(self) -> Settled {
        self.0.await
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred")
    }
}
