//! # Type Definitions
//!
//! The explicit method tables that stand in for runtime reflection.
//!
//! A `TypeDef` names a type and lists the methods remote callers may reach on it,
//! each keyed by name and `MethodType`. An `ObjectRef` pairs a live value with
//! its `TypeDef`, which is how a chained call finds the methods of whatever the
//! previous link returned.
//!
//! ## Invariants
//!
//! - **Immutable**: A built `TypeDef` never changes; it is shared as `Arc<TypeDef>`.
//! - **Unique Signatures**: No two methods share a name and a `MethodType`.
//! - **Ignored Names Stay Hidden**: A name passed to `ignore` is never resolvable,
//!   whatever was registered under it.

use std::any::Any;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use fleetrpc::MethodType;
use fleetrpc::Value;

use crate::Fault;

/// Errors raised while building a `TypeDef`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("{type_name}::{method}: {source}")]
    InvalidDescriptor {
        type_name: String,
        method: String,
        source: fleetrpc::Error,
    },
    #[error("{type_name}::{method}{descriptor} is defined twice")]
    Duplicate {
        type_name: String,
        method: String,
        descriptor: String,
    },
}

pub type Result<T> = std::result::Result<T, DefinitionError>;

/// What a method hands back: plain data, or an object that may receive further calls.
#[derive(Debug, Clone)]
pub enum Returned {
    Data(Value),
    Object(ObjectRef),
}

impl Returned {
    pub fn null() -> Self {
        Returned::Data(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Returned::Data(Value::Null))
    }
}

impl From<Value> for Returned {
    fn from(value: Value) -> Self {
        Returned::Data(value)
    }
}

impl From<ObjectRef> for Returned {
    fn from(object: ObjectRef) -> Self {
        Returned::Object(object)
    }
}

impl From<Option<ObjectRef>> for Returned {
    fn from(object: Option<ObjectRef>) -> Self {
        object.map_or(Returned::null(), Returned::Object)
    }
}

/// The validated arguments of a call, positionally.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a>(&'a [Value]);

impl<'a> Args<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value(&self, index: usize) -> std::result::Result<&'a Value, Fault> {
        self.0
            .get(index)
            .ok_or_else(|| Fault::illegal_argument(format!("missing argument {index}")))
    }

    /// Converts the argument at `index` to `T`.
    pub fn get<T>(&self, index: usize) -> std::result::Result<T, Fault>
    where
        T: TryFrom<Value, Error = fleetrpc::Error>,
    {
        let value = self.value(index)?.clone();
        T::try_from(value).map_err(|e| Fault::illegal_argument(format!("argument {index}: {e}")))
    }
}

type InvokeFn = dyn Fn(Option<&ObjectRef>, Args<'_>) -> std::result::Result<Returned, Fault> + Send + Sync;
type SnapshotFn = dyn Fn(&ObjectRef) -> Option<Value> + Send + Sync;

/// One remotely reachable method.
pub struct MethodDef {
    name: String,
    method_type: MethodType,
    is_static: bool,
    invoke: Arc<InvokeFn>,
}

impl MethodDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_type(&self) -> &MethodType {
        &self.method_type
    }

    /// Static methods run without a receiver.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub(crate) fn call(
        &self,
        receiver: Option<&ObjectRef>,
        args: &[Value],
    ) -> std::result::Result<Returned, Fault> {
        (self.invoke)(receiver, Args::new(args))
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("method_type", &self.method_type.to_string())
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// A named method table.
pub struct TypeDef {
    name: String,
    methods: HashMap<String, Vec<MethodDef>>,
    timeout: Option<Duration>,
    snapshot: Option<Arc<SnapshotFn>>,
}

impl TypeDef {
    /// Starts a definition whose instance methods receive a `&T`.
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> TypeDefBuilder<T> {
        TypeDefBuilder {
            name: name.into(),
            methods: Vec::new(),
            ignored: HashSet::new(),
            timeout: None,
            snapshot: None,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The call timeout callers should use for this type, if it sets one.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Finds the method with this exact name and signature.
    pub fn method(&self, name: &str, method_type: &MethodType) -> Option<&MethodDef> {
        self.methods
            .get(name)?
            .iter()
            .find(|m| &m.method_type == method_type)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values().flatten()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("methods", &self.methods().count())
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct TypeDefBuilder<T> {
    name: String,
    methods: Vec<(String, String, bool, Arc<InvokeFn>)>,
    ignored: HashSet<String>,
    timeout: Option<Duration>,
    snapshot: Option<Arc<SnapshotFn>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeDefBuilder<T> {
    /// Adds an instance method. The receiver is downcast to `T` before `f` runs.
    pub fn method<F>(mut self, name: impl Into<String>, descriptor: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T, Args<'_>) -> std::result::Result<Returned, Fault> + Send + Sync + 'static,
    {
        let type_name = self.name.clone();
        let invoke = move |receiver: Option<&ObjectRef>, args: Args<'_>| {
            let receiver = receiver
                .ok_or_else(|| Fault::null_pointer(format!("no receiver for {type_name}")))?;
            let this = receiver.downcast_ref::<T>().ok_or_else(|| {
                Fault::illegal_state(format!("{} is not a {type_name}", receiver.type_name()))
            })?;
            f(this, args)
        };
        self.methods.push((name.into(), descriptor.into(), false, Arc::new(invoke)));
        self
    }

    /// Adds a method that needs no receiver.
    pub fn static_method<F>(mut self, name: impl Into<String>, descriptor: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args<'_>) -> std::result::Result<Returned, Fault> + Send + Sync + 'static,
    {
        let invoke = move |_: Option<&ObjectRef>, args: Args<'_>| f(args);
        self.methods.push((name.into(), descriptor.into(), true, Arc::new(invoke)));
        self
    }

    /// Hides every method called `name` from remote callers.
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignored.insert(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Lets objects of this type end a chain, serialized through `f`.
    pub fn snapshot<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let snapshot = move |object: &ObjectRef| object.downcast_ref::<T>().map(&f);
        self.snapshot = Some(Arc::new(snapshot));
        self
    }

    pub fn build(self) -> Result<Arc<TypeDef>> {
        let mut methods: HashMap<String, Vec<MethodDef>> = HashMap::new();

        for (name, descriptor, is_static, invoke) in self.methods {
            if self.ignored.contains(&name) {
                continue;
            }
            let method_type = MethodType::parse(&descriptor).map_err(|source| {
                DefinitionError::InvalidDescriptor {
                    type_name: self.name.clone(),
                    method: name.clone(),
                    source,
                }
            })?;

            let overloads = methods.entry(name.clone()).or_default();
            if overloads.iter().any(|m| m.method_type == method_type) {
                return Err(DefinitionError::Duplicate {
                    type_name: self.name,
                    method: name,
                    descriptor,
                });
            }
            overloads.push(MethodDef { name, method_type, is_static, invoke });
        }

        Ok(Arc::new(TypeDef {
            name: self.name,
            methods,
            timeout: self.timeout,
            snapshot: self.snapshot,
        }))
    }
}

/// A live object together with the table of methods it answers to.
#[derive(Clone)]
pub struct ObjectRef {
    object: Arc<dyn Any + Send + Sync>,
    type_def: Arc<TypeDef>,
}

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(value: T, type_def: Arc<TypeDef>) -> Self {
        Self::from_arc(Arc::new(value), type_def)
    }

    /// Wraps an object that is also held elsewhere.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>, type_def: Arc<TypeDef>) -> Self {
        Self { object: value, type_def }
    }

    pub fn type_def(&self) -> &Arc<TypeDef> {
        &self.type_def
    }

    pub fn type_name(&self) -> &str {
        self.type_def.name()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// Serializes the object through its type's snapshot, if it has one.
    pub fn snapshot(&self) -> Option<Value> {
        let snapshot = self.type_def.snapshot.as_ref()?;
        snapshot(self)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef").field("type", &self.type_name()).finish()
    }
}
