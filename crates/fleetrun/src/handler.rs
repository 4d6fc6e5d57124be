//! # Handlers
//!
//! A `Handler` exposes one `TypeDef` to remote callers, optionally bound to an
//! instance. Resolution runs in a fixed order so every malformed call gets the
//! same, stable rejection:
//!
//! 1. parse the descriptor
//! 2. find the method by name and signature
//! 3. check the arguments against the declared parameters
//! 4. require a receiver for instance methods
//! 5. invoke
//!
//! A handler without an instance still resolves and validates calls; it only
//! refuses to run instance methods. Registering one marks a type as reachable
//! by chained calls without exposing any object of it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use fleetrpc::InvocationResult;
use fleetrpc::MethodType;
use fleetrpc::ServerError;
use fleetrpc::Value;

use crate::Fault;
use crate::object::MethodDef;
use crate::object::ObjectRef;
use crate::object::Returned;
use crate::object::TypeDef;

pub const NO_INSTANCE: &str = "no instance to invoke the method on";

/// Why a single call could not produce a `Returned`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("invalid target method descriptor")]
    InvalidDescriptor,
    #[error("target method not found")]
    MethodNotFound,
    /// Carries the descriptor as the caller sent it.
    #[error("provided arguments do not satisfy {0}")]
    ArgumentsMismatch(String),
    #[error("no instance to invoke the method on")]
    NoInstance,
    /// The method ran and failed.
    #[error("{}", .0.message())]
    Fault(Fault),
}

impl From<InvokeError> for InvocationResult {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::NoInstance => InvocationResult::server_error(NO_INSTANCE),
            InvokeError::Fault(fault) => InvocationResult::ServerError(ServerError::from(fault)),
            other => InvocationResult::BadRequest(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, InvokeError>;

/// Parses `descriptor` and finds the matching method on `type_def`.
pub fn resolve<'a>(type_def: &'a TypeDef, method: &str, descriptor: &str) -> Result<&'a MethodDef> {
    let method_type = MethodType::parse(descriptor).map_err(|_| InvokeError::InvalidDescriptor)?;
    type_def.method(method, &method_type).ok_or(InvokeError::MethodNotFound)
}

/// Checks count and per-position assignability.
pub fn check_arguments(method: &MethodDef, descriptor: &str, args: &[Value]) -> Result<()> {
    let params = &method.method_type().params;
    let satisfied = params.len() == args.len()
        && params.iter().zip(args).all(|(ty, value)| ty.accepts(value));
    if satisfied {
        Ok(())
    } else {
        Err(InvokeError::ArgumentsMismatch(descriptor.to_string()))
    }
}

/// Runs `method` against `receiver`, turning panics into a `Panic` fault and
/// recording the method's own frame on every fault it raises.
pub fn invoke_on(
    owner: &TypeDef,
    method: &MethodDef,
    receiver: Option<&ObjectRef>,
    args: &[Value],
) -> Result<Returned> {
    if receiver.is_none() && !method.is_static() {
        return Err(InvokeError::NoInstance);
    }

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| method.call(receiver, args)))
        .unwrap_or_else(|payload| Err(Fault::new("Panic", panic_detail(payload.as_ref()))));

    let returned = outcome.map_err(|fault| InvokeError::Fault(fault.at(owner.name(), method.name())))?;
    conform(owner, method, returned)
}

// A void method answers null; a data value must fit the declared return type.
fn conform(owner: &TypeDef, method: &MethodDef, returned: Returned) -> Result<Returned> {
    let Some(ret) = &method.method_type().ret else {
        return Ok(Returned::null());
    };
    match &returned {
        Returned::Data(value) if !ret.accepts(value) => Err(InvokeError::Fault(
            Fault::illegal_state(format!("returned a {} where {ret} is declared", value.kind()))
                .at(owner.name(), method.name()),
        )),
        _ => Ok(returned),
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}

/// A registered, remotely reachable type.
#[derive(Debug)]
pub struct Handler {
    type_def: Arc<TypeDef>,
    instance: Option<ObjectRef>,
}

impl Handler {
    pub fn builder(type_def: Arc<TypeDef>) -> HandlerBuilder {
        HandlerBuilder { type_def, instance: None }
    }

    pub fn target_type(&self) -> &str {
        self.type_def.name()
    }

    pub fn type_def(&self) -> &Arc<TypeDef> {
        &self.type_def
    }

    pub fn instance(&self) -> Option<&ObjectRef> {
        self.instance.as_ref()
    }

    pub fn resolve(&self, method: &str, descriptor: &str) -> Result<&MethodDef> {
        resolve(&self.type_def, method, descriptor)
    }

    /// Runs an already resolved and validated method on the bound instance.
    pub fn invoke(&self, method: &MethodDef, args: &[Value]) -> Result<Returned> {
        invoke_on(&self.type_def, method, self.instance.as_ref(), args)
    }

    /// Resolves, validates and invokes in one step.
    pub fn call(&self, method: &str, descriptor: &str, args: &[Value]) -> Result<Returned> {
        let resolved = self.resolve(method, descriptor)?;
        check_arguments(resolved, descriptor, args)?;
        self.invoke(resolved, args)
    }
}

pub struct HandlerBuilder {
    type_def: Arc<TypeDef>,
    instance: Option<ObjectRef>,
}

impl HandlerBuilder {
    /// Binds a fresh instance.
    pub fn instance<T: std::any::Any + Send + Sync>(mut self, value: T) -> Self {
        self.instance = Some(ObjectRef::new(value, self.type_def.clone()));
        self
    }

    /// Binds an instance that is also shared elsewhere.
    pub fn shared<T: std::any::Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.instance = Some(ObjectRef::from_arc(value, self.type_def.clone()));
        self
    }

    pub fn build(self) -> Handler {
        Handler { type_def: self.type_def, instance: self.instance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicI32;
    use std::sync::atomic::Ordering;

    use crate::object::Args;

    struct Greeter {
        calls: AtomicI32,
    }

    fn greeter_def() -> Arc<TypeDef> {
        TypeDef::builder::<Greeter>("greeter")
            .method("greet", "(I)T", |g: &Greeter, args: Args<'_>| {
                g.calls.fetch_add(1, Ordering::SeqCst);
                let n: i32 = args.get(0)?;
                Ok(Value::from(format!("hi #{n}")).into())
            })
            .method("greet", "(T)T", |_: &Greeter, args: Args<'_>| {
                let name: String = args.get(0)?;
                Ok(Value::from(format!("hi {name}")).into())
            })
            .method("boom", "()V", |_: &Greeter, _| panic!("kaboom"))
            .method("liar", "()I", |_: &Greeter, _| Ok(Value::from("nope").into()))
            .static_method("version", "()I", |_| Ok(Value::Int(3).into()))
            .build()
            .unwrap()
    }

    fn bound() -> Handler {
        Handler::builder(greeter_def()).instance(Greeter { calls: AtomicI32::new(0) }).build()
    }

    fn data(returned: Returned) -> Value {
        match returned {
            Returned::Data(v) => v,
            Returned::Object(o) => panic!("unexpected object {o:?}"),
        }
    }

    #[test]
    fn test_overloads_resolve_by_descriptor() {
        let handler = bound();
        let by_int = handler.call("greet", "(I)T", &[Value::Int(4)]).unwrap();
        let by_name = handler.call("greet", "(T)T", &[Value::from("bo")]).unwrap();
        assert_eq!(data(by_int), Value::from("hi #4"));
        assert_eq!(data(by_name), Value::from("hi bo"));
    }

    #[test]
    fn test_rejections_in_order() {
        let handler = bound();
        assert_eq!(handler.call("greet", "(I", &[]).unwrap_err(), InvokeError::InvalidDescriptor);
        assert_eq!(handler.call("greet", "(J)T", &[Value::Long(1)]).unwrap_err(), InvokeError::MethodNotFound);
        assert_eq!(
            handler.call("greet", "(I)T", &[Value::Long(1)]).unwrap_err().to_string(),
            "provided arguments do not satisfy (I)T"
        );
    }

    #[test]
    fn test_unbound_handler_runs_only_static_methods() {
        let handler = Handler::builder(greeter_def()).build();
        assert_eq!(handler.call("greet", "(I)T", &[Value::Int(1)]).unwrap_err(), InvokeError::NoInstance);
        assert_eq!(data(handler.call("version", "()I", &[]).unwrap()), Value::Int(3));
    }

    #[test]
    fn test_panic_becomes_fault_with_method_frame() {
        let Err(InvokeError::Fault(fault)) = bound().call("boom", "()V", &[]) else {
            panic!("expected a fault");
        };
        assert_eq!(fault.message(), "Panic: kaboom");
        assert_eq!(fault.frames[0].method, "boom");
    }

    #[test]
    fn test_return_value_must_match_declaration() {
        let Err(InvokeError::Fault(fault)) = bound().call("liar", "()I", &[]) else {
            panic!("expected a fault");
        };
        assert_eq!(fault.kind, "IllegalStateException");
    }

    #[test]
    fn test_rejections_map_to_result_classes() {
        assert_eq!(
            InvocationResult::from(InvokeError::MethodNotFound),
            InvocationResult::bad_request("target method not found")
        );
        assert_eq!(
            InvocationResult::from(InvokeError::NoInstance),
            InvocationResult::server_error("no instance to invoke the method on")
        );
    }
}
