//! # Call Sender
//!
//! The client-side façade: turns a method invocation into an `RpcDescriptor`,
//! chains descriptors with `join`, and drives the request through a channel.
//!
//! ```ignore
//! let total = sender
//!     .invoke_method("chainedTest", MethodType::parse("(I)Ltarget;")?, [Value::Int(235)])
//!     .join(target.invoke_method("addToCounter", MethodType::parse("(F)D")?, [Value::Float(9.5)]))?
//!     .fire()
//!     .await?;
//! ```
//!
//! A chain is encoded into one packet, so any number of links costs a single
//! round trip. Completion is either awaited (`fire`), blocked on (`fire_sync`)
//! or skipped entirely (`fire_and_forget`, or `no_result` on the call).
//! A chain's timeout and result mode are those of its first call.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fleetpack::DataBufReader;
use fleetrpc::FaultFrame;
use fleetrpc::INTERNAL_RPC_CHANNEL;
use fleetrpc::InvocationResult;
use fleetrpc::MethodType;
use fleetrpc::RemoteArgs;
use fleetrpc::RemoteFault;
use fleetrpc::RemoteReturn;
use fleetrpc::RpcDescriptor;
use fleetrpc::Value;
use fleetrpc::encode_chain;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::runtime::RuntimeFlavor;

use crate::config::RpcConfig;
use crate::object::TypeDef;
use crate::query;
use crate::query::QueryManager;
use crate::transport::NetworkChannel;
use crate::transport::Packet;
use crate::transport::TransportError;

/// A failure inside the remote method, rebuilt on the caller's side.
///
/// `frames[0]` is where the failure was raised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub kind: String,
    pub message: String,
    pub frames: Vec<FaultFrame>,
}

impl From<RemoteFault> for ExecutionError {
    fn from(fault: RemoteFault) -> Self {
        Self { message: fault.message(), kind: fault.kind, frames: fault.frames }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("response channel closed")]
    ChannelClosed,
    /// The call was built as one-way; there is nothing to wait for.
    #[error("call does not expect a result")]
    NoResultExpected,
    #[error("no tokio runtime to drive the call")]
    NoRuntime,
    /// `fire_sync` was used on a single-threaded runtime's own thread.
    #[error("cannot block inside a current-thread runtime")]
    WouldBlock,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("server error: {0}")]
    Server(String),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("protocol error: {0}")]
    Protocol(#[from] fleetrpc::Error),
    #[error("unexpected result: {0}")]
    Conversion(fleetrpc::Error),
}

impl From<query::Error> for CallError {
    fn from(e: query::Error) -> Self {
        match e {
            query::Error::Transport(e) => CallError::Transport(e),
            query::Error::Timeout(d) => CallError::Timeout(d),
            query::Error::ChannelClosed => CallError::ChannelClosed,
        }
    }
}

/// Maps a decoded response onto the caller's outcome.
pub fn into_outcome(result: InvocationResult) -> Result<Value, CallError> {
    match result {
        InvocationResult::Success(value) => Ok(value),
        InvocationResult::BadRequest(message) => Err(CallError::BadRequest(message)),
        InvocationResult::ServerError(err) => match err.fault {
            Some(fault) => Err(CallError::Execution(fault.into())),
            None => Err(CallError::Server(err.message)),
        },
    }
}

/// Rejected `join`s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Only object results can receive a further call.
    #[error("{method} returns {returns}, which cannot receive a further call")]
    ReceiverNotObject { method: String, returns: String },
    #[error("{method} returns {expected}, but the next call targets {found}")]
    TargetMismatch { method: String, expected: String, found: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("sender for {0} has no channel")]
    MissingChannel(String),
}

struct SenderInner {
    target_type: String,
    channel: Arc<dyn NetworkChannel>,
    queries: Arc<QueryManager>,
    timeout: Duration,
    runtime: Option<Handle>,
}

/// Builds calls against one remote type over one channel. Cheap to clone.
#[derive(Clone)]
pub struct RpcSender {
    inner: Arc<SenderInner>,
}

pub struct RpcSenderBuilder {
    target_type: String,
    channel: Option<Arc<dyn NetworkChannel>>,
    queries: Option<Arc<QueryManager>>,
    timeout: Duration,
    runtime: Option<Handle>,
}

impl RpcSender {
    pub fn builder(target_type: impl Into<String>) -> RpcSenderBuilder {
        RpcSenderBuilder {
            target_type: target_type.into(),
            channel: None,
            queries: None,
            timeout: RpcConfig::default().call_timeout,
            runtime: None,
        }
    }

    /// Starts from a type definition, adopting its timeout if it sets one.
    pub fn for_type(type_def: &TypeDef) -> RpcSenderBuilder {
        let builder = Self::builder(type_def.name());
        match type_def.timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    pub fn target_type(&self) -> &str {
        &self.inner.target_type
    }

    /// Describes a call of `name` with the given signature and arguments.
    pub fn invoke_method(
        &self,
        name: impl Into<String>,
        method_type: MethodType,
        args: impl IntoIterator<Item = Value>,
    ) -> Rpc {
        let descriptor = RpcDescriptor::new(
            self.inner.target_type.clone(),
            name,
            method_type,
            args.into_iter().collect(),
        );
        Rpc {
            call: Call {
                sender: self.clone(),
                links: vec![descriptor],
                expect_result: true,
                timeout: self.inner.timeout,
            },
        }
    }

    /// Prepares a call whose descriptor is derived from the argument tuple and
    /// the return type, e.g. `invoke::<_, String>("helloWorld", (123,))`.
    pub fn invoke<A: RemoteArgs, R: RemoteReturn>(&self, name: impl Into<String>, args: A) -> Rpc {
        self.invoke_method(name, MethodType::of::<A, R>(), args.into_values())
    }
}

impl RpcSenderBuilder {
    pub fn channel(mut self, channel: Arc<dyn NetworkChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Responses are only delivered if this manager is the one the node pumps into.
    pub fn query_manager(mut self, queries: Arc<QueryManager>) -> Self {
        self.queries = Some(queries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The runtime `fire_sync` drives calls on. Defaults to the ambient one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<RpcSender, BuildError> {
        let channel = self
            .channel
            .ok_or_else(|| BuildError::MissingChannel(self.target_type.clone()))?;
        Ok(RpcSender {
            inner: Arc::new(SenderInner {
                target_type: self.target_type,
                channel,
                queries: self.queries.unwrap_or_default(),
                timeout: self.timeout,
                runtime: self.runtime.or_else(|| Handle::try_current().ok()),
            }),
        })
    }
}

// ============================================================================
//  CALLS
// ============================================================================

struct Call {
    sender: RpcSender,
    links: Vec<RpcDescriptor>,
    expect_result: bool,
    timeout: Duration,
}

impl Call {
    fn encode(&self) -> Result<Bytes, CallError> {
        Ok(encode_chain(&self.links)?.freeze())
    }

    /// Appends the links of `next`. Per-call settings stay those of `self`.
    fn join(mut self, next: Rpc) -> Result<Self, ChainError> {
        if let Some(last) = self.links.last() {
            let ret = &last.method_type().ret;
            let Some(receiver) = ret.as_ref().and_then(|t| t.receiver_name()) else {
                return Err(ChainError::ReceiverNotObject {
                    method: last.method_name().to_string(),
                    returns: ret.as_ref().map_or_else(|| "V".to_string(), |t| t.to_string()),
                });
            };
            if receiver != next.call.sender.target_type() {
                return Err(ChainError::TargetMismatch {
                    method: last.method_name().to_string(),
                    expected: receiver.to_string(),
                    found: next.call.sender.target_type().to_string(),
                });
            }
        }
        self.links.extend(next.call.links);
        Ok(self)
    }

    async fn run(self) -> Result<Value, CallError> {
        if !self.expect_result {
            return Err(CallError::NoResultExpected);
        }
        let content = self.encode()?;
        let inner = &self.sender.inner;

        tracing::debug!(
            target_type = %inner.target_type,
            links = self.links.len(),
            "sending rpc"
        );
        let packet = inner
            .queries
            .send_query(inner.channel.as_ref(), INTERNAL_RPC_CHANNEL, content, self.timeout)
            .await?;

        let mut reader = DataBufReader::new(packet.content);
        into_outcome(InvocationResult::decode(&mut reader)?)
    }

    async fn send_one_way(self) -> Result<(), CallError> {
        let content = self.encode()?;
        let packet = Packet::new(INTERNAL_RPC_CHANNEL, None, content);
        self.sender.inner.channel.send_packet(packet).await?;
        Ok(())
    }

    fn run_sync(self) -> Result<Value, CallError> {
        let handle = self
            .sender
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(CallError::NoRuntime)?;

        match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.run()))
            }
            Ok(_) => Err(CallError::WouldBlock),
            Err(_) => handle.block_on(self.run()),
        }
    }
}

fn convert<T>(value: Value) -> Result<T, CallError>
where
    T: TryFrom<Value, Error = fleetrpc::Error>,
{
    T::try_from(value).map_err(CallError::Conversion)
}

/// A single remote call, not yet sent.
pub struct Rpc {
    call: Call,
}

impl Rpc {
    pub fn descriptor(&self) -> &RpcDescriptor {
        &self.call.links[0]
    }

    /// Marks the call as one-way: the remote side will never respond.
    pub fn no_result(mut self) -> Self {
        self.call.expect_result = false;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.call.timeout = timeout;
        self
    }

    /// Makes `next` run against whatever this call returns.
    ///
    /// The chain keeps this call's timeout and result mode. Only the links of
    /// `next` are taken; its `timeout` and `no_result` settings are discarded,
    /// so configure them on the chain instead.
    pub fn join(self, next: Rpc) -> Result<RpcChain, ChainError> {
        Ok(RpcChain { call: self.call.join(next)? })
    }

    pub fn fire(self) -> BoxFuture<'static, Result<Value, CallError>> {
        self.call.run().boxed()
    }

    pub fn fire_as<T>(self) -> BoxFuture<'static, Result<T, CallError>>
    where
        T: TryFrom<Value, Error = fleetrpc::Error> + Send + 'static,
    {
        self.call.run().map(|r| r.and_then(convert)).boxed()
    }

    /// Blocks the calling thread until the response arrives or the call times out.
    pub fn fire_sync(self) -> Result<Value, CallError> {
        self.call.run_sync()
    }

    pub fn fire_sync_as<T>(self) -> Result<T, CallError>
    where
        T: TryFrom<Value, Error = fleetrpc::Error>,
    {
        self.fire_sync().and_then(convert)
    }

    /// Sends without a unique id. Nothing comes back, success or failure.
    pub fn fire_and_forget(self) -> BoxFuture<'static, Result<(), CallError>> {
        self.call.send_one_way().boxed()
    }
}

/// Two or more calls sent and resolved as one unit.
pub struct RpcChain {
    call: Call,
}

impl RpcChain {
    pub fn links(&self) -> &[RpcDescriptor] {
        &self.call.links
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.call.timeout = timeout;
        self
    }

    /// Appends `next`; as with `Rpc::join`, only its links are kept.
    pub fn join(self, next: Rpc) -> Result<RpcChain, ChainError> {
        Ok(RpcChain { call: self.call.join(next)? })
    }

    pub fn fire(self) -> BoxFuture<'static, Result<Value, CallError>> {
        self.call.run().boxed()
    }

    pub fn fire_as<T>(self) -> BoxFuture<'static, Result<T, CallError>>
    where
        T: TryFrom<Value, Error = fleetrpc::Error> + Send + 'static,
    {
        self.call.run().map(|r| r.and_then(convert)).boxed()
    }

    pub fn fire_sync(self) -> Result<Value, CallError> {
        self.call.run_sync()
    }

    pub fn fire_sync_as<T>(self) -> Result<T, CallError>
    where
        T: TryFrom<Value, Error = fleetrpc::Error>,
    {
        self.fire_sync().and_then(convert)
    }

    pub fn fire_and_forget(self) -> BoxFuture<'static, Result<(), CallError>> {
        self.call.send_one_way().boxed()
    }
}
