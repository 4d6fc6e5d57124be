//! # Invocation Listener
//!
//! The packet-facing side of the engine: decodes a chain, walks it link by link
//! and produces exactly one `InvocationResult`.
//!
//! ## Invariants
//!
//! - **Terminal Failures**: The first rejection or fault ends the chain; later
//!   links are never read.
//! - **Bounded Reads**: The chain length is validated before anything else is read.
//! - **Allow List**: Every link names a type with a registered handler. Links after
//!   the first run against the previous result, resolved by its own `TypeDef`.
//! - **Silent One-Way**: A packet without a unique id never gets a response,
//!   whatever the outcome.
//! - **No Crash**: Malformed input and panicking business code both end up as a
//!   structured result.

use std::sync::Arc;

use bytes::Bytes;
use fleetpack::DataBufReader;
use fleetrpc::InvocationResult;
use fleetrpc::LinkHeader;
use fleetrpc::RESPONSE_CHANNEL;
use fleetrpc::RequestReader;
use fleetrpc::Value;
use tokio::sync::Semaphore;

use crate::Fault;
use crate::config::RpcConfig;
use crate::handler;
use crate::handler::InvokeError;
use crate::object::MethodDef;
use crate::object::Returned;
use crate::registry::HandlerRegistry;
use crate::transport::NetworkChannel;
use crate::transport::Packet;

pub const INVALID_CHAIN_LENGTH: &str = "invalid chain length";
pub const MISSING_HANDLER: &str = "missing explicitly defined target handler to call";

/// Why a chain stopped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum Rejection {
    #[error("invalid chain length")]
    ChainLength,
    #[error("missing explicitly defined target handler to call")]
    MissingHandler,
    #[error("malformed request: {0}")]
    Malformed(#[from] fleetrpc::Error),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl From<Rejection> for InvocationResult {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Invoke(err) => err.into(),
            other => InvocationResult::BadRequest(other.to_string()),
        }
    }
}

impl From<Fault> for Rejection {
    fn from(fault: Fault) -> Self {
        Rejection::Invoke(InvokeError::Fault(fault))
    }
}

pub struct InvocationListener {
    registry: Arc<HandlerRegistry>,
    max_chain_length: i32,
    workers: Arc<Semaphore>,
}

impl InvocationListener {
    pub fn new(registry: Arc<HandlerRegistry>, config: &RpcConfig) -> Self {
        Self {
            registry,
            max_chain_length: config.max_chain_length,
            // Configs built in code skip validation; an oversized count would panic here.
            workers: Arc::new(Semaphore::new(config.worker_permits.min(Semaphore::MAX_PERMITS))),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Runs one request payload to completion on the calling thread.
    ///
    /// Business methods may block, so async callers go through `handle`.
    pub fn process(&self, content: Bytes) -> InvocationResult {
        let mut request = RequestReader::new(DataBufReader::new(content));
        match self.run_chain(&mut request) {
            Ok(value) => {
                tracing::debug!(kind = value.kind(), "chain completed");
                InvocationResult::Success(value)
            }
            Err(rejection) => {
                tracing::warn!(reason = %rejection, "chain rejected");
                rejection.into()
            }
        }
    }

    /// Processes a request packet on the blocking pool and answers on `channel`
    /// when the packet asked for a response.
    pub async fn handle(self: Arc<Self>, channel: Arc<dyn NetworkChannel>, packet: Packet) {
        let Ok(permit) = self.workers.clone().acquire_owned().await else {
            tracing::warn!("worker pool closed, dropping request");
            return;
        };

        let listener = self.clone();
        let content = packet.content.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            listener.process(content)
        })
        .await
        .unwrap_or_else(|e| {
            InvocationResult::ServerError(Fault::illegal_state(format!("worker failed: {e}")).into())
        });

        let Some(unique_id) = packet.unique_id else {
            tracing::trace!(status = result.status(), "one-way request, no response");
            return;
        };

        let body = match result.to_buf() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%unique_id, error = %e, "result could not be encoded");
                let fallback: InvocationResult = InvocationResult::ServerError(
                    Fault::illegal_state(format!("result could not be encoded: {e}")).into(),
                );
                match fallback.to_buf() {
                    Ok(body) => body,
                    Err(_) => return,
                }
            }
        };

        let response = Packet::new(RESPONSE_CHANNEL, Some(unique_id), body.freeze());
        if let Err(e) = channel.send_packet(response).await {
            tracing::warn!(%unique_id, error = %e, "failed to send response");
        }
    }

    fn run_chain(&self, request: &mut RequestReader) -> Result<Value, Rejection> {
        let length = request.chain_length()?;
        if length <= 0 || length > self.max_chain_length {
            return Err(Rejection::ChainLength);
        }

        let mut previous: Option<Returned> = None;
        for index in 0..length {
            let header = request.next_header()?;
            tracing::trace!(index, target = %header.target, method = %header.method, "link");

            let returned = match previous.take() {
                None => self.first_link(&header, request)?,
                Some(prev) => self.next_link(&header, request, prev)?,
            };
            previous = Some(returned);
        }

        match previous {
            Some(Returned::Data(value)) => Ok(value),
            Some(Returned::Object(object)) => object.snapshot().ok_or_else(|| {
                Fault::illegal_state(format!("{} cannot be sent as a result", object.type_name()))
                    .into()
            }),
            None => Err(Rejection::ChainLength),
        }
    }

    fn first_link(&self, header: &LinkHeader, request: &mut RequestReader) -> Result<Returned, Rejection> {
        let handler = self.registry.find(&header.target).ok_or(Rejection::MissingHandler)?;
        let method = handler.resolve(&header.method, &header.descriptor)?;
        let args = read_arguments(request, method, &header.descriptor)?;
        Ok(handler.invoke(method, &args)?)
    }

    fn next_link(
        &self,
        header: &LinkHeader,
        request: &mut RequestReader,
        previous: Returned,
    ) -> Result<Returned, Rejection> {
        if !self.registry.has_handler(&header.target) {
            return Err(Rejection::MissingHandler);
        }

        let receiver = match previous {
            Returned::Object(object) => object,
            Returned::Data(Value::Null) => {
                return Err(Fault::null_pointer(format!(
                    "cannot invoke {}.{} because the previous result is null",
                    header.target, header.method
                ))
                .into());
            }
            Returned::Data(_) => return Err(InvokeError::MethodNotFound.into()),
        };
        if receiver.type_name() != header.target {
            return Err(InvokeError::MethodNotFound.into());
        }

        let type_def = receiver.type_def().clone();
        let method = handler::resolve(&type_def, &header.method, &header.descriptor)?;
        let args = read_arguments(request, method, &header.descriptor)?;
        Ok(handler::invoke_on(&type_def, method, Some(&receiver), &args)?)
    }
}

fn read_arguments(
    request: &mut RequestReader,
    method: &MethodDef,
    descriptor: &str,
) -> Result<Vec<Value>, InvokeError> {
    let args = request
        .read_arguments(method.method_type())
        .map_err(|_| InvokeError::ArgumentsMismatch(descriptor.to_string()))?;
    handler::check_arguments(method, descriptor, &args)?;
    Ok(args)
}
