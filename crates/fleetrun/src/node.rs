//! # Rpc Node
//!
//! Ties one side of a link together: the handler registry, the listener that
//! serves incoming chains and the query manager that completes outgoing calls.
//!
//! ## Architecture
//!
//! Every inbound packet is routed by channel id:
//!
//! - `INTERNAL_RPC_CHANNEL`: a request, served by the listener on its own task.
//! - `RESPONSE_CHANNEL`: a response, handed to the query manager.
//! - anything else is not ours and is dropped.
//!
//! A node serves any number of channels; senders built through it share its
//! query manager, so their responses arrive through `serve`.

use std::sync::Arc;

use fleetrpc::INTERNAL_RPC_CHANNEL;
use fleetrpc::RESPONSE_CHANNEL;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::RpcConfig;
use crate::handler::Handler;
use crate::listener::InvocationListener;
use crate::object::TypeDef;
use crate::query::QueryManager;
use crate::registry::HandlerRegistry;
use crate::sender::RpcSender;
use crate::sender::RpcSenderBuilder;
use crate::transport::NetworkChannel;
use crate::transport::Packet;

pub struct RpcNode {
    registry: Arc<HandlerRegistry>,
    listener: Arc<InvocationListener>,
    queries: Arc<QueryManager>,
    config: RpcConfig,
}

impl RpcNode {
    pub fn new(config: RpcConfig) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let listener = Arc::new(InvocationListener::new(registry.clone(), &config));
        Self {
            registry,
            listener,
            queries: Arc::new(QueryManager::new()),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn listener(&self) -> &Arc<InvocationListener> {
        &self.listener
    }

    pub fn queries(&self) -> &Arc<QueryManager> {
        &self.queries
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn register(&self, handler: Handler) -> Option<Arc<Handler>> {
        self.registry.register(handler)
    }

    /// A sender for `target_type` whose responses are completed by this node.
    pub fn sender(
        &self,
        target_type: impl Into<String>,
        channel: Arc<dyn NetworkChannel>,
    ) -> RpcSenderBuilder {
        RpcSender::builder(target_type)
            .channel(channel)
            .query_manager(self.queries.clone())
            .timeout(self.config.call_timeout)
    }

    /// Like `sender`, but a timeout set on the type wins over the node's.
    pub fn sender_for(&self, type_def: &TypeDef, channel: Arc<dyn NetworkChannel>) -> RpcSenderBuilder {
        let builder = self.sender(type_def.name(), channel);
        match type_def.timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Routes one inbound packet. Requests are served on a spawned task, so
    /// this must run inside a tokio runtime.
    pub fn dispatch(&self, channel: &Arc<dyn NetworkChannel>, packet: Packet) {
        match packet.channel {
            INTERNAL_RPC_CHANNEL => {
                tokio::spawn(self.listener.clone().handle(channel.clone(), packet));
            }
            RESPONSE_CHANNEL => {
                self.queries.complete(packet);
            }
            other => {
                tracing::trace!(channel = other, "packet on foreign channel dropped");
            }
        }
    }

    /// Pumps `inbound` until it closes, answering on `channel`.
    pub fn serve(
        self: &Arc<Self>,
        channel: Arc<dyn NetworkChannel>,
        mut inbound: mpsc::UnboundedReceiver<Packet>,
    ) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            while let Some(packet) = inbound.recv().await {
                node.dispatch(&channel, packet);
            }
            tracing::debug!("inbound channel closed, node stopped serving");
        })
    }
}
