//! # Fleetrun
//!
//! The rpc runtime: exposes in-process objects to remote callers and calls
//! remote objects, over any `NetworkChannel`.
//!
//! ## Architecture
//!
//! - `object`: `TypeDef` method tables and the `ObjectRef` values they describe.
//! - `handler` / `registry`: which types are reachable, and with which instance.
//! - `listener`: serves request chains into `InvocationResult`s.
//! - `sender` / `query`: builds calls and chains, and waits for their responses.
//! - `node`: routes inbound packets between the two sides.
//! - `transport` / `memory`: the channel seam and an in-process implementation.
//! - `config`: runtime settings from toml and the environment.
//!
//! Business failures travel as a `Fault`, the same type on both sides.

pub mod config;
pub mod handler;
pub mod listener;
pub mod math;
pub mod memory;
pub mod node;
pub mod object;
pub mod query;
pub mod registry;
pub mod sender;
pub mod transport;

pub use fleetrpc::RemoteFault as Fault;

pub use config::RpcConfig;
pub use handler::Handler;
pub use handler::InvokeError;
pub use listener::InvocationListener;
pub use memory::MemoryChannel;
pub use node::RpcNode;
pub use object::Args;
pub use object::ObjectRef;
pub use object::Returned;
pub use object::TypeDef;
pub use query::QueryManager;
pub use registry::HandlerRegistry;
pub use sender::CallError;
pub use sender::ChainError;
pub use sender::ExecutionError;
pub use sender::Rpc;
pub use sender::RpcChain;
pub use sender::RpcSender;
pub use transport::NetworkChannel;
pub use transport::Packet;
