//! # Fleetrpc
//!
//! The wire vocabulary of the rpc engine, layered over `fleetpack`.
//!
//! ## Architecture
//!
//! - `value`: the self-describing `Value` model and its codec (the object mapper).
//! - `descriptor`: the method signature grammar and argument assignability.
//! - `frame`: request chains and their incremental decoding.
//! - `remote`: descriptors derived from Rust argument and return types.
//! - `result`: invocation outcomes as sent back to callers.
//! - `fault`: business failures as plain, serializable data.
//!
//! Nothing here performs io or holds state; the runtime lives in `fleetrun`.

pub mod descriptor;
pub mod error;
pub mod fault;
pub mod frame;
pub mod remote;
pub mod result;
pub mod value;

pub use descriptor::MethodType;
pub use descriptor::TypeDesc;
pub use error::Error;
pub use error::Result;
pub use fault::FaultFrame;
pub use fault::RemoteFault;
pub use frame::INTERNAL_RPC_CHANNEL;
pub use frame::LinkHeader;
pub use frame::RESPONSE_CHANNEL;
pub use frame::RequestReader;
pub use frame::RpcDescriptor;
pub use frame::encode_chain;
pub use remote::RemoteArgs;
pub use remote::RemoteReturn;
pub use remote::RemoteType;
pub use result::InvocationResult;
pub use result::STATUS_BAD_REQUEST;
pub use result::STATUS_OK;
pub use result::STATUS_SERVER_ERROR;
pub use result::ServerError;
pub use value::MAX_NESTING_DEPTH;
pub use value::Value;
pub use value::decode_value;
pub use value::decode_value_as;
pub use value::encode_value;
