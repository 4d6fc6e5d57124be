//! # Request Frames
//!
//! The layout of an rpc request: a chain length followed by the links in call order.
//!
//! ```text
//! [chainLength: i32]
//! [target: string][method: string][descriptor: string][arg: value]*   (per link)
//! ```
//!
//! ## Invariants
//! - The argument count of a link is not on the wire; it comes from the link's descriptor.
//! - `RequestReader` never reads past what the caller asks for, so a rejected chain
//!   leaves the remaining bytes untouched.

use fleetpack::DataBuf;
use fleetpack::DataBufReader;

use crate::descriptor::MethodType;
use crate::error::Error;
use crate::error::Result;
use crate::value::Value;
use crate::value::decode_value;
use crate::value::encode_value;

/// The channel every rpc request travels on.
pub const INTERNAL_RPC_CHANNEL: i32 = 6;

/// The channel responses travel on; nothing replies to a packet on it.
pub const RESPONSE_CHANNEL: i32 = -1;

/// One remote call: which method of which type, with which arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcDescriptor {
    target_type: String,
    method_name: String,
    method_type: MethodType,
    arguments: Vec<Value>,
}

impl RpcDescriptor {
    pub fn new(
        target_type: impl Into<String>,
        method_name: impl Into<String>,
        method_type: MethodType,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            target_type: target_type.into(),
            method_name: method_name.into(),
            method_type,
            arguments,
        }
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn method_type(&self) -> &MethodType {
        &self.method_type
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Renders the descriptor string sent on the wire.
    pub fn method_descriptor(&self) -> String {
        self.method_type.to_string()
    }

    /// Writes the link header and its arguments, which must satisfy the descriptor.
    pub fn encode(&self, buf: &mut DataBuf) -> Result<()> {
        if self.arguments.len() != self.method_type.params.len() {
            return Err(Error::Protocol(format!(
                "{} declares {} parameters, {} arguments given",
                self.method_name,
                self.method_type.params.len(),
                self.arguments.len()
            )));
        }

        let params = &self.method_type.params;
        if let Some(index) = params.iter().zip(&self.arguments).position(|(ty, arg)| !ty.accepts(arg)) {
            return Err(Error::Protocol(format!(
                "argument {index} of {} is a {}, {} declared",
                self.method_name,
                self.arguments[index].kind(),
                params[index]
            )));
        }

        buf.write_string(&self.target_type)?;
        buf.write_string(&self.method_name)?;
        buf.write_string(&self.method_descriptor())?;
        for arg in &self.arguments {
            encode_value(buf, arg)?;
        }
        Ok(())
    }
}

/// Encodes a whole chain into a request payload.
pub fn encode_chain(links: &[RpcDescriptor]) -> Result<DataBuf> {
    if links.is_empty() {
        return Err(Error::Protocol("a chain needs at least one link".into()));
    }
    let len = i32::try_from(links.len())
        .map_err(|_| Error::Protocol("chain too long".into()))?;

    let mut buf = DataBuf::new();
    buf.write_int(len);
    for link in links {
        link.encode(&mut buf)?;
    }
    Ok(buf)
}

/// The three strings that precede a link's arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHeader {
    pub target: String,
    pub method: String,
    pub descriptor: String,
}

/// Step-by-step decoding of a request, driven by the listener.
#[derive(Debug)]
pub struct RequestReader {
    reader: DataBufReader,
}

impl RequestReader {
    pub fn new(reader: impl Into<DataBufReader>) -> Self {
        Self { reader: reader.into() }
    }

    /// Reads the raw chain length. Validation is left to the caller.
    pub fn chain_length(&mut self) -> Result<i32> {
        Ok(self.reader.read_int()?)
    }

    pub fn next_header(&mut self) -> Result<LinkHeader> {
        Ok(LinkHeader {
            target: self.reader.read_string()?,
            method: self.reader.read_string()?,
            descriptor: self.reader.read_string()?,
        })
    }

    /// Decodes exactly one value per declared parameter.
    ///
    /// Values are not checked against the parameter types here.
    pub fn read_arguments(&mut self, method_type: &MethodType) -> Result<Vec<Value>> {
        let mut args = Vec::with_capacity(method_type.params.len());
        for _ in &method_type.params {
            args.push(decode_value(&mut self.reader)?);
        }
        Ok(args)
    }

    pub fn readable_bytes(&self) -> usize {
        self.reader.readable_bytes()
    }
}
