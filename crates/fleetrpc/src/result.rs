//! # Invocation Results
//!
//! The single outcome of a processed chain, as sent back to the caller.
//!
//! ```text
//! [status: u8] OK          -> [payload: value]
//!              BAD_REQUEST -> [message: string]
//!              SERVER_ERROR-> [message: string][has_fault: bool][fault]?
//! ```

use fleetpack::DataBuf;
use fleetpack::DataBufReader;

use crate::error::Error;
use crate::error::Result;
use crate::fault::RemoteFault;
use crate::value::Value;
use crate::value::decode_value;
use crate::value::encode_value;

pub const STATUS_OK: u8 = 0x00;
pub const STATUS_BAD_REQUEST: u8 = 0x01;
pub const STATUS_SERVER_ERROR: u8 = 0x02;

/// A failure on the serving side. `fault` is set when business code raised it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub message: String,
    pub fault: Option<RemoteFault>,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), fault: None }
    }
}

impl From<RemoteFault> for ServerError {
    fn from(fault: RemoteFault) -> Self {
        Self { message: fault.message(), fault: Some(fault) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Value),
    BadRequest(String),
    ServerError(ServerError),
}

impl InvocationResult {
    pub fn bad_request(message: impl Into<String>) -> Self {
        InvocationResult::BadRequest(message.into())
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        InvocationResult::ServerError(ServerError::new(message))
    }

    pub fn status(&self) -> u8 {
        match self {
            InvocationResult::Success(_) => STATUS_OK,
            InvocationResult::BadRequest(_) => STATUS_BAD_REQUEST,
            InvocationResult::ServerError(_) => STATUS_SERVER_ERROR,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    /// The informative message, if the outcome is a failure.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::BadRequest(msg) => Some(msg),
            InvocationResult::ServerError(err) => Some(&err.message),
        }
    }

    pub fn encode(&self, buf: &mut DataBuf) -> Result<()> {
        buf.write_u8(self.status());
        match self {
            InvocationResult::Success(value) => encode_value(buf, value)?,
            InvocationResult::BadRequest(msg) => {
                buf.write_string(msg)?;
            }
            InvocationResult::ServerError(err) => {
                buf.write_string(&err.message)?;
                buf.write_bool(err.fault.is_some());
                if let Some(fault) = &err.fault {
                    fault.encode(buf)?;
                }
            }
        }
        Ok(())
    }

    pub fn to_buf(&self) -> Result<DataBuf> {
        let mut buf = DataBuf::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(reader: &mut DataBufReader) -> Result<Self> {
        let result = match reader.read_u8()? {
            STATUS_OK => InvocationResult::Success(decode_value(reader)?),
            STATUS_BAD_REQUEST => InvocationResult::BadRequest(reader.read_string()?),
            STATUS_SERVER_ERROR => {
                let message = reader.read_string()?;
                let fault = if reader.read_bool()? {
                    Some(RemoteFault::decode(reader)?)
                } else {
                    None
                };
                InvocationResult::ServerError(ServerError { message, fault })
            }
            other => return Err(Error::UnknownStatus(other)),
        };
        Ok(result)
    }
}
