//! # Remote Faults
//!
//! A failure raised inside business code, carried across the wire as plain data.
//! The frame list starts at the fault site; rpc plumbing never appears in it.

use std::fmt;

use fleetpack::DataBuf;
use fleetpack::DataBufReader;

use crate::error::Error;
use crate::error::Result;

/// One entry of a remote trace: the type and method that were executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultFrame {
    pub owner: String,
    pub method: String,
}

impl fmt::Display for FaultFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}::{}", self.owner, self.method)
    }
}

/// A failure kind with an optional detail and the frames it unwound through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFault {
    pub kind: String,
    pub detail: Option<String>,
    pub frames: Vec<FaultFrame>,
}

impl RemoteFault {
    pub fn new(kind: impl Into<String>, detail: impl Into<Option<String>>) -> Self {
        Self { kind: kind.into(), detail: detail.into(), frames: Vec::new() }
    }

    pub fn arithmetic(detail: impl Into<String>) -> Self {
        Self::new("ArithmeticException", Some(detail.into()))
    }

    pub fn null_pointer(detail: impl Into<String>) -> Self {
        Self::new("NullPointerException", Some(detail.into()))
    }

    pub fn illegal_argument(detail: impl Into<String>) -> Self {
        Self::new("IllegalArgumentException", Some(detail.into()))
    }

    pub fn illegal_state(detail: impl Into<String>) -> Self {
        Self::new("IllegalStateException", Some(detail.into()))
    }

    /// Records that the fault passed through `owner::method`.
    pub fn at(mut self, owner: impl Into<String>, method: impl Into<String>) -> Self {
        self.frames.push(FaultFrame { owner: owner.into(), method: method.into() });
        self
    }

    /// `"<kind>: <detail>"`, with `null` standing in for a missing detail.
    pub fn message(&self) -> String {
        format!("{}: {}", self.kind, self.detail.as_deref().unwrap_or("null"))
    }

    pub fn encode(&self, buf: &mut DataBuf) -> Result<()> {
        buf.write_string(&self.kind)?;
        buf.write_nullable(self.detail.as_deref(), |b, d| b.write_string(d).map(|_| ()))?;
        let count = i32::try_from(self.frames.len())
            .map_err(|_| Error::Protocol("too many fault frames".into()))?;
        buf.write_int(count);
        for frame in &self.frames {
            buf.write_string(&frame.owner)?;
            buf.write_string(&frame.method)?;
        }
        Ok(())
    }

    pub fn decode(reader: &mut DataBufReader) -> Result<Self> {
        let kind = reader.read_string()?;
        let detail = reader.read_nullable(|r| r.read_string())?;
        let count = reader.read_int()?;
        let count = usize::try_from(count)
            .map_err(|_| Error::Protocol(format!("negative fault frame count {count}")))?;

        let mut frames = Vec::with_capacity(count.min(reader.readable_bytes() / 8));
        for _ in 0..count {
            let owner = reader.read_string()?;
            let method = reader.read_string()?;
            frames.push(FaultFrame { owner, method });
        }
        Ok(Self { kind, detail, frames })
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for RemoteFault {}
