//! APDU response definitions
//!
//! A response is `Data | SW1 | SW2`; the status word is always the trailing two
//! bytes.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::status::{StatusWord, codes};
use crate::{Error, Result};

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data
    payload: Option<Bytes>,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload,
            status: status.into(),
        }
    }

    /// Create a success response
    pub const fn success(payload: Option<Bytes>) -> Self {
        Self {
            payload,
            status: codes::NO_ERROR,
        }
    }

    /// Create an error response from a status word
    pub fn error(status: impl Into<StatusWord>) -> Self {
        Self::new(None, status)
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [payload @ .., sw1, sw2] = data else {
            return Err(Error::IncompleteResponse(data.len()));
        };
        let status = StatusWord::new(*sw1, *sw2);
        let payload = (!payload.is_empty()).then(|| Bytes::copy_from_slice(payload));

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.as_ref().map_or(0, |p| p.len()),
            "Parsed APDU response"
        );

        Ok(Self { payload, status })
    }

    /// Get the response payload data
    pub const fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Take the response payload
    pub fn into_payload(self) -> Option<Bytes> {
        self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serialize back to `Data | SW1 | SW2`
    pub fn to_bytes(&self) -> Bytes {
        let payload = self.payload.as_deref().unwrap_or_default();
        let mut buf = BytesMut::with_capacity(payload.len() + 2);
        buf.put_slice(payload);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}
