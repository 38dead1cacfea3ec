//! Core types for talking to a phonon card over ISO/IEC 7816-4 APDUs
//!
//! This crate provides the foundational pieces the phonon protocol layer is
//! built on:
//!
//! - [`StatusWord`] and the applet's documented status codes
//! - Short-form [`Command`] encoding and [`Response`] parsing
//! - The [`CardTransport`] capability through which raw bytes reach a reader
//!
//! It performs no I/O of its own; a reader driver implements [`CardTransport`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod status;
pub mod transport;

mod error;
pub use error::{Error, Result, TransportError};

pub use command::{Command, MAX_PAYLOAD_LENGTH};
pub use response::Response;
pub use status::StatusWord;
pub use transport::CardTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardTransport, Command, Error, Response, StatusWord, TransportError,
        status::codes,
    };
}
