//! Host side of the phonon smart card protocol
//!
//! - A catalog of every applet command, each carrying the status words it is
//!   documented to return ([`PhononCommand`], [`Instruction`])
//! - Resolution of card responses into payloads or [`CardError`]s
//! - The pairing and secure channel [`Handshake`]
//! - [`PhononCard`], a client that runs catalog commands through an
//!   established [`SecureChannelSession`]
//!
//! Transports are injected through [`CardTransport`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

mod card;
mod commands;
mod config;
mod constants;
mod crypto;
mod error;
mod handshake;
mod session;
mod types;
mod validator;

#[cfg(test)]
mod mock;

pub use card::PhononCard;
pub use commands::*;
pub use config::HandshakeConfig;
pub use constants::*;
pub use crypto::{
    COMPRESSED_KEY_LENGTH, Cryptogram, PairingKey, PhononScp, UNCOMPRESSED_KEY_LENGTH,
    encode_public_key, generate_ecdh_shared_secret, parse_public_key,
};
pub use error::{CardError, Error, Result};
pub use handshake::{CertificateStatus, Handshake, HandshakeState};
pub use session::SecureChannelSession;
pub use types::{CardCertificate, CardIdentity, CurveType, PairingInfo, Phonon, encode_key_index};
pub use validator::{Validator, validate_phonon};

pub use phonon_apdu_core::{CardTransport, StatusWord, TransportError};
