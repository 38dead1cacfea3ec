use iso7816_tlv::TlvError;
use phonon_apdu_core::{StatusWord, TransportError};

use crate::handshake::HandshakeState;

/// Result type for phonon card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of resolving a card status word against a command's error table
///
/// Resolution is total: a status word missing from the table is either
/// success or [`CardError::Unspecified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    /// The command requires the PIN to be verified first
    #[error("PIN not entered")]
    PinNotEntered,

    /// The supplied PIN was rejected
    #[error("PIN verification failed")]
    PinVerificationFailed,

    /// No free slot left for another phonon
    #[error("phonon table full")]
    PhononTableFull,

    /// The phonon index does not address a phonon
    #[error("invalid phonon index")]
    InvalidPhononIndex,

    /// The certificate or certificate authority can no longer be changed
    #[error("certificate locked")]
    CertLocked,

    /// The key handed to the card has the wrong length
    #[error("invalid key length")]
    InvalidKeyLength,

    /// A mining attempt found no phonon
    #[error("mining failed")]
    MiningFailed,

    /// The secure channel has already been mutually authenticated
    #[error("already mutually authenticated")]
    AlreadyAuthenticated,

    /// The card rejected the host pairing cryptogram
    #[error("client cryptogram differs from expected")]
    CryptogramMismatch,

    /// A documented card condition without a dedicated variant
    #[error("{0}")]
    Card(&'static str),

    /// Status word not documented for this command
    #[error("unspecified card error: {0} ({desc})", desc = .0.description())]
    Unspecified(StatusWord),
}

impl CardError {
    /// Whether this outcome fell through to the default
    pub const fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified(_))
    }
}

/// Error type for phonon card operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// APDU framing failure
    #[error(transparent)]
    Apdu(phonon_apdu_core::Error),

    /// The card answered with an error status
    #[error(transparent)]
    Card(#[from] CardError),

    /// A handshake operation was called in the wrong state. Nothing was sent.
    #[error("{operation} is not allowed in state {state}")]
    OutOfOrder {
        /// The rejected operation
        operation: &'static str,
        /// State the handshake was in when it was called
        state: HandshakeState,
    },

    /// The handshake failed earlier and can no longer be used
    #[error("handshake aborted: {0}")]
    Aborted(String),

    /// A signature or cryptogram from the card did not verify
    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    /// The card answered with a malformed payload
    #[error("invalid data: {0}")]
    InvalidData(&'static str),

    /// Public key bytes are neither compressed nor uncompressed SEC1
    #[error("invalid ECC public key format")]
    InvalidPublicKeyFormat,

    /// A phonon reached validation without a public key
    #[error("phonon has no public key")]
    MissingPublicKey,

    /// Secure messaging failure. The channel is unusable afterwards.
    #[error("secure channel: {0}")]
    SecureChannel(&'static str),

    /// Elliptic curve failure
    #[error(transparent)]
    EllipticCurve(#[from] k256::elliptic_curve::Error),

    /// ECDSA failure
    #[error(transparent)]
    Ecdsa(#[from] k256::ecdsa::Error),

    /// Decrypted data carries no valid ISO7816 padding
    #[error("invalid padding")]
    Unpad,

    /// Malformed BER-TLV
    #[error("TlvError: {0}")]
    Tlv(TlvError),
}

impl From<TlvError> for Error {
    fn from(error: TlvError) -> Self {
        Self::Tlv(error)
    }
}

impl From<phonon_apdu_core::Error> for Error {
    fn from(error: phonon_apdu_core::Error) -> Self {
        match error {
            phonon_apdu_core::Error::Transport(e) => Self::Transport(e),
            other => Self::Apdu(other),
        }
    }
}

impl From<cipher::block_padding::UnpadError> for Error {
    fn from(_: cipher::block_padding::UnpadError) -> Self {
        Self::Unpad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_flattened() {
        let error = Error::from(phonon_apdu_core::Error::Transport(TransportError::Timeout));
        assert!(matches!(error, Error::Transport(TransportError::Timeout)));

        let error = Error::from(phonon_apdu_core::Error::InvalidCommandLength(300));
        assert!(matches!(
            error,
            Error::Apdu(phonon_apdu_core::Error::InvalidCommandLength(300))
        ));
    }

    #[test]
    fn test_unspecified_is_distinguishable() {
        assert!(CardError::Unspecified(StatusWord::new(0x6F, 0x00)).is_unspecified());
        assert!(!CardError::PinNotEntered.is_unspecified());
        assert!(!CardError::Card("phonon does not exist").is_unspecified());
    }

    #[test]
    fn test_unspecified_message_names_status() {
        let error = CardError::Unspecified(StatusWord::new(0x6A, 0x82));
        assert_eq!(error.to_string(), "unspecified card error: 6A 82 (File not found)");

        let error = CardError::Unspecified(StatusWord::new(0x12, 0x34));
        assert_eq!(error.to_string(), "unspecified card error: 12 34 (Unknown status word)");
    }
}
