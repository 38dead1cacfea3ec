use std::fmt;

use k256::PublicKey;
use zeroize::Zeroize;

use crate::crypto::PairingKey;

/// Pairing information structure
///
/// Produced once by the pairing handshake and persisted by the caller. Later
/// sessions resume from it without pairing again.
#[derive(Clone, PartialEq, Eq)]
pub struct PairingInfo {
    /// Secret both sides derived while pairing
    pub key: PairingKey,
    /// Pairing slot on the card
    pub index: u8,
    /// Identity key the card presented in its certificate
    pub card_public_key: PublicKey,
}

impl fmt::Debug for PairingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingInfo")
            .field("index", &self.index)
            .field("card_public_key", &self.card_public_key)
            .finish_non_exhaustive()
    }
}

impl Drop for PairingInfo {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
