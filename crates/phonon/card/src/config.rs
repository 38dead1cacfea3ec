//! Configuration options for the pairing handshake and card client

use k256::PublicKey;

/// Optional checks applied while talking to a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Certificate authority the card certificate must be signed by.
    /// When unset the certificate signature is not checked.
    pub ca_public_key: Option<PublicKey>,

    /// Verify the signature returned by IDENTIFY CARD
    pub verify_identity: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            ca_public_key: None,
            verify_identity: true,
        }
    }
}

impl HandshakeConfig {
    /// Require card certificates signed by `ca_public_key`
    pub fn with_ca_public_key(mut self, ca_public_key: PublicKey) -> Self {
        self.ca_public_key = Some(ca_public_key);
        self
    }

    /// Check IDENTIFY CARD signatures against the host nonce
    pub const fn with_verify_identity(mut self, verify_identity: bool) -> Self {
        self.verify_identity = verify_identity;
        self
    }
}
