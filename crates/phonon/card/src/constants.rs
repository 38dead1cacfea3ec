/// Application identifier of the phonon applet
pub const PHONON_AID: &[u8] = b"\xA0\x00\x00\x08\x20\x00\x03\x01";

/// Length of the salts, challenges and cryptograms exchanged during pairing
pub const SALT_LENGTH: usize = 32;

/// Command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
}

/// Instruction codes understood by the phonon applet
pub mod ins {
    /// SELECT by AID
    pub const SELECT: u8 = 0xA4;
    /// Start a secure channel on a stored pairing
    pub const OPEN_SECURE_CHANNEL: u8 = 0x10;
    /// Prove both sides derived the same session keys
    pub const MUTUALLY_AUTHENTICATE: u8 = 0x11;
    /// Two step pairing, see [`pair_p1`](super::pair_p1)
    pub const PAIR: u8 = 0x12;
    /// Remove a stored pairing
    pub const UNPAIR: u8 = 0x13;
    /// Sign a host nonce with the card identity key
    pub const IDENTIFY_CARD: u8 = 0x14;
    /// Install the card certificate
    pub const LOAD_CERT: u8 = 0x15;
    /// Verify the user PIN
    pub const VERIFY_PIN: u8 = 0x20;
    /// Replace the user PIN
    pub const CHANGE_PIN: u8 = 0x21;
    /// Create an empty phonon
    pub const CREATE_PHONON: u8 = 0x30;
    /// Attach a descriptor to a phonon
    pub const SET_DESCRIPTOR: u8 = 0x31;
    /// List phonons matching a filter
    pub const LIST_PHONONS: u8 = 0x32;
    /// Read a phonon public key
    pub const GET_PHONON_PUBKEY: u8 = 0x33;
    /// Destroy a phonon and export its private key
    pub const DESTROY_PHONON: u8 = 0x34;
    /// Export phonons as a transfer packet
    pub const SEND_PHONONS: u8 = 0x35;
    /// Import a transfer packet
    pub const RECV_PHONONS: u8 = 0x36;
    /// Restrict which phonons may be received
    pub const SET_RECV_LIST: u8 = 0x37;
    /// Acknowledge a completed transfer
    pub const TRANSACTION_ACK: u8 = 0x38;
    /// Attempt to mine a native phonon
    pub const MINE_NATIVE_PHONON: u8 = 0x41;
    /// Start card to card pairing
    pub const INIT_CARD_PAIRING: u8 = 0x50;
    /// First card to card pairing response
    pub const CARD_PAIR: u8 = 0x51;
    /// Second card to card pairing response
    pub const CARD_PAIR_2: u8 = 0x52;
    /// Finish card to card pairing
    pub const FINALIZE_CARD_PAIR: u8 = 0x53;
    /// Create an invoice
    pub const GENERATE_INVOICE: u8 = 0x54;
    /// Accept an invoice
    pub const RECEIVE_INVOICE: u8 = 0x55;
    /// Read the friendly name
    pub const GET_FRIENDLY_NAME: u8 = 0x56;
    /// Store a friendly name
    pub const SET_FRIENDLY_NAME: u8 = 0x57;
    /// Install the certificate authority key
    pub const LOAD_CA: u8 = 0x58;
    /// Report free persistent and transient memory
    pub const GET_AVAILABLE_MEMORY: u8 = 0x99;
    /// Initialize a fresh card with a PIN
    pub const INIT: u8 = 0xFE;
}

/// P1 values of the PAIR command
pub mod pair_p1 {
    /// First PAIR exchange: host salt and ephemeral key
    pub const FIRST_STEP: u8 = 0x00;
    /// Second PAIR exchange: host cryptogram
    pub const FINAL_STEP: u8 = 0x01;
}

/// BER-TLV tags used in card payloads
pub mod tags {
    /// Signature template containing:
    /// - ECC_PUBLIC_KEY
    /// - ECDSA_SIGNATURE
    pub const TEMPLATE_SIGNATURE: u8 = 0xA0;
    /// ECC public key (compressed or uncompressed)
    pub const ECC_PUBLIC_KEY: u8 = 0x80;
    /// Card certificate, holding ECC_PUBLIC_KEY and an optional CA ECDSA_SIGNATURE
    pub const CERTIFICATE: u8 = 0x8A;
    /// DER encoded ECDSA signature
    pub const ECDSA_SIGNATURE: u8 = 0x30;
    /// Phonon key index (2 bytes, big endian)
    pub const PHONON_KEY_INDEX: u8 = 0x41;
    /// Phonon private key, returned when a phonon is destroyed
    pub const PHONON_PRIVATE_KEY: u8 = 0x81;
}
