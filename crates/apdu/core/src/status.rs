//! Status word definitions for APDU responses
//!
//! Besides the generic [`StatusWord`] type this module carries the fixed set of
//! codes the phonon applet is documented to return, in [`codes`].

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Derive a sub-error code from a base status word.
    ///
    /// The applet multiplexes several failures of one logical step onto a
    /// single base code by adding a small offset to it. The arithmetic is done
    /// on the full 16-bit value, so `offset` may carry into SW1 exactly as the
    /// firmware does. This is the only place the convention is encoded.
    pub const fn offset(self, offset: u8) -> Self {
        Self::from_u16(self.to_u16().wrapping_add(offset as u16))
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if this status word indicates more data is available (61 XX)
    pub const fn is_more_data_available(&self) -> bool {
        self.sw1 == 0x61
    }

    /// Check if this status word indicates a warning (62 XX / 63 XX)
    pub const fn is_warning(&self) -> bool {
        self.sw1 == 0x62 || self.sw1 == 0x63
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() || self.is_more_data_available() {
            Level::DEBUG
        } else if self.is_warning() {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x90, 0x01) => "Mining failed",
            (0x06, 0x3C) => "PIN verification failed",
            (0x61, _) => "More data available",
            (0x62, 0x00) => "State of non-volatile memory unchanged",
            (0x67, 0x00) => "Wrong length",
            (0x68, 0x81) => "Logical channel not supported",
            (0x68, 0x82) => "Secure messaging not supported",
            (0x68, 0x83) => "Last command of the chain expected",
            (0x68, 0x84) => "Command chaining not supported",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x83) => "File invalid",
            (0x69, 0x84) => "Data invalid",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x69, 0x86) => "Command not allowed",
            (0x69, 0x99) => "Applet selection failed",
            (0x6A, 0x80) => "Wrong data",
            (0x6A, 0x81) => "Function not supported",
            (0x6A, 0x82) => "File not found",
            (0x6A, 0x83) => "Record not found",
            (0x6A, 0x84) => "File full",
            (0x6A, 0x86) => "Incorrect parameters P1-P2",
            (0x6B, 0x00) => "Wrong parameters P1-P2",
            (0x6C, _) => "Wrong Le field",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            (0x6F, 0x00) => "No precise diagnosis",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Status words returned by the phonon applet.
///
/// ISO7816 codes keep their standard names; the two application specific
/// extensions are [`MINING_FAILED`](codes::MINING_FAILED) and
/// [`PIN_VERIFY_FAILED`](codes::PIN_VERIFY_FAILED).
pub mod codes {
    use super::StatusWord;

    /// Unconditional success
    pub const NO_ERROR: StatusWord = StatusWord::from_u16(0x9000);
    /// Native phonon mining did not find a solution
    pub const MINING_FAILED: StatusWord = StatusWord::from_u16(0x9001);
    /// Wrong PIN presented. The firmware really returns `06 3C`.
    pub const PIN_VERIFY_FAILED: StatusWord = StatusWord::from_u16(0x063C);

    /// Response bytes remaining (61 XX)
    pub const BYTES_REMAINING_00: StatusWord = StatusWord::from_u16(0x6100);
    /// Warning, state unchanged
    pub const WARNING_STATE_UNCHANGED: StatusWord = StatusWord::from_u16(0x6200);
    /// Wrong length
    pub const WRONG_LENGTH: StatusWord = StatusWord::from_u16(0x6700);
    /// Logical channel not supported
    pub const LOGICAL_CHANNEL_NOT_SUPPORTED: StatusWord = StatusWord::from_u16(0x6881);
    /// Secure messaging not supported
    pub const SECURE_MESSAGING_NOT_SUPPORTED: StatusWord = StatusWord::from_u16(0x6882);
    /// Last command of a chain expected
    pub const LAST_COMMAND_EXPECTED: StatusWord = StatusWord::from_u16(0x6883);
    /// Command chaining not supported
    pub const COMMAND_CHAINING_NOT_SUPPORTED: StatusWord = StatusWord::from_u16(0x6884);
    /// Security status not satisfied
    pub const SECURITY_STATUS_NOT_SATISFIED: StatusWord = StatusWord::from_u16(0x6982);
    /// File invalid
    pub const FILE_INVALID: StatusWord = StatusWord::from_u16(0x6983);
    /// Data invalid
    pub const DATA_INVALID: StatusWord = StatusWord::from_u16(0x6984);
    /// Conditions of use not satisfied
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord::from_u16(0x6985);
    /// Command not allowed
    pub const COMMAND_NOT_ALLOWED: StatusWord = StatusWord::from_u16(0x6986);
    /// Applet selection failed
    pub const APPLET_SELECT_FAILED: StatusWord = StatusWord::from_u16(0x6999);
    /// Wrong data
    pub const WRONG_DATA: StatusWord = StatusWord::from_u16(0x6A80);
    /// Function not supported
    pub const FUNC_NOT_SUPPORTED: StatusWord = StatusWord::from_u16(0x6A81);
    /// File not found
    pub const FILE_NOT_FOUND: StatusWord = StatusWord::from_u16(0x6A82);
    /// Record not found
    pub const RECORD_NOT_FOUND: StatusWord = StatusWord::from_u16(0x6A83);
    /// File full
    pub const FILE_FULL: StatusWord = StatusWord::from_u16(0x6A84);
    /// Incorrect P1 P2
    pub const INCORRECT_P1P2: StatusWord = StatusWord::from_u16(0x6A86);
    /// Wrong P1 P2
    pub const WRONG_P1P2: StatusWord = StatusWord::from_u16(0x6B00);
    /// Correct length hint (6C XX)
    pub const CORRECT_LENGTH_00: StatusWord = StatusWord::from_u16(0x6C00);
    /// Instruction not supported
    pub const INS_NOT_SUPPORTED: StatusWord = StatusWord::from_u16(0x6D00);
    /// Class not supported
    pub const CLA_NOT_SUPPORTED: StatusWord = StatusWord::from_u16(0x6E00);
    /// No precise diagnosis
    pub const UNKNOWN: StatusWord = StatusWord::from_u16(0x6F00);
}
