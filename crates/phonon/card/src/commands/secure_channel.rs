//! Host pairing and secure channel commands

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{cla, ins, pair_p1},
};

pub(crate) const PAIR_STEP_1_ERRORS: ErrorTable = &[
    (codes::WRONG_DATA, CardError::Card("data incorrect size")),
    (codes::SECURE_MESSAGING_NOT_SUPPORTED, CardError::Card("no certificate loaded")),
    (codes::SECURITY_STATUS_NOT_SATISFIED, CardError::Card("unable to compute ECDH secrets")),
];

pub(crate) const PAIR_STEP_2_ERRORS: ErrorTable = &[
    (codes::WRONG_DATA, CardError::Card("wrong secret length")),
    (codes::SECURITY_STATUS_NOT_SATISFIED, CardError::CryptogramMismatch),
];

pub(crate) const OPEN_SECURE_CHANNEL_ERRORS: ErrorTable = &[
    (codes::INCORRECT_P1P2, CardError::Card("incorrect parameters")),
    (codes::SECURITY_STATUS_NOT_SATISFIED, CardError::Card("unable to generate secret")),
];

pub(crate) const MUTUALLY_AUTHENTICATE_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::Card("authentication key not initialized")),
    (codes::LOGICAL_CHANNEL_NOT_SUPPORTED, CardError::AlreadyAuthenticated),
    (codes::SECURITY_STATUS_NOT_SATISFIED, CardError::Card("secret length invalid")),
];

/// First pairing exchange: host salt followed by the uncompressed host public key
pub fn pair_step_1(salt: &[u8], public_key: &[u8]) -> PhononCommand {
    let data = Bytes::from([salt, public_key].concat());

    PhononCommand::new(
        Instruction::PairStep1,
        Command::new_with_data(cla::GP, ins::PAIR, pair_p1::FIRST_STEP, 0x00, data),
    )
}

/// Second pairing exchange: the host cryptogram
pub fn pair_step_2(cryptogram: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::PairStep2,
        Command::new_with_data(
            cla::GP,
            ins::PAIR,
            pair_p1::FINAL_STEP,
            0x00,
            Bytes::copy_from_slice(cryptogram),
        ),
    )
}

/// Release pairing slot `index`
pub fn unpair(index: u8) -> PhononCommand {
    PhononCommand::new(Instruction::Unpair, Command::new(cla::GP, ins::UNPAIR, index, 0x00))
}

/// Open a secure channel for pairing slot `index` with a fresh host key
pub fn open_secure_channel(index: u8, public_key: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::OpenSecureChannel,
        Command::new_with_data(
            cla::GP,
            ins::OPEN_SECURE_CHANNEL,
            index,
            0x00,
            Bytes::copy_from_slice(public_key),
        ),
    )
}

/// Send a host challenge over the freshly opened channel
pub fn mutually_authenticate(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::MutuallyAuthenticate,
        Command::new_with_data(
            cla::GP,
            ins::MUTUALLY_AUTHENTICATE,
            0x00,
            0x00,
            Bytes::copy_from_slice(data),
        ),
    )
}
