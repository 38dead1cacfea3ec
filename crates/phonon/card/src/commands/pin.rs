//! PIN commands

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{cla, ins},
};

pub(crate) const VERIFY_PIN_ERRORS: ErrorTable =
    &[(codes::PIN_VERIFY_FAILED, CardError::PinVerificationFailed)];

pub(crate) const CHANGE_PIN_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (
        codes::INCORRECT_P1P2,
        CardError::Card("parameter neither change user pin or change pairing secret"),
    ),
];

/// Verify the user PIN
pub fn verify_pin(pin: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::VerifyPin,
        Command::new_with_data(cla::GP, ins::VERIFY_PIN, 0x00, 0x00, Bytes::copy_from_slice(pin)),
    )
}

/// Replace the user PIN. The current PIN must have been verified.
pub fn change_pin(pin: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::ChangePin,
        Command::new_with_data(cla::GP, ins::CHANGE_PIN, 0x00, 0x00, Bytes::copy_from_slice(pin)),
    )
}
