//! Card to card pairing commands used ahead of a phonon transfer

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{cla, ins},
};

pub(crate) const INIT_CARD_PAIRING_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_DATA, CardError::Card("unable to decode certificate TLV")),
    (codes::COMMAND_NOT_ALLOWED, CardError::Card("card certificate not initialized")),
];

pub(crate) const CARD_PAIR_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_DATA, CardError::Card("unable to decode card certificate TLV")),
    (codes::WRONG_DATA.offset(1), CardError::Card("unable to decode salt TLV")),
];

pub(crate) const CARD_PAIR_2_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_DATA, CardError::Card("unable to read salt")),
    (codes::WRONG_DATA.offset(1), CardError::Card("unable to read AES TLV")),
    (codes::WRONG_DATA.offset(2), CardError::Card("unable to read signature TLV")),
];

pub(crate) const FINALIZE_CARD_PAIR_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_DATA, CardError::Card("unable to read receiver signature TLV")),
    (codes::SECURITY_STATUS_NOT_SATISFIED, CardError::Card("unable to verify signature")),
];

/// Start pairing with a counterparty card
pub fn init_card_pairing(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::InitCardPairing,
        Command::new_with_data(
            cla::GP,
            ins::INIT_CARD_PAIRING,
            0x00,
            0x00,
            Bytes::copy_from_slice(data),
        ),
    )
}

/// Answer a counterparty pairing request
pub fn card_pair(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::CardPair,
        Command::new_with_data(cla::GP, ins::CARD_PAIR, 0x00, 0x00, Bytes::copy_from_slice(data)),
    )
}

/// Second card to card pairing exchange
pub fn card_pair_2(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::CardPair2,
        Command::new_with_data(cla::GP, ins::CARD_PAIR_2, 0x00, 0x00, Bytes::copy_from_slice(data)),
    )
}

/// Complete card to card pairing
pub fn finalize_card_pair(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::FinalizeCardPair,
        Command::new_with_data(
            cla::GP,
            ins::FINALIZE_CARD_PAIR,
            0x00,
            0x00,
            Bytes::copy_from_slice(data),
        ),
    )
}
