//! Phonon transfer commands

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{cla, ins},
};

pub(crate) const SEND_PHONONS_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::INCORRECT_P1P2, CardError::Card("phonon list continuation greater than 1")),
    (codes::INCORRECT_P1P2.offset(1), CardError::Card("no phonons requested")),
    (codes::WRONG_DATA, CardError::Card("incorrect phonon index")),
];

pub(crate) const RECEIVE_PHONONS_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::Card("phonon receipt conditions not met")),
    (codes::FILE_FULL, CardError::Card("maximum number of phonons exceeded")),
    (codes::WRONG_DATA, CardError::Card("unable to decode phonon key list TLV")),
];

pub(crate) const SET_RECEIVE_LIST_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::FILE_FULL, CardError::Card("no phonon with index passed")),
    (codes::WRONG_DATA, CardError::Card("unable to decode phonon key list TLV")),
    (codes::WRONG_DATA.offset(1), CardError::Card("unable to decode phonon key TLV")),
];

pub(crate) const TRANSACTION_ACK_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_DATA, CardError::Card("unable to decode TLV tag")),
];

/// Export phonons into a transfer packet.
///
/// `extended` marks a request that continues a previous list.
pub fn send_phonons(data: &[u8], p2: u8, extended: bool) -> PhononCommand {
    let p1 = u8::from(extended);
    PhononCommand::new(
        Instruction::SendPhonons,
        Command::new_with_data(
            cla::ISO7816,
            ins::SEND_PHONONS,
            p1,
            p2,
            Bytes::copy_from_slice(data),
        ),
    )
}

/// Import a transfer packet produced by another card
pub fn receive_phonons(packet: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::ReceivePhonons,
        Command::new_with_data(
            cla::ISO7816,
            ins::RECV_PHONONS,
            0x00,
            0x00,
            Bytes::copy_from_slice(packet),
        ),
    )
}

/// Restrict which phonons the card will accept
pub fn set_receive_list(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::SetReceiveList,
        Command::new_with_data(
            cla::ISO7816,
            ins::SET_RECV_LIST,
            0x00,
            0x00,
            Bytes::copy_from_slice(data),
        ),
    )
}

/// Acknowledge a completed transfer so the sender can delete its copies
pub fn transaction_ack(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::TransactionAck,
        Command::new_with_data(
            cla::ISO7816,
            ins::TRANSACTION_ACK,
            0x00,
            0x00,
            Bytes::copy_from_slice(data),
        ),
    )
}
