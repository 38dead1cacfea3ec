//! Applet selection, identity and housekeeping commands

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{PHONON_AID, cla, ins},
};

pub(crate) const IDENTIFY_CARD_ERRORS: ErrorTable = &[(
    codes::DATA_INVALID,
    CardError::Card("received challenge is not correct length"),
)];

pub(crate) const GET_FRIENDLY_NAME_ERRORS: ErrorTable = &[(
    codes::DATA_INVALID,
    CardError::Card("friendly name not set"),
)];

/// Placeholder payload for commands that carry no parameters but are sent with a data field
const EMPTY_DATA: &[u8] = &[0x00];

/// Select the phonon applet by AID
pub fn select_phonon_applet() -> PhononCommand {
    PhononCommand::new(
        Instruction::Select,
        Command::new_with_data(
            cla::ISO7816,
            ins::SELECT,
            0x04,
            0x00,
            Bytes::from_static(PHONON_AID),
        )
        .with_le(0x00),
    )
}

/// Ask the card to sign `nonce` with its identity key
pub fn identify_card(nonce: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::IdentifyCard,
        Command::new_with_data(
            cla::GP,
            ins::IDENTIFY_CARD,
            0x00,
            0x00,
            Bytes::copy_from_slice(nonce),
        ),
    )
}

/// Initialize a fresh card
pub fn init(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::Init,
        Command::new_with_data(cla::GP, ins::INIT, 0x00, 0x00, Bytes::copy_from_slice(data)),
    )
}

/// Create an invoice
pub fn generate_invoice() -> PhononCommand {
    PhononCommand::new(
        Instruction::GenerateInvoice,
        Command::new_with_data(
            cla::GP,
            ins::GENERATE_INVOICE,
            0x00,
            0x00,
            Bytes::from_static(EMPTY_DATA),
        ),
    )
}

/// Accept an invoice
pub fn receive_invoice() -> PhononCommand {
    PhononCommand::new(
        Instruction::ReceiveInvoice,
        Command::new_with_data(
            cla::GP,
            ins::RECEIVE_INVOICE,
            0x00,
            0x00,
            Bytes::from_static(EMPTY_DATA),
        ),
    )
}

/// Read the friendly name
pub fn get_friendly_name() -> PhononCommand {
    PhononCommand::new(
        Instruction::GetFriendlyName,
        Command::new_with_data(
            cla::GP,
            ins::GET_FRIENDLY_NAME,
            0x00,
            0x00,
            Bytes::from_static(EMPTY_DATA),
        ),
    )
}

/// Store a friendly name
pub fn set_friendly_name(name: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::SetFriendlyName,
        Command::new_with_data(
            cla::GP,
            ins::SET_FRIENDLY_NAME,
            0x00,
            0x00,
            Bytes::copy_from_slice(name),
        ),
    )
}

/// Query free persistent and transient memory
pub fn get_available_memory() -> PhononCommand {
    PhononCommand::new(
        Instruction::GetAvailableMemory,
        Command::new(cla::GP, ins::GET_AVAILABLE_MEMORY, 0x00, 0x00),
    )
}
