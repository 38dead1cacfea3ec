//! Phonon lifecycle commands

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{cla, ins},
};

pub(crate) const CREATE_PHONON_ERRORS: ErrorTable = &[
    (codes::FILE_FULL, CardError::PhononTableFull),
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
];

pub(crate) const SET_DESCRIPTOR_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_LENGTH, CardError::Card("wrong data length")),
    (codes::FILE_INVALID, CardError::InvalidPhononIndex),
    (codes::FILE_INVALID.offset(1), CardError::Card("phonon does not exist")),
    (codes::FILE_INVALID.offset(3), CardError::Card("phonon does not exist")),
    (codes::FILE_INVALID.offset(4), CardError::Card("unable to decode currency TLV")),
    (codes::FILE_INVALID.offset(5), CardError::Card("unable to set currency type to 0x00")),
    (codes::FILE_INVALID.offset(6), CardError::Card("unable to decode phonon value TLV")),
    (codes::FUNC_NOT_SUPPORTED, CardError::Card("phonon type not supported")),
];

pub(crate) const LIST_PHONONS_ERRORS: ErrorTable = &[
    (codes::WRONG_DATA, CardError::Card("no remaining phonons to list")),
    (codes::WRONG_DATA.offset(1), CardError::Card("unable to decode filter TLV")),
    (codes::WRONG_DATA.offset(2), CardError::Card("unable to decode currency TLV")),
    (codes::WRONG_DATA.offset(3), CardError::Card("unable to decode less than TLV")),
    (codes::WRONG_DATA.offset(4), CardError::Card("unable to decode greater than TLV")),
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::INCORRECT_P1P2, CardError::Card("incorrect parameters received")),
];

pub(crate) const GET_PHONON_PUBLIC_KEY_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_LENGTH, CardError::Card("data length incorrect")),
    (codes::WRONG_DATA, CardError::Card("phonon index invalid")),
    (codes::FILE_INVALID, CardError::InvalidPhononIndex),
    (
        codes::FILE_INVALID.offset(1),
        CardError::Card("phonon at index exceeds available phonon list"),
    ),
    (codes::FILE_INVALID.offset(3), CardError::Card("phonon at index is null")),
    (codes::FILE_NOT_FOUND, CardError::Card("phonon not initialized")),
];

// FILE_INVALID + 2 collides with CONDITIONS_NOT_SATISFIED and is never used
pub(crate) const DESTROY_PHONON_ERRORS: ErrorTable = &[
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
    (codes::WRONG_LENGTH, CardError::Card("incoming length wrong")),
    (codes::WRONG_DATA, CardError::Card("invalid phonon index")),
    (codes::FILE_INVALID, CardError::InvalidPhononIndex),
    (codes::FILE_INVALID.offset(1), CardError::Card("phonon doesn't exist")),
    (codes::FILE_INVALID.offset(3), CardError::Card("phonon already deleted")),
];

pub(crate) const MINE_NATIVE_PHONON_ERRORS: ErrorTable = &[
    (codes::MINING_FAILED, CardError::MiningFailed),
    (codes::CONDITIONS_NOT_SATISFIED, CardError::PinNotEntered),
];

/// Payload of a create request; the curve travels in P1
const CREATE_DATA: &[u8] = &[0x00];

/// Create a new phonon key pair on `curve_type`
pub fn create_phonon(curve_type: u8) -> PhononCommand {
    PhononCommand::new(
        Instruction::CreatePhonon,
        Command::new_with_data(
            cla::ISO7816,
            ins::CREATE_PHONON,
            curve_type,
            0x00,
            Bytes::from_static(CREATE_DATA),
        ),
    )
}

/// Attach a pre-encoded descriptor TLV to a phonon
pub fn set_descriptor(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::SetDescriptor,
        Command::new_with_data(
            cla::GP,
            ins::SET_DESCRIPTOR,
            0x00,
            0x00,
            Bytes::copy_from_slice(data),
        ),
    )
}

/// List phonons matching a pre-encoded filter. `p1`/`p2` select the filter mode.
pub fn list_phonons(p1: u8, p2: u8, filter: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::ListPhonons,
        Command::new_with_data(
            cla::ISO7816,
            ins::LIST_PHONONS,
            p1,
            p2,
            Bytes::copy_from_slice(filter),
        ),
    )
}

/// Read the public key of the phonon addressed by `index_tlv`
pub fn get_phonon_public_key(index_tlv: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::GetPhononPublicKey,
        Command::new_with_data(
            cla::ISO7816,
            ins::GET_PHONON_PUBKEY,
            0x00,
            0x00,
            Bytes::copy_from_slice(index_tlv),
        ),
    )
}

/// Destroy a phonon, releasing its private key
pub fn destroy_phonon(index_tlv: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::DestroyPhonon,
        Command::new_with_data(
            cla::ISO7816,
            ins::DESTROY_PHONON,
            0x00,
            0x00,
            Bytes::copy_from_slice(index_tlv),
        ),
    )
}

/// Mine a native phonon with the given difficulty
pub fn mine_native_phonon(difficulty: u8) -> PhononCommand {
    PhononCommand::new(
        Instruction::MineNativePhonon,
        Command::new(cla::GP, ins::MINE_NATIVE_PHONON, difficulty, 0x00),
    )
}
