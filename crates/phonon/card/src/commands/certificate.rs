//! Certificate authority and card certificate installation

use phonon_apdu_core::{Bytes, Command, status::codes};

use super::{ErrorTable, Instruction, PhononCommand};
use crate::{
    CardError,
    constants::{cla, ins},
};

pub(crate) const LOAD_CERT_AUTHORITY_ERRORS: ErrorTable = &[
    (codes::FUNC_NOT_SUPPORTED, CardError::CertLocked),
    (codes::WRONG_DATA, CardError::InvalidKeyLength),
];

pub(crate) const INSTALL_CERTIFICATE_ERRORS: ErrorTable = &[
    (codes::COMMAND_NOT_ALLOWED, CardError::CertLocked),
    (codes::DATA_INVALID, CardError::Card("unable to save certificate")),
];

/// Load the certificate authority public key
pub fn load_cert_authority(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::LoadCertAuthority,
        Command::new_with_data(cla::GP, ins::LOAD_CA, 0x00, 0x00, Bytes::copy_from_slice(data)),
    )
}

/// Install the CA signed card certificate
pub fn install_certificate(data: &[u8]) -> PhononCommand {
    PhononCommand::new(
        Instruction::InstallCertificate,
        Command::new_with_data(cla::GP, ins::LOAD_CERT, 0x00, 0x00, Bytes::copy_from_slice(data)),
    )
}
