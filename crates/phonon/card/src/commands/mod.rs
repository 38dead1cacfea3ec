//! Command catalog for the phonon applet
//!
//! Every card operation has a constructor returning a [`PhononCommand`]: the
//! encoded APDU plus the static table that maps the status words documented
//! for that instruction to a [`CardError`]. The catalog never inspects the
//! payloads it wraps.

use bytes::Bytes;
use phonon_apdu_core::{CardTransport, Command, Response, StatusWord};
use tracing::{Level, debug, info, warn};

use crate::{CardError, Result, session::SecureChannelSession};

mod applet;
mod card_pairing;
mod certificate;
mod phonon;
mod pin;
mod secure_channel;
mod transfer;

pub use applet::*;
pub use card_pairing::*;
pub use certificate::*;
pub use phonon::*;
pub use pin::*;
pub use secure_channel::*;
pub use transfer::*;

/// Status words an instruction is documented to return, with their outcome
pub type ErrorTable = &'static [(StatusWord, CardError)];

const NO_ERRORS: ErrorTable = &[];

/// Card operations known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// SELECT
    Select,
    /// IDENTIFY CARD
    IdentifyCard,
    /// VERIFY PIN
    VerifyPin,
    /// CHANGE PIN
    ChangePin,
    /// CREATE PHONON
    CreatePhonon,
    /// SET DESCRIPTOR
    SetDescriptor,
    /// LIST PHONONS
    ListPhonons,
    /// GET PHONON PUBKEY
    GetPhononPublicKey,
    /// DESTROY PHONON
    DestroyPhonon,
    /// SEND PHONONS
    SendPhonons,
    /// RECV PHONONS
    ReceivePhonons,
    /// SET RECV LIST
    SetReceiveList,
    /// TRANSACTION ACK
    TransactionAck,
    /// INIT CARD PAIRING
    InitCardPairing,
    /// CARD PAIR
    CardPair,
    /// CARD PAIR 2
    CardPair2,
    /// FINALIZE CARD PAIR
    FinalizeCardPair,
    /// LOAD CA
    LoadCertAuthority,
    /// LOAD CERT
    InstallCertificate,
    /// PAIR, first step
    PairStep1,
    /// PAIR, final step
    PairStep2,
    /// UNPAIR
    Unpair,
    /// OPEN SECURE CHANNEL
    OpenSecureChannel,
    /// MUTUALLY AUTHENTICATE
    MutuallyAuthenticate,
    /// INIT
    Init,
    /// GENERATE INVOICE
    GenerateInvoice,
    /// RECEIVE INVOICE
    ReceiveInvoice,
    /// GET FRIENDLY NAME
    GetFriendlyName,
    /// SET FRIENDLY NAME
    SetFriendlyName,
    /// GET AVAILABLE MEMORY
    GetAvailableMemory,
    /// MINE NATIVE PHONON
    MineNativePhonon,
}

impl Instruction {
    /// Every instruction in the catalog
    pub const ALL: [Self; 31] = [
        Self::Select,
        Self::IdentifyCard,
        Self::VerifyPin,
        Self::ChangePin,
        Self::CreatePhonon,
        Self::SetDescriptor,
        Self::ListPhonons,
        Self::GetPhononPublicKey,
        Self::DestroyPhonon,
        Self::SendPhonons,
        Self::ReceivePhonons,
        Self::SetReceiveList,
        Self::TransactionAck,
        Self::InitCardPairing,
        Self::CardPair,
        Self::CardPair2,
        Self::FinalizeCardPair,
        Self::LoadCertAuthority,
        Self::InstallCertificate,
        Self::PairStep1,
        Self::PairStep2,
        Self::Unpair,
        Self::OpenSecureChannel,
        Self::MutuallyAuthenticate,
        Self::Init,
        Self::GenerateInvoice,
        Self::ReceiveInvoice,
        Self::GetFriendlyName,
        Self::SetFriendlyName,
        Self::GetAvailableMemory,
        Self::MineNativePhonon,
    ];

    /// The status word table for this instruction
    pub const fn error_table(self) -> ErrorTable {
        match self {
            Self::Select => NO_ERRORS,
            Self::IdentifyCard => IDENTIFY_CARD_ERRORS,
            Self::VerifyPin => VERIFY_PIN_ERRORS,
            Self::ChangePin => CHANGE_PIN_ERRORS,
            Self::CreatePhonon => CREATE_PHONON_ERRORS,
            Self::SetDescriptor => SET_DESCRIPTOR_ERRORS,
            Self::ListPhonons => LIST_PHONONS_ERRORS,
            Self::GetPhononPublicKey => GET_PHONON_PUBLIC_KEY_ERRORS,
            Self::DestroyPhonon => DESTROY_PHONON_ERRORS,
            Self::SendPhonons => SEND_PHONONS_ERRORS,
            Self::ReceivePhonons => RECEIVE_PHONONS_ERRORS,
            Self::SetReceiveList => SET_RECEIVE_LIST_ERRORS,
            Self::TransactionAck => TRANSACTION_ACK_ERRORS,
            Self::InitCardPairing => INIT_CARD_PAIRING_ERRORS,
            Self::CardPair => CARD_PAIR_ERRORS,
            Self::CardPair2 => CARD_PAIR_2_ERRORS,
            Self::FinalizeCardPair => FINALIZE_CARD_PAIR_ERRORS,
            Self::LoadCertAuthority => LOAD_CERT_AUTHORITY_ERRORS,
            Self::InstallCertificate => INSTALL_CERTIFICATE_ERRORS,
            Self::PairStep1 => PAIR_STEP_1_ERRORS,
            Self::PairStep2 => PAIR_STEP_2_ERRORS,
            Self::OpenSecureChannel => OPEN_SECURE_CHANNEL_ERRORS,
            Self::MutuallyAuthenticate => MUTUALLY_AUTHENTICATE_ERRORS,
            Self::GetFriendlyName => GET_FRIENDLY_NAME_ERRORS,
            Self::MineNativePhonon => MINE_NATIVE_PHONON_ERRORS,
            Self::Unpair
            | Self::Init
            | Self::GenerateInvoice
            | Self::ReceiveInvoice
            | Self::SetFriendlyName
            | Self::GetAvailableMemory => NO_ERRORS,
        }
    }
}

/// An encoded command together with the outcomes its status words map to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhononCommand {
    instruction: Instruction,
    apdu: Command,
}

impl PhononCommand {
    pub(crate) const fn new(instruction: Instruction, apdu: Command) -> Self {
        Self { instruction, apdu }
    }

    /// The operation this command performs
    pub const fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// The APDU sent to the card
    pub const fn apdu(&self) -> &Command {
        &self.apdu
    }

    /// The status word table this command resolves against
    pub const fn error_table(&self) -> ErrorTable {
        self.instruction.error_table()
    }

    /// Serialize the APDU, rejecting payloads that do not fit a short APDU
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(self.apdu.to_bytes()?)
    }

    /// Find the documented outcome for a status word
    pub fn lookup(&self, status: StatusWord) -> Option<CardError> {
        self.error_table()
            .iter()
            .find(|(sw, _)| *sw == status)
            .map(|(_, error)| *error)
    }

    /// Classify a card response.
    ///
    /// A documented status word yields its error, `90 00` yields the payload
    /// and anything else is [`CardError::Unspecified`].
    pub fn resolve(&self, response: &Response) -> std::result::Result<Option<Bytes>, CardError> {
        let status = response.status();
        let outcome = match self.lookup(status) {
            Some(error) => Err(error),
            None if status.is_success() => Ok(response.payload().cloned()),
            None => Err(CardError::Unspecified(status)),
        };

        match (&outcome, status.tracing_level()) {
            (Ok(_), _) => debug!(instruction = ?self.instruction, %status, "Command succeeded"),
            (Err(error), level) if level == Level::DEBUG => {
                debug!(instruction = ?self.instruction, %status, %error, "Card returned a status")
            }
            (Err(error), level) if level == Level::INFO => {
                info!(instruction = ?self.instruction, %status, %error, "Card returned a warning")
            }
            (Err(error), _) => {
                warn!(instruction = ?self.instruction, %status, %error, "Card returned an error")
            }
        }

        outcome
    }

    /// Send the command and resolve the card's answer.
    ///
    /// With a secure channel the APDU is wrapped before transmission and the
    /// response unwrapped before resolution.
    pub fn execute<T>(
        &self,
        transport: &mut T,
        channel: Option<&mut SecureChannelSession>,
    ) -> Result<Option<Bytes>>
    where
        T: CardTransport + ?Sized,
    {
        debug!(instruction = ?self.instruction, secure = channel.is_some(), "Executing command");

        let response = match channel {
            Some(session) => {
                let wrapped = session.wrap(&self.apdu)?;
                let raw = transport.transmit_raw(&wrapped.to_bytes()?)?;
                session.unwrap(Response::from_bytes(&raw)?)?
            }
            None => {
                let raw = transport.transmit_raw(&self.to_bytes()?)?;
                Response::from_bytes(&raw)?
            }
        };

        Ok(self.resolve(&response)?)
    }
}
