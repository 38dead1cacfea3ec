//! Pairing and secure channel establishment
//!
//! The handshake walks a fixed sequence of states. Each step consumes the data
//! the previous step produced, so the phase carries it along:
//!
//! ```text
//! Idle -> AppletSelected -> [CaInstalled] -> Pairing1Sent -> Pairing2Sent
//!      -> PairingFinalized -> Paired -> SecureChannelOpening
//!      -> MutuallyAuthenticating -> SecureChannelEstablished
//! ```
//!
//! Calling a step in the wrong state is refused before anything is sent and
//! leaves the handshake untouched. Any other failure aborts it for good.

use std::{fmt, mem};

use aes::cipher::Iv;
use k256::{PublicKey, SecretKey, ecdh::SharedSecret, ecdsa::Signature};
use phonon_apdu_core::CardTransport;
use tracing::{debug, warn};

use crate::{
    CardError, Error, Result,
    card::PhononCard,
    commands::{
        PhononCommand, install_certificate, load_cert_authority, mutually_authenticate,
        open_secure_channel, pair_step_1, pair_step_2, select_phonon_applet,
    },
    config::HandshakeConfig,
    constants::SALT_LENGTH,
    crypto::{
        Cryptogram, PhononScp, calculate_cryptogram, derive_pairing_key, derive_session_keys,
        encode_public_key, generate_ecdh_shared_secret, generate_secret_key, random_bytes,
        verify_signature,
    },
    session::SecureChannelSession,
    types::{CardCertificate, PairingInfo},
};

const IV_LENGTH: usize = 16;

/// Observable handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum HandshakeState {
    /// Nothing sent yet
    #[display("Idle")]
    Idle,
    /// Applet selected
    #[display("AppletSelected")]
    AppletSelected,
    /// Certificate authority key loaded
    #[display("CaInstalled")]
    CaInstalled,
    /// Card certificate received
    #[display("Pairing1Sent")]
    Pairing1Sent,
    /// Card cryptogram verified
    #[display("Pairing2Sent")]
    Pairing2Sent,
    /// Transcript signature being checked
    #[display("PairingFinalized")]
    PairingFinalized,
    /// Pairing key available
    #[display("Paired")]
    Paired,
    /// Session keys derived, not yet authenticated
    #[display("SecureChannelOpening")]
    SecureChannelOpening,
    /// MUTUALLY AUTHENTICATE in flight
    #[display("MutuallyAuthenticating")]
    MutuallyAuthenticating,
    /// Channel ready for wrapped commands
    #[display("SecureChannelEstablished")]
    SecureChannelEstablished,
    /// A step failed; nothing else is accepted
    #[display("Aborted")]
    Aborted,
}

/// Result of installing a certificate authority or card certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    /// The card accepted it
    Installed,
    /// The card already holds a locked one; nothing changed
    AlreadyLocked,
}

/// Material from the first PAIR exchange
struct PendingPairing {
    host_key: SecretKey,
    host_salt: [u8; SALT_LENGTH],
    card_salt: [u8; SALT_LENGTH],
    card_key: PublicKey,
}

/// Material from the second PAIR exchange, card cryptogram already checked
struct VerifiedPairing {
    pending: PendingPairing,
    shared_secret: SharedSecret,
    index: u8,
    client_cryptogram: Cryptogram,
    card_cryptogram: Cryptogram,
    signature: Signature,
}

impl VerifiedPairing {
    /// Everything both sides exchanged, in order. The card signs this.
    fn transcript(&self) -> Vec<u8> {
        let pending = &self.pending;
        let parts: [&[u8]; 6] = [
            &pending.host_salt,
            &pending.card_salt,
            &encode_public_key(&pending.host_key.public_key()),
            &encode_public_key(&pending.card_key),
            &self.client_cryptogram,
            &self.card_cryptogram,
        ];
        parts.concat()
    }
}

enum Phase {
    Idle,
    AppletSelected,
    CaInstalled,
    Pairing1Sent(PendingPairing),
    Pairing2Sent(Box<VerifiedPairing>),
    PairingFinalized,
    Paired(PairingInfo),
    SecureChannelOpening {
        pairing: PairingInfo,
        session: SecureChannelSession,
    },
    MutuallyAuthenticating,
    Established {
        pairing: PairingInfo,
        session: SecureChannelSession,
    },
    Aborted(String),
}

impl Phase {
    const fn state(&self) -> HandshakeState {
        match self {
            Self::Idle => HandshakeState::Idle,
            Self::AppletSelected => HandshakeState::AppletSelected,
            Self::CaInstalled => HandshakeState::CaInstalled,
            Self::Pairing1Sent(_) => HandshakeState::Pairing1Sent,
            Self::Pairing2Sent(_) => HandshakeState::Pairing2Sent,
            Self::PairingFinalized => HandshakeState::PairingFinalized,
            Self::Paired(_) => HandshakeState::Paired,
            Self::SecureChannelOpening { .. } => HandshakeState::SecureChannelOpening,
            Self::MutuallyAuthenticating => HandshakeState::MutuallyAuthenticating,
            Self::Established { .. } => HandshakeState::SecureChannelEstablished,
            Self::Aborted(_) => HandshakeState::Aborted,
        }
    }

    /// Held while a step is in flight
    fn interrupted() -> Self {
        Self::Aborted(String::from("interrupted mid-step"))
    }
}

/// Pairing and secure channel handshake with a phonon card
pub struct Handshake<T: CardTransport> {
    transport: T,
    config: HandshakeConfig,
    phase: Phase,
}

impl<T: CardTransport> Handshake<T> {
    /// Handshake with the default [`HandshakeConfig`]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, HandshakeConfig::default())
    }

    /// Handshake that verifies the card according to `config`
    pub const fn with_config(transport: T, config: HandshakeConfig) -> Self {
        Self {
            transport,
            config,
            phase: Phase::Idle,
        }
    }

    /// Current progress
    pub const fn state(&self) -> HandshakeState {
        self.phase.state()
    }

    /// Verification settings in use
    pub const fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Pairing in use, once paired or resumed
    pub const fn pairing(&self) -> Option<&PairingInfo> {
        match &self.phase {
            Phase::Paired(pairing)
            | Phase::SecureChannelOpening { pairing, .. }
            | Phase::Established { pairing, .. } => Some(pairing),
            _ => None,
        }
    }

    /// Select the phonon applet
    pub fn select(&mut self) -> Result<()> {
        const OPERATION: &str = "select";

        match self.take_phase(Phase::interrupted()) {
            Phase::Idle => {}
            other => return Err(self.reject(other, OPERATION)),
        }

        let result = select_phonon_applet()
            .execute(&mut self.transport, None)
            .map(|_| (Phase::AppletSelected, ()));
        self.settle(OPERATION, result)
    }

    /// Load the certificate authority public key
    pub fn install_ca(&mut self, data: &[u8]) -> Result<CertificateStatus> {
        self.install("install CA", load_cert_authority(data))
    }

    /// Install the card certificate signed by the certificate authority
    pub fn install_certificate(&mut self, data: &[u8]) -> Result<CertificateStatus> {
        self.install("install certificate", install_certificate(data))
    }

    /// Send the host salt and an ephemeral key, receive the card certificate
    pub fn pair_step_1(&mut self) -> Result<()> {
        const OPERATION: &str = "pair step 1";

        match self.take_phase(Phase::interrupted()) {
            Phase::AppletSelected | Phase::CaInstalled => {}
            other => return Err(self.reject(other, OPERATION)),
        }

        let result = self
            .send_pair_step_1()
            .map(|pending| (Phase::Pairing1Sent(pending), ()));
        self.settle(OPERATION, result)
    }

    /// Exchange cryptograms proving both sides hold the ECDH secret
    pub fn pair_step_2(&mut self) -> Result<()> {
        const OPERATION: &str = "pair step 2";

        let pending = match self.take_phase(Phase::interrupted()) {
            Phase::Pairing1Sent(pending) => pending,
            other => return Err(self.reject(other, OPERATION)),
        };

        let result = self
            .send_pair_step_2(pending)
            .map(|verified| (Phase::Pairing2Sent(Box::new(verified)), ()));
        self.settle(OPERATION, result)
    }

    /// Check the card's signature over the pairing transcript and derive the
    /// pairing key. The returned [`PairingInfo`] is what the caller persists.
    pub fn finalize_pairing(&mut self) -> Result<PairingInfo> {
        const OPERATION: &str = "finalize pairing";

        let verified = match self.take_phase(Phase::PairingFinalized) {
            Phase::Pairing2Sent(verified) => verified,
            other => return Err(self.reject(other, OPERATION)),
        };

        let result =
            finish_pairing(*verified).map(|pairing| (Phase::Paired(pairing.clone()), pairing));
        self.settle(OPERATION, result)
    }

    /// Continue with a pairing persisted from an earlier session
    pub fn resume(&mut self, pairing: PairingInfo) -> Result<()> {
        match self.take_phase(Phase::interrupted()) {
            Phase::AppletSelected | Phase::CaInstalled => {}
            other => return Err(self.reject(other, "resume")),
        }

        self.settle("resume", Ok((Phase::Paired(pairing), ())))
    }

    /// Run all pairing steps
    pub fn pair(&mut self) -> Result<PairingInfo> {
        self.pair_step_1()?;
        self.pair_step_2()?;
        self.finalize_pairing()
    }

    /// Derive session keys for the pairing
    pub fn open_secure_channel(&mut self) -> Result<()> {
        const OPERATION: &str = "open secure channel";

        let pairing = match self.take_phase(Phase::interrupted()) {
            Phase::Paired(pairing) => pairing,
            other => return Err(self.reject(other, OPERATION)),
        };

        let result = self
            .send_open_secure_channel(&pairing)
            .map(|session| (Phase::SecureChannelOpening { pairing, session }, ()));
        self.settle(OPERATION, result)
    }

    /// Prove both sides derived the same session keys
    pub fn mutually_authenticate(&mut self) -> Result<()> {
        const OPERATION: &str = "mutually authenticate";

        let (pairing, mut session) = match self.take_phase(Phase::MutuallyAuthenticating) {
            Phase::SecureChannelOpening { pairing, session } => (pairing, session),
            other => return Err(self.reject(other, OPERATION)),
        };

        let result = self
            .send_mutually_authenticate(&mut session)
            .map(|()| (Phase::Established { pairing, session }, ()));
        self.settle(OPERATION, result)
    }

    /// Open the secure channel and authenticate it
    pub fn authenticate(&mut self) -> Result<()> {
        self.open_secure_channel()?;
        self.mutually_authenticate()
    }

    /// Hand over the transport and the established session
    pub fn finish(self) -> Result<(T, SecureChannelSession)> {
        match self.phase {
            Phase::Established { session, .. } => Ok((self.transport, session)),
            Phase::Aborted(reason) => Err(Error::Aborted(reason)),
            other => Err(Error::OutOfOrder {
                operation: "finish",
                state: other.state(),
            }),
        }
    }

    /// A card client whose commands go through the established channel
    pub fn into_card(self) -> Result<PhononCard<T>> {
        let config = self.config.clone();
        let (transport, session) = self.finish()?;
        Ok(PhononCard::with_config(transport, config).with_secure_channel(session))
    }

    /// Give back the transport, whatever the state
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn install(
        &mut self,
        operation: &'static str,
        command: PhononCommand,
    ) -> Result<CertificateStatus> {
        let previous = match self.take_phase(Phase::interrupted()) {
            phase @ (Phase::AppletSelected | Phase::CaInstalled) => phase,
            other => return Err(self.reject(other, operation)),
        };

        let result = match command.execute(&mut self.transport, None) {
            Ok(_) => Ok((Phase::CaInstalled, CertificateStatus::Installed)),
            Err(Error::Card(CardError::CertLocked)) => {
                debug!(operation, "Certificate already locked");
                Ok((previous, CertificateStatus::AlreadyLocked))
            }
            Err(error) => Err(error),
        };
        self.settle(operation, result)
    }

    fn send_pair_step_1(&mut self) -> Result<PendingPairing> {
        let host_key = generate_secret_key();
        let host_salt: [u8; SALT_LENGTH] = random_bytes();

        let payload = pair_step_1(&host_salt, &encode_public_key(&host_key.public_key()))
            .execute(&mut self.transport, None)?
            .ok_or(Error::InvalidData("empty pairing response"))?;

        if payload.len() <= SALT_LENGTH {
            return Err(Error::InvalidData("pairing response too short"));
        }
        let (card_salt, certificate) = payload.split_at(SALT_LENGTH);

        let certificate = CardCertificate::try_from(certificate)?;
        if let Some(ca) = &self.config.ca_public_key {
            certificate.verify(ca)?;
        }

        Ok(PendingPairing {
            host_key,
            host_salt,
            card_salt: card_salt
                .try_into()
                .map_err(|_| Error::InvalidData("invalid card salt"))?,
            card_key: certificate.public_key,
        })
    }

    fn send_pair_step_2(&mut self, pending: PendingPairing) -> Result<VerifiedPairing> {
        let shared_secret = generate_ecdh_shared_secret(&pending.host_key, &pending.card_key);
        let client_cryptogram = calculate_cryptogram(&shared_secret, &pending.card_salt);

        let payload = pair_step_2(&client_cryptogram)
            .execute(&mut self.transport, None)?
            .ok_or(Error::InvalidData("empty pairing response"))?;

        let (index, card_cryptogram, signature) = match payload.split_first() {
            Some((index, rest)) if rest.len() > SALT_LENGTH => {
                let (card_cryptogram, signature) = rest.split_at(SALT_LENGTH);
                (*index, card_cryptogram, signature)
            }
            _ => return Err(Error::InvalidData("pairing response too short")),
        };

        let expected = calculate_cryptogram(&shared_secret, &pending.host_salt);
        if card_cryptogram != expected.as_slice() {
            warn!("Card cryptogram does not match");
            return Err(Error::Authentication("card cryptogram mismatch"));
        }

        Ok(VerifiedPairing {
            pending,
            shared_secret,
            index,
            client_cryptogram,
            card_cryptogram: expected,
            signature: Signature::from_der(signature)?,
        })
    }

    fn send_open_secure_channel(&mut self, pairing: &PairingInfo) -> Result<SecureChannelSession> {
        let session_key = generate_secret_key();

        let host_key = encode_public_key(&session_key.public_key());
        let payload = open_secure_channel(pairing.index, &host_key)
            .execute(&mut self.transport, None)?
            .ok_or(Error::InvalidData("empty secure channel response"))?;

        if payload.len() != SALT_LENGTH + IV_LENGTH {
            return Err(Error::InvalidData("unexpected secure channel response length"));
        }
        let (challenge, iv) = payload.split_at(SALT_LENGTH);

        let shared_secret = generate_ecdh_shared_secret(&session_key, &pairing.card_public_key);
        let keys = derive_session_keys(&shared_secret, &pairing.key, challenge);

        Ok(SecureChannelSession::from_keys(
            keys,
            Iv::<PhononScp>::from_slice(iv),
        ))
    }

    fn send_mutually_authenticate(&mut self, session: &mut SecureChannelSession) -> Result<()> {
        let challenge: [u8; SALT_LENGTH] = random_bytes();

        match mutually_authenticate(&challenge).execute(&mut self.transport, Some(session))? {
            Some(cryptogram) if cryptogram.len() == SALT_LENGTH => Ok(()),
            _ => Err(Error::Authentication("unexpected mutual authentication response")),
        }
    }

    fn take_phase(&mut self, placeholder: Phase) -> Phase {
        mem::replace(&mut self.phase, placeholder)
    }

    /// Put back a phase that does not accept `operation`
    fn reject(&mut self, phase: Phase, operation: &'static str) -> Error {
        let error = match &phase {
            Phase::Aborted(reason) => Error::Aborted(reason.clone()),
            other => Error::OutOfOrder {
                operation,
                state: other.state(),
            },
        };
        self.phase = phase;
        debug!(operation, state = %self.state(), "Refused handshake step");
        error
    }

    fn settle<R>(&mut self, operation: &'static str, result: Result<(Phase, R)>) -> Result<R> {
        match result {
            Ok((phase, value)) => {
                debug!(operation, state = %phase.state(), "Handshake advanced");
                self.phase = phase;
                Ok(value)
            }
            Err(error) => {
                warn!(operation, %error, "Handshake aborted");
                self.phase = Phase::Aborted(format!("{operation} failed: {error}"));
                Err(error)
            }
        }
    }
}

fn finish_pairing(verified: VerifiedPairing) -> Result<PairingInfo> {
    if !verify_signature(
        &verified.pending.card_key,
        &verified.transcript(),
        &verified.signature,
    ) {
        return Err(Error::Authentication("card pairing signature invalid"));
    }
    debug!(
        state = %HandshakeState::PairingFinalized,
        index = verified.index,
        "Pairing transcript verified"
    );

    let VerifiedPairing {
        pending,
        shared_secret,
        index,
        ..
    } = verified;

    Ok(PairingInfo {
        key: derive_pairing_key(&shared_secret, &pending.host_salt, &pending.card_salt),
        index,
        card_public_key: pending.card_key,
    })
}

impl<T: CardTransport> fmt::Debug for Handshake<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
