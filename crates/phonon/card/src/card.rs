//! Card client executing catalog commands

use bytes::Bytes;
use iso7816_tlv::ber::Tlv;
use k256::PublicKey;
use phonon_apdu_core::CardTransport;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::{
    Error, Result,
    commands::{self, PhononCommand},
    config::HandshakeConfig,
    constants::{SALT_LENGTH, tags},
    session::SecureChannelSession,
    types::{CardIdentity, CurveType, Phonon, encode_key_index, parse_public_key_tlv},
};

/// A phonon card reached through `T`
///
/// Once a secure channel is attached every command is wrapped. A transport,
/// framing or secure messaging failure drops the channel; the card has to be
/// selected and authenticated again afterwards.
#[derive(Debug)]
pub struct PhononCard<T: CardTransport> {
    transport: T,
    channel: Option<SecureChannelSession>,
    config: HandshakeConfig,
}

impl<T: CardTransport> PhononCard<T> {
    /// Client with the default [`HandshakeConfig`]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, HandshakeConfig::default())
    }

    /// Client that verifies identities according to `config`
    pub const fn with_config(transport: T, config: HandshakeConfig) -> Self {
        Self {
            transport,
            channel: None,
            config,
        }
    }

    /// Wrap every following command with `session`
    pub fn with_secure_channel(mut self, session: SecureChannelSession) -> Self {
        self.channel = Some(session);
        self
    }

    /// Whether commands are currently wrapped
    pub const fn has_secure_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Verification settings in use
    pub const fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Execute any catalog command
    ///
    /// Card errors leave the channel in place. Anything that may have put the
    /// IV chain out of step with the card drops it.
    pub fn execute(&mut self, command: &PhononCommand) -> Result<Option<Bytes>> {
        let result = command.execute(&mut self.transport, self.channel.as_mut());

        if let Err(
            error @ (Error::Transport(_)
            | Error::Apdu(_)
            | Error::SecureChannel(_)
            | Error::Unpad),
        ) = &result
        {
            if self.channel.take().is_some() {
                warn!(%error, "Dropping secure channel");
            }
        }

        result
    }

    /// Select the applet. Any secure channel is gone after this.
    pub fn select(&mut self) -> Result<()> {
        self.channel = None;
        self.execute(&commands::select_phonon_applet())?;
        Ok(())
    }

    /// Have the card sign `nonce` with its identity key
    pub fn identify(&mut self, nonce: &[u8; SALT_LENGTH]) -> Result<CardIdentity> {
        let payload = self.expect_payload(&commands::identify_card(nonce))?;
        let identity = CardIdentity::try_from(payload.as_ref())?;

        if self.config.verify_identity {
            identity.verify(nonce)?;
        }
        Ok(identity)
    }

    /// Unlock PIN protected commands
    pub fn verify_pin(&mut self, pin: &str) -> Result<()> {
        self.execute(&commands::verify_pin(pin.as_bytes()))?;
        Ok(())
    }

    /// Replace the PIN
    pub fn change_pin(&mut self, pin: &str) -> Result<()> {
        self.execute(&commands::change_pin(pin.as_bytes()))?;
        Ok(())
    }

    /// Create an empty phonon on `curve`
    pub fn create_phonon(&mut self, curve: CurveType) -> Result<Phonon> {
        let payload = self.expect_payload(&commands::create_phonon(curve.into()))?;
        let phonon = Phonon::from_tlv_bytes(&payload, curve)?;
        debug!(key_index = phonon.key_index, ?curve, "Created phonon");
        Ok(phonon)
    }

    /// Attach a descriptor to the phonon selected on the card
    pub fn set_descriptor(&mut self, descriptor: &[u8]) -> Result<()> {
        self.execute(&commands::set_descriptor(descriptor))?;
        Ok(())
    }

    /// Raw phonon list matching `filter`, empty when the card has none
    pub fn list_phonons(&mut self, p1: u8, p2: u8, filter: &[u8]) -> Result<Bytes> {
        Ok(self
            .execute(&commands::list_phonons(p1, p2, filter))?
            .unwrap_or_default())
    }

    /// Public key of the phonon at `key_index`
    pub fn get_phonon_public_key(&mut self, key_index: u16) -> Result<PublicKey> {
        let index = encode_key_index(key_index)?;
        let payload = self.expect_payload(&commands::get_phonon_public_key(&index))?;

        let (tlv, _) = Tlv::parse(&payload);
        parse_public_key_tlv(&tlv?)
    }

    /// Destroy a phonon and return its private key
    ///
    /// The key is read straight out of the response, so no copy outlives the
    /// returned buffer.
    pub fn destroy_phonon(&mut self, key_index: u16) -> Result<Zeroizing<Vec<u8>>> {
        let index = encode_key_index(key_index)?;
        let payload = self.expect_payload(&commands::destroy_phonon(&index))?;
        let payload = Zeroizing::new(Vec::from(payload));

        match payload.as_slice() {
            [tags::PHONON_PRIVATE_KEY, len @ 0..=0x7F, rest @ ..]
                if rest.len() >= usize::from(*len) =>
            {
                Ok(Zeroizing::new(rest[..usize::from(*len)].to_vec()))
            }
            _ => Err(Error::InvalidData("expected phonon private key")),
        }
    }

    /// Export phonons as an encrypted transfer packet
    pub fn send_phonons(&mut self, data: &[u8], p2: u8, extended: bool) -> Result<Bytes> {
        self.expect_payload(&commands::send_phonons(data, p2, extended))
    }

    /// Import a transfer packet
    pub fn receive_phonons(&mut self, packet: &[u8]) -> Result<()> {
        self.execute(&commands::receive_phonons(packet))?;
        Ok(())
    }

    /// Restrict which phonons the card accepts
    pub fn set_receive_list(&mut self, data: &[u8]) -> Result<()> {
        self.execute(&commands::set_receive_list(data))?;
        Ok(())
    }

    /// Acknowledge a completed transfer
    pub fn transaction_ack(&mut self, data: &[u8]) -> Result<()> {
        self.execute(&commands::transaction_ack(data))?;
        Ok(())
    }

    /// Start card to card pairing
    pub fn init_card_pairing(&mut self, data: &[u8]) -> Result<Option<Bytes>> {
        self.execute(&commands::init_card_pairing(data))
    }

    /// First card to card pairing response
    pub fn card_pair(&mut self, data: &[u8]) -> Result<Option<Bytes>> {
        self.execute(&commands::card_pair(data))
    }

    /// Second card to card pairing response
    pub fn card_pair_2(&mut self, data: &[u8]) -> Result<Option<Bytes>> {
        self.execute(&commands::card_pair_2(data))
    }

    /// Finish card to card pairing
    pub fn finalize_card_pair(&mut self, data: &[u8]) -> Result<()> {
        self.execute(&commands::finalize_card_pair(data))?;
        Ok(())
    }

    /// Install a card certificate
    pub fn install_certificate(&mut self, data: &[u8]) -> Result<()> {
        self.execute(&commands::install_certificate(data))?;
        Ok(())
    }

    /// Install the certificate authority key
    pub fn load_cert_authority(&mut self, data: &[u8]) -> Result<()> {
        self.execute(&commands::load_cert_authority(data))?;
        Ok(())
    }

    /// Mine a native phonon, returning the card's answer for the attempt
    pub fn mine_native_phonon(&mut self, difficulty: u8) -> Result<Option<Bytes>> {
        self.execute(&commands::mine_native_phonon(difficulty))
    }

    /// Free memory as reported by the card
    pub fn get_available_memory(&mut self) -> Result<Bytes> {
        self.expect_payload(&commands::get_available_memory())
    }

    /// Name the owner gave the card
    pub fn get_friendly_name(&mut self) -> Result<String> {
        let payload = self.expect_payload(&commands::get_friendly_name())?;
        String::from_utf8(payload.to_vec())
            .map_err(|_| Error::InvalidData("friendly name is not UTF-8"))
    }

    /// Store a new friendly name
    pub fn set_friendly_name(&mut self, name: &str) -> Result<()> {
        self.execute(&commands::set_friendly_name(name.as_bytes()))?;
        Ok(())
    }

    /// Remove the pairing stored in `index`
    pub fn unpair(&mut self, index: u8) -> Result<()> {
        self.execute(&commands::unpair(index))?;
        Ok(())
    }

    /// Initialize a fresh card with `pin`
    pub fn init(&mut self, pin: &str) -> Result<()> {
        self.execute(&commands::init(pin.as_bytes()))?;
        Ok(())
    }

    /// Create an invoice
    pub fn generate_invoice(&mut self) -> Result<Option<Bytes>> {
        self.execute(&commands::generate_invoice())
    }

    /// Accept an invoice
    pub fn receive_invoice(&mut self) -> Result<Option<Bytes>> {
        self.execute(&commands::receive_invoice())
    }

    /// Forget the secure channel and reset the transport
    pub fn close(&mut self) -> Result<()> {
        self.channel = None;
        self.transport.reset()?;
        debug!("Card connection closed");
        Ok(())
    }

    /// Give back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn expect_payload(&mut self, command: &PhononCommand) -> Result<Bytes> {
        self.execute(command)?
            .ok_or(Error::InvalidData("expected response data"))
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use k256::{
        SecretKey,
        ecdsa::{Signature, SigningKey, signature::Signer},
    };
    use phonon_apdu_core::{Response, TransportError, status::codes};

    use super::*;
    use crate::{CardError, crypto::encode_public_key, mock::MockTransport};

    const NONCE: [u8; 32] = [0x5A; 32];

    fn session() -> SecureChannelSession {
        SecureChannelSession::new(&[0x01; 32].into(), &[0x02; 32].into(), &[0x03; 16].into())
    }

    fn identity_template(signer: &SigningKey, nonce: &[u8]) -> Vec<u8> {
        let signature: Signature = signer.sign(nonce);
        let public_key = encode_public_key(&PublicKey::from(signer.verifying_key()));
        let der = signature.to_der();

        let mut inner = vec![tags::ECC_PUBLIC_KEY, public_key.len() as u8];
        inner.extend_from_slice(&public_key);
        inner.extend_from_slice(der.as_bytes());

        let mut template = vec![tags::TEMPLATE_SIGNATURE, 0x81, inner.len() as u8];
        template.extend_from_slice(&inner);
        template
    }

    #[test]
    fn test_select_identify_and_pin() {
        let signer = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let mut mock = MockTransport::new();
        mock.push(Response::success(None));
        mock.push(Response::success(Some(identity_template(&signer, &NONCE).into())));
        mock.push(Response::error(codes::PIN_VERIFY_FAILED));
        mock.push(Response::success(None));

        let mut card = PhononCard::new(&mut mock);
        card.select().unwrap();

        let identity = card.identify(&NONCE).unwrap();
        assert_eq!(identity.public_key, PublicKey::from(signer.verifying_key()));

        assert!(matches!(
            card.verify_pin("000000"),
            Err(Error::Card(CardError::PinVerificationFailed))
        ));
        card.verify_pin("111111").unwrap();
        drop(card);

        assert_eq!(mock.commands().len(), 4);
        assert_eq!(
            mock.commands()[0].as_ref(),
            hex!("00A4040008A00000082000030100")
        );
        assert_eq!(mock.commands()[3].as_ref(), hex!("8020000006313131313131"));
    }

    #[test]
    fn test_identify_rejects_signature_over_other_nonce() {
        let signer = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let mut mock = MockTransport::new();
        mock.push(Response::success(Some(identity_template(&signer, &[0x00; 32]).into())));

        let mut card = PhononCard::new(&mut mock);
        assert!(matches!(card.identify(&NONCE), Err(Error::Authentication(_))));
        drop(card);

        mock.push(Response::success(Some(identity_template(&signer, &[0x00; 32]).into())));
        let config = HandshakeConfig::default().with_verify_identity(false);
        let mut card = PhononCard::with_config(&mut mock, config);
        assert!(card.identify(&NONCE).is_ok());
    }

    #[test]
    fn test_create_phonon_requires_pin() {
        let key = SecretKey::from_slice(&[0x07; 32]).unwrap().public_key();
        let mut created = hex!("41020003").to_vec();
        created.extend_from_slice(&[tags::ECC_PUBLIC_KEY, 0x41]);
        created.extend_from_slice(&encode_public_key(&key));

        let mut mock = MockTransport::new();
        mock.push(Response::error(codes::CONDITIONS_NOT_SATISFIED));
        mock.push(Response::success(Some(created.into())));

        let mut card = PhononCard::new(&mut mock);
        assert!(matches!(
            card.create_phonon(CurveType::Secp256k1),
            Err(Error::Card(CardError::PinNotEntered))
        ));

        let phonon = card.create_phonon(CurveType::Secp256k1).unwrap();
        assert_eq!(phonon.key_index, 3);
        assert_eq!(phonon.public_key, Some(key));
        drop(card);
        assert_eq!(mock.commands()[1].as_ref(), hex!("00300000 0100"));
    }

    #[test]
    fn test_oversized_descriptor_is_not_sent() {
        let mut mock = MockTransport::new();
        let mut card = PhononCard::new(&mut mock);

        assert!(matches!(
            card.set_descriptor(&[0u8; 256]),
            Err(Error::Apdu(phonon_apdu_core::Error::InvalidCommandLength(256)))
        ));
        drop(card);
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_undocumented_status_is_unspecified() {
        let mut mock = MockTransport::new();
        mock.push(Response::error(codes::UNKNOWN));

        let mut card = PhononCard::new(&mut mock);
        match card.set_friendly_name("alice") {
            Err(Error::Card(error)) => assert!(error.is_unspecified()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_phonon_key_helpers() {
        let key = SecretKey::from_slice(&[0x09; 32]).unwrap();
        let mut public = vec![tags::ECC_PUBLIC_KEY, 0x41];
        public.extend_from_slice(&encode_public_key(&key.public_key()));
        let mut private = vec![tags::PHONON_PRIVATE_KEY, 0x20];
        private.extend_from_slice(&key.to_bytes());

        let mut mock = MockTransport::new();
        mock.push(Response::success(Some(public.into())));
        mock.push(Response::success(Some(private.into())));

        let mut card = PhononCard::new(&mut mock);
        assert_eq!(card.get_phonon_public_key(2).unwrap(), key.public_key());
        assert_eq!(card.destroy_phonon(2).unwrap().as_slice(), key.to_bytes().as_slice());
        drop(card);

        assert_eq!(mock.commands()[0].as_ref(), hex!("0033000004 41020002"));
        assert_eq!(mock.commands()[1].as_ref(), hex!("0034000004 41020002"));
    }

    #[test]
    fn test_destroy_phonon_rejects_other_tags() {
        let mut mock = MockTransport::new();
        mock.push(Response::success(Some(Bytes::copy_from_slice(&hex!("8002AABB")))));
        mock.push(Response::success(Some(Bytes::copy_from_slice(&hex!("8120AABB")))));

        let mut card = PhononCard::new(&mut mock);
        assert!(matches!(card.destroy_phonon(1), Err(Error::InvalidData(_))));
        assert!(matches!(card.destroy_phonon(1), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_friendly_name() {
        let mut mock = MockTransport::new();
        mock.push(Response::success(Some(Bytes::from_static(b"alice's card"))));
        mock.push(Response::error(codes::DATA_INVALID));

        let mut card = PhononCard::new(&mut mock);
        assert_eq!(card.get_friendly_name().unwrap(), "alice's card");
        assert!(matches!(
            card.get_friendly_name(),
            Err(Error::Card(CardError::Card("friendly name not set")))
        ));
    }

    #[test]
    fn test_transport_error_drops_channel() {
        let mut mock = MockTransport::new();
        mock.fail_next(TransportError::Timeout);

        let mut card = PhononCard::new(&mut mock).with_secure_channel(session());
        assert!(card.has_secure_channel());

        assert!(matches!(
            card.get_available_memory(),
            Err(Error::Transport(TransportError::Timeout))
        ));
        assert!(!card.has_secure_channel());
    }

    #[test]
    fn test_truncated_response_drops_channel() {
        let mut mock = MockTransport::new();
        mock.push_raw(&[0x90]);

        let mut card = PhononCard::new(&mut mock).with_secure_channel(session());
        assert!(matches!(
            card.get_available_memory(),
            Err(Error::Apdu(phonon_apdu_core::Error::IncompleteResponse(1)))
        ));
        assert!(!card.has_secure_channel());
    }

    #[test]
    fn test_card_error_keeps_channel() {
        let mut mock = MockTransport::new();
        mock.push(Response::error(codes::PIN_VERIFY_FAILED));

        let mut card = PhononCard::new(&mut mock).with_secure_channel(session());
        assert!(card.verify_pin("123456").is_err());
        assert!(card.has_secure_channel());

        card.close().unwrap();
        assert!(!card.has_secure_channel());
    }
}
