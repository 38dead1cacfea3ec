//! Test doubles for card transports

use std::collections::VecDeque;

use bytes::Bytes;
use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::{
    PublicKey, SecretKey,
    ecdh::SharedSecret,
    ecdsa::{Signature, SigningKey, signature::Signer},
};
use phonon_apdu_core::{
    CardTransport, Command, Response, StatusWord, TransportError, status::codes,
};

use crate::{
    constants::{SALT_LENGTH, ins, pair_p1, tags},
    crypto::{
        SessionKeys, calculate_cryptogram, derive_pairing_key, derive_session_keys,
        encode_public_key, generate_ecdh_shared_secret, parse_public_key, random_bytes,
    },
    session::{unwrap_command, wrap_response},
};

/// Replays canned responses and records every command sent
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    responses: VecDeque<Result<Bytes, TransportError>>,
    commands: Vec<Bytes>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, response: Response) {
        self.responses.push_back(Ok(response.to_bytes()));
    }

    /// Queue bytes exactly as the card would put them on the wire
    pub(crate) fn push_raw(&mut self, raw: &[u8]) {
        self.responses.push_back(Ok(Bytes::copy_from_slice(raw)));
    }

    pub(crate) fn fail_next(&mut self, error: TransportError) {
        self.responses.push_back(Err(error));
    }

    pub(crate) fn commands(&self) -> &[Bytes] {
        &self.commands
    }
}

impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Transmission))
    }
}

/// Encode a `0x8A` certificate for `card`, signed by `ca` when given
pub(crate) fn certificate(card: &PublicKey, ca: Option<&SigningKey>) -> Vec<u8> {
    let key = Tlv::new(
        Tag::try_from(tags::ECC_PUBLIC_KEY).unwrap(),
        Value::Primitive(encode_public_key(card).to_vec()),
    )
    .unwrap()
    .to_vec();

    let mut value = key.clone();
    if let Some(ca) = ca {
        let signature: Signature = ca.sign(&key);
        value.extend_from_slice(signature.to_der().as_bytes());
    }

    Tlv::new(Tag::try_from(tags::CERTIFICATE).unwrap(), Value::Primitive(value))
        .unwrap()
        .to_vec()
}

struct PendingPair {
    host_salt: [u8; SALT_LENGTH],
    card_salt: [u8; SALT_LENGTH],
    host_public: PublicKey,
    shared_secret: SharedSecret,
}

struct Channel {
    keys: SessionKeys,
    iv: [u8; 16],
    authenticated: bool,
}

/// A phonon applet in memory, enough to pair, open a secure channel and
/// handle a few wrapped commands
pub(crate) struct SimulatedCard {
    identity: SecretKey,
    certificate: Option<Vec<u8>>,
    pin: Vec<u8>,
    pin_verified: bool,
    phonons: u16,
    capacity: u16,
    pending: Option<PendingPair>,
    pairings: Vec<[u8; 32]>,
    channel: Option<Channel>,
    /// Answer PAIR step 2 with a corrupted card cryptogram
    pub(crate) tamper_cryptogram: bool,
    /// Every command after secure messaging was removed
    pub(crate) received: Vec<Command>,
}

impl SimulatedCard {
    pub(crate) fn new(ca: Option<&SigningKey>) -> Self {
        let identity = SecretKey::from_slice(&[0x42; 32]).unwrap();

        Self {
            certificate: Some(certificate(&identity.public_key(), ca)),
            identity,
            pin: b"123456".to_vec(),
            pin_verified: false,
            phonons: 0,
            capacity: 2,
            pending: None,
            pairings: Vec::new(),
            channel: None,
            tamper_cryptogram: false,
            received: Vec::new(),
        }
    }

    pub(crate) fn without_certificate() -> Self {
        Self {
            certificate: None,
            ..Self::new(None)
        }
    }

    pub(crate) fn identity_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    pub(crate) fn pairing_count(&self) -> usize {
        self.pairings.len()
    }

    fn handle(&mut self, command: &Command) -> Result<Vec<u8>, StatusWord> {
        let data = command.payload();
        match command.ins {
            ins::SELECT => {
                self.channel = None;
                self.pin_verified = false;
                Ok(Vec::new())
            }
            ins::PAIR if command.p1 == pair_p1::FIRST_STEP => self.pair_first(data),
            ins::PAIR if command.p1 == pair_p1::FINAL_STEP => self.pair_final(data),
            ins::OPEN_SECURE_CHANNEL => self.open(command.p1, data),
            ins::MUTUALLY_AUTHENTICATE => self.authenticate(),
            ins::VERIFY_PIN if data == self.pin.as_slice() => {
                self.pin_verified = true;
                Ok(Vec::new())
            }
            ins::VERIFY_PIN => Err(codes::PIN_VERIFY_FAILED),
            ins::CREATE_PHONON => self.create_phonon(),
            ins::LOAD_CA | ins::LOAD_CERT => Ok(Vec::new()),
            ins::GET_FRIENDLY_NAME => Ok(b"simulated".to_vec()),
            _ => Err(codes::INS_NOT_SUPPORTED),
        }
    }

    fn pair_first(&mut self, data: &[u8]) -> Result<Vec<u8>, StatusWord> {
        let certificate = self
            .certificate
            .clone()
            .ok_or(codes::SECURE_MESSAGING_NOT_SUPPORTED)?;
        if data.len() != SALT_LENGTH + 65 {
            return Err(codes::WRONG_DATA);
        }

        let (host_salt, host_public) = data.split_at(SALT_LENGTH);
        let host_public = parse_public_key(host_public).map_err(|_| codes::WRONG_DATA)?;
        let card_salt: [u8; SALT_LENGTH] = random_bytes();

        self.pending = Some(PendingPair {
            host_salt: host_salt.try_into().unwrap(),
            card_salt,
            shared_secret: generate_ecdh_shared_secret(&self.identity, &host_public),
            host_public,
        });

        Ok([card_salt.as_slice(), certificate.as_slice()].concat())
    }

    fn pair_final(&mut self, data: &[u8]) -> Result<Vec<u8>, StatusWord> {
        let pending = self.pending.take().ok_or(codes::CONDITIONS_NOT_SATISFIED)?;
        if data.len() != SALT_LENGTH {
            return Err(codes::WRONG_DATA);
        }
        if data != calculate_cryptogram(&pending.shared_secret, &pending.card_salt).as_slice() {
            return Err(codes::SECURITY_STATUS_NOT_SATISFIED);
        }

        let mut card_cryptogram = calculate_cryptogram(&pending.shared_secret, &pending.host_salt);
        let transcript: [&[u8]; 6] = [
            &pending.host_salt,
            &pending.card_salt,
            &encode_public_key(&pending.host_public),
            &encode_public_key(&self.identity_key()),
            data,
            &card_cryptogram,
        ];
        let transcript = transcript.concat();
        let signature: Signature = SigningKey::from(&self.identity).sign(&transcript);

        if self.tamper_cryptogram {
            card_cryptogram[0] ^= 0xFF;
        }

        let index = self.pairings.len() as u8;
        self.pairings.push(derive_pairing_key(
            &pending.shared_secret,
            &pending.host_salt,
            &pending.card_salt,
        ));

        let der = signature.to_der();
        let response: [&[u8]; 3] = [&[index], &card_cryptogram, der.as_bytes()];
        Ok(response.concat())
    }

    fn open(&mut self, index: u8, data: &[u8]) -> Result<Vec<u8>, StatusWord> {
        let pairing_key = *self
            .pairings
            .get(usize::from(index))
            .ok_or(codes::INCORRECT_P1P2)?;
        let host_public =
            parse_public_key(data).map_err(|_| codes::SECURITY_STATUS_NOT_SATISFIED)?;

        let shared_secret = generate_ecdh_shared_secret(&self.identity, &host_public);
        let challenge: [u8; SALT_LENGTH] = random_bytes();
        let iv: [u8; 16] = random_bytes();
        self.channel = Some(Channel {
            keys: derive_session_keys(&shared_secret, &pairing_key, &challenge),
            iv,
            authenticated: false,
        });

        Ok([challenge.as_slice(), iv.as_slice()].concat())
    }

    fn authenticate(&mut self) -> Result<Vec<u8>, StatusWord> {
        let channel = self.channel.as_mut().ok_or(codes::CONDITIONS_NOT_SATISFIED)?;
        if channel.authenticated {
            return Err(codes::LOGICAL_CHANNEL_NOT_SUPPORTED);
        }
        channel.authenticated = true;
        Ok(random_bytes::<SALT_LENGTH>().to_vec())
    }

    fn create_phonon(&mut self) -> Result<Vec<u8>, StatusWord> {
        if !self.pin_verified {
            return Err(codes::CONDITIONS_NOT_SATISFIED);
        }
        if self.phonons == self.capacity {
            return Err(codes::FILE_FULL);
        }
        self.phonons += 1;

        let key = SecretKey::from_slice(&[self.phonons as u8; 32]).unwrap().public_key();
        let mut out = vec![tags::PHONON_KEY_INDEX, 0x02];
        out.extend_from_slice(&self.phonons.to_be_bytes());
        out.extend_from_slice(&[tags::ECC_PUBLIC_KEY, 0x41]);
        out.extend_from_slice(&encode_public_key(&key));
        Ok(out)
    }

    /// Whether `ins` travels through secure messaging once a channel is open
    const fn is_secured(ins: u8) -> bool {
        !matches!(ins, ins::SELECT | ins::PAIR | ins::OPEN_SECURE_CHANNEL)
    }
}

impl std::fmt::Debug for SimulatedCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedCard")
            .field("pairings", &self.pairings.len())
            .field("channel", &self.channel.is_some())
            .finish_non_exhaustive()
    }
}

impl CardTransport for SimulatedCard {
    fn do_transmit_raw(&mut self, raw: &[u8]) -> Result<Bytes, TransportError> {
        let mut command =
            Command::from_bytes(raw).map_err(|e| TransportError::other(e.to_string()))?;

        let secured = Self::is_secured(command.ins) && self.channel.is_some();
        if secured {
            let channel = self.channel.as_mut().unwrap();
            let (enc, mac) = (channel.keys.enc(), channel.keys.mac());
            let Some(plain) = unwrap_command(&command, enc, mac, &mut channel.iv) else {
                return Ok(Response::error(codes::SECURITY_STATUS_NOT_SATISFIED).to_bytes());
            };
            command.data = Some(plain);
        }
        self.received.push(command.clone());

        let response = match self.handle(&command) {
            Ok(data) if secured => match self.channel.as_mut() {
                Some(channel) => {
                    let (enc, mac) = (channel.keys.enc(), channel.keys.mac());
                    Response::success(Some(wrap_response(&data, enc, mac, &mut channel.iv)))
                }
                None => Response::success(Some(data.into())),
            },
            Ok(data) if data.is_empty() => Response::success(None),
            Ok(data) => Response::success(Some(data.into())),
            Err(status) => Response::error(status),
        };

        Ok(response.to_bytes())
    }
}
