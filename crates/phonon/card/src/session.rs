//! Secure messaging for an established channel
//!
//! Command data is AES-256-CBC encrypted under the session encryption key and
//! authenticated with a CBC-MAC under the session MAC key. Each MAC becomes the
//! IV of the next message, chaining every command and response of the session.

use std::fmt;

use aes::cipher::{Iv, Key};
use bytes::BytesMut;
use phonon_apdu_core::{Command, Response};
use tracing::{trace, warn};

use crate::{
    Error, Result,
    crypto::{ApduMeta, PhononScp, SessionKeys, calculate_mac, decrypt_data, encrypt_data},
};

const MAC_LENGTH: usize = 16;

/// Keys and chaining state of an open secure channel
pub struct SecureChannelSession {
    keys: SessionKeys,
    iv: [u8; 16],
    counter: u64,
}

impl SecureChannelSession {
    /// Create a session from derived keys and the IV sent by the card
    pub fn new(enc_key: &Key<PhononScp>, mac_key: &Key<PhononScp>, iv: &Iv<PhononScp>) -> Self {
        Self::from_keys(SessionKeys::new(enc_key, mac_key), iv)
    }

    pub(crate) fn from_keys(keys: SessionKeys, iv: &Iv<PhononScp>) -> Self {
        let mut chained = [0; 16];
        chained.copy_from_slice(iv);

        Self {
            keys,
            iv: chained,
            counter: 0,
        }
    }

    /// Current chaining value
    pub const fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    /// Number of commands wrapped so far
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Encrypt and authenticate a command.
    ///
    /// The wrapped payload is `MAC | ciphertext`. Header bytes and Le are kept.
    pub fn wrap(&mut self, command: &Command) -> Result<Command> {
        let encrypted = encrypt_data(command.payload(), self.keys.enc(), self.chaining_iv());

        let lc = encrypted.len() + MAC_LENGTH;
        let mut meta = ApduMeta::default();
        meta[..4].copy_from_slice(&[command.cla, command.ins, command.p1, command.p2]);
        meta[4] = u8::try_from(lc)
            .map_err(|_| phonon_apdu_core::Error::InvalidCommandLength(lc))?;

        let mac = calculate_mac(&meta, &encrypted, self.keys.mac());
        self.iv.copy_from_slice(&mac);
        self.counter += 1;

        let mut data = BytesMut::with_capacity(lc);
        data.extend_from_slice(&mac);
        data.extend_from_slice(&encrypted);

        trace!(counter = self.counter, ins = command.ins, "Wrapped command");

        Ok(Command {
            data: Some(data.freeze()),
            ..command.clone()
        })
    }

    /// Authenticate and decrypt a response.
    ///
    /// Error statuses and empty responses carry no secure messaging and are
    /// returned untouched.
    pub fn unwrap(&mut self, response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            return Ok(response);
        }
        let Some(payload) = response.into_payload() else {
            return Ok(Response::success(None));
        };

        if payload.len() < MAC_LENGTH * 2 {
            warn!(length = payload.len(), "Secure channel response too short");
            return Err(Error::SecureChannel("response too short"));
        }

        let (received_mac, encrypted) = payload.split_at(MAC_LENGTH);

        let mut meta = ApduMeta::default();
        meta[0] = u8::try_from(payload.len())
            .map_err(|_| Error::SecureChannel("response too long"))?;
        let mac = calculate_mac(&meta, encrypted, self.keys.mac());

        if received_mac != mac.as_slice() {
            warn!("Secure channel response MAC mismatch");
            return Err(Error::SecureChannel("invalid response MAC"));
        }

        let plain = decrypt_data(encrypted, self.keys.enc(), self.chaining_iv())?;
        self.iv.copy_from_slice(&mac);

        let payload = (!plain.is_empty()).then_some(plain);
        Ok(Response::new(payload, status))
    }

    fn chaining_iv(&self) -> &Iv<PhononScp> {
        Iv::<PhononScp>::from_slice(&self.iv)
    }
}

impl fmt::Debug for SecureChannelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannelSession")
            .field("iv", &hex::encode(self.iv))
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

/// Wrap a response the way the card does. Used by the simulated card in tests.
#[cfg(test)]
pub(crate) fn wrap_response(
    data: &[u8],
    enc_key: &Key<PhononScp>,
    mac_key: &Key<PhononScp>,
    iv: &mut [u8; 16],
) -> bytes::Bytes {
    let encrypted = encrypt_data(data, enc_key, Iv::<PhononScp>::from_slice(iv));
    let mut meta = ApduMeta::default();
    meta[0] = (encrypted.len() + MAC_LENGTH) as u8;
    let mac = calculate_mac(&meta, &encrypted, mac_key);
    iv.copy_from_slice(&mac);

    let mut out = BytesMut::new();
    out.extend_from_slice(&mac);
    out.extend_from_slice(&encrypted);
    out.freeze()
}

/// Check and decrypt a wrapped command the way the card does
#[cfg(test)]
pub(crate) fn unwrap_command(
    command: &Command,
    enc_key: &Key<PhononScp>,
    mac_key: &Key<PhononScp>,
    iv: &mut [u8; 16],
) -> Option<bytes::Bytes> {
    let data = command.payload();
    let (received_mac, encrypted) = data.split_at(MAC_LENGTH);

    let mut meta = ApduMeta::default();
    meta[..5].copy_from_slice(&[
        command.cla,
        command.ins,
        command.p1,
        command.p2,
        data.len() as u8,
    ]);
    if calculate_mac(&meta, encrypted, mac_key).as_slice() != received_mac {
        return None;
    }

    let plain = decrypt_data(encrypted, enc_key, Iv::<PhononScp>::from_slice(iv)).ok()?;
    iv.copy_from_slice(received_mac);
    Some(plain)
}
