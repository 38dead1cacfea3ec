use aes::cipher::{
    BlockDecryptMut, BlockEncryptMut, Iv, IvSizeUser, Key, KeyIvInit, KeySizeUser,
    block_padding::Iso7816,
    typenum::{U16, U32},
};
use bytes::Bytes;
use k256::{
    PublicKey, SecretKey,
    ecdh::SharedSecret,
    ecdsa::{Signature, VerifyingKey, signature::Verifier},
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Salts, challenges and cryptograms are all SHA-256 sized
pub type Cryptogram = [u8; 32];
/// Secret shared by host and card after pairing
pub type PairingKey = [u8; 32];
pub(crate) type ApduMeta = [u8; 16];

/// Length of an uncompressed SEC1 point
pub const UNCOMPRESSED_KEY_LENGTH: usize = 65;
/// Length of a compressed SEC1 point
pub const COMPRESSED_KEY_LENGTH: usize = 33;

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

/// Key and IV sizes of the phonon secure channel (AES-256, 16 byte blocks)
#[derive(Debug)]
pub struct PhononScp;

impl KeySizeUser for PhononScp {
    type KeySize = U32;
}

impl IvSizeUser for PhononScp {
    type IvSize = U16;
}

/// Parse a SEC1 encoded secp256k1 public key.
///
/// Only `0x04` (65 bytes) and `0x02`/`0x03` (33 bytes) encodings are accepted.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    match (bytes.first(), bytes.len()) {
        (Some(0x04), UNCOMPRESSED_KEY_LENGTH) | (Some(0x02 | 0x03), COMPRESSED_KEY_LENGTH) => {
            Ok(PublicKey::from_sec1_bytes(bytes)?)
        }
        _ => Err(Error::InvalidPublicKeyFormat),
    }
}

/// Uncompressed SEC1 encoding, as sent to the card
pub fn encode_public_key(key: &PublicKey) -> Bytes {
    Bytes::copy_from_slice(key.to_encoded_point(false).as_bytes())
}

/// ECDH over secp256k1
pub fn generate_ecdh_shared_secret(private: &SecretKey, public: &PublicKey) -> SharedSecret {
    k256::elliptic_curve::ecdh::diffie_hellman(private.to_nonzero_scalar(), public.as_affine())
}

/// Fresh ephemeral secp256k1 key
pub(crate) fn generate_secret_key() -> SecretKey {
    SecretKey::random(&mut rand_v8::thread_rng())
}

pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// `SHA-256(shared_secret | salt)`
pub(crate) fn calculate_cryptogram(shared_secret: &SharedSecret, salt: &[u8]) -> Cryptogram {
    let mut hasher = Sha256::new();
    hasher.update(shared_secret.raw_secret_bytes());
    hasher.update(salt);
    hasher.finalize().into()
}

/// `SHA-256(shared_secret | host_salt | card_salt)`
pub(crate) fn derive_pairing_key(
    shared_secret: &SharedSecret,
    host_salt: &[u8],
    card_salt: &[u8],
) -> PairingKey {
    let mut hasher = Sha256::new();
    hasher.update(shared_secret.raw_secret_bytes());
    hasher.update(host_salt);
    hasher.update(card_salt);
    hasher.finalize().into()
}

/// Encryption and MAC keys of one secure channel session, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SessionKeys {
    enc: [u8; 32],
    mac: [u8; 32],
}

impl SessionKeys {
    pub(crate) fn new(enc_key: &Key<PhononScp>, mac_key: &Key<PhononScp>) -> Self {
        let mut keys = Self {
            enc: [0; 32],
            mac: [0; 32],
        };
        keys.enc.copy_from_slice(enc_key);
        keys.mac.copy_from_slice(mac_key);
        keys
    }

    pub(crate) fn enc(&self) -> &Key<PhononScp> {
        Key::<PhononScp>::from_slice(&self.enc)
    }

    pub(crate) fn mac(&self) -> &Key<PhononScp> {
        Key::<PhononScp>::from_slice(&self.mac)
    }
}

/// Derive session keys from the shared secret, pairing key, and challenge.
///
/// (K(E) | K(M)) = SHA-512(shared_secret | pairing_key | challenge)
pub(crate) fn derive_session_keys(
    secret: &SharedSecret,
    pairing_key: &PairingKey,
    challenge: &[u8],
) -> SessionKeys {
    let mut hasher = Sha512::new();
    hasher.update(secret.raw_secret_bytes());
    hasher.update(pairing_key);
    hasher.update(challenge);
    let mut data = hasher.finalize();

    let mut keys = SessionKeys {
        enc: [0; 32],
        mac: [0; 32],
    };
    keys.enc.copy_from_slice(&data[..32]);
    keys.mac.copy_from_slice(&data[32..]);
    data.as_mut_slice().zeroize();

    keys
}

/// Encrypt data using the provided key and IV, padding it in ISO 7816 format.
pub(crate) fn encrypt_data(data: &[u8], enc_key: &Key<PhononScp>, iv: &Iv<PhononScp>) -> Bytes {
    Encryptor::new(enc_key, iv)
        .encrypt_padded_vec_mut::<Iso7816>(data)
        .into()
}

/// Decrypt data using the provided key and IV assuming the data is padded in ISO 7816 format.
pub(crate) fn decrypt_data(
    data: &[u8],
    enc_key: &Key<PhononScp>,
    iv: &Iv<PhononScp>,
) -> Result<Bytes> {
    let decrypted = Decryptor::new(enc_key, iv).decrypt_padded_vec_mut::<Iso7816>(data)?;
    Ok(decrypted.into())
}

/// CBC-MAC over `meta | data` with a zero IV.
///
/// `meta | data` is always block aligned, so the padding adds one full block
/// and the MAC is the block before it.
pub(crate) fn calculate_mac(
    meta: &ApduMeta,
    data: &[u8],
    mac_key: &Key<PhononScp>,
) -> Iv<PhononScp> {
    let mut buf = Vec::with_capacity(meta.len() + data.len());
    buf.extend_from_slice(meta);
    buf.extend_from_slice(data);

    let ciphertext = Encryptor::new(mac_key, &Iv::<PhononScp>::default())
        .encrypt_padded_vec_mut::<Iso7816>(&buf);

    Iv::<PhononScp>::clone_from_slice(&ciphertext[ciphertext.len() - 32..ciphertext.len() - 16])
}

/// Check an ECDSA (SHA-256) signature made by `signer` over `message`
pub(crate) fn verify_signature(signer: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    VerifyingKey::from(signer).verify(message, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use k256::FieldBytes;

    use super::*;

    const UNCOMPRESSED: [u8; 65] = hex!(
        "045cfdf77a00b4b6b4a5b8bb26b5497dbc7a4d01cbefd7aaeaf5f6f8f8865976e7941ab0ec1651209c444009fd48d925a17de5040ba47eaf3f5b51720dd40b2f9d"
    );
    const COMPRESSED: [u8; 33] =
        hex!("02b4632d08485ff1df2db55b9dafd23347d1c47a457072a1e87be26896549a8737");

    #[test]
    fn test_parse_public_key_fixtures() {
        let key = parse_public_key(&UNCOMPRESSED).unwrap();
        assert_eq!(encode_public_key(&key).as_ref(), &UNCOMPRESSED);

        assert!(parse_public_key(&COMPRESSED).is_ok());

        let mut invalid = UNCOMPRESSED;
        invalid[0] = 0x05;
        assert!(matches!(
            parse_public_key(&invalid),
            Err(Error::InvalidPublicKeyFormat)
        ));
    }

    #[test]
    fn test_parse_public_key_rejects_bad_lengths() {
        assert!(matches!(parse_public_key(&[]), Err(Error::InvalidPublicKeyFormat)));
        assert!(matches!(
            parse_public_key(&UNCOMPRESSED[..33]),
            Err(Error::InvalidPublicKeyFormat)
        ));

        let mut long = COMPRESSED.to_vec();
        long.push(0x00);
        assert!(matches!(parse_public_key(&long), Err(Error::InvalidPublicKeyFormat)));
    }

    #[test]
    fn test_parse_public_key_rejects_points_off_curve() {
        let mut off_curve = UNCOMPRESSED;
        off_curve[64] ^= 0x01;
        assert!(matches!(parse_public_key(&off_curve), Err(Error::EllipticCurve(_))));
    }

    #[test]
    fn test_parse_generated_compressed_key() {
        let key = generate_secret_key().public_key();
        let compressed = key.to_encoded_point(true);
        assert_eq!(compressed.len(), COMPRESSED_KEY_LENGTH);
        assert_eq!(parse_public_key(compressed.as_bytes()).unwrap(), key);
    }

    #[test]
    fn test_ecdh() {
        let pk1 = generate_secret_key();
        let pk2 = generate_secret_key();

        let shared_secret1 = generate_ecdh_shared_secret(&pk1, &pk2.public_key());
        let shared_secret2 = generate_ecdh_shared_secret(&pk2, &pk1.public_key());

        assert_eq!(
            shared_secret1.raw_secret_bytes(),
            shared_secret2.raw_secret_bytes()
        );
    }

    #[test]
    fn test_cryptograms_depend_on_salt_order() {
        let secret = SharedSecret::from(FieldBytes::from([0x42; 32]));
        let host_salt = [0x01; 32];
        let card_salt = [0x02; 32];

        assert_ne!(
            calculate_cryptogram(&secret, &host_salt),
            calculate_cryptogram(&secret, &card_salt)
        );
        assert_ne!(
            derive_pairing_key(&secret, &host_salt, &card_salt),
            derive_pairing_key(&secret, &card_salt, &host_salt)
        );
    }

    #[test]
    fn test_derive_session_keys() {
        let secret = hex!("B410E816DA313545151807E25A830201FA389913A977066AB0C6DE0E8631E400");
        let pairing_key = hex!("544FF0B9B0737E4BFC4ECDFCE09F522B837051BBE4FFCEC494FA420D8525670E");
        let card_data = hex!(
            "1D7C033E75E10EC578AB538F69F1B02538571BA3831441F1649E3F24B5B3E3E71D7BC2D6A3D02FC8CB2FBB3FD8711BB5"
        );

        let keys = derive_session_keys(
            &SharedSecret::from(FieldBytes::from(secret)),
            &pairing_key,
            &card_data[..32],
        );

        assert_eq!(
            keys.enc().as_slice(),
            hex!("4FF496554C01BAE0A52323E3481B448C99D43982118D95C6918FE0354D224B90")
        );
        assert_eq!(
            keys.mac().as_slice(),
            hex!("185811013138EA1B4FFDBBFA7343EF2DBE3E54C2C231885E867F792448AC2FE5")
        );
    }

    #[test]
    fn test_session_keys_are_wiped() {
        let mut keys = SessionKeys::new(&[0x01; 32].into(), &[0x02; 32].into());
        assert_eq!(keys.enc().as_slice(), [0x01; 32]);
        assert_eq!(keys.mac().as_slice(), [0x02; 32]);

        keys.zeroize();
        assert_eq!(keys.enc().as_slice(), [0; 32]);
        assert_eq!(keys.mac().as_slice(), [0; 32]);
    }

    #[test]
    fn test_encrypt_data() {
        let data = hex!("A8A686D0E3290459BCB36088A8FD04A76BF13283BE4B1EAE2E1248EF609F94DC");
        let enc_key = hex!("44D689AB4B18206F7EEE5439FB9A71A8A617406BA5259728D1EBC2786D24896C");
        let iv = hex!("9D3EF41EF1D221DD98A54AD5470F58F2");

        let encrypted = encrypt_data(&data, &enc_key.into(), &iv.into());

        assert_eq!(
            encrypted.as_ref(),
            hex!(
                "FFB41FED5F71A2B57A6AE62D5D5ECD1C12616F6464637DD0A7A930920ACBA55867A7E12CC4F06B089AF34FF4ED4BAB08"
            )
        );
    }

    #[test]
    fn test_decrypt_data() {
        let enc_data = hex!(
            "73B58B66372E3446E14A9F54BA59666DB432E9DD87D24F9B0525180EE52DA2106E0C70EED7CD42B5B313E4443D6AC90D"
        );
        let enc_key = hex!("D93D8E6164196D5C5B5F84F10E4B90D98F8D282ED145513ED666AA55C9871E79");
        let iv = hex!("F959B1220333046D3C47D61B1E1B891B");

        let data = decrypt_data(&enc_data, &enc_key.into(), &iv.into()).unwrap();

        assert_eq!(
            data.as_ref(),
            hex!("2E21F9F2B2C2CC9038D518A5C6B490613E7955BD19D19108B77786986B7ABFE69000")
        );
    }

    #[test]
    fn test_decrypt_rejects_partial_blocks() {
        let key = [0x11; 32];
        let iv = [0x22; 16];
        assert!(matches!(
            decrypt_data(&[0u8; 15], &key.into(), &iv.into()),
            Err(Error::Unpad)
        ));
    }
}
