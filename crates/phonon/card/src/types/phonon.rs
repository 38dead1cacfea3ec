use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::PublicKey;

use super::{get_primitive_value, parse_all, parse_public_key_tlv};
use crate::{Error, Result, constants::tags};

/// Curve a phonon key lives on, sent as P1 of CREATE PHONON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CurveType {
    /// Bitcoin and Ethereum curve
    #[default]
    Secp256k1 = 0x00,
    /// Native phonons produced by mining
    Native = 0x01,
}

impl From<CurveType> for u8 {
    fn from(curve: CurveType) -> Self {
        curve as Self
    }
}

/// A phonon held on the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phonon {
    /// Slot the card stores the phonon in
    pub key_index: u16,
    /// Curve of the phonon key
    pub curve: CurveType,
    /// Absent when the card did not report one
    pub public_key: Option<PublicKey>,
}

impl Phonon {
    /// Decode the `0x41` key index and optional `0x80` public key TLVs
    pub fn from_tlv_bytes(bytes: &[u8], curve: CurveType) -> Result<Self> {
        let tlvs = parse_all(bytes)?;
        let index_tag = Tag::try_from(tags::PHONON_KEY_INDEX)?;
        let key_tag = Tag::try_from(tags::ECC_PUBLIC_KEY)?;

        let index = tlvs
            .iter()
            .find(|tlv| tlv.tag() == &index_tag)
            .ok_or(Error::InvalidData("Missing phonon key index"))?;
        let index = get_primitive_value(&index_tag, index)?;
        let key_index = <[u8; 2]>::try_from(index.as_slice())
            .map(u16::from_be_bytes)
            .map_err(|_| Error::InvalidData("Invalid phonon key index length"))?;

        let public_key = tlvs
            .iter()
            .find(|tlv| tlv.tag() == &key_tag)
            .map(parse_public_key_tlv)
            .transpose()?;

        Ok(Self {
            key_index,
            curve,
            public_key,
        })
    }
}

/// Encode a phonon key index as the `0x41` TLV the card expects
pub fn encode_key_index(key_index: u16) -> Result<Vec<u8>> {
    let tlv = Tlv::new(
        Tag::try_from(tags::PHONON_KEY_INDEX)?,
        Value::Primitive(key_index.to_be_bytes().to_vec()),
    )?;
    Ok(tlv.to_vec())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use k256::SecretKey;

    use super::*;
    use crate::crypto::encode_public_key;

    #[test]
    fn test_encode_key_index() {
        assert_eq!(encode_key_index(0x0102).unwrap(), hex!("41020102"));
    }

    #[test]
    fn test_decode_created_phonon() {
        let key = SecretKey::from_slice(&[0x03; 32]).unwrap().public_key();
        let mut bytes = hex!("41020007").to_vec();
        bytes.extend_from_slice(&[0x80, 0x41]);
        bytes.extend_from_slice(&encode_public_key(&key));

        let phonon = Phonon::from_tlv_bytes(&bytes, CurveType::Secp256k1).unwrap();
        assert_eq!(phonon.key_index, 7);
        assert_eq!(phonon.public_key, Some(key));
    }

    #[test]
    fn test_decode_requires_index() {
        assert!(matches!(
            Phonon::from_tlv_bytes(&hex!("800100"), CurveType::Native),
            Err(Error::InvalidData("Missing phonon key index"))
        ));
        assert!(matches!(
            Phonon::from_tlv_bytes(&hex!("410107"), CurveType::Native),
            Err(Error::InvalidData("Invalid phonon key index length"))
        ));
    }
}
