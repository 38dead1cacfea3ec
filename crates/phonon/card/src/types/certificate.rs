use bytes::Bytes;
use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::{PublicKey, ecdsa::Signature};

use super::{parse_all, parse_public_key_tlv, parse_signature_tlv};
use crate::{Error, constants::tags, crypto::verify_signature};

/// Certificate a card presents while pairing
///
/// The `0x8A` value holds the card identity key TLV, optionally followed by
/// the certificate authority's signature over that TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCertificate {
    /// Card identity key
    pub public_key: PublicKey,
    /// Certificate authority signature, if the card carries one
    pub signature: Option<Signature>,
    signed: Bytes,
}

impl CardCertificate {
    /// Check the certificate was issued by `ca`
    pub fn verify(&self, ca: &PublicKey) -> Result<(), Error> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(Error::Authentication("card certificate is not signed"))?;

        if verify_signature(ca, &self.signed, signature) {
            Ok(())
        } else {
            Err(Error::Authentication("card certificate signature invalid"))
        }
    }
}

impl TryFrom<Tlv> for CardCertificate {
    type Error = Error;

    fn try_from(tlv: Tlv) -> Result<Self, Self::Error> {
        if tlv.tag() != &Tag::try_from(tags::CERTIFICATE)? {
            return Err(Self::Error::InvalidData("TLV tag was not certificate tag"));
        }

        let Value::Primitive(value) = tlv.value() else {
            return Err(Self::Error::InvalidData("Expected primitive TLV for certificate"));
        };

        match parse_all(value)?.as_slice() {
            [key] => Ok(Self {
                public_key: parse_public_key_tlv(key)?,
                signature: None,
                signed: key.to_vec().into(),
            }),
            [key, signature] => Ok(Self {
                public_key: parse_public_key_tlv(key)?,
                signature: Some(parse_signature_tlv(signature)?),
                signed: key.to_vec().into(),
            }),
            _ => Err(Self::Error::InvalidData("Unexpected certificate layout")),
        }
    }
}

impl TryFrom<&[u8]> for CardCertificate {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from(Tlv::from_bytes(value)?)
    }
}
