use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::{PublicKey, ecdsa::Signature};

use super::{parse_public_key_tlv, parse_signature_tlv};
use crate::{Error, constants::tags, crypto::verify_signature};

/// Answer to IDENTIFY CARD: the card identity key and its signature over the host nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardIdentity {
    /// Card identity key
    pub public_key: PublicKey,
    /// Signature over the host nonce
    pub signature: Signature,
}

impl CardIdentity {
    /// Check the card signed `nonce` with the key it presented
    pub fn verify(&self, nonce: &[u8]) -> Result<(), Error> {
        if verify_signature(&self.public_key, nonce, &self.signature) {
            Ok(())
        } else {
            Err(Error::Authentication("card identity signature invalid"))
        }
    }
}

impl TryFrom<Tlv> for CardIdentity {
    type Error = Error;

    fn try_from(tlv: Tlv) -> Result<Self, Self::Error> {
        if tlv.tag() != &Tag::try_from(tags::TEMPLATE_SIGNATURE)? {
            return Err(Self::Error::InvalidData(
                "TLV tag was not signature template tag",
            ));
        }

        match tlv.value() {
            Value::Primitive(_) => Err(Self::Error::InvalidData(
                "Expected constructed TLV for signature template",
            )),
            Value::Constructed(tlvs) => match tlvs.as_slice() {
                [public_key, signature] => Ok(Self {
                    public_key: parse_public_key_tlv(public_key)?,
                    signature: parse_signature_tlv(signature)?,
                }),
                _ => Err(Self::Error::InvalidData("Unexpected signature template layout")),
            },
        }
    }
}

impl TryFrom<&[u8]> for CardIdentity {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let (tlv, _) = Tlv::parse(value);
        Self::try_from(tlv?)
    }
}
