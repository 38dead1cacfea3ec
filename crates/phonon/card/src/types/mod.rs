mod certificate;
mod identity;
mod pairing_info;
mod phonon;

pub use certificate::CardCertificate;
pub use identity::CardIdentity;
pub use pairing_info::PairingInfo;
pub use phonon::{CurveType, Phonon, encode_key_index};

use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::{PublicKey, ecdsa::Signature};

use crate::{Error, Result, constants::tags, crypto::parse_public_key};

pub(crate) fn get_primitive_value(tag: &Tag, tlv: &Tlv) -> Result<Vec<u8>> {
    if tag != tlv.tag() {
        return Err(Error::InvalidData("Invalid tag"));
    }
    match tlv.value() {
        Value::Primitive(bytes) => Ok(bytes.to_vec()),
        _ => Err(Error::InvalidData("Invalid value type")),
    }
}

/// Parse back to back TLVs, failing on any trailing garbage
pub(crate) fn parse_all(mut bytes: &[u8]) -> Result<Vec<Tlv>> {
    let mut tlvs = Vec::new();
    while !bytes.is_empty() {
        let (tlv, rest) = Tlv::parse(bytes);
        tlvs.push(tlv?);
        bytes = rest;
    }
    Ok(tlvs)
}

pub(crate) fn parse_public_key_tlv(tlv: &Tlv) -> Result<PublicKey> {
    let value = get_primitive_value(&Tag::try_from(tags::ECC_PUBLIC_KEY)?, tlv)?;
    parse_public_key(&value)
}

/// DER signatures are themselves a constructed `0x30` TLV
pub(crate) fn parse_signature_tlv(tlv: &Tlv) -> Result<Signature> {
    if tlv.tag() != &Tag::try_from(tags::ECDSA_SIGNATURE)? {
        return Err(Error::InvalidData("Invalid tag"));
    }
    Ok(Signature::from_der(&tlv.to_vec())?)
}
