//! Pluggable asset validation

use crate::{Error, Result, types::Phonon};

/// Checks that the asset a phonon claims to hold actually exists
///
/// Implementations typically query a chain for the balance behind the phonon
/// public key. They are only ever handed phonons that carry a public key.
pub trait Validator {
    /// Whether `phonon` is backed by a real asset
    fn validate(&self, phonon: &Phonon) -> Result<bool>;
}

impl<V: Validator + ?Sized> Validator for &V {
    fn validate(&self, phonon: &Phonon) -> Result<bool> {
        (**self).validate(phonon)
    }
}

/// Run `validator` against `phonon`, refusing phonons without a public key
pub fn validate_phonon<V: Validator + ?Sized>(validator: &V, phonon: &Phonon) -> Result<bool> {
    if phonon.public_key.is_none() {
        return Err(Error::MissingPublicKey);
    }
    validator.validate(phonon)
}
