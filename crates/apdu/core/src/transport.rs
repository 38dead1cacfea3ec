//! Transport layer for card communication
//!
//! A transport sends raw APDU bytes and returns the raw response. It knows
//! nothing about command structure, status words or secure channels.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::TransportError;

/// Trait for card transport connections
///
/// A smart card processes one command at a time, so every call blocks until
/// the card has answered. Implementors provide [`do_transmit_raw`]; callers use
/// [`transmit_raw`], which adds wire-level tracing.
///
/// [`do_transmit_raw`]: CardTransport::do_transmit_raw
/// [`transmit_raw`]: CardTransport::transmit_raw
pub trait CardTransport: fmt::Debug + Send {
    /// Send raw APDU bytes to card and return response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "Received raw response"),
            Err(e) => debug!(error = ?e, "Transport error during transmission"),
        }
        result
    }

    /// Exchange bytes with the card
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}
