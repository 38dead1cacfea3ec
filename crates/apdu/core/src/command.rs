//! APDU command definitions
//!
//! This module provides the short-form ISO/IEC 7816-4 command APDU used by the
//! phonon applet: `CLA | INS | P1 | P2 | [Lc | Data] | [Le]`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Largest payload a short APDU can carry
pub const MAX_PAYLOAD_LENGTH: usize = 255;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command payload data, empty if there is none
    pub fn payload(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        4 + self.data.as_ref().map_or(0, |data| 1 + data.len()) + usize::from(self.le.is_some())
    }

    /// Convert to raw APDU bytes
    ///
    /// Lc and the data field are omitted when there is no payload. Payloads
    /// longer than [`MAX_PAYLOAD_LENGTH`] cannot be expressed in a short APDU
    /// and are rejected.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            let lc = u8::try_from(data.len())
                .map_err(|_| Error::InvalidCommandLength(data.len()))?;
            buffer.put_u8(lc);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        Ok(buffer.freeze())
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [cla, ins, p1, p2, body @ ..] = data else {
            return Err(Error::InvalidCommandLength(data.len()));
        };

        let mut command = Self::new(*cla, *ins, *p1, *p2);

        match body {
            [] => {}
            [le] => command.le = Some(*le),
            [lc, rest @ ..] => {
                let lc = usize::from(*lc);
                match rest.len() {
                    n if n == lc => {}
                    n if n == lc + 1 => command.le = Some(rest[lc]),
                    _ => return Err(Error::InvalidCommandLength(data.len())),
                }
                command.data = Some(Bytes::copy_from_slice(&rest[..lc]));
            }
        }

        Ok(command)
    }
}
