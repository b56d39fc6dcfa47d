//! Receive message wire format
//!
//! Every message starts with a 12-byte header followed by a body whose layout
//! depends on the message id. All integers and floats are little-endian.
//!
//! ```text
//! header        size u32 | version u32 | id u32
//! OBJECT_DATA   request u32 | object u32 | define u32 | flags u32 |
//!               entry_number u32 | out_of u32 | define_count u32 | data ...
//! EVENT         group u32 | event u32 | data u32
//! FILENAME      EVENT fields | name [260] | flags u32
//! FRAME         EVENT fields | frame_rate f32 | sim_speed f32
//! EXCEPTION     exception u32 | send_id u32 | index u32
//! SYSTEM_STATE  request u32 | integer u32 | float f32 | string [260]
//! OPEN          name [256] | application version u32 x4 | sdk version u32 x4
//! ```

use crate::types::text_until_nul;
use crate::{Result, SimError};

/// Size of the common message header.
pub const HEADER_SIZE: usize = 12;

/// Width of the application name in OPEN messages.
pub const APPLICATION_NAME_WIDTH: usize = 256;

/// Width of file names and system-state strings.
pub const PATH_WIDTH: usize = 260;

/// Fixed fields preceding the record bytes of a data message.
pub const OBJECT_DATA_PREFIX: usize = 7 * 4;

/// Receive message ids.
pub mod message_ids {
    pub const NULL: u32 = 0;
    pub const EXCEPTION: u32 = 1;
    pub const OPEN: u32 = 2;
    pub const QUIT: u32 = 3;
    pub const EVENT: u32 = 4;
    pub const EVENT_FILENAME: u32 = 6;
    pub const EVENT_FRAME: u32 = 7;
    pub const SIMOBJECT_DATA: u32 = 8;
    pub const SIMOBJECT_DATA_BYTYPE: u32 = 9;
    pub const SYSTEM_STATE: u32 = 15;
}

/// Bounds-checked little-endian reader over one message body.
pub(crate) struct BodyReader<'a> {
    data: &'a [u8],
    offset: usize,
    context: &'static str,
}

impl<'a> BodyReader<'a> {
    pub(crate) fn new(data: &'a [u8], context: &'static str) -> Self {
        Self { data, offset: 0, context }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset + len;
        let bytes = self.data.get(self.offset..end).ok_or_else(|| {
            SimError::protocol(format!(
                "{} body too short: need {} bytes at offset {}, have {}",
                self.context,
                len,
                self.offset,
                self.data.len()
            ))
        })?;
        self.offset = end;
        Ok(bytes)
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn text(&mut self, width: usize) -> Result<String> {
        self.take(width).map(text_until_nul)
    }

    /// Everything not yet read.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.offset.min(self.data.len())..];
        self.offset = self.data.len();
        rest
    }
}

/// Parsed message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub size: u32,
    pub version: u32,
    pub id: u32,
}

impl MessageHeader {
    /// Parse the header and return it with the message body.
    ///
    /// The body ends at the header's declared size; bytes past it are ignored.
    pub fn split(message: &[u8]) -> Result<(Self, &[u8])> {
        let mut reader = BodyReader::new(message, "header");
        let header = Self { size: reader.u32()?, version: reader.u32()?, id: reader.u32()? };

        let size = header.size as usize;
        if size < HEADER_SIZE || size > message.len() {
            return Err(SimError::protocol(format!(
                "message declares {} bytes but {} were received",
                header.size,
                message.len()
            )));
        }

        Ok((header, &message[HEADER_SIZE..size]))
    }
}
