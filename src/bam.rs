//! Panda3D BAM files.
//!
//! A BAM file is a 6-byte magic followed by a stream of length-prefixed datagrams.
//! The first datagram is the header; every following one carries one object, a
//! nesting marker, a list of removed objects or auxiliary file data. Objects are
//! pulled one at a time with [`BamReader::read_object`].

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::cursor::{ByteCursor, Endian};
use crate::error::{header_too_short, Diagnostic, Error, Result};
use crate::options::DecodeOptions;

pub const MAGIC: &[u8; 6] = b"pbj\0\n\r";
pub const MAJOR_VERSION: u16 = 6;
pub const FIRST_MINOR_VERSION: u16 = 14;
pub const LAST_MINOR_VERSION: u16 = 45;
/// First minor version whose header carries the stdfloat flag.
pub const STDFLOAT_DOUBLE_MINOR: u16 = 27;
/// First minor version whose datagrams start with an object code.
pub const OBJECT_CODE_MINOR: u16 = 21;

// A 32-bit size of all ones announces a 64-bit size.
const LARGE_SIZE: u32 = u32::MAX;

/// Whether `bytes` starts with the BAM magic.
pub fn is_bam(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BamHeader {
    /// Size of the header datagram.
    pub byte_count: u32,
    pub major: u16,
    pub minor: u16,
    /// `0` for big endian, `1` for little endian object data.
    pub endian: u8,
    /// Floating point fields of objects are stored as doubles.
    pub stdfloat_double: bool,
}

impl BamHeader {
    /// Reads the magic and the header datagram.
    pub fn read(
        cursor: &mut ByteCursor<'_>,
        options: &DecodeOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<BamHeader> {
        let magic = cursor.read_bytes(MAGIC.len()).map_err(header_too_short)?;
        if magic != MAGIC {
            options.report(
                Diagnostic::MagicMismatch {
                    expected: MAGIC.to_vec(),
                    found: magic.to_vec(),
                },
                diagnostics,
            )?;
        }

        let byte_count = cursor.read_u32().map_err(header_too_short)?;
        if byte_count == LARGE_SIZE {
            return Err(Error::UnsupportedFormat("64-bit BAM header size".to_owned()));
        }

        let major = cursor.read_u16().map_err(header_too_short)?;
        let minor = cursor.read_u16().map_err(header_too_short)?;
        if major != MAJOR_VERSION || !(FIRST_MINOR_VERSION..=LAST_MINOR_VERSION).contains(&minor) {
            options.report(
                Diagnostic::VersionMismatch {
                    found: format!("{}.{}", major, minor),
                    supported: format!(
                        "{}.{} through {}.{}",
                        MAJOR_VERSION, FIRST_MINOR_VERSION, MAJOR_VERSION, LAST_MINOR_VERSION
                    ),
                },
                diagnostics,
            )?;
        }

        let endian = cursor.read_u8().map_err(header_too_short)?;
        let stdfloat_double = if minor >= STDFLOAT_DOUBLE_MINOR {
            cursor.read_bool().map_err(header_too_short)?
        } else {
            false
        };

        Ok(BamHeader {
            byte_count,
            major,
            minor,
            endian,
            stdfloat_double,
        })
    }

    /// Byte order of object payloads.
    pub fn byte_order(&self) -> Endian {
        if self.endian == 0 {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// Leading code of an object datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BamObjectCode {
    /// An object definition that opens a nesting level, closed by a `Pop`.
    Push,
    Pop,
    /// An object definition at the current level.
    Adjunct,
    /// Object ids released by the writer.
    Remove,
    /// Auxiliary file data referenced by a later object.
    FileData,
}

impl TryFrom<u8> for BamObjectCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<BamObjectCode> {
        Ok(match code {
            0 => BamObjectCode::Push,
            1 => BamObjectCode::Pop,
            2 => BamObjectCode::Adjunct,
            3 => BamObjectCode::Remove,
            4 => BamObjectCode::FileData,
            other => return Err(Error::UnsupportedFormat(format!("BAM object code {}", other))),
        })
    }
}

/// A type registered by the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BamType {
    pub index: u16,
    pub name: String,
    /// Indices of the parent types.
    pub parents: Vec<u16>,
}

/// One datagram of the object stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BamObject<'a> {
    pub code: BamObjectCode,
    /// Type of a pushed or adjunct object.
    pub kind: Option<BamType>,
    pub object_id: Option<u32>,
    /// Ids listed by a `Remove` datagram.
    pub removed: Vec<u32>,
    /// Object body or file data, empty for the other codes.
    pub payload: &'a [u8],
    endian: Endian,
}

impl<'a> BamObject<'a> {
    /// A cursor over the payload in the file's declared byte order.
    pub fn payload_cursor(&self) -> ByteCursor<'a> {
        ByteCursor::new(self.payload, self.endian)
    }
}

/// Incremental reader over a BAM buffer.
#[derive(Debug)]
pub struct BamReader<'a> {
    cursor: ByteCursor<'a>,
    header: BamHeader,
    diagnostics: Vec<Diagnostic>,
    types: BTreeMap<u16, BamType>,
    long_object_id: bool,
    nesting_level: usize,
}

impl<'a> BamReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<BamReader<'a>> {
        BamReader::with_options(bytes, DecodeOptions::default())
    }

    /// Reads the header; objects are read on demand.
    pub fn with_options(bytes: &'a [u8], options: DecodeOptions) -> Result<BamReader<'a>> {
        let mut cursor = ByteCursor::new(bytes, Endian::Little);
        let mut diagnostics = Vec::new();
        let header = BamHeader::read(&mut cursor, &options, &mut diagnostics)?;

        // The header datagram may carry fields newer than this reader knows.
        let header_end = (MAGIC.len() + 4).saturating_add(header.byte_count as usize);
        if header_end > cursor.tell() {
            let trailing = header_end - cursor.tell();
            trace!(trailing, "skipping unknown header fields");
            cursor.skip(trailing).map_err(header_too_short)?;
        }
        debug!(
            major = header.major,
            minor = header.minor,
            endian = header.endian,
            stdfloat_double = header.stdfloat_double,
            "decoding BAM"
        );
        Ok(BamReader {
            cursor,
            header,
            diagnostics,
            types: BTreeMap::new(),
            long_object_id: false,
            nesting_level: 0,
        })
    }

    pub fn header(&self) -> &BamHeader {
        &self.header
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn type_of(&self, index: u16) -> Option<&BamType> {
        self.types.get(&index)
    }

    /// Number of pushes not yet matched by a pop, always `0` for files older than
    /// minor version 21.
    pub fn nesting_level(&self) -> usize {
        self.nesting_level
    }

    pub fn tell(&self) -> usize {
        self.cursor.tell()
    }

    /// Reads the next datagram, or `None` at the end of the buffer.
    pub fn read_object(&mut self) -> Result<Option<BamObject<'a>>> {
        if self.cursor.remaining() == 0 {
            return Ok(None);
        }

        let size = self.cursor.read_u32()?;
        if size == LARGE_SIZE {
            return Err(Error::UnsupportedFormat("64-bit BAM datagram size".to_owned()));
        }
        let mut scan = ByteCursor::new(self.cursor.read_bytes(size as usize)?, Endian::Little);

        // Before object codes existed every datagram is an object and there is no
        // nesting to track.
        let has_code = self.header.minor >= OBJECT_CODE_MINOR;
        let code = if has_code {
            BamObjectCode::try_from(scan.read_u8()?)?
        } else {
            BamObjectCode::Push
        };

        let mut object = BamObject {
            code,
            kind: None,
            object_id: None,
            removed: Vec::new(),
            payload: &[],
            endian: self.header.byte_order(),
        };
        match code {
            BamObjectCode::Push | BamObjectCode::Adjunct => {
                if has_code && code == BamObjectCode::Push {
                    self.nesting_level += 1;
                }
                object.kind = self.read_handle(&mut scan)?;
                object.object_id = Some(self.read_object_id(&mut scan)?);
                object.payload = scan.read_bytes(scan.remaining())?;
            }
            BamObjectCode::Pop => {
                self.nesting_level = self.nesting_level.saturating_sub(1);
            }
            BamObjectCode::Remove => {
                while scan.remaining() > 0 {
                    object.removed.push(self.read_object_id(&mut scan)?);
                }
            }
            BamObjectCode::FileData => {
                object.payload = scan.read_bytes(scan.remaining())?;
            }
        }

        trace!(
            ?code,
            object_id = ?object.object_id,
            payload = object.payload.len(),
            nesting_level = self.nesting_level,
            "BAM object"
        );
        Ok(Some(object))
    }

    /// Reads a type index, registering the type and its parents on first sight.
    fn read_handle(&mut self, scan: &mut ByteCursor<'a>) -> Result<Option<BamType>> {
        let index = scan.read_u16()?;
        if index == 0 {
            return Ok(None);
        }
        if let Some(known) = self.types.get(&index) {
            return Ok(Some(known.clone()));
        }

        let name_len = usize::from(scan.read_u16()?);
        let name = scan.read_string(name_len)?;
        let parent_count = scan.read_u8()?;
        let mut parents = Vec::with_capacity(usize::from(parent_count));
        for _ in 0..parent_count {
            if let Some(parent) = self.read_handle(scan)? {
                parents.push(parent.index);
            }
        }

        let kind = BamType { index, name, parents };
        debug!(index, name = %kind.name, "registered BAM type");
        self.types.insert(index, kind.clone());
        Ok(Some(kind))
    }

    /// Object ids are 16-bit until the writer escapes with `0xFFFF`.
    fn read_object_id(&mut self, scan: &mut ByteCursor<'a>) -> Result<u32> {
        if self.long_object_id {
            return scan.read_u32();
        }
        let id = scan.read_u16()?;
        if id == u16::MAX {
            self.long_object_id = true;
        }
        Ok(u32::from(id))
    }
}
