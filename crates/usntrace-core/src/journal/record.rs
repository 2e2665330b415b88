//! Change journal record decoding
//!
//! Version 2 records use a 60-byte fixed header followed by the UTF-16LE leaf
//! name:
//! - 0x00: RecordLength (u32)
//! - 0x04: MajorVersion / MinorVersion (u16, u16)
//! - 0x08: FileReferenceNumber (u64)
//! - 0x10: ParentFileReferenceNumber (u64)
//! - 0x18: Usn (i64)
//! - 0x20: TimeStamp (i64, FILETIME ticks)
//! - 0x28: Reason (u32)
//! - 0x2C: SourceInfo (u32)
//! - 0x30: SecurityId (u32)
//! - 0x34: FileAttributes (u32)
//! - 0x38: FileNameLength / FileNameOffset (u16, u16)
//! - 0x3C: FileName

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use std::io::Cursor;
use thiserror::Error;

/// Size of the fixed part of a version 2 record
pub const RECORD_HEADER_LEN: usize = 60;

/// Records start on 8-byte boundaries; also the minimal safe stride after a bad length
pub const RECORD_ALIGNMENT: usize = 8;

/// Low 48 bits of a file reference: the MFT entry index
pub const FRN_INDEX_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

pub const SUPPORTED_MAJOR_VERSION: u16 = 2;

pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;

/// One decoded journal record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawJournalRecord {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub usn: i64,
    /// File reference of the changed entry (index + sequence)
    pub file_ref: u64,
    /// Packed parent reference: low 48 bits index, high 16 bits sequence
    pub parent_ref_raw: u64,
    /// 100ns ticks since 1601-01-01 UTC
    pub timestamp_raw: i64,
    pub reason_bits: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub attributes: u32,
    /// Leaf name only
    pub file_name: String,
}

impl RawJournalRecord {
    /// Entry index of the changed file, used as the ancestor map key
    pub fn file_frn(&self) -> u64 {
        self.file_ref & FRN_INDEX_MASK
    }

    /// Entry index of the parent directory, used as the ancestor map key
    pub fn parent_frn(&self) -> u64 {
        self.parent_ref_raw & FRN_INDEX_MASK
    }

    /// Reuse sequence number of the parent slot
    pub fn parent_sequence(&self) -> u16 {
        (self.parent_ref_raw >> 48) as u16
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & FILE_ATTRIBUTE_DIRECTORY != 0
    }
}

/// Why a record at some offset was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record at offset {offset} declares length {length}, shorter than the fixed header")]
    TooShort { offset: usize, length: u32 },

    #[error("record at offset {offset} declares length {length} but only {remaining} bytes remain")]
    Overrun {
        offset: usize,
        length: u32,
        remaining: usize,
    },

    #[error("record at offset {offset} declares length {length}, not a multiple of 8")]
    Misaligned { offset: usize, length: u32 },

    #[error("record at offset {offset} has unsupported version {major}.{minor}")]
    UnsupportedVersion { offset: usize, major: u16, minor: u16 },

    #[error(
        "record at offset {offset} places its name at {name_offset}+{name_length}, outside its {length} bytes"
    )]
    NameOutOfBounds {
        offset: usize,
        length: u32,
        name_offset: u16,
        name_length: u16,
    },
}

/// Outcome of decoding at one offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A well-formed record and the offset of the one after it
    Record { record: RawJournalRecord, next: usize },
    /// Zero-filled region (sparse journal stream); `next` is the first non-zero word
    Padding { next: usize },
    /// Rejected record; decoding resumes at `next`
    Corrupt { error: DecodeError, next: usize },
    /// Not enough bytes left for another record
    End,
}

/// Decode the record starting at `offset`.
///
/// Never panics on malformed input. A length field that cannot be trusted
/// (too short, past the buffer, off the 8-byte grid) or a header from an
/// unknown version advances by [`RECORD_ALIGNMENT`]. A valid version 2 header
/// whose name falls outside its own length advances past the whole record.
pub fn decode_record(buf: &[u8], offset: usize) -> Decoded {
    let remaining = buf.len().saturating_sub(offset);
    if remaining < RECORD_ALIGNMENT {
        return Decoded::End;
    }

    let data = &buf[offset..];
    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);

    if length == 0 {
        return Decoded::Padding {
            next: skip_zero_words(buf, offset),
        };
    }

    let len = length as usize;
    if len < RECORD_HEADER_LEN {
        return Decoded::Corrupt {
            error: DecodeError::TooShort { offset, length },
            next: offset + RECORD_ALIGNMENT,
        };
    }
    if len > remaining {
        return Decoded::Corrupt {
            error: DecodeError::Overrun {
                offset,
                length,
                remaining,
            },
            next: offset + RECORD_ALIGNMENT,
        };
    }
    if len % RECORD_ALIGNMENT != 0 {
        return Decoded::Corrupt {
            error: DecodeError::Misaligned { offset, length },
            next: offset + RECORD_ALIGNMENT,
        };
    }

    let next = offset + len;
    let body = &data[..len];

    let header = match read_header(body) {
        Ok(header) => header,
        // Unreachable once len >= RECORD_HEADER_LEN, kept as a skip rather than a panic
        Err(_) => {
            return Decoded::Corrupt {
                error: DecodeError::TooShort { offset, length },
                next: offset + RECORD_ALIGNMENT,
            }
        }
    };

    if header.major_version != SUPPORTED_MAJOR_VERSION {
        return Decoded::Corrupt {
            error: DecodeError::UnsupportedVersion {
                offset,
                major: header.major_version,
                minor: header.minor_version,
            },
            next: offset + RECORD_ALIGNMENT,
        };
    }

    let name_start = header.name_offset as usize;
    let name_end = name_start + header.name_length as usize;
    if name_start < RECORD_HEADER_LEN || name_end > len {
        return Decoded::Corrupt {
            error: DecodeError::NameOutOfBounds {
                offset,
                length,
                name_offset: header.name_offset,
                name_length: header.name_length,
            },
            next,
        };
    }

    let (file_name, _) = UTF_16LE.decode_without_bom_handling(&body[name_start..name_end]);

    Decoded::Record {
        record: RawJournalRecord {
            record_length: length,
            major_version: header.major_version,
            minor_version: header.minor_version,
            usn: header.usn,
            file_ref: header.file_ref,
            parent_ref_raw: header.parent_ref_raw,
            timestamp_raw: header.timestamp_raw,
            reason_bits: header.reason_bits,
            source_info: header.source_info,
            security_id: header.security_id,
            attributes: header.attributes,
            file_name: file_name.into_owned(),
        },
        next,
    }
}

struct Header {
    major_version: u16,
    minor_version: u16,
    file_ref: u64,
    parent_ref_raw: u64,
    usn: i64,
    timestamp_raw: i64,
    reason_bits: u32,
    source_info: u32,
    security_id: u32,
    attributes: u32,
    name_length: u16,
    name_offset: u16,
}

fn read_header(data: &[u8]) -> std::io::Result<Header> {
    let mut cursor = Cursor::new(data);
    cursor.set_position(4);

    Ok(Header {
        major_version: cursor.read_u16::<LittleEndian>()?,
        minor_version: cursor.read_u16::<LittleEndian>()?,
        file_ref: cursor.read_u64::<LittleEndian>()?,
        parent_ref_raw: cursor.read_u64::<LittleEndian>()?,
        usn: cursor.read_i64::<LittleEndian>()?,
        timestamp_raw: cursor.read_i64::<LittleEndian>()?,
        reason_bits: cursor.read_u32::<LittleEndian>()?,
        source_info: cursor.read_u32::<LittleEndian>()?,
        security_id: cursor.read_u32::<LittleEndian>()?,
        attributes: cursor.read_u32::<LittleEndian>()?,
        name_length: cursor.read_u16::<LittleEndian>()?,
        name_offset: cursor.read_u16::<LittleEndian>()?,
    })
}

/// First offset at or after `offset` whose 8-byte word is non-zero, stepping by the alignment
fn skip_zero_words(buf: &[u8], offset: usize) -> usize {
    let zero_words = buf[offset..]
        .chunks_exact(RECORD_ALIGNMENT)
        .take_while(|word| word.iter().all(|&b| b == 0))
        .count();

    // A zero length word is always skipped at least once
    offset + zero_words.max(1) * RECORD_ALIGNMENT
}

/// Counters kept while walking a journal buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub records_decoded: usize,
    pub records_skipped: usize,
    pub padding_regions: usize,
}

/// Iterator over every decodable record in a journal buffer
pub struct JournalReader<'a> {
    buf: &'a [u8],
    offset: usize,
    stats: ReaderStats,
}

impl<'a> JournalReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::starting_at(buf, 0)
    }

    /// Start at `offset`, e.g. 8 to step over the next-USN prefix of a raw read buffer
    pub fn starting_at(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            offset,
            stats: ReaderStats::default(),
        }
    }

    /// Byte position of the next decode attempt
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }
}

impl Iterator for JournalReader<'_> {
    type Item = RawJournalRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match decode_record(self.buf, self.offset) {
                Decoded::Record { record, next } => {
                    self.offset = next;
                    self.stats.records_decoded += 1;
                    return Some(record);
                }
                Decoded::Padding { next } => {
                    self.offset = next;
                    self.stats.padding_regions += 1;
                }
                Decoded::Corrupt { error, next } => {
                    tracing::debug!("Skipping journal record: {}", error);
                    self.offset = next;
                    self.stats.records_skipped += 1;
                }
                Decoded::End => {
                    self.offset = self.buf.len().max(self.offset);
                    return None;
                }
            }
        }
    }
}
