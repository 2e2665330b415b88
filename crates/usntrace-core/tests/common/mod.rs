//! Synthetic journal buffers shared by the integration tests
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use usntrace_core::journal::time::{FILETIME_UNIX_EPOCH_OFFSET, TICKS_PER_SECOND};
use usntrace_core::journal::RECORD_HEADER_LEN;
use usntrace_core::{AncestorMap, Drive};

pub fn drive(letter: char) -> Drive {
    Drive::new(letter).unwrap()
}

/// FILETIME ticks for `seconds` after the Unix epoch
pub fn ticks(seconds: i64) -> i64 {
    FILETIME_UNIX_EPOCH_OFFSET + seconds * TICKS_PER_SECOND
}

#[derive(Debug, Clone)]
pub struct TestRecord {
    pub file_ref: u64,
    pub parent_ref: u64,
    pub usn: i64,
    pub timestamp: i64,
    pub reason: u32,
    pub name: String,
}

impl TestRecord {
    pub fn new(file_ref: u64, parent_ref: u64, name: &str) -> Self {
        Self {
            file_ref,
            parent_ref,
            usn: 0,
            timestamp: ticks(0),
            reason: 0x8000_0100, // create | close
            name: name.to_string(),
        }
    }

    pub fn usn(mut self, usn: i64) -> Self {
        self.usn = usn;
        self
    }

    pub fn at(mut self, seconds: i64) -> Self {
        self.timestamp = ticks(seconds);
        self
    }

    pub fn reason(mut self, reason: u32) -> Self {
        self.reason = reason;
        self
    }

    /// Version 2 on-disk layout, padded to the 8-byte record alignment
    pub fn encode(&self) -> Vec<u8> {
        let name_units: Vec<u16> = self.name.encode_utf16().collect();
        let name_bytes = name_units.len() * 2;
        let length = (RECORD_HEADER_LEN + name_bytes + 7) & !7;

        let mut buf = Vec::with_capacity(length);
        buf.write_u32::<LittleEndian>(length as u32).unwrap();
        buf.write_u16::<LittleEndian>(2).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.write_u64::<LittleEndian>(self.file_ref).unwrap();
        buf.write_u64::<LittleEndian>(self.parent_ref).unwrap();
        buf.write_i64::<LittleEndian>(self.usn).unwrap();
        buf.write_i64::<LittleEndian>(self.timestamp).unwrap();
        buf.write_u32::<LittleEndian>(self.reason).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(0x20).unwrap();
        buf.write_u16::<LittleEndian>(name_bytes as u16).unwrap();
        buf.write_u16::<LittleEndian>(RECORD_HEADER_LEN as u16).unwrap();
        for unit in name_units {
            buf.write_u16::<LittleEndian>(unit).unwrap();
        }
        buf.resize(length, 0);
        buf
    }
}

/// Concatenates records, padding and damage into one journal buffer
#[derive(Debug, Default)]
pub struct JournalBuilder {
    bytes: Vec<u8>,
}

impl JournalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with an 8-byte next-USN header, as a raw read buffer does
    pub fn with_leading_usn(next_usn: i64) -> Self {
        let mut builder = Self::new();
        builder.bytes.write_i64::<LittleEndian>(next_usn).unwrap();
        builder
    }

    pub fn record(mut self, record: TestRecord) -> Self {
        self.bytes.extend(record.encode());
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = TestRecord>) -> Self {
        for record in records {
            self.bytes.extend(record.encode());
        }
        self
    }

    /// Zero-filled gap of `words` 8-byte words
    pub fn padding(mut self, words: usize) -> Self {
        self.bytes.extend(std::iter::repeat(0u8).take(words * 8));
        self
    }

    /// An 8-byte word whose length field is below the header size
    pub fn short_record(mut self) -> Self {
        self.bytes.write_u32::<LittleEndian>(16).unwrap();
        self.bytes.write_u32::<LittleEndian>(0xDEAD_BEEF).unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// C:\Docs (100) and C:\Docs\Sub (200)
pub fn docs_tree() -> AncestorMap {
    let mut map = AncestorMap::new();
    map.insert_entry(100, 5, "Docs");
    map.insert_entry(200, 100, "Sub");
    map
}
