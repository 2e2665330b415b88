//! Change journal decoding
//!
//! Turns the raw byte stream of one volume's journal into typed records and
//! classifies their reason masks.

pub mod reason;
pub mod record;
pub mod time;

pub use reason::{flag_names, ChangeReason};
pub use record::{
    decode_record, DecodeError, Decoded, JournalReader, RawJournalRecord, ReaderStats,
    FRN_INDEX_MASK, RECORD_ALIGNMENT, RECORD_HEADER_LEN,
};
pub use time::{datetime_to_filetime, filetime_to_datetime, format_filetime};
