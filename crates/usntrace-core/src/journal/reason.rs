/// Change reason classification
///
/// A record's reason mask usually carries several flags at once (a new file
/// shows up as create + extend + close). The ladder below picks the single
/// most structurally significant one. It is the only ladder in the crate;
/// downstream counting depends on the labels staying stable.
use serde::{Deserialize, Serialize};

pub const USN_REASON_DATA_OVERWRITE: u32 = 0x0000_0001;
pub const USN_REASON_DATA_EXTEND: u32 = 0x0000_0002;
pub const USN_REASON_DATA_TRUNCATION: u32 = 0x0000_0004;
pub const USN_REASON_NAMED_DATA_OVERWRITE: u32 = 0x0000_0010;
pub const USN_REASON_NAMED_DATA_EXTEND: u32 = 0x0000_0020;
pub const USN_REASON_NAMED_DATA_TRUNCATION: u32 = 0x0000_0040;
pub const USN_REASON_FILE_CREATE: u32 = 0x0000_0100;
pub const USN_REASON_FILE_DELETE: u32 = 0x0000_0200;
pub const USN_REASON_EA_CHANGE: u32 = 0x0000_0400;
pub const USN_REASON_SECURITY_CHANGE: u32 = 0x0000_0800;
pub const USN_REASON_RENAME_OLD_NAME: u32 = 0x0000_1000;
pub const USN_REASON_RENAME_NEW_NAME: u32 = 0x0000_2000;
pub const USN_REASON_INDEXABLE_CHANGE: u32 = 0x0000_4000;
pub const USN_REASON_BASIC_INFO_CHANGE: u32 = 0x0000_8000;
pub const USN_REASON_HARD_LINK_CHANGE: u32 = 0x0001_0000;
pub const USN_REASON_COMPRESSION_CHANGE: u32 = 0x0002_0000;
pub const USN_REASON_ENCRYPTION_CHANGE: u32 = 0x0004_0000;
pub const USN_REASON_OBJECT_ID_CHANGE: u32 = 0x0008_0000;
pub const USN_REASON_REPARSE_POINT_CHANGE: u32 = 0x0010_0000;
pub const USN_REASON_STREAM_CHANGE: u32 = 0x0020_0000;
pub const USN_REASON_TRANSACTED_CHANGE: u32 = 0x0040_0000;
pub const USN_REASON_INTEGRITY_CHANGE: u32 = 0x0080_0000;
pub const USN_REASON_CLOSE: u32 = 0x8000_0000;

const OVERWRITE_MASK: u32 = USN_REASON_DATA_OVERWRITE | USN_REASON_NAMED_DATA_OVERWRITE;
const EXTEND_MASK: u32 = USN_REASON_DATA_EXTEND | USN_REASON_NAMED_DATA_EXTEND;
const TRUNCATE_MASK: u32 = USN_REASON_DATA_TRUNCATION | USN_REASON_NAMED_DATA_TRUNCATION;
const METADATA_MASK: u32 = USN_REASON_EA_CHANGE
    | USN_REASON_SECURITY_CHANGE
    | USN_REASON_INDEXABLE_CHANGE
    | USN_REASON_BASIC_INFO_CHANGE
    | USN_REASON_HARD_LINK_CHANGE
    | USN_REASON_COMPRESSION_CHANGE
    | USN_REASON_ENCRYPTION_CHANGE
    | USN_REASON_OBJECT_ID_CHANGE
    | USN_REASON_REPARSE_POINT_CHANGE
    | USN_REASON_STREAM_CHANGE
    | USN_REASON_TRANSACTED_CHANGE
    | USN_REASON_INTEGRITY_CHANGE;

/// Priority ladder, evaluated top-down
const LADDER: [(u32, ChangeReason); 9] = [
    (USN_REASON_FILE_CREATE, ChangeReason::Created),
    (USN_REASON_FILE_DELETE, ChangeReason::Deleted),
    (USN_REASON_RENAME_OLD_NAME, ChangeReason::RenamedOldName),
    (USN_REASON_RENAME_NEW_NAME, ChangeReason::RenamedNewName),
    (OVERWRITE_MASK, ChangeReason::Overwritten),
    (EXTEND_MASK, ChangeReason::Extended),
    (TRUNCATE_MASK, ChangeReason::Truncated),
    (METADATA_MASK, ChangeReason::MetadataChanged),
    (USN_REASON_CLOSE, ChangeReason::Closed),
];

/// Individual flag names, lowest bit first
const FLAG_NAMES: [(u32, &str); 23] = [
    (USN_REASON_DATA_OVERWRITE, "DataOverwrite"),
    (USN_REASON_DATA_EXTEND, "DataExtend"),
    (USN_REASON_DATA_TRUNCATION, "DataTruncation"),
    (USN_REASON_NAMED_DATA_OVERWRITE, "NamedDataOverwrite"),
    (USN_REASON_NAMED_DATA_EXTEND, "NamedDataExtend"),
    (USN_REASON_NAMED_DATA_TRUNCATION, "NamedDataTruncation"),
    (USN_REASON_FILE_CREATE, "FileCreate"),
    (USN_REASON_FILE_DELETE, "FileDelete"),
    (USN_REASON_EA_CHANGE, "EaChange"),
    (USN_REASON_SECURITY_CHANGE, "SecurityChange"),
    (USN_REASON_RENAME_OLD_NAME, "RenameOldName"),
    (USN_REASON_RENAME_NEW_NAME, "RenameNewName"),
    (USN_REASON_INDEXABLE_CHANGE, "IndexableChange"),
    (USN_REASON_BASIC_INFO_CHANGE, "BasicInfoChange"),
    (USN_REASON_HARD_LINK_CHANGE, "HardLinkChange"),
    (USN_REASON_COMPRESSION_CHANGE, "CompressionChange"),
    (USN_REASON_ENCRYPTION_CHANGE, "EncryptionChange"),
    (USN_REASON_OBJECT_ID_CHANGE, "ObjectIdChange"),
    (USN_REASON_REPARSE_POINT_CHANGE, "ReparsePointChange"),
    (USN_REASON_STREAM_CHANGE, "StreamChange"),
    (USN_REASON_TRANSACTED_CHANGE, "TransactedChange"),
    (USN_REASON_INTEGRITY_CHANGE, "IntegrityChange"),
    (USN_REASON_CLOSE, "Close"),
];

/// Normalized change category of one journal record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeReason {
    Created,
    Deleted,
    RenamedOldName,
    RenamedNewName,
    Overwritten,
    Extended,
    Truncated,
    MetadataChanged,
    Closed,
    /// No recognized bit set; never expected for well-formed records
    Unknown,
}

impl ChangeReason {
    pub const ALL: [ChangeReason; 10] = [
        ChangeReason::Created,
        ChangeReason::Deleted,
        ChangeReason::RenamedOldName,
        ChangeReason::RenamedNewName,
        ChangeReason::Overwritten,
        ChangeReason::Extended,
        ChangeReason::Truncated,
        ChangeReason::MetadataChanged,
        ChangeReason::Closed,
        ChangeReason::Unknown,
    ];

    /// Classify a reason mask; the first ladder rung with a matching bit wins
    pub fn classify(reason_bits: u32) -> Self {
        LADDER
            .iter()
            .find(|(mask, _)| reason_bits & mask != 0)
            .map(|&(_, reason)| reason)
            .unwrap_or(ChangeReason::Unknown)
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeReason::Created => "Created",
            ChangeReason::Deleted => "Deleted",
            ChangeReason::RenamedOldName => "Renamed (old name)",
            ChangeReason::RenamedNewName => "Renamed (new name)",
            ChangeReason::Overwritten => "Overwritten",
            ChangeReason::Extended => "Extended",
            ChangeReason::Truncated => "Truncated",
            ChangeReason::MetadataChanged => "Metadata changed",
            ChangeReason::Closed => "Closed",
            ChangeReason::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Names of every recognized flag in the mask, lowest bit first
pub fn flag_names(reason_bits: u32) -> Vec<&'static str> {
    FLAG_NAMES
        .iter()
        .filter(|(bit, _)| reason_bits & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}
