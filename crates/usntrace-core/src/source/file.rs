/// Journal dumps on disk
///
/// Reads a raw journal capture per drive (an extracted `$UsnJrnl:$J` stream
/// or a saved read buffer). Files are memory-mapped, so multi-gigabyte sparse
/// dumps never have to fit in memory.
use memmap2::{Mmap, MmapOptions};
use std::collections::HashMap;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use super::{classify_io_error, JournalSource, SourceError};
use crate::Drive;

/// Raw journal bytes, owned or mapped
pub enum JournalData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl JournalData {
    pub fn empty() -> Self {
        JournalData::Owned(Vec::new())
    }

    /// Memory-map a dump file. A zero-length file yields empty data, since it
    /// cannot be mapped.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(JournalData::empty());
        }

        let map = unsafe { MmapOptions::new().map(&file)? };
        Ok(JournalData::Mapped(map))
    }
}

impl Deref for JournalData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            JournalData::Owned(bytes) => bytes.as_slice(),
            JournalData::Mapped(map) => &map[..],
        }
    }
}

impl From<Vec<u8>> for JournalData {
    fn from(bytes: Vec<u8>) -> Self {
        JournalData::Owned(bytes)
    }
}

impl std::fmt::Debug for JournalData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            JournalData::Owned(_) => "Owned",
            JournalData::Mapped(_) => "Mapped",
        };
        write!(f, "JournalData::{}({} bytes)", kind, self.len())
    }
}

/// One journal dump file per drive
#[derive(Debug, Clone, Default)]
pub struct FileJournalSource {
    paths: HashMap<Drive, PathBuf>,
}

impl FileJournalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drive(mut self, drive: Drive, path: impl Into<PathBuf>) -> Self {
        self.insert(drive, path);
        self
    }

    pub fn insert(&mut self, drive: Drive, path: impl Into<PathBuf>) {
        self.paths.insert(drive, path.into());
    }

    pub fn path_for(&self, drive: Drive) -> Option<&Path> {
        self.paths.get(&drive).map(PathBuf::as_path)
    }

    /// Drives with a configured dump, in letter order
    pub fn drives(&self) -> Vec<Drive> {
        let mut drives: Vec<Drive> = self.paths.keys().copied().collect();
        drives.sort();
        drives
    }
}

impl JournalSource for FileJournalSource {
    fn read_journal(&self, drive: Drive) -> Result<JournalData, SourceError> {
        let path = self.path_for(drive).ok_or(SourceError::NoJournal(drive))?;

        let data = JournalData::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NoJournal(drive),
            _ => classify_io_error(drive, "journal", e),
        })?;

        tracing::info!("Mapped {} byte journal for {} from {}", data.len(), drive, path.display());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reads_mapped_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        file.flush().unwrap();

        let drive = Drive::new('C').unwrap();
        let source = FileJournalSource::new().with_drive(drive, file.path());
        let data = source.read_journal(drive).unwrap();

        assert_eq!(&data[..], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(matches!(data, JournalData::Mapped(_)));
    }

    #[test]
    fn test_open_maps_without_a_drive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[9; 16]).unwrap();
        file.flush().unwrap();

        let data = JournalData::open(file.path()).unwrap();
        assert_eq!(data.len(), 16);
        assert!(matches!(data, JournalData::Mapped(_)));

        let missing = file.path().with_extension("missing");
        assert!(JournalData::open(&missing).is_err());
    }

    #[test]
    fn test_empty_file_is_empty_data() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let drive = Drive::new('C').unwrap();
        let source = FileJournalSource::new().with_drive(drive, file.path());

        assert!(source.read_journal(drive).unwrap().is_empty());
    }

    #[test]
    fn test_missing_journal() {
        let dir = tempfile::tempdir().unwrap();
        let c = Drive::new('C').unwrap();
        let d = Drive::new('D').unwrap();
        let source = FileJournalSource::new().with_drive(c, dir.path().join("absent.bin"));

        assert!(matches!(source.read_journal(c), Err(SourceError::NoJournal(_))));
        assert!(matches!(source.read_journal(d), Err(SourceError::NoJournal(_))));
    }
}
