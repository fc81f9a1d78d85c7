//! Format-agnostic view of a container of named byte blobs
//!
//! [`Archive`] is implemented by the package container
//! ([`BtdxArchive`](crate::btdx::BtdxArchive)) and by the structured
//! database ([`CompiledDb`](crate::cdb::CompiledDb)), whose records are
//! exposed as entries.

use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::common::Tag;
use crate::error::{Error, Result};

/// Format specific details of an [`ArchiveEntry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMeta {
    /// An entry of a general package container
    Package {
        hash: u32,
        extension: String,
        directory_hash: u32,
        packed_size: u32,
    },
    /// A record of a structured database
    Record { tag: Tag },
}

/// One named, sized entry of an archive.
///
/// Entries do not hold on to their container. `index` is the position of
/// the entry in its container's enumeration and is what the container uses
/// to resolve [`Archive::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
    pub index: usize,
    pub meta: EntryMeta,
}

impl ArchiveEntry {
    /// True if the entry is stored compressed in its container
    pub fn is_compressed(&self) -> bool {
        matches!(self.meta, EntryMeta::Package { packed_size, .. } if packed_size != 0)
    }
}

/// A container of named, sized byte blobs
pub trait Archive {
    /// All entries, in container order
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>>;

    /// Open an entry's content. The stream borrows the archive and is
    /// released when dropped.
    fn open(&mut self, entry: &ArchiveEntry) -> Result<Box<dyn Read + '_>>;

    /// Read an entry's content fully into memory
    fn read(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open(entry)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Extract an entry below `directory`, returning the written path.
    ///
    /// This default reads the whole entry into memory before writing it;
    /// containers that can stream should override it.
    fn extract_into(&mut self, entry: &ArchiveEntry, directory: &Path, overwrite: bool) -> Result<PathBuf> {
        let final_path = prepare_destination(directory, &entry.path, overwrite)?;
        let data = self.read(entry)?;
        fs::write(&final_path, data)?;
        Ok(final_path)
    }

    /// Add or replace an entry
    fn add(&mut self, _path: &str, _content: Vec<u8>) -> Result<()> {
        Err(Error::Unsupported("add"))
    }

    fn remove(&mut self, _entry: &ArchiveEntry) -> Result<()> {
        Err(Error::Unsupported("remove"))
    }

    /// Serialize the (possibly modified) archive
    fn save(&mut self, _out: &mut dyn Write) -> Result<()> {
        Err(Error::Unsupported("save"))
    }
}

/// Resolve where `entry_path` lands below `directory` and check the
/// extraction preconditions. Intermediate directories are created.
pub fn prepare_destination(directory: &Path, entry_path: &str, overwrite: bool) -> Result<PathBuf> {
    if !directory.is_dir() {
        return Err(Error::NotADirectory(directory.to_path_buf()));
    }

    let final_path = directory.join(relative_entry_path(entry_path)?);
    if final_path.exists() && !overwrite {
        return Err(Error::AlreadyExists(final_path));
    }

    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(final_path)
}

/// Turn an archive path (which may use `\` separators) into a relative path
/// that cannot escape the extraction directory
pub fn relative_entry_path(entry_path: &str) -> Result<PathBuf> {
    let normalized = entry_path.replace('\\', "/");
    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(Error::Validation {
                    field: "path",
                    value: entry_path.to_string(),
                })
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(Error::Validation {
            field: "path",
            value: entry_path.to_string(),
        });
    }
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct MemoryArchive {
        files: Vec<(String, Vec<u8>)>,
    }

    impl Archive for MemoryArchive {
        fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
            Ok(self
                .files
                .iter()
                .enumerate()
                .map(|(index, (path, data))| ArchiveEntry {
                    path: path.clone(),
                    size: data.len() as u64,
                    index,
                    meta: EntryMeta::Record { tag: Tag::new(b"TEST") },
                })
                .collect())
        }

        fn open(&mut self, entry: &ArchiveEntry) -> Result<Box<dyn Read + '_>> {
            Ok(Box::new(Cursor::new(self.files[entry.index].1.as_slice())))
        }
    }

    fn archive() -> MemoryArchive {
        MemoryArchive {
            files: vec![("textures\\sky.dds".to_string(), b"sky".to_vec())],
        }
    }

    #[test]
    fn test_relative_entry_path() {
        assert_eq!(
            relative_entry_path("textures\\sky.dds").unwrap(),
            PathBuf::from("textures").join("sky.dds")
        );
        assert_eq!(relative_entry_path("/a.txt").unwrap(), PathBuf::from("a.txt"));
        assert!(relative_entry_path("..\\evil.txt").is_err());
    }

    #[test]
    fn test_default_extract_into() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = archive();
        let entry = archive.entries().unwrap().remove(0);

        let written = archive.extract_into(&entry, dir.path(), false).unwrap();
        assert_eq!(fs::read(&written).unwrap(), b"sky");

        let err = archive.extract_into(&entry, dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        archive.extract_into(&entry, dir.path(), true).unwrap();
    }

    #[test]
    fn test_extract_into_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let mut archive = archive();
        let entry = archive.entries().unwrap().remove(0);
        let err = archive.extract_into(&entry, &file, false).unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));
    }

    #[test]
    fn test_mutation_unsupported_by_default() {
        let mut archive = archive();
        assert!(matches!(archive.add("x", vec![]), Err(Error::Unsupported("add"))));
        assert!(matches!(archive.save(&mut Vec::new()), Err(Error::Unsupported("save"))));
    }
}
