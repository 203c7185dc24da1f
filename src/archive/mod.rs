//! Archive formats, member listing and background extraction.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{ComixError, Result};

pub mod coordinator;
pub mod extractor;
mod formats;
mod mobi;

pub use coordinator::{Coordinator, Ticket, WaitHandle, WaitOutcome};
pub use extractor::Extractor;

/// Container formats recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    Rar,
    SevenZip,
    Mobi,
}

const SNIFF_LEN: usize = 512;

impl ArchiveFormat {
    /// Identify a format from the first bytes of a file.
    pub fn from_magic(head: &[u8]) -> Option<Self> {
        if head.starts_with(b"PK\x03\x04")
            || head.starts_with(b"PK\x05\x06")
            || head.starts_with(b"PK\x07\x08")
        {
            Some(ArchiveFormat::Zip)
        } else if head.starts_with(b"Rar!\x1a\x07") {
            Some(ArchiveFormat::Rar)
        } else if head.starts_with(b"7z\xbc\xaf\x27\x1c") {
            Some(ArchiveFormat::SevenZip)
        } else if head.starts_with(b"\x1f\x8b") {
            Some(ArchiveFormat::TarGz)
        } else if head.starts_with(b"BZh") {
            Some(ArchiveFormat::TarBz2)
        } else if head.len() >= 262 && &head[257..262] == b"ustar" {
            Some(ArchiveFormat::Tar)
        } else if head.len() >= 68 && &head[60..68] == b"BOOKMOBI" {
            Some(ArchiveFormat::Mobi)
        } else {
            None
        }
    }

    pub fn sniff(path: &Path) -> io::Result<Option<Self>> {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        File::open(path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)?;
        Ok(Self::from_magic(&head))
    }

    pub fn name(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "ZIP",
            ArchiveFormat::Tar => "Tar",
            ArchiveFormat::TarGz => "Gzip compressed tar",
            ArchiveFormat::TarBz2 => "Bzip2 compressed tar",
            ArchiveFormat::Rar => "RAR",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Mobi => "MobiPocket",
        }
    }

    /// Whether members can be read directly. The others are streamed from
    /// the start, and reopened when the next member is behind.
    pub fn is_random_access(self) -> bool {
        matches!(self, ArchiveFormat::Zip | ArchiveFormat::Tar | ArchiveFormat::Mobi)
    }
}

/// The archive format of the regular file at `path`, if it is one.
pub fn archive_format(path: &Path) -> Option<ArchiveFormat> {
    if !path.is_file() {
        return None;
    }
    ArchiveFormat::sniff(path).ok().flatten()
}

/// Names of the file members of the archive (directories left out), in
/// archive order.
pub fn list_members(path: &Path, format: ArchiveFormat) -> Result<Vec<String>> {
    let members = match format {
        ArchiveFormat::Zip => formats::list_zip(path),
        ArchiveFormat::Tar | ArchiveFormat::TarGz | ArchiveFormat::TarBz2 => {
            formats::list_tar(path, format)
        }
        ArchiveFormat::SevenZip => formats::list_7z(path),
        ArchiveFormat::Rar => return formats::list_rar(path),
        ArchiveFormat::Mobi => return mobi::list(path),
    };
    members.map_err(|e| ComixError::corrupt(path, e))
}
