//! Tar archives for copying files in and out of containers.
//!
//! The daemon's copy API speaks tar in both directions: copying out yields an
//! archive of the requested path, and copying in extracts an archive into a
//! directory.

use std::io::Read;

use tar::{Archive, Builder, EntryType, Header};

use crate::error::{Error, Result};

/// Mode for staged certificate files.
const FILE_MODE: u32 = 0o644;

/// Packs `contents` as a single regular file called `file_name`.
///
/// # Errors
///
/// Returns `Error::Archive` if the archive cannot be written.
pub fn single_file(file_name: &str, contents: &[u8]) -> Result<Vec<u8>> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(contents.len() as u64);
    header.set_mode(FILE_MODE);

    let archive_error = |source| Error::Archive {
        context: format!("archive '{file_name}'"),
        source,
    };

    let mut builder = Builder::new(Vec::new());
    builder
        .append_data(&mut header, file_name, contents)
        .map_err(archive_error)?;
    builder.into_inner().map_err(archive_error)
}

/// Returns the contents of the first regular file in `archive`.
///
/// # Errors
///
/// Returns `Error::Archive` if the archive is malformed or holds no file.
pub fn first_file(archive: &[u8]) -> Result<Vec<u8>> {
    let unpack_error = |source| Error::Archive {
        context: "read copied archive".to_string(),
        source,
    };

    let mut archive = Archive::new(archive);
    for entry in archive.entries().map_err(unpack_error)? {
        let mut entry = entry.map_err(unpack_error)?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(unpack_error)?;
        return Ok(contents);
    }

    Err(unpack_error(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "archive contains no regular file",
    )))
}
