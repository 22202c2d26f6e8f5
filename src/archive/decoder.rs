use std::io::{Cursor, Read, Seek};

use zip::ZipArchive;

use crate::{
    error::{AppError, AppResult},
    models::{DATA_FILE_EXTENSION, DATA_FILE_NAME},
};

/// Uncompressed contents of the tabular entry chosen from an upload.
#[derive(Debug, Clone)]
pub struct TabularEntry {
    name: String,
    contents: Vec<u8>,
}

impl TabularEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.contents
    }
}

/// Opens a zip archive held in memory and extracts its tabular entry.
///
/// An entry named exactly `data.csv` wins; otherwise the first file entry whose
/// name ends in `.csv` is used. Decompression happens here, so a corrupt entry
/// surfaces as [`AppError::InvalidArchive`] rather than as a table error later.
pub fn decode(bytes: &[u8]) -> AppResult<TabularEntry> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(AppError::invalid_archive)?;

    let index = locate_data_entry(&mut archive)?.ok_or(AppError::MissingDataEntry)?;

    let mut file = archive.by_index(index).map_err(AppError::invalid_archive)?;
    let name = file.name().to_string();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(AppError::invalid_archive)?;

    tracing::debug!(entry = %name, bytes = contents.len(), "decoded tabular entry");

    Ok(TabularEntry { name, contents })
}

fn locate_data_entry<R>(archive: &mut ZipArchive<R>) -> AppResult<Option<usize>>
where
    R: Read + Seek,
{
    let mut fallback = None;

    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(AppError::invalid_archive)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name();
        if name == DATA_FILE_NAME {
            return Ok(Some(index));
        }
        if fallback.is_none() && has_table_extension(name) {
            fallback = Some(index);
        }
    }

    Ok(fallback)
}

fn has_table_extension(name: &str) -> bool {
    name.len() > DATA_FILE_EXTENSION.len() && name.ends_with(DATA_FILE_EXTENSION)
}
