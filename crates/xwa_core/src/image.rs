use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::catalog::MAX_IMAGE_LEN;
use crate::core_api::{CoreError, CoreErrorCode};

/// In-memory copy of the head of the executable plus the handle it came from.
///
/// Every write goes to the backing stream first and reaches the buffer only
/// once the stream accepted it, so the buffer never holds bytes the disk
/// rejected.
#[derive(Debug)]
pub struct BinaryImage<F = File> {
    bytes: Vec<u8>,
    stream: F,
}

impl BinaryImage<File> {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                CoreError::new(
                    CoreErrorCode::FileAccess,
                    format!("could not open {} for reading and writing: {e}", path.display()),
                )
            })?;
        let image = Self::from_stream(file)?;
        debug!(path = %path.display(), len = image.len(), "opened binary image");
        Ok(image)
    }
}

impl<F: Read + Write + Seek> BinaryImage<F> {
    pub fn from_stream(mut stream: F) -> Result<Self, CoreError> {
        let mut bytes = Vec::new();
        stream
            .seek(SeekFrom::Start(0))
            .and_then(|_| (&mut stream).take(MAX_IMAGE_LEN as u64).read_to_end(&mut bytes))
            .map_err(|e| {
                CoreError::new(CoreErrorCode::FileAccess, format!("could not read file: {e}"))
            })?;

        Ok(Self { bytes, stream })
    }

    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), CoreError> {
        let end = offset.checked_add(data.len()).unwrap_or(usize::MAX);
        if end > self.bytes.len() {
            return Err(CoreError::new(
                CoreErrorCode::Write,
                format!(
                    "region {offset:#x}..{end:#x} lies outside the loaded image ({:#x} bytes)",
                    self.bytes.len()
                ),
            ));
        }

        self.stream
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.stream.write_all(data))
            .and_then(|_| self.stream.flush())
            .map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Write,
                    format!("failed writing {} bytes at {offset:#x}: {e}", data.len()),
                )
            })?;
        self.bytes[offset..end].copy_from_slice(data);

        trace!("wrote {} bytes at {offset:#x}", data.len());
        Ok(())
    }

    pub fn into_inner(self) -> F {
        self.stream
    }
}

impl<F> BinaryImage<F> {
    pub fn read_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
