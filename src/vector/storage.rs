//! Append-only memory-mapped vector file.
//!
//! Layout:
//! ```text
//! [magic "DSVEC001": 8][dimension: u32 LE][reserved: u32]
//! [slot: u32 LE][f32 LE * dimension]   <- repeated, one record per slot
//! ```
//! The slot count is derived from the file length. A trailing partial
//! record (interrupted write) is cut off on open.

use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::types::{VectorDimension, VectorError};

const MAGIC: &[u8; 8] = b"DSVEC001";
const HEADER_SIZE: usize = 16;

pub struct MmapVectorStorage {
    path: PathBuf,
    file: File,
    mmap: Option<Mmap>,
    dimension: VectorDimension,
    count: usize,
}

impl std::fmt::Debug for MmapVectorStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapVectorStorage")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .field("count", &self.count)
            .finish()
    }
}

impl MmapVectorStorage {
    /// Open an existing vector file or create an empty one.
    ///
    /// An existing file with a different dimension is rejected.
    pub fn open_or_create(
        path: impl AsRef<Path>,
        dimension: VectorDimension,
    ) -> Result<Self, VectorError> {
        let path = path.as_ref();
        let exists = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        if exists {
            let storage = Self::open(path)?;
            if storage.dimension != dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: dimension.get(),
                    actual: storage.dimension.get(),
                });
            }
            return Ok(storage);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = Self::open_file(path)?;
        file.set_len(0)?;

        let mut header = [0u8; HEADER_SIZE];
        header[..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&(dimension.get() as u32).to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap: None,
            dimension,
            count: 0,
        })
    }

    /// Open an existing vector file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();
        let mut file = Self::open_file(path)?;

        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)
            .map_err(|_| VectorError::Corrupt(format!("{} has no header", path.display())))?;
        if &header[..8] != MAGIC {
            return Err(VectorError::Corrupt(format!(
                "{} is not a vector file",
                path.display()
            )));
        }
        let raw_dimension = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        let dimension = VectorDimension::new(raw_dimension as usize)?;

        let record_size = Self::record_size_for(dimension);
        let body_len = file.metadata()?.len() as usize - HEADER_SIZE;
        let count = body_len / record_size;
        if body_len % record_size != 0 {
            tracing::warn!(
                target: "store",
                "[store] dropping partial vector record at end of {}",
                path.display()
            );
            file.set_len((HEADER_SIZE + count * record_size) as u64)?;
        }

        let mut storage = Self {
            path: path.to_path_buf(),
            file,
            mmap: None,
            dimension,
            count,
        };
        storage.remap()?;
        Ok(storage)
    }

    fn open_file(path: &Path) -> std::io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
    }

    fn record_size_for(dimension: VectorDimension) -> usize {
        4 + 4 * dimension.get()
    }

    fn record_size(&self) -> usize {
        Self::record_size_for(self.dimension)
    }

    fn remap(&mut self) -> Result<(), VectorError> {
        self.mmap = None;
        if self.count > 0 {
            // SAFETY: the file is only written through this handle, and the map is
            // dropped before every truncation.
            self.mmap = Some(unsafe { Mmap::map(&self.file)? });
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Number of stored slots.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append vectors to fresh slots and sync them to disk.
    ///
    /// Either every vector is written or none is: dimensions are validated
    /// before the file is touched.
    pub fn append_batch(&mut self, vectors: &[Vec<f32>]) -> Result<Range<u32>, VectorError> {
        for vector in vectors {
            self.dimension.validate_vector(vector)?;
        }

        let first = self.count;
        let end = first + vectors.len();
        if u32::try_from(end).is_err() {
            return Err(VectorError::Corrupt("slot space exhausted".to_string()));
        }

        let mut buffer = Vec::with_capacity(vectors.len() * self.record_size());
        for (i, vector) in vectors.iter().enumerate() {
            buffer.extend_from_slice(&((first + i) as u32).to_le_bytes());
            for value in vector {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }

        let offset = (HEADER_SIZE + first * self.record_size()) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buffer)?;
        self.file.sync_data()?;

        self.count = end;
        self.remap()?;
        Ok(first as u32..end as u32)
    }

    /// Read the vector stored in `slot`.
    pub fn read_vector(&self, slot: u32) -> Option<Vec<f32>> {
        let slot_idx = slot as usize;
        if slot_idx >= self.count {
            return None;
        }
        let mmap = self.mmap.as_ref()?;
        let start = HEADER_SIZE + slot_idx * self.record_size();
        let record = mmap.get(start..start + self.record_size())?;

        let stored_slot = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        if stored_slot != slot {
            tracing::warn!(
                target: "store",
                "[store] slot {slot} holds record for slot {stored_slot}"
            );
            return None;
        }

        Some(
            record[4..]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// Drop every slot at or after `slots`.
    pub fn truncate_to(&mut self, slots: usize) -> Result<(), VectorError> {
        if slots >= self.count {
            return Ok(());
        }
        self.mmap = None;
        self.file
            .set_len((HEADER_SIZE + slots * self.record_size()) as u64)?;
        self.file.sync_all()?;
        self.count = slots;
        self.remap()
    }

    /// Remove all vectors, keeping the header.
    pub fn clear(&mut self) -> Result<(), VectorError> {
        self.truncate_to(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dim(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage =
            MmapVectorStorage::open_or_create(temp_dir.path().join("vectors.bin"), dim(3)).unwrap();
        assert!(storage.is_empty());

        let slots = storage
            .append_batch(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .unwrap();
        assert_eq!(slots, 0..2);
        let more = storage.append_batch(&[vec![7.0, 8.0, 9.0]]).unwrap();
        assert_eq!(more, 2..3);

        assert_eq!(storage.len(), 3);
        assert_eq!(storage.read_vector(1), Some(vec![4.0, 5.0, 6.0]));
        assert_eq!(storage.read_vector(2), Some(vec![7.0, 8.0, 9.0]));
        assert_eq!(storage.read_vector(3), None);
    }

    #[test]
    fn test_wrong_dimension_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage =
            MmapVectorStorage::open_or_create(temp_dir.path().join("vectors.bin"), dim(2)).unwrap();
        let result = storage.append_batch(&[vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(
            result,
            Err(VectorError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(storage.len(), 0);
    }

    #[test]
    fn test_persistence_and_truncate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.bin");
        {
            let mut storage = MmapVectorStorage::open_or_create(&path, dim(2)).unwrap();
            storage
                .append_batch(&[vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]])
                .unwrap();
        }

        let mut storage = MmapVectorStorage::open(&path).unwrap();
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.dimension().get(), 2);

        storage.truncate_to(1).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.read_vector(1), None);
        assert_eq!(storage.read_vector(0), Some(vec![1.0, 1.0]));

        // Appends continue from the truncated end
        assert_eq!(storage.append_batch(&[vec![9.0, 9.0]]).unwrap(), 1..2);

        storage.clear().unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.bin");
        MmapVectorStorage::open_or_create(&path, dim(4)).unwrap();
        assert!(matches!(
            MmapVectorStorage::open_or_create(&path, dim(8)),
            Err(VectorError::DimensionMismatch { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn test_partial_record_is_dropped_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.bin");
        {
            let mut storage = MmapVectorStorage::open_or_create(&path, dim(2)).unwrap();
            storage.append_batch(&[vec![1.0, 2.0]]).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        drop(file);

        let storage = MmapVectorStorage::open(&path).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.read_vector(0), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.bin");
        std::fs::write(&path, b"definitely not vectors").unwrap();
        assert!(matches!(
            MmapVectorStorage::open(&path),
            Err(VectorError::Corrupt(_))
        ));
    }
}
