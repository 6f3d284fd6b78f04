use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Whole-block access to a single backing file. Every node occupies one fixed-size block,
/// block `i` occupies bytes `[i * block_size, (i + 1) * block_size)`, and a block's byte
/// offset is its address. The file length is always a multiple of the block size and
/// doubles as the address allocator.
#[derive(Debug)]
pub struct BlockFile {
    file: File,
    block_size: usize,
}

impl BlockFile {
    /// Opens the backing file at the given path, creating it if absent.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(Self { file, block_size })
    }

    /// Current length of the backing file in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the address for a new block: the offset immediately past the last block.
    pub fn allocate(&self) -> Result<u64> {
        self.len()
    }

    /// Reads the whole block at an address. An address at or past end-of-file is
    /// `NotFound`, which read paths may recover as "no such node".
    pub fn read_block(&mut self, address: u64) -> Result<Bytes> {
        self.check_aligned(address)?;
        if address + self.block_size as u64 > self.len()? {
            return Err(Error::NotFound(format!("No block at address {}", address)));
        }
        self.file.seek(SeekFrom::Start(address))?;
        let mut block = vec![0u8; self.block_size];
        self.file.read_exact(&mut block)?;
        Ok(Bytes::from(block))
    }

    /// Writes exactly one block at an address, extending the file if the address is at or
    /// past the current length. Partial blocks are rejected.
    pub fn write_block(&mut self, address: u64, block: &[u8]) -> Result<()> {
        self.check_aligned(address)?;
        if block.len() != self.block_size {
            return Err(Error::Internal(format!(
                "Block write of {} bytes, expected {}",
                block.len(),
                self.block_size
            )));
        }
        self.file.seek(SeekFrom::Start(address))?;
        self.file.write_all(block)?;
        Ok(())
    }

    fn check_aligned(&self, address: u64) -> Result<()> {
        if address % self.block_size as u64 != 0 {
            return Err(Error::Internal(format!(
                "Address {} is not aligned to the {}-byte block size",
                address, self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod block_file_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BLOCK_SIZE: usize = 128;

    fn setup() -> (BlockFile, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let file = BlockFile::open(dir.path().join("blocks"), BLOCK_SIZE).unwrap();
        (file, dir)
    }

    fn block(byte: u8) -> Vec<u8> {
        vec![byte; BLOCK_SIZE]
    }

    #[test]
    fn open_creates_empty_file() {
        let (file, _dir) = setup();
        assert_eq!(file.len(), Ok(0));
        assert_eq!(file.is_empty(), Ok(true));
    }

    #[test]
    fn write_then_read() {
        let (mut file, _dir) = setup();
        file.write_block(0, &block(1)).unwrap();
        file.write_block(BLOCK_SIZE as u64, &block(2)).unwrap();
        assert_eq!(file.read_block(0), Ok(Bytes::from(block(1))));
        assert_eq!(file.read_block(BLOCK_SIZE as u64), Ok(Bytes::from(block(2))));
        assert_eq!(file.len(), Ok(2 * BLOCK_SIZE as u64));
    }

    #[test]
    fn read_past_end_is_not_found() {
        let (mut file, _dir) = setup();
        assert!(matches!(file.read_block(0), Err(Error::NotFound(_))));
        file.write_block(0, &block(1)).unwrap();
        assert!(matches!(file.read_block(BLOCK_SIZE as u64), Err(Error::NotFound(_))));
    }

    #[test]
    fn allocate_returns_file_length() {
        let (mut file, _dir) = setup();
        assert_eq!(file.allocate(), Ok(0));
        file.write_block(0, &block(1)).unwrap();
        assert_eq!(file.allocate(), Ok(BLOCK_SIZE as u64));
        file.write_block(BLOCK_SIZE as u64, &block(2)).unwrap();
        assert_eq!(file.allocate(), Ok(2 * BLOCK_SIZE as u64));
    }

    #[test]
    fn overwrite_does_not_extend() {
        let (mut file, _dir) = setup();
        file.write_block(0, &block(1)).unwrap();
        file.write_block(0, &block(9)).unwrap();
        assert_eq!(file.len(), Ok(BLOCK_SIZE as u64));
        assert_eq!(file.read_block(0), Ok(Bytes::from(block(9))));
    }

    #[test]
    fn rejects_partial_blocks_and_misaligned_addresses() {
        let (mut file, _dir) = setup();
        assert!(matches!(file.write_block(0, &[0u8; 7]), Err(Error::Internal(_))));
        assert!(matches!(file.write_block(17, &block(0)), Err(Error::Internal(_))));
        assert!(matches!(file.read_block(17), Err(Error::Internal(_))));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks");
        {
            let mut file = BlockFile::open(&path, BLOCK_SIZE).unwrap();
            file.write_block(0, &block(3)).unwrap();
        }
        let mut file = BlockFile::open(&path, BLOCK_SIZE).unwrap();
        assert_eq!(file.read_block(0), Ok(Bytes::from(block(3))));
    }
}
