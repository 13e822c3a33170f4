use super::pool::PooledBuffer;

/// One part of a transfer, produced by the reader and consumed by exactly one
/// upload worker. The backing buffer goes back to the pool when the chunk is
/// dropped.
#[derive(Debug)]
pub struct Chunk {
    /// 0-indexed ordinal within the transfer.
    pub part_num: u32,
    /// Best-known part count when the chunk was emitted; 0 if the size is unknown.
    pub total_parts: u32,
    buffer: PooledBuffer,
}

impl Chunk {
    pub fn new(part_num: u32, total_parts: u32, buffer: PooledBuffer) -> Self {
        Self {
            part_num,
            total_parts,
            buffer,
        }
    }

    pub fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}
