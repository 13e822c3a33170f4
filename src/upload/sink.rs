use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::upload::error::UploadResult;

pub const DEFAULT_SMALL_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Which part-upload API a transfer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// Known size at or below the threshold; finalized with an MD5 checksum.
    Small,
    /// Above the threshold, or of unknown size; parts carry a total-part count.
    Big,
}

impl SizeClass {
    pub fn classify(size: Option<u64>, threshold: u64) -> Self {
        match size {
            Some(size) if size <= threshold => SizeClass::Small,
            _ => SizeClass::Big,
        }
    }
}

/// Chat-side part upload API.
///
/// Parts may arrive out of order and concurrently; implementations must
/// accept any `part` ordering for a given `file_id`.
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload_small(&self, file_id: i64, part: u32, bytes: &[u8]) -> UploadResult<()>;

    async fn upload_big(
        &self,
        file_id: i64,
        part: u32,
        total_parts: u32,
        bytes: &[u8],
    ) -> UploadResult<()>;

    fn supports(&self, _class: SizeClass) -> bool {
        true
    }
}

/// Upload one chunk through the API matching `class`.
pub async fn upload_chunk(
    sink: &dyn UploadSink,
    class: SizeClass,
    file_id: i64,
    chunk: &Chunk,
) -> UploadResult<()> {
    match class {
        SizeClass::Small => sink.upload_small(file_id, chunk.part_num, chunk.data()).await,
        SizeClass::Big => {
            sink.upload_big(file_id, chunk.part_num, chunk.total_parts, chunk.data())
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::BufferPool;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(SizeClass, u32, u32, usize)>>,
    }

    #[async_trait]
    impl UploadSink for RecordingSink {
        async fn upload_small(&self, _file_id: i64, part: u32, bytes: &[u8]) -> UploadResult<()> {
            self.calls
                .lock()
                .push((SizeClass::Small, part, 0, bytes.len()));
            Ok(())
        }

        async fn upload_big(
            &self,
            _file_id: i64,
            part: u32,
            total_parts: u32,
            bytes: &[u8],
        ) -> UploadResult<()> {
            self.calls
                .lock()
                .push((SizeClass::Big, part, total_parts, bytes.len()));
            Ok(())
        }
    }

    #[test]
    fn test_classify() {
        let threshold = DEFAULT_SMALL_FILE_THRESHOLD;
        assert_eq!(SizeClass::classify(Some(1), threshold), SizeClass::Small);
        assert_eq!(SizeClass::classify(Some(threshold), threshold), SizeClass::Small);
        assert_eq!(SizeClass::classify(Some(threshold + 1), threshold), SizeClass::Big);
        assert_eq!(SizeClass::classify(None, threshold), SizeClass::Big);
    }

    #[tokio::test]
    async fn test_upload_chunk_dispatch() {
        let sink = RecordingSink::default();
        let pool = BufferPool::new(8);
        let mut buf = pool.get();
        buf.truncate(5);
        let chunk = Chunk::new(3, 9, buf);

        upload_chunk(&sink, SizeClass::Small, 1, &chunk).await.unwrap();
        upload_chunk(&sink, SizeClass::Big, 1, &chunk).await.unwrap();

        let calls = sink.calls.lock();
        assert_eq!(calls[0], (SizeClass::Small, 3, 0, 5));
        assert_eq!(calls[1], (SizeClass::Big, 3, 9, 5));
    }
}
