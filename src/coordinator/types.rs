use serde::Serialize;

use crate::upload::SizeClass;

/// Everything the upstream needs to finalize a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub transfer_id: String,
    pub file_id: i64,
    /// Actual number of parts uploaded.
    pub parts: u32,
    pub size_class: SizeClass,
    #[serde(skip)]
    pub checksum: Option<[u8; 16]>,
    /// Bytes relayed.
    pub total_size: u64,
}

impl TransferOutcome {
    pub fn md5_hex(&self) -> Option<String> {
        self.checksum.map(hex::encode)
    }
}
