/// Largest file the Bot API accepts for upload (50 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeVerdict {
    Pass,
    Reject,
}

/// Accepts artifacts up to and including `limit_bytes`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGate {
    limit_bytes: u64,
}

impl SizeGate {
    pub fn new(limit_bytes: u64) -> Self {
        Self { limit_bytes }
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    pub fn check(&self, size_bytes: u64) -> SizeVerdict {
        if size_bytes <= self.limit_bytes {
            SizeVerdict::Pass
        } else {
            SizeVerdict::Reject
        }
    }
}

impl Default for SizeGate {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES)
    }
}
