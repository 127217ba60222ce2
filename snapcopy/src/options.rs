use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 4;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_SPARSE_THRESHOLD: u64 = 4096;

/// Tuning of a single copy operation.
///
/// Every field is optional in the serialized form. Durations are
/// expressed in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CopyOptions {
    /// Bytes requested per `get_chunk` call
    pub chunk_size: u32,
    /// Retries of a failing request before the copy is aborted
    pub max_retries_per_chunk: u32,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Files pulled in parallel within one copy
    pub max_concurrent_file_transfers: usize,
    #[serde(with = "millis")]
    pub retry_interval: Duration,
    /// Shortest zero run that is turned into a hole
    pub sparse_threshold: u64,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries_per_chunk: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_file_transfers: DEFAULT_MAX_CONCURRENT_FILES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            sparse_threshold: DEFAULT_SPARSE_THRESHOLD,
        }
    }
}

impl CopyOptions {
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_retries_per_chunk(mut self, retries: u32) -> Self {
        self.max_retries_per_chunk = retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_file_transfers(mut self, max: usize) -> Self {
        self.max_concurrent_file_transfers = max;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_sparse_threshold(mut self, threshold: u64) -> Self {
        self.sparse_threshold = threshold;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            crate::options_bail!("chunk size must not be zero");
        }
        if self.max_concurrent_file_transfers == 0 {
            crate::options_bail!("at least one concurrent file transfer is needed");
        }
        if self.sparse_threshold == 0 {
            crate::options_bail!("sparse threshold must not be zero");
        }
        if self.request_timeout.is_zero() {
            crate::options_bail!("request timeout must not be zero");
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
