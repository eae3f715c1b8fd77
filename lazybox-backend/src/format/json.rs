use bytes::Bytes;
use lazybox_core::{Raw, RebuildJob};

use super::{FormatError, JobFormat};

/// JSON format (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JobFormat for JsonFormat {
    fn encode(&self, job: &RebuildJob) -> Result<Raw, FormatError> {
        serde_json::to_vec(job)
            .map(Bytes::from)
            .map_err(|error| FormatError::Serialize(Box::new(error)))
    }

    fn decode(&self, data: &[u8]) -> Result<RebuildJob, FormatError> {
        serde_json::from_slice(data).map_err(|error| FormatError::Deserialize(Box::new(error)))
    }
}
