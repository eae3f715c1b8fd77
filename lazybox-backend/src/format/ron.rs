use bytes::Bytes;
use lazybox_core::{Raw, RebuildJob};

use super::{FormatError, JobFormat};

/// RON (Rusty Object Notation) format - human-readable alternative to JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct RonFormat;

impl JobFormat for RonFormat {
    fn encode(&self, job: &RebuildJob) -> Result<Raw, FormatError> {
        // RON serializes to a String, unlike JSON which writes bytes directly
        let text = ron::to_string(job).map_err(|error| FormatError::Serialize(Box::new(error)))?;
        Ok(Bytes::from(text.into_bytes()))
    }

    fn decode(&self, data: &[u8]) -> Result<RebuildJob, FormatError> {
        let text =
            std::str::from_utf8(data).map_err(|error| FormatError::Deserialize(Box::new(error)))?;
        ron::from_str(text).map_err(|error| FormatError::Deserialize(Box::new(error)))
    }
}
