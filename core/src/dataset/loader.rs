use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::dataset::event_dataset::EventDataset;
use crate::detection::{Channel, RawDetection};
use crate::prelude::{DatasetError, DatasetResult, RecordDefect};

impl EventDataset {
    /// Parses a dataset document.
    ///
    /// Two layouts are accepted: a flat array of records, each declaring its
    /// own channel, or an object keyed by channel name whose values are arrays
    /// of records (the channel is then implied by the key).
    pub fn from_json_str(document: &str) -> DatasetResult<Self> {
        let value: Value = serde_json::from_str(document)?;
        match value {
            Value::Array(_) => {
                let raws: Vec<RawDetection> = serde_json::from_value(value)?;
                Self::from_raw(raws)
            }
            Value::Object(groups) => {
                let mut records = Vec::new();
                let mut index = 0usize;
                for (key, group) in groups {
                    let channel = key
                        .parse::<Channel>()
                        .map_err(|_| DatasetError::invalid(index, RecordDefect::UnknownChannel(key)))?;
                    let raws: Vec<RawDetection> = serde_json::from_value(group)?;
                    for raw in raws {
                        let record = raw
                            .validate(Some(channel))
                            .map_err(|defect| DatasetError::invalid(index, defect))?;
                        records.push(record);
                        index += 1;
                    }
                }
                Self::from_records(records)
            }
            _ => Err(DatasetError::UnsupportedLayout),
        }
    }

    /// Reads and parses a dataset document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| DatasetError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}
