use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::detection::channel::Channel;
use crate::prelude::RecordDefect;

/// Field name the canned dashboard datasets use for the activation instant.
const LEGACY_ACTIVATION_FIELD: &str = "detectedAt";

/// One detection event with a fixed activation instant and an opaque payload.
///
/// Records are only built through validation, so `activation_time` is fixed
/// for the record's lifetime and the payload is never inspected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    id: String,
    channel: Channel,
    activation_time: i64,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl DetectionRecord {
    pub fn new(
        id: impl Into<String>,
        channel: Channel,
        activation_time: i64,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            channel,
            activation_time,
            payload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Epoch milliseconds at which the record becomes visible.
    pub fn activation_time(&self) -> i64 {
        self.activation_time
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Copy of this record activating `offset_ms` later (or earlier).
    pub(crate) fn shifted(&self, offset_ms: i64) -> Self {
        Self {
            activation_time: self.activation_time.saturating_add(offset_ms),
            ..self.clone()
        }
    }
}

/// Unvalidated record as supplied by a dataset file or a live feed.
///
/// Shape: `{ id, channel, activationTime, ...payload }`. The legacy
/// `detectedAt` field is accepted in place of `activationTime`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time: Option<Value>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RawDetection {
    /// Validates the raw record. `enclosing` is the channel implied by the
    /// surrounding document (a dataset keyed by channel), if any.
    pub fn validate(mut self, enclosing: Option<Channel>) -> Result<DetectionRecord, RecordDefect> {
        let id = parse_id(self.id.take())?;
        let channel = resolve_channel(self.channel.take(), enclosing)?;
        let activation = match self.activation_time.take() {
            Some(value) => Some(value),
            None => self.payload.remove(LEGACY_ACTIVATION_FIELD),
        };
        let activation_time = parse_activation_time(activation)?;

        Ok(DetectionRecord::new(id, channel, activation_time, self.payload))
    }
}

fn parse_id(value: Option<Value>) -> Result<String, RecordDefect> {
    match value {
        None | Some(Value::Null) => Err(RecordDefect::MissingId),
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(_) => Err(RecordDefect::MalformedId),
    }
}

fn resolve_channel(
    declared: Option<String>,
    enclosing: Option<Channel>,
) -> Result<Channel, RecordDefect> {
    match (declared, enclosing) {
        (None, None) => Err(RecordDefect::MissingChannel),
        (None, Some(expected)) => Ok(expected),
        (Some(declared), enclosing) => {
            let channel = declared
                .parse::<Channel>()
                .map_err(|_| RecordDefect::UnknownChannel(declared.clone()))?;
            match enclosing {
                Some(expected) if expected != channel => {
                    Err(RecordDefect::ChannelMismatch { declared, expected })
                }
                _ => Ok(channel),
            }
        }
    }
}

/// Accepts integer epoch milliseconds, whole-valued floats, or RFC 3339 strings.
fn parse_activation_time(value: Option<Value>) -> Result<i64, RecordDefect> {
    match value {
        None | Some(Value::Null) => Err(RecordDefect::MissingActivationTime),
        Some(Value::Number(n)) => {
            if let Some(ms) = n.as_i64() {
                Ok(ms)
            } else if let Some(ms) = n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0) {
                if ms.abs() < i64::MAX as f64 {
                    Ok(ms as i64)
                } else {
                    Err(RecordDefect::InvalidActivationTime(n.to_string()))
                }
            } else {
                Err(RecordDefect::InvalidActivationTime(n.to_string()))
            }
        }
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text.trim())
            .map(|instant| instant.timestamp_millis())
            .map_err(|err| RecordDefect::InvalidActivationTime(format!("{text}: {err}"))),
        Some(other) => Err(RecordDefect::InvalidActivationTime(other.to_string())),
    }
}
