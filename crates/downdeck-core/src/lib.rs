use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub mod wire;

/// Sentinel total size for tasks whose content length is not yet known.
pub const UNKNOWN_SIZE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    Idle,
    Preparing,
    Downloading,
    Paused,
    Canceled,
    Finished,
    Error,
    /// The server's status set is open; anything unrecognized is carried
    /// through verbatim instead of failing the whole task decode.
    Other(String),
}

impl DownloadStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DownloadStatus::Idle => "IDLE",
            DownloadStatus::Preparing => "PREPARING",
            DownloadStatus::Downloading => "DOWNLOADING",
            DownloadStatus::Paused => "PAUSED",
            DownloadStatus::Canceled => "CANCELED",
            DownloadStatus::Finished => "FINISHED",
            DownloadStatus::Error => "ERROR",
            DownloadStatus::Other(raw) => raw,
        }
    }

    /// Terminal states cannot transition further without a new request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Finished | DownloadStatus::Canceled | DownloadStatus::Error
        )
    }

    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_uppercase();
        match normalized.as_str() {
            "IDLE" => DownloadStatus::Idle,
            "PREPARING" => DownloadStatus::Preparing,
            "DOWNLOADING" => DownloadStatus::Downloading,
            "PAUSED" => DownloadStatus::Paused,
            "CANCELED" | "CANCELLED" => DownloadStatus::Canceled,
            "FINISHED" => DownloadStatus::Finished,
            "ERROR" => DownloadStatus::Error,
            _ => DownloadStatus::Other(normalized),
        }
    }
}

impl Default for DownloadStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = std::convert::Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(input))
    }
}

impl Serialize for DownloadStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DownloadStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(DownloadStatus::parse(&raw))
    }
}

/// One worker's assigned byte range within a task, plus its progress cursor.
///
/// `start..=end` are inclusive byte offsets; `current` is the next byte the
/// worker will write, so `start <= current <= end + 1` in the well-formed
/// case. Ranges from a confused server may overlap; consumers must tolerate
/// that (see the grid engine's tie-break rules).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ChunkWire")]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub start: u64,
    pub end: u64,
    pub current: u64,
    pub speed: u64,
    pub finished: bool,
    pub color_index: u32,
}

/// Raw wire shape for [`Chunk`]. Upstream encodings of the progress cursor
/// vary: current builds emit `current` as a plain number, older ones emit
/// `currentPos`, and some serializers wrap concurrently-mutated counters in
/// a `{"value": n}` object. All of that is funneled through
/// [`normalize_cursor`] so the rest of the crate only ever sees a `u64`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    start: Option<Value>,
    #[serde(default)]
    end: Option<Value>,
    #[serde(default)]
    current: Option<Value>,
    #[serde(default)]
    current_pos: Option<Value>,
    #[serde(default)]
    speed: Option<Value>,
    #[serde(default)]
    finished: Option<bool>,
    #[serde(default)]
    color_index: Option<Value>,
}

impl From<ChunkWire> for Chunk {
    fn from(wire: ChunkWire) -> Self {
        Chunk {
            id: wire.id,
            start: wire.start.as_ref().and_then(coerce_offset).unwrap_or(0),
            end: wire.end.as_ref().and_then(coerce_offset).unwrap_or(0),
            current: normalize_cursor(wire.current.as_ref(), wire.current_pos.as_ref()),
            speed: wire.speed.as_ref().and_then(coerce_offset).unwrap_or(0),
            finished: wire.finished.unwrap_or(false),
            color_index: wire
                .color_index
                .as_ref()
                .and_then(coerce_offset)
                .unwrap_or(0) as u32,
        }
    }
}

/// Compatibility shim, not a core rule: coerce whatever shape the server
/// reported for a progress cursor into a non-negative integer. A plain
/// number wins; otherwise the legacy `currentPos` field; otherwise any
/// coercible form of `current`; otherwise 0.
fn normalize_cursor(current: Option<&Value>, legacy: Option<&Value>) -> u64 {
    if let Some(value @ Value::Number(_)) = current {
        if let Some(offset) = coerce_offset(value) {
            return offset;
        }
    }
    legacy
        .and_then(coerce_offset)
        .or_else(|| current.and_then(coerce_offset))
        .unwrap_or(0)
}

fn coerce_offset(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                Some(unsigned)
            } else if let Some(signed) = number.as_i64() {
                (signed >= 0).then_some(signed as u64)
            } else {
                number
                    .as_f64()
                    .filter(|float| float.is_finite() && *float >= 0.0)
                    .map(|float| float.floor() as u64)
            }
        }
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        Value::Object(map) => map.get("value").and_then(coerce_offset),
        _ => None,
    }
}

/// Ordered set of worker chunks. The server reports this either as a JSON
/// array or as a `{"0": {...}, "1": {...}}` map keyed by worker index; map
/// entries are ordered by numeric key.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChunkSet(pub Vec<Chunk>);

impl ChunkSet {
    pub fn as_slice(&self) -> &[Chunk] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Deref for ChunkSet {
    type Target = [Chunk];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Chunk>> for ChunkSet {
    fn from(chunks: Vec<Chunk>) -> Self {
        Self(chunks)
    }
}

impl<'de> Deserialize<'de> for ChunkSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Array(items) => {
                let mut chunks = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_null() {
                        continue;
                    }
                    chunks.push(
                        serde_json::from_value::<Chunk>(item).map_err(serde::de::Error::custom)?,
                    );
                }
                Ok(ChunkSet(chunks))
            }
            Value::Object(map) => {
                let mut keyed: Vec<(u64, Chunk)> = Vec::with_capacity(map.len());
                for (position, (key, item)) in map.into_iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    let order = key.trim().parse::<u64>().unwrap_or(position as u64);
                    keyed.push((
                        order,
                        serde_json::from_value::<Chunk>(item).map_err(serde::de::Error::custom)?,
                    ));
                }
                keyed.sort_by_key(|(order, _)| *order);
                Ok(ChunkSet(keyed.into_iter().map(|(_, chunk)| chunk).collect()))
            }
            Value::Null => Ok(ChunkSet::default()),
            other => Err(serde::de::Error::custom(format!(
                "expected array or map of chunks, got {other}"
            ))),
        }
    }
}

/// One download task as the server reports it.
///
/// `id` is immutable for the task's lifetime and is the sole merge key.
/// Unrecognized fields are kept in `extra` so newer servers do not break
/// older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: DownloadStatus,
    #[serde(default = "unknown_size")]
    pub total_size: i64,
    #[serde(default)]
    pub downloaded: u64,
    #[serde(default)]
    pub speed: u64,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub support_range: bool,
    #[serde(default)]
    pub chunks: Option<ChunkSet>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl Task {
    pub fn chunk_slice(&self) -> &[Chunk] {
        self.chunks.as_ref().map(ChunkSet::as_slice).unwrap_or(&[])
    }
}

fn unknown_size() -> i64 {
    UNKNOWN_SIZE
}

/// Deserialize an id that can be either a string or a number into a String.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(raw) => Ok(raw),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(serde::de::Error::custom("expected string or number for id")),
    }
}
