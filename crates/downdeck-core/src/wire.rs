//! Wire contracts between the dashboard core and the downloader backend:
//! the paginated snapshot response, push-channel progress batches, and the
//! request payloads for the create/control/delete endpoints.

use crate::{ChunkSet, DownloadStatus, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Push frames larger than this are rejected rather than buffered.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

/// One page of the authoritative task list, as returned by the pull
/// endpoint. `total_elements` counts every task on the server, not just
/// this page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    #[serde(default)]
    pub content: Vec<Task>,
    #[serde(default)]
    pub total_elements: u64,
}

/// One element of a push batch: a partial update for an existing task.
/// Only fields the server actually sent are `Some`; everything else is left
/// untouched by the merge. `chunks`, when present, replaces the task's
/// chunk table wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, deserialize_with = "crate::deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DownloadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_range: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<ChunkSet>,
}

/// An ordered push batch. Order matters: later patches for the same id win.
pub type ProgressBatch = Vec<TaskPatch>;

/// Decode one push frame body into a progress batch.
pub fn decode_batch(body: &str, max_frame_bytes: usize) -> Result<ProgressBatch, WireError> {
    if body.len() > max_frame_bytes {
        return Err(WireError::OversizedFrame {
            size: body.len(),
            max: max_frame_bytes,
        });
    }
    serde_json::from_str(body).map_err(|err| WireError::Decode(err.to_string()))
}

/// Encode a progress batch the way the push channel delivers it.
pub fn encode_batch(batch: &ProgressBatch, max_frame_bytes: usize) -> Result<String, WireError> {
    let encoded = serde_json::to_string(batch).map_err(|err| WireError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(WireError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    Ok(encoded)
}

/// Payload for the task create endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub url: String,
    pub threads: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    pub path: String,
}

/// Verbs accepted by the task control endpoint. Fire-and-forget from the
/// core's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlAction {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "pause" => Ok(ControlAction::Pause),
            "resume" => Ok(ControlAction::Resume),
            "cancel" => Ok(ControlAction::Cancel),
            other => Err(format!("Unknown control action: {other}")),
        }
    }
}

/// Payload for the task delete endpoint. `delete_file` also removes the
/// partially downloaded file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub id: String,
    pub delete_file: bool,
}
