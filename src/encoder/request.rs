//! Encode request construction
//!
//! At the end of a session the buffered frames become a small synthetic
//! filesystem (`input001.jpg`, `input002.jpg`, ...) plus a fixed ffmpeg
//! argument vector, sent to the encoding service in one message.

use anyhow::Result;
use bytes::Bytes;
use log::info;
use serde::{Deserialize, Serialize};

use crate::assets::{ENCODE_FRAME_RATE, MANIFEST_EXTENSION, MANIFEST_PATTERN, MEMORY_BUDGET, OUTPUT_NAME};
use crate::encoder::service::{ServiceHandle, ServiceRequest};
use crate::pipeline::types::Frame;

/// One file of the synthetic filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub arguments: Vec<String>,
    #[serde(rename = "MEMFS")]
    pub manifest: Vec<ManifestEntry>,
    #[serde(rename = "TOTAL_MEMORY")]
    pub memory_budget: u64,
}

impl EncodeRequest {
    /// Sum of all payload sizes
    pub fn total_bytes(&self) -> u64 {
        self.manifest.iter().map(|e| e.data.len() as u64).sum()
    }

    pub fn frame_count(&self) -> usize {
        self.manifest.len()
    }
}

/// Name of the manifest entry at 1-based `position`.
///
/// Padded to three digits, never truncated: 1000 gives `input1000.jpg`.
pub fn manifest_name(position: usize) -> String {
    format!("input{:03}.{}", position, MANIFEST_EXTENSION)
}

pub struct EncodeRequestBuilder;

impl EncodeRequestBuilder {
    /// Fixed argument vector: read the manifest as an image sequence at the
    /// encode frame rate and write a single output file.
    pub fn arguments() -> Vec<String> {
        vec![
            "-framerate".to_string(),
            ENCODE_FRAME_RATE.to_string(),
            "-i".to_string(),
            MANIFEST_PATTERN.to_string(),
            OUTPUT_NAME.to_string(),
        ]
    }

    /// Pure: the same frames always give the same request.
    pub fn build(frames: &[Frame]) -> EncodeRequest {
        let manifest = frames
            .iter()
            .enumerate()
            .map(|(i, frame)| ManifestEntry {
                name: manifest_name(i + 1),
                data: frame.clone().into_bytes(),
            })
            .collect();

        EncodeRequest {
            arguments: Self::arguments(),
            manifest,
            memory_budget: MEMORY_BUDGET,
        }
    }

    /// Build the request and hand it to the service without waiting for
    /// the encode. Completion shows up in the service's event stream.
    pub fn dispatch(frames: &[Frame], service: &ServiceHandle) -> Result<()> {
        let request = Self::build(frames);
        info!(
            "EncodeRequestBuilder: dispatching {} frames ({} KB) to {}",
            request.frame_count(),
            request.total_bytes() / 1024,
            service.name()
        );
        service.dispatch(ServiceRequest::Run(request))
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
