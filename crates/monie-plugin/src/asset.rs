//! Plugin assets: binary files shipped with a plugin and streamed to the
//! host during the handshake as base64 chunks.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use monie_types::AssetChunk;

use crate::error::PluginError;

/// A file from the plugin's assets directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginAsset {
    pub filename: String,
    pub data: Vec<u8>,
}

impl PluginAsset {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Split into chunks of at most `chunk_size` raw bytes. The last chunk
    /// has `end` set; an empty file yields one empty final chunk.
    pub fn chunks(&self, chunk_size: usize) -> Vec<AssetChunk> {
        let size = chunk_size.max(1);
        if self.data.is_empty() {
            return vec![AssetChunk {
                filename: self.filename.clone(),
                data: String::new(),
                end: true,
            }];
        }
        let count = self.data.len().div_ceil(size);
        self.data
            .chunks(size)
            .enumerate()
            .map(|(i, part)| AssetChunk {
                filename: self.filename.clone(),
                data: STANDARD.encode(part),
                end: i + 1 == count,
            })
            .collect()
    }
}

/// Read every regular file directly under `dir`, sorted by name.
///
/// A missing directory means the plugin ships no assets.
pub fn load_assets(dir: &Path) -> Result<Vec<PluginAsset>, PluginError> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "no assets directory");
        return Ok(Vec::new());
    }

    let mut assets = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        let data = std::fs::read(entry.path())?;
        debug!(%filename, bytes = data.len(), "loaded asset");
        assets.push(PluginAsset { filename, data });
    }
    assets.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(assets)
}
