//! Startup handshake.
//!
//! Before reading any request the server announces what the plugin
//! provides: the manifest, one declaration frame per provider, the asset
//! files in chunks, then `end`.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use monie_plugin::PluginRegistry;
use monie_types::{OutboundEvent, StreamFrame};

use crate::codec::FrameWriter;
use crate::error::Result;

/// Builds the handshake frames for a loaded registry.
pub struct Handshake<'a> {
    registry: &'a PluginRegistry,
    chunk_size: usize,
}

impl<'a> Handshake<'a> {
    pub fn new(registry: &'a PluginRegistry, chunk_size: usize) -> Self {
        Self {
            registry,
            chunk_size,
        }
    }

    /// Every handshake frame, in wire order.
    pub fn frames(&self) -> Result<Vec<StreamFrame>> {
        let definition = self.registry.definition();
        let mut frames = vec![declaration(
            OutboundEvent::ManifestDeclaration,
            &definition.manifest,
        )?];

        for provider in &definition.tool_providers {
            frames.push(declaration(OutboundEvent::ToolDeclaration, provider)?);
        }
        for provider in &definition.model_providers {
            frames.push(declaration(OutboundEvent::ModelDeclaration, provider)?);
        }
        for provider in &definition.endpoint_providers {
            frames.push(declaration(OutboundEvent::EndpointDeclaration, provider)?);
        }
        for provider in &definition.agent_strategy_providers {
            frames.push(declaration(OutboundEvent::AgentStrategyDeclaration, provider)?);
        }

        for asset in self.registry.assets() {
            for chunk in asset.chunks(self.chunk_size) {
                frames.push(StreamFrame::asset_chunk(&chunk)?);
            }
        }

        frames.push(StreamFrame::end());
        Ok(frames)
    }

    /// Write the handshake. Returns the number of frames sent.
    pub async fn send(&self, writer: &FrameWriter) -> Result<usize> {
        let frames = self.frames()?;
        for frame in &frames {
            writer.put(frame).await?;
        }
        debug!(frames = frames.len(), "handshake frames written");
        info!(
            plugin = %self.registry.manifest().name,
            version = %self.registry.manifest().version,
            assets = self.registry.assets().len(),
            "plugin declared"
        );
        Ok(frames.len())
    }
}

fn declaration<T: Serialize>(event: OutboundEvent, data: &T) -> Result<StreamFrame> {
    let data: Value = serde_json::to_value(data)?;
    Ok(StreamFrame::declaration(event, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use monie_plugin::{
        EndpointProviderDeclaration, PluginAsset, PluginDefinition, PluginManifest,
        StaticModuleResolver,
    };

    fn registry(assets: Vec<PluginAsset>) -> PluginRegistry {
        let mut definition = PluginDefinition::new(PluginManifest {
            name: "handshake".into(),
            version: "1.0.0".into(),
            author: String::new(),
            label: Default::default(),
            description: Default::default(),
            icon: None,
            tags: vec![],
        });
        definition
            .endpoint_providers
            .push(EndpointProviderDeclaration {
                settings: vec![],
                endpoints: vec![],
            });
        PluginRegistry::load(definition, &StaticModuleResolver::new())
            .unwrap()
            .with_assets(assets)
    }

    #[test]
    fn frames_are_ordered_and_end() {
        let reg = registry(vec![
            PluginAsset::new("a.bin", vec![1u8; 5]),
            PluginAsset::new("b.txt", Vec::new()),
        ]);
        let frames = Handshake::new(&reg, 2).frames().unwrap();
        let events: Vec<OutboundEvent> = frames.iter().map(|f| f.event).collect();
        assert_eq!(
            events,
            vec![
                OutboundEvent::ManifestDeclaration,
                OutboundEvent::EndpointDeclaration,
                OutboundEvent::AssetChunk,
                OutboundEvent::AssetChunk,
                OutboundEvent::AssetChunk,
                OutboundEvent::AssetChunk,
                OutboundEvent::End,
            ]
        );
        assert!(frames.iter().all(|f| f.event.is_handshake()));
        assert_eq!(frames[0].data.as_ref().unwrap()["name"], "handshake");

        let ends: Vec<bool> = frames[2..6]
            .iter()
            .map(|f| f.data.as_ref().unwrap()["end"].as_bool().unwrap())
            .collect();
        assert_eq!(ends, vec![false, false, true, true]);
    }

    #[tokio::test]
    async fn send_writes_every_frame() {
        use tokio::io::AsyncReadExt;

        let reg = registry(vec![]);
        let (client, mut server) = tokio::io::duplex(4096);
        let writer = FrameWriter::new(client);
        let sent = Handshake::new(&reg, 1024).send(&writer).await.unwrap();
        writer.close().await.unwrap();

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert_eq!(sent, 3);
        assert_eq!(out.lines().count(), 3);
        assert_eq!(out.lines().last(), Some(r#"{"event":"end"}"#));
    }
}
