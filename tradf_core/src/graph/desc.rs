//! Structural graph description as read from `*.tradf.json`

use crate::error::TradfResult;
use crate::ndd::NetworkDescription;
use serde::Deserialize;
use std::path::Path;

/// Actors and channels of a TRADF graph
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDescription {
    pub actors: Vec<ActorDesc>,
    pub channels: Vec<ChannelDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorDesc {
    pub name: String,
    pub host: String,
    /// Duration literal, e.g. `"1.5ms"`
    pub wcet: String,
}

/// A channel entry
///
/// Entries without `target` weight an actor's output; entries whose `source`
/// is not an actor bind an external input.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDesc {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
    pub weight: f64,
    /// Any non-null value marks a backedge
    #[serde(rename = "hasInitialToken", default)]
    pub has_initial_token: Option<serde_json::Value>,
}

impl ChannelDesc {
    pub fn has_initial_token(&self) -> bool {
        self.has_initial_token.is_some()
    }
}

impl GraphDescription {
    pub fn from_json(json: &str) -> TradfResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> TradfResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Read a network description (`host -> host -> delay model`) from disk
pub fn load_network(path: &Path) -> TradfResult<NetworkDescription> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
