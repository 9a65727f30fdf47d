use serde::{Deserialize, Serialize};

use crate::model::Channel;

/// Drops a candidate whose channel matches any field set here, OR-combined
/// within one rule (spec §4.C step 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeAssociation {
    #[serde(default)]
    pub channel_name_pattern: Option<String>,
    #[serde(default)]
    pub channel_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub channel_tags: Option<Vec<String>>,
}

impl ExcludeAssociation {
    /// Whether this rule matches `channel`. A regex compile failure is
    /// propagated rather than silently treated as a non-match.
    pub fn matches(&self, channel: &Channel) -> Result<bool, regex::Error> {
        if let Some(ids) = &self.channel_ids {
            if ids.contains(&channel.id) {
                return Ok(true);
            }
        }
        if let Some(tags) = &self.channel_tags {
            if channel.tags.iter().any(|t| tags.contains(t)) {
                return Ok(true);
            }
        }
        if let Some(pattern) = &self.channel_name_pattern {
            let re = regex::Regex::new(pattern)?;
            if re.is_match(&channel.name) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// A priority-ordered rule mapping a requested model name to a channel
/// subset plus upstream model (spec §3, wire shape in §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelAssociation {
    ChannelModel {
        priority: i64,
        channel_id: i64,
        model_id: String,
    },
    Model {
        priority: i64,
        model_id: String,
        #[serde(default)]
        exclude: Vec<ExcludeAssociation>,
    },
    ChannelRegex {
        priority: i64,
        channel_id: i64,
        pattern: String,
        #[serde(default)]
        exclude: Vec<ExcludeAssociation>,
    },
    Regex {
        priority: i64,
        pattern: String,
        #[serde(default)]
        exclude: Vec<ExcludeAssociation>,
    },
}

impl ModelAssociation {
    pub fn priority(&self) -> i64 {
        match self {
            ModelAssociation::ChannelModel { priority, .. }
            | ModelAssociation::Model { priority, .. }
            | ModelAssociation::ChannelRegex { priority, .. }
            | ModelAssociation::Regex { priority, .. } => *priority,
        }
    }

    pub fn exclude(&self) -> &[ExcludeAssociation] {
        match self {
            ModelAssociation::ChannelModel { .. } => &[],
            ModelAssociation::Model { exclude, .. }
            | ModelAssociation::ChannelRegex { exclude, .. }
            | ModelAssociation::Regex { exclude, .. } => exclude,
        }
    }
}

/// One output row of the association resolver: a channel, the priority it
/// was first reached at, and the deduplicated (requested, upstream) model
/// pairs routed to it (spec §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelChannelConnection {
    pub channel: Channel,
    pub priority: i64,
    pub models: Vec<(String, String)>,
}
