//! Association resolver (component C): expand association rules × channel
//! set into an ordered, deduplicated candidate list.
//!
//! Grounded on the teacher's `RoutingEngine::route` / `extract_model_tier`
//! (`daemon/llm_gateway/router.rs`) — a rule list walked in order, each
//! producing a recorded decision — generalized from "route one request" to
//! "expand many rules into a multi-channel candidate list".

use std::collections::HashSet;

use regex::Regex;

use crate::error::{GatewayError, Result};
use crate::model::association::ModelAssociation;
use crate::model::{Channel, ModelChannelConnection};

struct Candidate<'a> {
    channel: &'a Channel,
    request_model: String,
    channel_model: String,
}

fn candidates_for<'a>(
    assoc: &ModelAssociation,
    channels: &'a [Channel],
) -> Result<Vec<Candidate<'a>>> {
    let mut out = Vec::new();
    match assoc {
        ModelAssociation::ChannelModel { channel_id, model_id, .. } => {
            if let Some(channel) = channels
                .iter()
                .find(|c| c.is_enabled() && c.id == *channel_id && c.supports_model(model_id))
            {
                out.push(Candidate { channel, request_model: model_id.clone(), channel_model: model_id.clone() });
            }
        }
        ModelAssociation::Model { model_id, .. } => {
            for channel in channels.iter().filter(|c| c.is_enabled() && c.supports_model(model_id)) {
                out.push(Candidate { channel, request_model: model_id.clone(), channel_model: model_id.clone() });
            }
        }
        ModelAssociation::ChannelRegex { channel_id, pattern, .. } => {
            let re = Regex::new(pattern)
                .map_err(|e| GatewayError::InvalidAssociationPattern(e.to_string()))?;
            if let Some(channel) = channels.iter().find(|c| c.is_enabled() && c.id == *channel_id) {
                for model in channel.supported_models.iter().filter(|m| re.is_match(m)) {
                    out.push(Candidate { channel, request_model: model.clone(), channel_model: model.clone() });
                }
            }
        }
        ModelAssociation::Regex { pattern, .. } => {
            let re = Regex::new(pattern)
                .map_err(|e| GatewayError::InvalidAssociationPattern(e.to_string()))?;
            for channel in channels.iter().filter(|c| c.is_enabled()) {
                for model in channel.supported_models.iter().filter(|m| re.is_match(m)) {
                    out.push(Candidate { channel, request_model: model.clone(), channel_model: model.clone() });
                }
            }
        }
    }
    Ok(out)
}

fn is_excluded(assoc: &ModelAssociation, channel: &Channel) -> Result<bool> {
    for rule in assoc.exclude() {
        if rule
            .matches(channel)
            .map_err(|e| GatewayError::InvalidAssociationPattern(e.to_string()))?
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Resolves `associations` (already sorted by priority ascending) against
/// `channels` (only enabled channels are considered) into the deduplicated,
/// priority-ordered connection list (spec §4.C).
pub fn resolve(
    associations: &[ModelAssociation],
    channels: &[Channel],
) -> Result<Vec<ModelChannelConnection>> {
    let mut visited: HashSet<(i64, String)> = HashSet::new();
    let mut order: Vec<i64> = Vec::new();
    let mut by_channel: std::collections::HashMap<i64, ModelChannelConnection> = std::collections::HashMap::new();

    for assoc in associations {
        for candidate in candidates_for(assoc, channels)? {
            if is_excluded(assoc, candidate.channel)? {
                continue;
            }
            let key = (candidate.channel.id, candidate.request_model.clone());
            if visited.contains(&key) {
                continue;
            }
            visited.insert(key);

            let entry = by_channel.entry(candidate.channel.id).or_insert_with(|| {
                order.push(candidate.channel.id);
                ModelChannelConnection {
                    channel: candidate.channel.clone(),
                    priority: assoc.priority(),
                    models: Vec::new(),
                }
            });
            entry.models.push((candidate.request_model, candidate.channel_model));
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| by_channel.remove(&id))
        .filter(|c| !c.models.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::association::ExcludeAssociation;
    use crate::model::ChannelStatus;

    fn channel(id: i64, tags: &[&str]) -> Channel {
        Channel {
            id,
            name: format!("channel-{id}"),
            type_tag: "openai".into(),
            status: ChannelStatus::Enabled,
            supported_models: vec!["gpt-4".into()],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            base_url: None,
            models_list_url: None,
        }
    }

    #[test]
    fn no_two_entries_share_channel_and_request_model() {
        let channels = vec![channel(1, &[])];
        let associations = vec![
            ModelAssociation::Model { priority: 1, model_id: "gpt-4".into(), exclude: vec![] },
            ModelAssociation::ChannelModel { priority: 2, channel_id: 1, model_id: "gpt-4".into() },
        ];
        let result = resolve(&associations, &channels).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].models.len(), 1);
        assert_eq!(result[0].priority, 1);
    }

    #[test]
    fn s6_association_exclude_by_tag() {
        let channels = vec![
            channel(1, &["production"]),
            channel(2, &["backup"]),
            channel(3, &["production"]),
            channel(4, &["development"]),
        ];
        let associations = vec![ModelAssociation::Regex {
            priority: 1,
            pattern: ".*".into(),
            exclude: vec![ExcludeAssociation { channel_tags: Some(vec!["production".into()]), ..Default::default() }],
        }];
        let result = resolve(&associations, &channels).unwrap();
        let ids: Vec<i64> = result.iter().map(|c| c.channel.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn empty_connections_are_dropped() {
        let channels = vec![channel(1, &[])];
        let associations = vec![ModelAssociation::Model { priority: 1, model_id: "no-such-model".into(), exclude: vec![] }];
        let result = resolve(&associations, &channels).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let channels = vec![channel(1, &[])];
        let associations = vec![ModelAssociation::Regex { priority: 1, pattern: "(".into(), exclude: vec![] }];
        let result = resolve(&associations, &channels);
        assert!(matches!(result, Err(GatewayError::InvalidAssociationPattern(_))));
    }

    #[test]
    fn disabled_channels_are_never_candidates() {
        let mut c = channel(1, &[]);
        c.status = ChannelStatus::Disabled;
        let associations = vec![ModelAssociation::Model { priority: 1, model_id: "gpt-4".into(), exclude: vec![] }];
        let result = resolve(&associations, &[c]).unwrap();
        assert!(result.is_empty());
    }
}
