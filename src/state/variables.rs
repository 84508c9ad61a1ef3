//! Derived variable definitions
//!
//! One variable per subscribed path, plus one name variable per channel that
//! both had its name requested and still has a live subscription.

use std::collections::{BTreeSet, HashSet};

use super::types::{ParameterPath, VariableDefinition};
use crate::protocol::{ChannelAddr, Parameter};

/// Variable id of a path, e.g. `input_1_fader` (one-based channel number)
pub fn variable_id(path: &ParameterPath) -> String {
    format!(
        "{}_{}_{}",
        path.channel_type(),
        u16::from(path.index()) + 1,
        path.parameter
    )
}

/// Variable id of a channel's name, e.g. `input_1_name`
pub fn name_variable_id(channel: &ChannelAddr) -> String {
    variable_id(&ParameterPath::new(*channel, Parameter::Name))
}

fn channel_label(channel: &ChannelAddr) -> String {
    format!(
        "{} {}",
        channel.channel_type.label(),
        u16::from(channel.index) + 1
    )
}

/// Compute the active variable list, sorted by variable id
pub fn build_definitions<'a>(
    subscribed: impl IntoIterator<Item = &'a ParameterPath>,
    named_channels: &HashSet<ChannelAddr>,
) -> Vec<VariableDefinition> {
    let mut definitions = BTreeSet::new();

    for path in subscribed {
        definitions.insert(VariableDefinition {
            variable_id: variable_id(path),
            name: format!("{} {}", channel_label(&path.channel), path.parameter.label()),
        });

        if named_channels.contains(&path.channel) {
            definitions.insert(VariableDefinition {
                variable_id: name_variable_id(&path.channel),
                name: format!("{} Name", channel_label(&path.channel)),
            });
        }
    }

    definitions.into_iter().collect()
}
