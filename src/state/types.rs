//! Engine type definitions
//!
//! Parameter paths, cached values, and the events the engine publishes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PathError;
use crate::protocol::{ChannelAddr, ChannelType, Parameter};

/// Identifier of a consumer (button, feedback, UI element) bound to a path
pub type ConsumerId = String;

/// Key of one observable console value
///
/// String form is `<channel_type>:<index>:<parameter>` with a zero-based index,
/// e.g. `input:0:mute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterPath {
    pub channel: ChannelAddr,
    pub parameter: Parameter,
}

impl ParameterPath {
    pub fn new(channel: ChannelAddr, parameter: Parameter) -> Self {
        Self { channel, parameter }
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel.channel_type
    }

    pub fn index(&self) -> u8 {
        self.channel.index
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.parameter)
    }
}

impl FromStr for ParameterPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split(':').collect();
        let [channel_type, index, parameter] = segments[..] else {
            return Err(PathError::SegmentCount(segments.len()));
        };

        let channel_type = ChannelType::from_key(channel_type)
            .ok_or_else(|| PathError::UnknownChannelType(channel_type.to_string()))?;
        let index = index
            .parse::<u8>()
            .map_err(|_| PathError::InvalidIndex(index.to_string()))?;
        let parameter = Parameter::from_key(parameter)
            .filter(|p| Parameter::subscribable().contains(p))
            .ok_or_else(|| PathError::UnknownParameter(parameter.to_string()))?;

        Ok(Self::new(ChannelAddr::new(channel_type, index), parameter))
    }
}

impl Serialize for ParameterPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParameterPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Raw value as received from the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Switch state (mute)
    Bool(bool),
    /// 7-bit protocol value (fader, assignment, scene)
    Number(u16),
    /// Text (channel names)
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<u16> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Host-facing variable descriptor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub variable_id: String,
    pub name: String,
}

/// Notification published by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A subscribed value changed
    ValueChanged {
        path: ParameterPath,
        value: ParamValue,
        display: String,
        consumers: Vec<ConsumerId>,
    },
    /// The name of a channel with live subscriptions changed
    ChannelNameChanged { channel: ChannelAddr, name: String },
    /// The set of active variables changed
    VariablesChanged { variables: Vec<VariableDefinition> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_string_round_trip() {
        let path: ParameterPath = "stereo_aux:3:fader".parse().unwrap();
        assert_eq!(path.channel_type(), ChannelType::StereoAux);
        assert_eq!(path.index(), 3);
        assert_eq!(path.parameter, Parameter::Fader);
        assert_eq!(path.to_string(), "stereo_aux:3:fader");
    }

    #[test]
    fn test_invalid_paths() {
        assert_eq!(
            "input:0".parse::<ParameterPath>(),
            Err(PathError::SegmentCount(2))
        );
        assert_eq!(
            "desk:0:mute".parse::<ParameterPath>(),
            Err(PathError::UnknownChannelType("desk".into()))
        );
        assert_eq!(
            "input:x:mute".parse::<ParameterPath>(),
            Err(PathError::InvalidIndex("x".into()))
        );
        assert_eq!(
            "input:0:scene".parse::<ParameterPath>(),
            Err(PathError::UnknownParameter("scene".into()))
        );
    }

    #[test]
    fn test_path_serde_as_string() {
        let path: ParameterPath = "dca:2:mute".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"dca:2:mute\"");
        let back: ParameterPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_value_changed_event_json() {
        let event = EngineEvent::ValueChanged {
            path: "input:0:fader".parse().unwrap(),
            value: ParamValue::Number(100),
            display: "-3.6".into(),
            consumers: vec!["btn-1".into()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "value_changed");
        assert_eq!(json["path"], "input:0:fader");
        assert_eq!(json["value"], 100);
    }
}
