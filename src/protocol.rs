//! Console wire constants and channel/parameter types
//!
//! Defines the closed set of channel types exposed by the console, the
//! logical parameters this crate understands, and the fixed bytes of the
//! MIDI-derived control protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default TCP port of the console's MIDI-over-TCP service
pub const DEFAULT_TCP_PORT: u16 = 51325;

/// SysEx start byte
pub const SYSEX_START: u8 = 0xF0;
/// SysEx terminator
pub const SYSEX_END: u8 = 0xF7;

/// Fixed header of every console SysEx message (manufacturer id, model, version)
pub const SYSEX_HEADER: [u8; 8] = [0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00];

/// SysEx command byte for a channel name response
pub const SYSEX_CHANNEL_NAME_REPLY: u8 = 0x02;

/// Controller number carrying the extended-parameter MSB (channel number)
pub const NRPN_MSB: u8 = 0x63;
/// Controller number carrying the extended-parameter LSB (parameter id)
pub const NRPN_LSB: u8 = 0x62;
/// Data entry controller carrying the extended-parameter value
pub const NRPN_DATA_ENTRY: u8 = 0x06;

/// Extended-parameter id of the fader level
pub const NRPN_FADER: u8 = 0x17;
/// Extended-parameter id of the main mix assignment
pub const NRPN_MAIN_ASSIGNMENT: u8 = 0x18;

/// Velocity threshold at and above which a mute note-on means "muted"
pub const MUTE_ON_THRESHOLD: u8 = 0x40;

/// Channel types exposed by the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Input,
    MonoGroup,
    StereoGroup,
    MonoAux,
    StereoAux,
    MonoMatrix,
    StereoMatrix,
    MonoFxSend,
    StereoFxSend,
    FxReturn,
    Main,
    Dca,
    MuteGroup,
    StereoUfxSend,
    StereoUfxReturn,
}

impl ChannelType {
    /// All channel types, in address-table order
    pub fn all() -> &'static [ChannelType] {
        &[
            ChannelType::Input,
            ChannelType::MonoGroup,
            ChannelType::StereoGroup,
            ChannelType::MonoAux,
            ChannelType::StereoAux,
            ChannelType::MonoMatrix,
            ChannelType::StereoMatrix,
            ChannelType::MonoFxSend,
            ChannelType::StereoFxSend,
            ChannelType::FxReturn,
            ChannelType::Main,
            ChannelType::Dca,
            ChannelType::MuteGroup,
            ChannelType::StereoUfxSend,
            ChannelType::StereoUfxReturn,
        ]
    }

    /// Parse from the snake_case key used in parameter paths
    pub fn from_key(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }

    /// Key used in parameter paths and variable ids
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Input => "input",
            ChannelType::MonoGroup => "mono_group",
            ChannelType::StereoGroup => "stereo_group",
            ChannelType::MonoAux => "mono_aux",
            ChannelType::StereoAux => "stereo_aux",
            ChannelType::MonoMatrix => "mono_matrix",
            ChannelType::StereoMatrix => "stereo_matrix",
            ChannelType::MonoFxSend => "mono_fx_send",
            ChannelType::StereoFxSend => "stereo_fx_send",
            ChannelType::FxReturn => "fx_return",
            ChannelType::Main => "main",
            ChannelType::Dca => "dca",
            ChannelType::MuteGroup => "mute_group",
            ChannelType::StereoUfxSend => "stereo_ufx_send",
            ChannelType::StereoUfxReturn => "stereo_ufx_return",
        }
    }

    /// Human readable label for variable definitions
    pub fn label(&self) -> &'static str {
        match self {
            ChannelType::Input => "Input",
            ChannelType::MonoGroup => "Mono Group",
            ChannelType::StereoGroup => "Stereo Group",
            ChannelType::MonoAux => "Mono Aux",
            ChannelType::StereoAux => "Stereo Aux",
            ChannelType::MonoMatrix => "Mono Matrix",
            ChannelType::StereoMatrix => "Stereo Matrix",
            ChannelType::MonoFxSend => "Mono FX Send",
            ChannelType::StereoFxSend => "Stereo FX Send",
            ChannelType::FxReturn => "FX Return",
            ChannelType::Main => "Main",
            ChannelType::Dca => "DCA",
            ChannelType::MuteGroup => "Mute Group",
            ChannelType::StereoUfxSend => "Stereo UFX Send",
            ChannelType::StereoUfxReturn => "Stereo UFX Return",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One console channel: type plus zero-based index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelAddr {
    pub channel_type: ChannelType,
    pub index: u8,
}

impl ChannelAddr {
    pub fn new(channel_type: ChannelType, index: u8) -> Self {
        Self {
            channel_type,
            index,
        }
    }
}

impl fmt::Display for ChannelAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_type, self.index)
    }
}

/// Logical parameter carried by an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Mute,
    Fader,
    MainAssignment,
    Scene,
    Name,
    /// Extended parameter id with no known meaning; never part of a path
    Unrecognized(u8),
}

impl Parameter {
    /// Parameters that may appear in a parameter path
    pub fn subscribable() -> &'static [Parameter] {
        &[
            Parameter::Mute,
            Parameter::Fader,
            Parameter::MainAssignment,
            Parameter::Name,
        ]
    }

    /// Map an extended-parameter id to its parameter
    pub fn from_nrpn(id: u8) -> Self {
        match id {
            NRPN_FADER => Parameter::Fader,
            NRPN_MAIN_ASSIGNMENT => Parameter::MainAssignment,
            other => Parameter::Unrecognized(other),
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "mute" => Some(Parameter::Mute),
            "fader" => Some(Parameter::Fader),
            "main_assignment" => Some(Parameter::MainAssignment),
            "scene" => Some(Parameter::Scene),
            "name" => Some(Parameter::Name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Mute => "mute",
            Parameter::Fader => "fader",
            Parameter::MainAssignment => "main_assignment",
            Parameter::Scene => "scene",
            Parameter::Name => "name",
            Parameter::Unrecognized(_) => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Parameter::Mute => "Mute",
            Parameter::Fader => "Fader",
            Parameter::MainAssignment => "Main Assignment",
            Parameter::Scene => "Scene",
            Parameter::Name => "Name",
            Parameter::Unrecognized(_) => "Unknown",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Parameter::Unrecognized(_))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
