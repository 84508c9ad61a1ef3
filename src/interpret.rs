//! Message interpreter
//!
//! Maps one complete frame to a semantic event: which channel, which
//! parameter, which value. Pure; the only context is the console's base
//! MIDI channel.

use crate::address;
use crate::framing::RawFrame;
use crate::protocol::{
    ChannelAddr, Parameter, MUTE_ON_THRESHOLD, NRPN_MSB, SYSEX_CHANNEL_NAME_REPLY, SYSEX_END,
    SYSEX_HEADER, SYSEX_START,
};
use crate::state::{ParamValue, ParameterPath};

/// Kind of message an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Note,
    ControlChange,
    ProgramChange,
    SysEx,
    Unknown,
}

/// Interpreted frame
///
/// Missing channel or parameter means the event cannot be mapped to a
/// [`ParameterPath`].
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticEvent {
    pub kind: EventKind,
    pub channel: Option<ChannelAddr>,
    pub parameter: Option<Parameter>,
    pub value: Option<ParamValue>,
}

impl SemanticEvent {
    fn unknown(kind: EventKind) -> Self {
        Self {
            kind,
            channel: None,
            parameter: None,
            value: None,
        }
    }

    /// Path this event updates, if it carries a full recognised identity
    pub fn path(&self) -> Option<ParameterPath> {
        match (self.channel, self.parameter) {
            (Some(channel), Some(parameter)) if parameter.is_recognized() => {
                Some(ParameterPath::new(channel, parameter))
            }
            _ => None,
        }
    }
}

/// Interpret a frame; `base_channel` is the console's zero-based MIDI channel
pub fn interpret(frame: &RawFrame, base_channel: u8) -> SemanticEvent {
    let status = frame.status();
    let offset = (status & 0x0F).wrapping_sub(base_channel);
    let data = frame.data();

    match status >> 4 {
        0x9 => interpret_note_on(offset, data),
        0xB => interpret_control_change(offset, data),
        0xC => SemanticEvent {
            kind: EventKind::ProgramChange,
            channel: None,
            parameter: Some(Parameter::Scene),
            value: data.first().map(|p| ParamValue::Number(u16::from(*p))),
        },
        0xF if status == SYSEX_START => interpret_sysex(frame.as_bytes(), base_channel),
        _ => SemanticEvent::unknown(EventKind::Unknown),
    }
}

fn interpret_note_on(offset: u8, data: &[u8]) -> SemanticEvent {
    let (note, velocity) = match data {
        [note, velocity, ..] => (*note, *velocity),
        _ => return SemanticEvent::unknown(EventKind::Unknown),
    };

    // velocity 0 is a note-off; only the note-on carries state
    if velocity == 0 {
        return SemanticEvent::unknown(EventKind::Unknown);
    }

    SemanticEvent {
        kind: EventKind::Note,
        channel: address::resolve(offset, note),
        parameter: Some(Parameter::Mute),
        value: Some(ParamValue::Bool(velocity >= MUTE_ON_THRESHOLD)),
    }
}

fn interpret_control_change(offset: u8, data: &[u8]) -> SemanticEvent {
    match data {
        [NRPN_MSB, channel, _, id, _, value] => SemanticEvent {
            kind: EventKind::ControlChange,
            channel: address::resolve(offset, *channel),
            parameter: Some(Parameter::from_nrpn(*id)),
            value: Some(ParamValue::Number(u16::from(*value))),
        },
        [_, value, ..] => SemanticEvent {
            kind: EventKind::ControlChange,
            channel: None,
            parameter: None,
            value: Some(ParamValue::Number(u16::from(*value))),
        },
        _ => SemanticEvent::unknown(EventKind::ControlChange),
    }
}

/// Channel name response:
/// `<header> 0N 02 CH <name...> F7`
fn interpret_sysex(bytes: &[u8], base_channel: u8) -> SemanticEvent {
    let Some(body) = bytes.strip_prefix(&SYSEX_HEADER[..]) else {
        return SemanticEvent::unknown(EventKind::SysEx);
    };

    match body {
        [midi_channel, SYSEX_CHANNEL_NAME_REPLY, number, name @ .., SYSEX_END] => {
            let offset = midi_channel.wrapping_sub(base_channel);
            SemanticEvent {
                kind: EventKind::SysEx,
                channel: address::resolve(offset, *number),
                parameter: Some(Parameter::Name),
                value: Some(ParamValue::Text(decode_name(name))),
            }
        }
        _ => SemanticEvent::unknown(EventKind::SysEx),
    }
}

fn decode_name(raw: &[u8]) -> String {
    let printable: Vec<u8> = raw.iter().copied().filter(|b| *b > 31).collect();
    String::from_utf8_lossy(&printable).trim().to_string()
}
