//! Channel address resolver
//!
//! Maps a MIDI channel offset (relative to the console's base channel) and a
//! note/controller number to a console channel. The layout is a fixed,
//! ordered table of `(offset, ranges)`; offsets outside the table address
//! input channels.

use crate::protocol::{ChannelAddr, ChannelType};

/// Inclusive range of note/controller numbers mapped to one channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub first: u8,
    pub last: u8,
    pub channel_type: ChannelType,
}

impl AddressRange {
    const fn new(first: u8, last: u8, channel_type: ChannelType) -> Self {
        Self {
            first,
            last,
            channel_type,
        }
    }

    fn contains(&self, number: u8) -> bool {
        (self.first..=self.last).contains(&number)
    }
}

const INPUTS: &[AddressRange] = &[AddressRange::new(0x00, 0x7F, ChannelType::Input)];

const GROUPS: &[AddressRange] = &[
    AddressRange::new(0x00, 0x3D, ChannelType::MonoGroup),
    AddressRange::new(0x40, 0x5E, ChannelType::StereoGroup),
];

const AUXES: &[AddressRange] = &[
    AddressRange::new(0x00, 0x3D, ChannelType::MonoAux),
    AddressRange::new(0x40, 0x5E, ChannelType::StereoAux),
];

const MATRICES: &[AddressRange] = &[
    AddressRange::new(0x00, 0x3D, ChannelType::MonoMatrix),
    AddressRange::new(0x40, 0x5E, ChannelType::StereoMatrix),
];

const FX_AND_CONTROL: &[AddressRange] = &[
    AddressRange::new(0x00, 0x0F, ChannelType::MonoFxSend),
    AddressRange::new(0x10, 0x1F, ChannelType::StereoFxSend),
    AddressRange::new(0x20, 0x2F, ChannelType::FxReturn),
    AddressRange::new(0x30, 0x35, ChannelType::Main),
    AddressRange::new(0x36, 0x4D, ChannelType::Dca),
    AddressRange::new(0x4E, 0x55, ChannelType::MuteGroup),
    AddressRange::new(0x56, 0x5D, ChannelType::StereoUfxSend),
    AddressRange::new(0x5E, 0x65, ChannelType::StereoUfxReturn),
];

/// Console address layout, keyed by offset from the base MIDI channel
pub const ADDRESS_TABLE: &[(u8, &[AddressRange])] = &[
    (0, INPUTS),
    (1, GROUPS),
    (2, AUXES),
    (3, MATRICES),
    (4, FX_AND_CONTROL),
];

/// Resolve `(offset, number)` to a channel
///
/// Returns `None` when the offset is in the table but the number falls in a
/// gap between its ranges.
pub fn resolve(offset: u8, number: u8) -> Option<ChannelAddr> {
    let Some((_, ranges)) = ADDRESS_TABLE.iter().find(|(o, _)| *o == offset) else {
        return Some(ChannelAddr::new(ChannelType::Input, number));
    };

    ranges
        .iter()
        .find(|range| range.contains(number))
        .map(|range| ChannelAddr::new(range.channel_type, number - range.first))
}

/// Reverse lookup: the `(offset, number)` addressing a channel
pub fn locate(channel: ChannelAddr) -> Option<(u8, u8)> {
    ADDRESS_TABLE.iter().find_map(|(offset, ranges)| {
        ranges
            .iter()
            .find(|range| range.channel_type == channel.channel_type)
            .and_then(|range| {
                let number = range.first.checked_add(channel.index)?;
                range.contains(number).then_some((*offset, number))
            })
    })
}
