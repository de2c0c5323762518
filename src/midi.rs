// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{collections::BTreeSet, error::Error, fmt, sync::Arc};

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use tracing::warn;

mod midir;
mod mock;

/// The controller number of the "all notes off" channel mode message.
const ALL_NOTES_OFF: u8 = 123;

/// A MIDI device that notes are sent to.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Emits the given events, in order.
    fn emit(&self, events: &[LiveEvent<'static>]) -> Result<(), Box<dyn Error>>;
}

/// The notes to stop and start to move from one set of sounding notes to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteChanges {
    off: Vec<i32>,
    on: Vec<i32>,
}

impl NoteChanges {
    /// Computes the changes needed to go from `before` to `after`. Notes in both
    /// keep sounding.
    pub fn between(before: &BTreeSet<i32>, after: &BTreeSet<i32>) -> NoteChanges {
        NoteChanges {
            off: before.difference(after).copied().collect(),
            on: after.difference(before).copied().collect(),
        }
    }

    /// Notes to stop, lowest first.
    pub fn off(&self) -> &[i32] {
        &self.off
    }

    /// Notes to start, lowest first.
    pub fn on(&self) -> &[i32] {
        &self.on
    }

    pub fn is_empty(&self) -> bool {
        self.off.is_empty() && self.on.is_empty()
    }

    /// Renders the changes as MIDI messages, note offs first. Pitches outside of
    /// the MIDI range are dropped.
    pub fn to_midi_events(&self, channel: u4, velocity: u7) -> Vec<LiveEvent<'static>> {
        let offs = self.off.iter().filter_map(|pitch| {
            key(*pitch).map(|key| LiveEvent::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::from(0),
                },
            })
        });
        let ons = self.on.iter().filter_map(|pitch| {
            key(*pitch).map(|key| LiveEvent::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel: velocity },
            })
        });
        offs.chain(ons).collect()
    }
}

fn key(pitch: i32) -> Option<u7> {
    let key = u8::try_from(pitch).ok().and_then(u7::try_from);
    if key.is_none() {
        warn!(pitch, "Pitch is outside of the MIDI range, skipping.");
    }
    key
}

/// The message that silences every note on the channel.
pub fn all_notes_off(channel: u4) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel,
        message: MidiMessage::Controller {
            controller: u7::from(ALL_NOTES_OFF),
            value: u7::from(0),
        },
    }
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}

#[cfg(test)]
pub mod test {
    use std::collections::BTreeSet;

    use midly::{
        live::LiveEvent,
        num::{u4, u7},
        MidiMessage,
    };

    pub use super::mock::Device;
    use super::NoteChanges;

    fn set(pitches: &[i32]) -> BTreeSet<i32> {
        pitches.iter().copied().collect()
    }

    #[test]
    fn test_note_changes() {
        let changes = NoteChanges::between(&set(&[60, 64, 67]), &set(&[60, 63, 67]));
        assert_eq!(&[64], changes.off());
        assert_eq!(&[63], changes.on());
        assert!(!changes.is_empty());

        assert!(NoteChanges::between(&set(&[60]), &set(&[60])).is_empty());

        let changes = NoteChanges::between(&set(&[]), &set(&[72, 76, 79]));
        assert!(changes.off().is_empty());
        assert_eq!(&[72, 76, 79], changes.on());
    }

    #[test]
    fn test_to_midi_events() {
        let changes = NoteChanges::between(&set(&[60, 200]), &set(&[-3, 62]));
        let events = changes.to_midi_events(u4::from(2), u7::from(90));
        assert_eq!(
            vec![
                LiveEvent::Midi {
                    channel: u4::from(2),
                    message: MidiMessage::NoteOff {
                        key: u7::from(60),
                        vel: u7::from(0),
                    },
                },
                LiveEvent::Midi {
                    channel: u4::from(2),
                    message: MidiMessage::NoteOn {
                        key: u7::from(62),
                        vel: u7::from(90),
                    },
                },
            ],
            events
        );
    }

    #[test]
    fn test_get_mock_device() {
        let device = super::get_device("mock-device").unwrap();
        assert_eq!("mock-device", device.name());
        assert_eq!("mock-device (Mock)", device.to_string());
    }
}
