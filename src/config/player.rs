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
use std::path::{Path, PathBuf};

use config::{Config, File};
use midly::num::{u4, u7};
use serde::Deserialize;

use super::{error::ConfigError, mapping::Mapping};

const DEFAULT_CHANNEL: u8 = 1;
const DEFAULT_VELOCITY: u8 = 100;
const DEFAULT_OCTAVE: i64 = 5;

/// The configuration for the chord player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The path to the controller mapping. The built in mapping is used if omitted.
    mapping: Option<PathBuf>,
    /// The MIDI device to send notes to.
    midi_device: Option<String>,
    /// The MIDI channel, 1-16.
    #[serde(default = "default_channel")]
    channel: u8,
    /// The note on velocity.
    #[serde(default = "default_velocity")]
    velocity: u8,
    /// The octave register the instrument starts in.
    #[serde(default = "default_octave")]
    octave: i64,
}

fn default_channel() -> u8 {
    DEFAULT_CHANNEL
}

fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}

fn default_octave() -> i64 {
    DEFAULT_OCTAVE
}

impl Default for Player {
    fn default() -> Self {
        Player {
            mapping: None,
            midi_device: None,
            channel: DEFAULT_CHANNEL,
            velocity: DEFAULT_VELOCITY,
            octave: DEFAULT_OCTAVE,
        }
    }
}

impl Player {
    /// Parse a player configuration from a file. Relative mapping paths are
    /// resolved against the directory of the file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        let mut player = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?;

        if let (Some(mapping), Some(parent)) = (player.mapping.as_ref(), path.parent()) {
            if mapping.is_relative() {
                player.mapping = Some(parent.join(mapping));
            }
        }
        Ok(player)
    }

    /// Overrides the MIDI device.
    pub fn with_midi_device(mut self, midi_device: Option<String>) -> Player {
        if midi_device.is_some() {
            self.midi_device = midi_device;
        }
        self
    }

    /// Overrides the mapping path.
    pub fn with_mapping(mut self, mapping: Option<PathBuf>) -> Player {
        if mapping.is_some() {
            self.mapping = mapping;
        }
        self
    }

    /// Loads the configured mapping, or the built in one.
    pub fn mapping(&self) -> Result<Mapping, ConfigError> {
        match &self.mapping {
            Some(path) => Mapping::deserialize(path),
            None => Mapping::defaults(),
        }
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    /// The zero based MIDI channel.
    pub fn channel(&self) -> Result<u4, ConfigError> {
        self.channel
            .checked_sub(1)
            .and_then(u4::try_from)
            .ok_or_else(|| ConfigError::Invalid {
                field: "channel".to_string(),
                reason: format!("{} is not between 1 and 16", self.channel),
            })
    }

    pub fn velocity(&self) -> Result<u7, ConfigError> {
        u7::try_from(self.velocity).ok_or_else(|| ConfigError::Invalid {
            field: "velocity".to_string(),
            reason: format!("{} is greater than 127", self.velocity),
        })
    }

    pub fn octave(&self) -> i64 {
        self.octave
    }
}
