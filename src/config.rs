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
use std::{error::Error, path::PathBuf, sync::Arc};

use tracing::info;

use crate::{chord_controller::ChordController, controller::Output, instrument::Instrument};

pub mod error;
pub mod mapping;
pub mod player;

pub use error::ConfigError;
pub use mapping::Mapping;
pub use player::Player;

/// Initializes the chord controller and the runtime controller from the given
/// config file and overrides. The controller owns the chord controller and can
/// be waited on until its driver closes.
pub fn init_controller(
    player_path: Option<PathBuf>,
    mapping_path: Option<PathBuf>,
    midi_device: Option<String>,
) -> Result<crate::controller::Controller, Box<dyn Error>> {
    let player = match player_path {
        Some(path) => Player::deserialize(&path)?,
        None => Player::default(),
    }
    .with_mapping(mapping_path)
    .with_midi_device(midi_device);

    let mapping = player.mapping()?;
    let midi_device = match player.midi_device() {
        Some(name) => crate::midi::get_device(name)?,
        None => return Err("No MIDI device configured.".into()),
    };
    info!(device = %midi_device, "Using MIDI device.");

    let chord_controller = ChordController::new(&mapping, Instrument::new(player.octave()))?;
    let controller = crate::controller::Controller::new(
        chord_controller,
        Arc::new(crate::controller::keyboard::Driver::new()),
        midi_device,
        Output::new(player.channel()?, player.velocity()?),
    )?;
    Ok(controller)
}
