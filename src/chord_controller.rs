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
use std::collections::{BTreeSet, HashSet};

use tracing::{debug, error, info};

use crate::{
    command::{
        Action, CommandDescriptor, CommandError, GroupKey, Invoker, InvokerError, Target, Value,
    },
    config::Mapping,
    input::{Event, InputError, InputHandler, Step},
    instrument::{Instrument, PLAY_SCALE_POSITION, RELEASE_SCALE_POSITION},
};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Invoker(#[from] InvokerError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// The command kinds the instrument understands.
fn descriptors() -> [CommandDescriptor; 3] {
    [
        CommandDescriptor::set(),
        CommandDescriptor::increment(),
        CommandDescriptor::method(PLAY_SCALE_POSITION, PLAY_SCALE_POSITION, &["scale_position"])
            .with_revert(RELEASE_SCALE_POSITION)
            .group_by_args([]),
    ]
}

/// Ties the input handler to an invoker that owns the instrument, and keeps the
/// instrument's sounding notes in step with the controls.
pub struct ChordController {
    mapping: Mapping,
    input_handler: InputHandler,
    invoker: Invoker<Instrument>,
}

impl ChordController {
    /// Creates a new chord controller. Every action in the mapping is registered
    /// up front, and each attribute the mapping sets gets an idle command holding
    /// its current value so releasing every control restores it.
    pub fn new(
        mapping: &Mapping,
        instrument: Instrument,
    ) -> Result<ChordController, ControllerError> {
        let input_handler = InputHandler::new(mapping)?;
        let mut invoker = Invoker::new(instrument, descriptors());

        let actions = mapping.actions();
        for action in actions.iter() {
            invoker.add_command(action, None)?;
        }

        let mut idle_attributes = HashSet::new();
        for action in actions.iter().filter(|action| action.name() == "set") {
            let Some(attribute) = action.args().first().and_then(Value::as_str) else {
                continue;
            };
            if !idle_attributes.insert(attribute.to_string()) {
                continue;
            }

            let current = invoker.target().get_attribute(attribute)?;
            let idle = Action::new("set", vec![Value::from(attribute), current]);
            invoker.add_command(&idle, None)?;
            invoker.do_action(&idle)?;
            debug!(action = %idle, "Registered idle command.");
        }

        info!(actions = actions.len(), "Chord controller ready.");
        Ok(ChordController {
            mapping: mapping.clone(),
            input_handler,
            invoker,
        })
    }

    /// Handles a batch of events. Every event is handled even if an earlier one
    /// fails, and the sounding notes are always brought up to date. Returns the
    /// first error encountered.
    pub fn update(&mut self, events: &[Event]) -> Result<(), ControllerError> {
        let mut first_error: Option<ControllerError> = None;

        for event in events {
            if let Err(e) = self.handle(event) {
                error!(event = ?event, err = %e, "Error handling event.");
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.reconcile() {
            error!(err = %e, "Error building chord.");
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn handle(&mut self, event: &Event) -> Result<(), ControllerError> {
        let update = self.input_handler.handle(event)?;

        let mut first_error: Option<ControllerError> = None;
        for step in update.steps() {
            let result = match step {
                Step::Do(action) => self.invoker.do_action(action),
                Step::Undo(action) => self.invoker.undo(action),
            };
            if let Err(e) = result {
                first_error.get_or_insert(e.into());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The scale position of the most recent play command still on its stack.
    fn held_scale_position(&self) -> Option<i64> {
        let key = GroupKey::new(PLAY_SCALE_POSITION, None, Vec::<Value>::new());
        let top = *self.invoker.get_command_stack(&key).first()?;
        self.invoker
            .command(top)?
            .arg("scale_position")?
            .to_int("scale_position")
            .ok()
    }

    fn reconcile(&mut self) -> Result<(), ControllerError> {
        let position = self.held_scale_position();
        if position != self.invoker.target().scale_position() {
            debug!(position = ?position, "Restoring held scale position.");
            self.invoker.target_mut().set_scale_position(position);
        }

        let chord = match position {
            Some(position) if self.input_handler.is_playing() => {
                self.invoker.target().construct_chord(position).map(Some)
            }
            _ => Ok(None),
        };
        let notes: BTreeSet<i32> = match &chord {
            Ok(Some(chord)) => chord.iter().copied().collect(),
            _ => BTreeSet::new(),
        };

        if notes != *self.invoker.target().playing_notes() {
            debug!(notes = ?notes, "Playing notes changed.");
            self.invoker.target_mut().set_playing_notes(notes);
        }
        chord.map(|_| ()).map_err(ControllerError::from)
    }

    /// Returns every control and the instrument to their initial state, keeping
    /// the octave register.
    pub fn reset(&mut self) -> Result<(), ControllerError> {
        let mut instrument = self.invoker.target().clone();
        instrument.reset();
        *self = ChordController::new(&self.mapping, instrument)?;
        info!("Chord controller reset.");
        Ok(())
    }

    pub fn instrument(&self) -> &Instrument {
        self.invoker.target()
    }

    pub fn input_handler(&self) -> &InputHandler {
        &self.input_handler
    }

    pub fn invoker(&self) -> &Invoker<Instrument> {
        &self.invoker
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// The pitches that should be sounding.
    pub fn playing_notes(&self) -> &BTreeSet<i32> {
        self.invoker.target().playing_notes()
    }
}
