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
use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    command::{Action, GroupKey},
    config::Mapping,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InputError {
    /// The device reported a release for a button that is not held.
    #[error("button {0} was released but is not held")]
    InconsistentRelease(u32),

    #[error("invalid button id {0:?} in mapping")]
    InvalidButton(String),
}

/// The position of a hat (d-pad).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Neutral,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl Direction {
    /// Converts a hat vector, with y pointing up, into a direction.
    pub fn from_vector(x: i8, y: i8) -> Direction {
        match (x.signum(), y.signum()) {
            (0, 1) => Direction::Up,
            (1, 1) => Direction::UpRight,
            (1, 0) => Direction::Right,
            (1, -1) => Direction::DownRight,
            (0, -1) => Direction::Down,
            (-1, -1) => Direction::DownLeft,
            (-1, 0) => Direction::Left,
            (-1, 1) => Direction::UpLeft,
            _ => Direction::Neutral,
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Direction::Neutral
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::deserialize(serde::de::value::StrDeserializer::<serde::de::value::Error>::new(
            s.trim(),
        ))
        .map_err(|e| e.to_string())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Neutral => "neutral",
            Direction::Up => "up",
            Direction::UpRight => "up_right",
            Direction::Right => "right",
            Direction::DownRight => "down_right",
            Direction::Down => "down",
            Direction::DownLeft => "down_left",
            Direction::Left => "left",
            Direction::UpLeft => "up_left",
        };
        write!(f, "{}", name)
    }
}

/// A normalized event from an input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Button {
        joystick: u32,
        button: u32,
        pressed: bool,
    },
    Hat {
        joystick: u32,
        hat: u32,
        direction: Direction,
    },
}

impl Event {
    /// A press of a button on the first joystick.
    pub fn press(button: u32) -> Event {
        Event::Button {
            joystick: 0,
            button,
            pressed: true,
        }
    }

    /// A release of a button on the first joystick.
    pub fn release(button: u32) -> Event {
        Event::Button {
            joystick: 0,
            button,
            pressed: false,
        }
    }

    /// Motion of the first hat on the first joystick.
    pub fn hat(direction: Direction) -> Event {
        Event::Hat {
            joystick: 0,
            hat: 0,
            direction,
        }
    }

    fn joystick(&self) -> u32 {
        match self {
            Event::Button { joystick, .. } | Event::Hat { joystick, .. } => *joystick,
        }
    }
}

/// One action to apply or take back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Do(Action),
    Undo(Action),
}

/// The ordered steps produced by a batch of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    steps: Vec<Step>,
}

impl Update {
    /// Every step in the order it must be applied.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The actions to execute, in emission order.
    pub fn to_do(&self) -> Vec<&Action> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Do(action) => Some(action),
                Step::Undo(_) => None,
            })
            .collect()
    }

    /// The actions to undo, in emission order.
    pub fn to_undo(&self) -> Vec<&Action> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Undo(action) => Some(action),
                Step::Do(_) => None,
            })
            .collect()
    }

    fn extend(&mut self, other: Update) {
        self.steps.extend(other.steps);
    }
}

/// The buttons holding one modifier group, in press order.
#[derive(Debug, Default)]
struct HoldStack {
    held: Vec<(u32, Action)>,
    /// Actions of buttons released while shadowed. They are taken back once the
    /// buttons above them are released.
    pending: Vec<Action>,
}

/// Translates raw events into do/undo steps, tracking which buttons are held
/// and where each hat points.
#[derive(Debug)]
pub struct InputHandler {
    joystick: Option<u32>,
    buttons: HashMap<u32, Vec<Action>>,
    hats: HashMap<Direction, Vec<Action>>,
    held_buttons: Vec<u32>,
    groups: HashMap<GroupKey, HoldStack>,
    hat_directions: HashMap<u32, Direction>,
}

/// The hold group of an action. Buttons setting the same attribute share a
/// group; any other action is its own group.
fn hold_group(action: &Action) -> GroupKey {
    match (action.name(), action.args().first()) {
        ("set", Some(attribute)) => GroupKey::new("set", None, [attribute.clone()]),
        (name, _) => GroupKey::new(name, None, action.args().to_vec()),
    }
}

impl InputHandler {
    /// Creates a new input handler from the mapping.
    pub fn new(mapping: &Mapping) -> Result<InputHandler, InputError> {
        let buttons = mapping
            .buttons()
            .iter()
            .map(|(id, descriptors)| {
                let id = id
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| InputError::InvalidButton(id.clone()))?;
                Ok((id, descriptors.iter().map(|d| d.action().clone()).collect()))
            })
            .collect::<Result<HashMap<u32, Vec<Action>>, InputError>>()?;
        let hats = mapping
            .hats()
            .iter()
            .map(|(direction, descriptors)| {
                (
                    *direction,
                    descriptors.iter().map(|d| d.action().clone()).collect(),
                )
            })
            .collect();

        Ok(InputHandler {
            joystick: mapping.joystick(),
            buttons,
            hats,
            held_buttons: Vec::new(),
            groups: HashMap::new(),
            hat_directions: HashMap::new(),
        })
    }

    /// Handles a batch of events in arrival order. Stops at the first event
    /// that fails.
    pub fn update(&mut self, events: &[Event]) -> Result<Update, InputError> {
        let mut update = Update::default();
        for event in events {
            update.extend(self.handle(event)?);
        }
        Ok(update)
    }

    /// Handles a single event.
    pub fn handle(&mut self, event: &Event) -> Result<Update, InputError> {
        if self.joystick.is_some_and(|joystick| joystick != event.joystick()) {
            debug!(event = ?event, "Ignoring event from another joystick.");
            return Ok(Update::default());
        }

        match event {
            Event::Button {
                button,
                pressed: true,
                ..
            } => Ok(self.press(*button)),
            Event::Button {
                button,
                pressed: false,
                ..
            } => self.release(*button),
            Event::Hat { hat, direction, .. } => Ok(self.move_hat(*hat, *direction)),
        }
    }

    /// Whether any hat is away from neutral.
    pub fn is_playing(&self) -> bool {
        self.hat_directions.values().any(|d| !d.is_neutral())
    }

    /// The held buttons in press order.
    pub fn held_buttons(&self) -> &[u32] {
        &self.held_buttons
    }

    /// The buttons holding the group of the given action, in press order.
    pub fn holds(&self, action: &Action) -> Vec<u32> {
        self.groups
            .get(&hold_group(action))
            .map(|stack| stack.held.iter().map(|(button, _)| *button).collect())
            .unwrap_or_default()
    }

    /// Forgets every held button and hat position.
    pub fn reset(&mut self) {
        self.held_buttons.clear();
        self.groups.clear();
        self.hat_directions.clear();
    }

    fn press(&mut self, button: u32) -> Update {
        let mut update = Update::default();
        if self.held_buttons.contains(&button) {
            warn!(button, "Button pressed while already held.");
            return update;
        }
        self.held_buttons.push(button);

        for action in self.buttons.get(&button).into_iter().flatten() {
            let stack = self.groups.entry(hold_group(action)).or_default();
            // Pressing again brings the action back to the top.
            stack.pending.retain(|pending| pending != action);
            stack.held.push((button, action.clone()));
            update.steps.push(Step::Do(action.clone()));
        }

        update
    }

    fn release(&mut self, button: u32) -> Result<Update, InputError> {
        let position = self
            .held_buttons
            .iter()
            .position(|held| *held == button)
            .ok_or(InputError::InconsistentRelease(button))?;
        self.held_buttons.remove(position);

        let mut update = Update::default();
        for action in self.buttons.get(&button).into_iter().flatten().rev() {
            let Some(stack) = self.groups.get_mut(&hold_group(action)) else {
                continue;
            };
            let Some(position) = stack.held.iter().position(|(b, _)| *b == button) else {
                continue;
            };

            stack.held.remove(position);
            if position < stack.held.len() {
                debug!(button, action = %action, "Released shadowed button.");
                stack.pending.push(action.clone());
                continue;
            }

            update
                .steps
                .extend(stack.pending.drain(..).map(Step::Undo));
            update.steps.push(Step::Undo(action.clone()));
        }

        Ok(update)
    }

    fn move_hat(&mut self, hat: u32, direction: Direction) -> Update {
        let mut update = Update::default();
        let previous = self
            .hat_directions
            .insert(hat, direction)
            .unwrap_or_default();
        if previous == direction {
            return update;
        }

        if !previous.is_neutral() {
            for action in self.hats.get(&previous).into_iter().flatten().rev() {
                update.steps.push(Step::Undo(action.clone()));
            }
        }
        if !direction.is_neutral() {
            for action in self.hats.get(&direction).into_iter().flatten() {
                update.steps.push(Step::Do(action.clone()));
            }
        }

        update
    }
}
