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
use std::{collections::BTreeMap, path::Path};

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::{command::Action, input::Direction};

/// The mapping shipped with the binary.
const DEFAULTS: &str = include_str!("../../assets/defaults.yaml");

/// Maps hat directions and buttons to the actions they trigger.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Mapping {
    /// Only events from this joystick are handled. All joysticks if omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    joystick: Option<u32>,

    /// Actions per hat direction.
    #[serde(default)]
    hats: BTreeMap<Direction, Vec<ActionDescriptor>>,

    /// Actions per button id.
    #[serde(default)]
    buttons: BTreeMap<String, Vec<ActionDescriptor>>,
}

/// A single declarative action, written as `do: [name, args...]`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ActionDescriptor {
    #[serde(rename = "do")]
    action: Action,
}

impl ActionDescriptor {
    pub fn new(action: Action) -> ActionDescriptor {
        ActionDescriptor { action }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl Mapping {
    /// Parse a mapping from a file. The format is taken from the extension.
    pub fn deserialize(path: &Path) -> Result<Mapping, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Mapping>()?)
    }

    /// Parse a mapping from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Mapping, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Mapping>()?)
    }

    /// The built in mapping.
    pub fn defaults() -> Result<Mapping, ConfigError> {
        Mapping::from_yaml(DEFAULTS)
    }

    /// Renders the mapping as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn joystick(&self) -> Option<u32> {
        self.joystick
    }

    pub fn hats(&self) -> &BTreeMap<Direction, Vec<ActionDescriptor>> {
        &self.hats
    }

    pub fn buttons(&self) -> &BTreeMap<String, Vec<ActionDescriptor>> {
        &self.buttons
    }

    /// Adds an action to a hat direction.
    pub fn with_hat(mut self, direction: Direction, action: Action) -> Mapping {
        self.hats
            .entry(direction)
            .or_default()
            .push(ActionDescriptor::new(action));
        self
    }

    /// Adds an action to a button.
    pub fn with_button(mut self, button: u32, action: Action) -> Mapping {
        self.buttons
            .entry(button.to_string())
            .or_default()
            .push(ActionDescriptor::new(action));
        self
    }

    /// Every distinct action the mapping can emit, hats first.
    pub fn actions(&self) -> Vec<Action> {
        let mut actions: Vec<Action> = Vec::new();
        for descriptor in self.hats.values().chain(self.buttons.values()).flatten() {
            if !actions.contains(&descriptor.action) {
                actions.push(descriptor.action.clone());
            }
        }
        actions
    }
}
