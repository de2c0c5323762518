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
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use tracing::debug;

use super::{Action, Command, CommandDescriptor, CommandError, GroupKey, Target, TargetId};

#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    #[error("no command named {0} is registered")]
    UnknownAction(String),

    #[error("action {0} was never added to the invoker")]
    UnregisteredInstance(Action),

    #[error("action {0} is not on any undo stack")]
    NotExecuted(Action),

    #[error("cannot undo {0}: no revert information")]
    Unrevertable(Action),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Identifies a command registered with an invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(usize);

/// Owns a target and executes commands against it, keeping one bounded undo
/// stack per grouping key.
pub struct Invoker<T: Target> {
    target: T,
    target_id: TargetId,
    /// Command descriptors by name.
    descriptors: HashMap<String, Arc<CommandDescriptor>>,
    /// Every command ever added, indexed by command id.
    commands: Vec<Command>,
    /// Action tuples to the command created for them.
    registry: HashMap<Action, CommandId>,
    /// Undo stacks, most recent first.
    stacks: HashMap<GroupKey, VecDeque<CommandId>>,
    /// Stack bounds. A missing entry or `None` is unbounded.
    stack_limits: HashMap<GroupKey, Option<usize>>,
}

impl<T: Target> Invoker<T> {
    /// Creates a new invoker that owns the given target and knows how to build
    /// the given kinds of commands.
    pub fn new<I>(target: T, descriptors: I) -> Invoker<T>
    where
        I: IntoIterator<Item = CommandDescriptor>,
    {
        Invoker {
            target,
            target_id: TargetId::next(),
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.name().to_string(), Arc::new(d)))
                .collect(),
            commands: Vec::new(),
            registry: HashMap::new(),
            stacks: HashMap::new(),
            stack_limits: HashMap::new(),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Mutable access to the target for state that lives outside the command
    /// history, such as output snapshots.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    /// Gets a registered command.
    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0)
    }

    /// Builds and registers the command for the given action without executing
    /// it. The first command registered for a grouping key sets that key's stack
    /// limit. Registering an action twice returns the existing command.
    pub fn add_command(
        &mut self,
        action: &Action,
        stack_limit: Option<usize>,
    ) -> Result<CommandId, InvokerError> {
        if let Some(id) = self.registry.get(action) {
            return Ok(*id);
        }

        let descriptor = self
            .descriptors
            .get(action.name())
            .ok_or_else(|| InvokerError::UnknownAction(action.name().to_string()))?;
        let command = Command::new(descriptor.clone(), self.target_id, action.args().to_vec())?;

        self.stack_limits
            .entry(command.group_by(false))
            .or_insert(stack_limit);

        let id = CommandId(self.commands.len());
        debug!(command = %command, "Added command.");
        self.commands.push(command);
        self.registry.insert(action.clone(), id);
        Ok(id)
    }

    /// Executes the command registered for the action and pushes it onto the
    /// top of its undo stack.
    pub fn do_action(&mut self, action: &Action) -> Result<CommandId, InvokerError> {
        let id = self.resolve(action)?;
        let command = &self.commands[id.0];
        command.execute(&mut self.target)?;

        let key = command.group_by(false);
        let limit = self.stack_limits.get(&key).copied().flatten();
        let stack = self.stacks.entry(key).or_default();

        // A command only ever occupies one slot.
        stack.retain(|c| *c != id);
        stack.push_front(id);
        debug!(command = %command, depth = stack.len(), "Executed command.");

        if let Some(limit) = limit {
            while stack.len() > limit {
                if let Some(evicted) = stack.pop_back() {
                    debug!(command = %self.commands[evicted.0], "Evicted command.");
                }
            }
        }

        Ok(id)
    }

    /// Undoes the command registered for the action.
    ///
    /// A command below the top of its stack is removed without touching the
    /// target. The top command is reverted if it can revert itself; otherwise
    /// the command beneath it is executed again to restore the previous state.
    pub fn undo(&mut self, action: &Action) -> Result<CommandId, InvokerError> {
        let id = self.resolve(action)?;
        let command = &self.commands[id.0];
        let not_executed = || InvokerError::NotExecuted(action.clone());

        let stack = self
            .stacks
            .get_mut(&command.group_by(false))
            .ok_or_else(not_executed)?;
        let position = stack.iter().position(|c| *c == id).ok_or_else(not_executed)?;

        if position > 0 {
            stack.remove(position);
            debug!(command = %command, "Removed shadowed command.");
            return Ok(id);
        }

        if command.can_revert() {
            command.revert(&mut self.target)?;
            debug!(command = %command, "Reverted command.");
        } else {
            let beneath = stack
                .get(1)
                .copied()
                .ok_or_else(|| InvokerError::Unrevertable(action.clone()))?;
            let beneath = &self.commands[beneath.0];
            beneath.execute(&mut self.target)?;
            debug!(command = %command, restored = %beneath, "Restored previous command.");
        }
        stack.pop_front();

        Ok(id)
    }

    /// The undo stack for the group, most recent first.
    pub fn get_command_stack(&self, key: &GroupKey) -> Vec<CommandId> {
        self.stacks
            .get(key)
            .map(|stack| stack.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The depth bound for the group, `None` if unbounded.
    pub fn get_command_stack_limit(&self, key: &GroupKey) -> Option<usize> {
        self.stack_limits.get(key).copied().flatten()
    }

    fn resolve(&self, action: &Action) -> Result<CommandId, InvokerError> {
        match self.registry.get(action) {
            Some(id) => Ok(*id),
            None if !self.descriptors.contains_key(action.name()) => {
                Err(InvokerError::UnknownAction(action.name().to_string()))
            }
            None => Err(InvokerError::UnregisteredInstance(action.clone())),
        }
    }
}
