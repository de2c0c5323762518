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
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};

pub mod invoker;

pub use invoker::{Invoker, InvokerError};

/// Errors raised while executing or reverting a command against its target.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("unknown attribute {0}")]
    UnknownAttribute(String),

    #[error("unknown method {0}")]
    UnknownMethod(String),

    #[error("command {name} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid value {value} for {attribute}")]
    InvalidValue { attribute: String, value: Value },
}

/// A single argument inside an action tuple.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Coerces the value to an integer. Floats are truncated toward zero and
    /// strings must hold an integer.
    pub fn to_int(&self, attribute: &str) -> Result<i64, CommandError> {
        let invalid = || CommandError::InvalidValue {
            attribute: attribute.to_string(),
            value: self.clone(),
        };
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(i) => Ok(*i),
            Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Value::Float(_) => Err(invalid()),
            Value::Str(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        }
    }

    /// Returns the string held by the value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn add(&self, other: &Value, attribute: &str) -> Result<Value, CommandError> {
        match (self, other) {
            (Value::Float(a), b) => Ok(Value::Float(a + b.to_float(attribute)?)),
            (a, Value::Float(b)) => Ok(Value::Float(a.to_float(attribute)? + b)),
            (a, b) => a
                .to_int(attribute)?
                .checked_add(b.to_int(attribute)?)
                .map(Value::Int)
                .ok_or_else(|| CommandError::InvalidValue {
                    attribute: attribute.to_string(),
                    value: other.clone(),
                }),
        }
    }

    fn negate(&self, attribute: &str) -> Result<Value, CommandError> {
        match self {
            Value::Float(f) => Ok(Value::Float(-f)),
            other => other
                .to_int(attribute)?
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| CommandError::InvalidValue {
                    attribute: attribute.to_string(),
                    value: self.clone(),
                }),
        }
    }

    fn to_float(&self, attribute: &str) -> Result<f64, CommandError> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Str(s) => s.trim().parse::<f64>().map_err(|_| CommandError::InvalidValue {
                attribute: attribute.to_string(),
                value: self.clone(),
            }),
            other => Ok(other.to_int(attribute)? as f64),
        }
    }
}

// Floats compare by bit pattern so that values can key the invoker registry.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// A symbolic action tuple: a command name followed by its positional arguments.
/// This is what the input handler emits and what the invoker is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub struct Action {
    name: String,
    args: Vec<Value>,
}

impl Action {
    /// Creates a new action.
    pub fn new<I, V>(name: &str, args: I) -> Action
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Action {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl TryFrom<Vec<Value>> for Action {
    type Error = String;

    fn try_from(mut values: Vec<Value>) -> Result<Self, Self::Error> {
        if values.is_empty() {
            return Err("an action needs at least a command name".to_string());
        }
        match values.remove(0) {
            Value::Str(name) => Ok(Action { name, args: values }),
            other => Err(format!("action name must be a string, got {}", other)),
        }
    }
}

impl From<Action> for Vec<Value> {
    fn from(action: Action) -> Self {
        let mut values = vec![Value::Str(action.name)];
        values.extend(action.args);
        values
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in self.args.iter() {
            write!(f, ", {}", arg)?;
        }
        write!(f, ")")
    }
}

/// Identifies a target object owned by an invoker. Commands hold this handle
/// rather than a reference to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(usize);

impl TargetId {
    /// Allocates a new, process-unique target id.
    pub fn next() -> TargetId {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        TargetId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// The key of an undo stack: the command name, optionally the target, and the
/// grouping arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    name: String,
    target: Option<TargetId>,
    args: Vec<Value>,
}

impl GroupKey {
    pub fn new<I, V>(name: &str, target: Option<TargetId>, args: I) -> GroupKey
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        GroupKey {
            name: name.to_string(),
            target,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        if let Some(target) = self.target {
            write!(f, ", {}", target)?;
        }
        for arg in self.args.iter() {
            write!(f, ", {}", arg)?;
        }
        write!(f, ")")
    }
}

/// An object that commands can mutate.
pub trait Target {
    /// Reads an attribute.
    fn get_attribute(&self, name: &str) -> Result<Value, CommandError>;

    /// Writes an attribute. Implementations coerce the value as they see fit.
    fn set_attribute(&mut self, name: &str, value: &Value) -> Result<(), CommandError>;

    /// Calls a named method with positional arguments.
    fn call_method(&mut self, method: &str, args: &[Value]) -> Result<(), CommandError>;
}

/// The effect a command applies to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Sets the attribute named by the first argument to the second argument.
    SetAttribute,

    /// Adds the second argument to the attribute named by the first argument.
    /// Reverting subtracts it again.
    IncrementAttribute,

    /// Calls a target method with all arguments, and optionally a revert method
    /// with the same arguments.
    Method {
        execute: String,
        revert: Option<String>,
    },
}

/// Describes a kind of command: its name, its effect, its argument names and
/// which arguments take part in the grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    name: String,
    effect: Effect,
    arg_names: Vec<String>,
    group_args: Option<Vec<usize>>,
}

impl CommandDescriptor {
    /// Creates a descriptor whose grouping key includes every argument.
    pub fn new(name: &str, effect: Effect, arg_names: &[&str]) -> CommandDescriptor {
        CommandDescriptor {
            name: name.to_string(),
            effect,
            arg_names: arg_names.iter().map(|n| n.to_string()).collect(),
            group_args: None,
        }
    }

    /// Creates a descriptor that calls a method on the target.
    pub fn method(name: &str, execute: &str, arg_names: &[&str]) -> CommandDescriptor {
        CommandDescriptor::new(
            name,
            Effect::Method {
                execute: execute.to_string(),
                revert: None,
            },
            arg_names,
        )
    }

    /// `set attribute value`. One undo stack per attribute, whatever the value.
    pub fn set() -> CommandDescriptor {
        CommandDescriptor::new("set", Effect::SetAttribute, &["attribute", "value"])
            .group_by_args([0])
    }

    /// `inc attribute delta`. Distinct deltas get distinct undo stacks.
    pub fn increment() -> CommandDescriptor {
        CommandDescriptor::new("inc", Effect::IncrementAttribute, &["attribute", "delta"])
    }

    /// Restricts the grouping key to the arguments at the given indices.
    pub fn group_by_args<I: IntoIterator<Item = usize>>(mut self, indices: I) -> Self {
        self.group_args = Some(indices.into_iter().collect());
        self
    }

    /// Sets the method called when reverting. Only meaningful for method effects.
    pub fn with_revert(mut self, revert_method: &str) -> Self {
        if let Effect::Method { revert, .. } = &mut self.effect {
            *revert = Some(revert_method.to_string());
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

/// A deferred mutation of a target, built from a descriptor and arguments.
#[derive(Debug)]
pub struct Command {
    descriptor: Arc<CommandDescriptor>,
    target: TargetId,
    args: Vec<Value>,
}

impl Command {
    /// Creates a new command, checking the argument count against the descriptor.
    pub fn new(
        descriptor: Arc<CommandDescriptor>,
        target: TargetId,
        args: Vec<Value>,
    ) -> Result<Command, CommandError> {
        if args.len() != descriptor.arg_names.len() {
            return Err(CommandError::ArgumentCount {
                name: descriptor.name.clone(),
                expected: descriptor.arg_names.len(),
                actual: args.len(),
            });
        }

        Ok(Command {
            descriptor,
            target,
            args,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Gets an argument by its declared name.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.descriptor
            .arg_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.args.get(i))
    }

    /// Whether the command can undo its own effect.
    pub fn can_revert(&self) -> bool {
        match &self.descriptor.effect {
            Effect::SetAttribute => false,
            Effect::IncrementAttribute => true,
            Effect::Method { revert, .. } => revert.is_some(),
        }
    }

    /// The key of the undo stack this command belongs to.
    pub fn group_by(&self, include_target: bool) -> GroupKey {
        let args = match &self.descriptor.group_args {
            Some(indices) => indices
                .iter()
                .filter_map(|i| self.args.get(*i).cloned())
                .collect(),
            None => self.args.clone(),
        };
        GroupKey {
            name: self.descriptor.name.clone(),
            target: include_target.then_some(self.target),
            args,
        }
    }

    /// Applies the command to the target.
    pub fn execute<T: Target + ?Sized>(&self, target: &mut T) -> Result<(), CommandError> {
        match &self.descriptor.effect {
            Effect::SetAttribute => {
                let (attribute, value) = self.attribute_and_operand()?;
                target.set_attribute(attribute, value)
            }
            Effect::IncrementAttribute => {
                let (attribute, delta) = self.attribute_and_operand()?;
                let current = target.get_attribute(attribute)?;
                target.set_attribute(attribute, &current.add(delta, attribute)?)
            }
            Effect::Method { execute, .. } => target.call_method(execute, &self.args),
        }
    }

    /// Undoes the command's effect. Returns `Ok(false)` if the command has no
    /// way of reverting itself, leaving the target untouched.
    pub fn revert<T: Target + ?Sized>(&self, target: &mut T) -> Result<bool, CommandError> {
        match &self.descriptor.effect {
            Effect::SetAttribute => Ok(false),
            Effect::IncrementAttribute => {
                let (attribute, delta) = self.attribute_and_operand()?;
                let current = target.get_attribute(attribute)?;
                let negated = delta.negate(attribute)?;
                target.set_attribute(attribute, &current.add(&negated, attribute)?)?;
                Ok(true)
            }
            Effect::Method {
                revert: Some(revert),
                ..
            } => {
                target.call_method(revert, &self.args)?;
                Ok(true)
            }
            Effect::Method { revert: None, .. } => Ok(false),
        }
    }

    fn attribute_and_operand(&self) -> Result<(&str, &Value), CommandError> {
        match self.args.as_slice() {
            [attribute, operand] => match attribute.as_str() {
                Some(attribute) => Ok((attribute, operand)),
                None => Err(CommandError::InvalidValue {
                    attribute: "attribute".to_string(),
                    value: attribute.clone(),
                }),
            },
            _ => Err(CommandError::ArgumentCount {
                name: self.descriptor.name.clone(),
                expected: 2,
                actual: self.args.len(),
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}", self.descriptor.name, self.target)?;
        for arg in self.args.iter() {
            write!(f, ", {}", arg)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::{collections::HashMap, sync::Arc};

    use super::*;

    /// A bag of attributes used as a command target in tests.
    #[derive(Default)]
    pub(crate) struct Bag {
        pub attributes: HashMap<String, Value>,
    }

    impl Bag {
        pub fn with(name: &str, value: Value) -> Bag {
            let mut bag = Bag::default();
            bag.attributes.insert(name.to_string(), value);
            bag
        }

        pub fn get(&self, name: &str) -> Value {
            self.attributes.get(name).cloned().unwrap_or(Value::Int(0))
        }
    }

    impl Target for Bag {
        fn get_attribute(&self, name: &str) -> Result<Value, CommandError> {
            self.attributes
                .get(name)
                .cloned()
                .ok_or_else(|| CommandError::UnknownAttribute(name.to_string()))
        }

        fn set_attribute(&mut self, name: &str, value: &Value) -> Result<(), CommandError> {
            self.attributes.insert(name.to_string(), value.clone());
            Ok(())
        }

        fn call_method(&mut self, method: &str, args: &[Value]) -> Result<(), CommandError> {
            match method {
                "add_both" => {
                    for (name, delta) in ["x", "y"].iter().zip(args) {
                        let current = self.get_attribute(name)?;
                        self.set_attribute(name, &current.add(delta, name)?)?;
                    }
                    Ok(())
                }
                _ => Err(CommandError::UnknownMethod(method.to_string())),
            }
        }
    }

    #[test]
    fn test_set_attribute() {
        let mut bag = Bag::with("button", 0.into());
        let target = TargetId::next();
        let cmd = Command::new(
            Arc::new(CommandDescriptor::set()),
            target,
            vec!["button".into(), 3.into()],
        )
        .unwrap();
        assert_eq!(Value::Int(0), bag.get("button"));

        cmd.execute(&mut bag).unwrap();
        assert_eq!(Value::Int(3), bag.get("button"));

        assert_eq!(
            GroupKey::new("set", Some(target), ["button"]),
            cmd.group_by(true)
        );
        assert!(!cmd.can_revert());
        assert_eq!(Ok(false), cmd.revert(&mut bag));
        assert_eq!(Value::Int(3), bag.get("button"));
    }

    #[test]
    fn test_increment_attribute() {
        let mut bag = Bag::with("button", 1.into());
        let target = TargetId::next();
        let cmd = Command::new(
            Arc::new(CommandDescriptor::increment()),
            target,
            vec!["button".into(), 2.into()],
        )
        .unwrap();

        cmd.execute(&mut bag).unwrap();
        assert_eq!(Value::Int(3), bag.get("button"));
        assert_eq!(
            GroupKey::new("inc", Some(target), vec![Value::from("button"), 2.into()]),
            cmd.group_by(true)
        );

        assert!(cmd.can_revert());
        assert_eq!(Ok(true), cmd.revert(&mut bag));
        assert_eq!(Value::Int(1), bag.get("button"));
    }

    #[test]
    fn test_increment_overflow() {
        let mut bag = Bag::with("button", Value::Int(i64::MAX));
        let cmd = Command::new(
            Arc::new(CommandDescriptor::increment()),
            TargetId::next(),
            vec!["button".into(), 1.into()],
        )
        .unwrap();

        assert!(matches!(
            cmd.execute(&mut bag),
            Err(CommandError::InvalidValue { .. })
        ));
        assert_eq!(Value::Int(i64::MAX), bag.get("button"));

        let cmd = Command::new(
            Arc::new(CommandDescriptor::increment()),
            TargetId::next(),
            vec!["button".into(), Value::Int(i64::MIN)],
        )
        .unwrap();
        bag.attributes.insert("button".to_string(), Value::Int(0));
        assert!(cmd.revert(&mut bag).is_err());
        assert_eq!(Value::Int(0), bag.get("button"));
    }

    #[test]
    fn test_method_command() {
        let foo = Arc::new(
            CommandDescriptor::method("foo", "add_both", &["x", "y"]).group_by_args(0..1),
        );
        let mut bag = Bag::with("x", 3.into());
        bag.attributes.insert("y".to_string(), 4.into());
        let target = TargetId::next();

        let cmd = Command::new(foo.clone(), target, vec![1.into(), 2.into()]).unwrap();
        assert_eq!("foo", cmd.name());
        assert_eq!(Some(&Value::Int(1)), cmd.arg("x"));
        assert_eq!(Some(&Value::Int(2)), cmd.arg("y"));
        assert_eq!(None, cmd.arg("z"));
        assert_eq!(GroupKey::new("foo", None, [1]), cmd.group_by(false));
        assert_eq!(GroupKey::new("foo", Some(target), [1]), cmd.group_by(true));

        cmd.execute(&mut bag).unwrap();
        assert_eq!(Value::Int(4), bag.get("x"));
        assert_eq!(Value::Int(6), bag.get("y"));

        let foo_bar = Arc::new(CommandDescriptor::method("foo_bar", "add_both", &["x", "y"]));
        let cmd = Command::new(foo_bar, target, vec![1.into(), 2.into()]).unwrap();
        assert_eq!(GroupKey::new("foo_bar", None, [1, 2]), cmd.group_by(false));
        assert_eq!(
            GroupKey::new("foo_bar", Some(target), [1, 2]),
            cmd.group_by(true)
        );

        assert!(matches!(
            Command::new(foo, target, vec![1.into()]),
            Err(CommandError::ArgumentCount {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_value_coercion() {
        assert_eq!(Ok(8), Value::Float(8.8).to_int("octave"));
        assert_eq!(Ok(-2), Value::Float(-2.7).to_int("octave"));
        assert_eq!(Ok(3), Value::from("3").to_int("octave"));
        assert!(Value::from("1.7").to_int("octave").is_err());
        assert!(Value::from("jeff").to_int("octave").is_err());
    }

    #[test]
    fn test_action_from_sequence() {
        let action: Action =
            Action::try_from(vec![Value::from("set"), "octave".into(), 4.into()]).unwrap();
        assert_eq!(Action::new("set", vec![Value::from("octave"), 4.into()]), action);
        assert_eq!("(set, \"octave\", 4)", action.to_string());
        assert!(Action::try_from(vec![]).is_err());
        assert!(Action::try_from(vec![Value::Int(1)]).is_err());
    }
}
