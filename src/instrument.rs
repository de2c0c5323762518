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
use std::collections::BTreeSet;

use crate::{
    chord::{Chord, Quality},
    command::{CommandError, Target, Value},
};

pub const OCTAVE: &str = "octave";
pub const BASS: &str = "bass";
pub const QUALITY_MODIFIER: &str = "quality_modifier";
pub const EXTENSION_MODIFIER: &str = "extension_modifier";

pub const PLAY_SCALE_POSITION: &str = "play_scale_position";
pub const RELEASE_SCALE_POSITION: &str = "release_scale_position";

/// Number of selectable octave registers.
const OCTAVES: i64 = 9;

const DEFAULT_OCTAVE: i64 = 5;

/// The widest distance between the root and any voiced chord tone.
const MAX_SPAN: i32 = 2 * 12 + 2;

/// Semitones above the tonic for each degree of the major scale.
const MAJOR_SCALE: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// The triad quality each major scale degree has without modification.
const DIATONIC_QUALITIES: [Quality; 7] = [
    Quality::Major,
    Quality::Minor,
    Quality::Minor,
    Quality::Major,
    Quality::Major,
    Quality::Minor,
    Quality::Diminished,
];

/// Extension sets selectable by the extension modifier, as semitones above the root.
const EXTENSIONS: [&[i32]; 5] = [&[], &[10], &[11], &[14], &[10, 14]];

/// The performance state of the virtual instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    octave: i64,
    /// The bass as set. It is wrapped by the chord size when read, so it stays
    /// in range when extensions come and go.
    bass: i64,
    quality_modifier: i64,
    extension_modifier: i64,
    scale_position: Option<i64>,
    playing_notes: BTreeSet<i32>,
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument {
            octave: DEFAULT_OCTAVE,
            bass: 0,
            quality_modifier: 0,
            extension_modifier: 0,
            scale_position: None,
            playing_notes: BTreeSet::new(),
        }
    }
}

impl Instrument {
    /// Creates a new instrument starting at the given octave register.
    pub fn new(octave: i64) -> Instrument {
        Instrument {
            octave: octave.rem_euclid(OCTAVES),
            ..Default::default()
        }
    }

    pub fn octave(&self) -> i64 {
        self.octave
    }

    pub fn set_octave(&mut self, value: &Value) -> Result<(), CommandError> {
        self.octave = value.to_int(OCTAVE)?.rem_euclid(OCTAVES);
        Ok(())
    }

    /// The chord tone in the bass, as a voicing index wrapped by the size of
    /// the current chord.
    pub fn bass(&self) -> i64 {
        self.bass.rem_euclid(self.chord_size())
    }

    pub fn set_bass(&mut self, value: &Value) -> Result<(), CommandError> {
        self.bass = value.to_int(BASS)?;
        Ok(())
    }

    pub fn quality_modifier(&self) -> i64 {
        self.quality_modifier
    }

    pub fn set_quality_modifier(&mut self, value: &Value) -> Result<(), CommandError> {
        self.quality_modifier = value.to_int(QUALITY_MODIFIER)?.rem_euclid(3);
        Ok(())
    }

    pub fn extension_modifier(&self) -> i64 {
        self.extension_modifier
    }

    pub fn set_extension_modifier(&mut self, value: &Value) -> Result<(), CommandError> {
        self.extension_modifier = value
            .to_int(EXTENSION_MODIFIER)?
            .rem_euclid(EXTENSIONS.len() as i64);
        Ok(())
    }

    /// The scale position being played, if any.
    pub fn scale_position(&self) -> Option<i64> {
        self.scale_position
    }

    /// Moves the scale position without going through a command.
    pub fn set_scale_position(&mut self, scale_position: Option<i64>) {
        self.scale_position = scale_position;
    }

    /// The pitches that should currently be sounding.
    pub fn playing_notes(&self) -> &BTreeSet<i32> {
        &self.playing_notes
    }

    pub fn set_playing_notes(&mut self, notes: BTreeSet<i32>) {
        self.playing_notes = notes;
    }

    /// Restores the defaults, keeping the octave register.
    pub fn reset(&mut self) {
        *self = Instrument::new(self.octave);
    }

    /// The extensions selected by the extension modifier.
    pub fn extensions(&self) -> &'static [i32] {
        EXTENSIONS[self.extension_modifier as usize]
    }

    /// The number of tones in the current chord.
    fn chord_size(&self) -> i64 {
        3 + self.extensions().len() as i64
    }

    /// The quality of the triad on the given scale degree after applying the
    /// quality modifier. 1 swaps major and minor, 2 makes it diminished.
    fn quality(&self, degree: usize) -> Quality {
        let diatonic = DIATONIC_QUALITIES[degree];
        match self.quality_modifier {
            0 => diatonic,
            1 => match diatonic {
                Quality::Major => Quality::Minor,
                Quality::Minor | Quality::Diminished => Quality::Major,
            },
            _ => Quality::Diminished,
        }
    }

    /// Builds the chord for a position in the major scale of the current octave.
    /// Positions past the seventh degree continue into the next octave.
    pub fn construct_chord(&self, scale_position: i64) -> Result<Chord, CommandError> {
        let degree = scale_position.rem_euclid(MAJOR_SCALE.len() as i64) as usize;
        let root = self
            .root(scale_position, degree)
            .ok_or_else(|| CommandError::InvalidValue {
                attribute: "scale_position".to_string(),
                value: Value::Int(scale_position),
            })?;

        Ok(Chord::new(
            root,
            self.quality(degree),
            self.extensions(),
            self.bass() as i32,
        ))
    }

    fn root(&self, scale_position: i64, degree: usize) -> Option<i32> {
        let octave = self
            .octave
            .checked_add(scale_position.div_euclid(MAJOR_SCALE.len() as i64))?;
        let root = octave
            .checked_mul(12)?
            .checked_add(i64::from(MAJOR_SCALE[degree]))?;
        // Voicing and extensions reach at most this far above the root.
        i32::try_from(root)
            .ok()
            .filter(|root| root.checked_add(MAX_SPAN).is_some())
    }
}

impl Target for Instrument {
    fn get_attribute(&self, name: &str) -> Result<Value, CommandError> {
        match name {
            OCTAVE => Ok(Value::Int(self.octave)),
            // Unwrapped, so increments and their reverts cancel out whatever the
            // chord size is in between.
            BASS => Ok(Value::Int(self.bass)),
            QUALITY_MODIFIER => Ok(Value::Int(self.quality_modifier)),
            EXTENSION_MODIFIER => Ok(Value::Int(self.extension_modifier)),
            _ => Err(CommandError::UnknownAttribute(name.to_string())),
        }
    }

    fn set_attribute(&mut self, name: &str, value: &Value) -> Result<(), CommandError> {
        match name {
            OCTAVE => self.set_octave(value),
            BASS => self.set_bass(value),
            QUALITY_MODIFIER => self.set_quality_modifier(value),
            EXTENSION_MODIFIER => self.set_extension_modifier(value),
            _ => Err(CommandError::UnknownAttribute(name.to_string())),
        }
    }

    fn call_method(&mut self, method: &str, args: &[Value]) -> Result<(), CommandError> {
        let position = match args {
            [position] => position.to_int("scale_position")?,
            _ => {
                return Err(CommandError::ArgumentCount {
                    name: method.to_string(),
                    expected: 1,
                    actual: args.len(),
                })
            }
        };

        match method {
            PLAY_SCALE_POSITION => {
                self.scale_position = Some(position);
                Ok(())
            }
            RELEASE_SCALE_POSITION => {
                // Another position may have started playing in the meantime.
                if self.scale_position == Some(position) {
                    self.scale_position = None;
                }
                Ok(())
            }
            _ => Err(CommandError::UnknownMethod(method.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::command::{CommandError, Target, Value};

    use super::*;

    fn instrument() -> Instrument {
        Instrument::new(5)
    }

    #[test]
    fn test_set_octave() {
        let cases: Vec<(Value, i64)> = vec![
            ((-1).into(), 8),
            (9.into(), 0),
            (10.into(), 1),
            (8.8.into(), 8),
            ("3".into(), 3),
        ];
        for (input, expected) in cases {
            let mut instrument = instrument();
            instrument.set_octave(&input).unwrap();
            assert_eq!(expected, instrument.octave(), "input {}", input);
        }
    }

    #[test]
    fn test_set_octave_from_bad_string() {
        for input in ["1.7", "jeff"] {
            let mut instrument = instrument();
            assert!(matches!(
                instrument.set_octave(&input.into()),
                Err(CommandError::InvalidValue { .. })
            ));
            assert_eq!(5, instrument.octave());
        }
    }

    #[test]
    fn test_set_bass() {
        let cases: Vec<(Value, i64)> = vec![
            ((-1).into(), 2),
            (10.into(), 1),
            (2.8.into(), 2),
            ("2".into(), 2),
        ];
        for (input, expected) in cases {
            let mut instrument = instrument();
            instrument.set_bass(&input).unwrap();
            assert_eq!(expected, instrument.bass(), "input {}", input);
        }
    }

    #[test]
    fn test_set_bass_from_bad_string() {
        for input in ["1.7", "jeff"] {
            let mut instrument = instrument();
            assert!(instrument.set_bass(&input.into()).is_err());
        }
    }

    #[test]
    fn test_bass_wraps_by_chord_size() {
        let mut instrument = instrument();
        instrument.set_extension_modifier(&1.into()).unwrap();
        instrument.set_bass(&3.into()).unwrap();
        assert_eq!(3, instrument.bass());
        instrument.set_bass(&4.into()).unwrap();
        assert_eq!(0, instrument.bass());
    }

    #[test]
    fn test_bass_follows_chord_size() {
        let mut instrument = instrument();
        instrument.set_extension_modifier(&1.into()).unwrap();
        instrument.set_bass(&(-1).into()).unwrap();
        assert_eq!(3, instrument.bass());
        assert_eq!(&[70, 72, 76, 79], instrument.construct_chord(0).unwrap().pitches());

        // Dropping the extension keeps the bass within the triad.
        instrument.set_extension_modifier(&0.into()).unwrap();
        assert_eq!(2, instrument.bass());
        assert_eq!(&[67, 72, 76], instrument.construct_chord(0).unwrap().pitches());
        assert_eq!(Ok(Value::Int(-1)), instrument.get_attribute(BASS));
    }

    #[test]
    fn test_construct_chord_out_of_range() {
        let instrument = instrument();
        for scale_position in [i64::MAX, i64::MIN, 7 * i64::from(i32::MAX / 12)] {
            assert!(matches!(
                instrument.construct_chord(scale_position),
                Err(CommandError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_construct_chord() {
        let cases: [(i64, i64, [i32; 3]); 8] = [
            (0, 0, [60, 64, 67]),
            (0, 1, [60, 63, 67]),
            (0, 2, [60, 63, 66]),
            (1, 0, [62, 65, 69]),
            (1, 1, [62, 66, 69]),
            (1, 2, [62, 65, 68]),
            (7, 0, [72, 76, 79]),
            (-1, 0, [59, 62, 65]),
        ];
        for (scale_position, quality_modifier, expected) in cases {
            let mut instrument = instrument();
            instrument
                .set_quality_modifier(&quality_modifier.into())
                .unwrap();
            assert_eq!(
                &expected,
                instrument.construct_chord(scale_position).unwrap().pitches(),
                "position {} modifier {}",
                scale_position,
                quality_modifier
            );
        }
    }

    #[test]
    fn test_construct_chord_with_extension_and_bass() {
        let mut instrument = instrument();
        instrument.set_extension_modifier(&1.into()).unwrap();
        instrument.set_bass(&1.into()).unwrap();
        assert_eq!(&[64, 67, 70, 72], instrument.construct_chord(0).unwrap().pitches());
    }

    #[test]
    fn test_target_attributes() {
        let mut instrument = instrument();
        instrument.set_attribute(OCTAVE, &Value::Int(3)).unwrap();
        assert_eq!(Ok(Value::Int(3)), instrument.get_attribute(OCTAVE));
        assert!(matches!(
            instrument.set_attribute("volume", &Value::Int(3)),
            Err(CommandError::UnknownAttribute(_))
        ));
        assert!(instrument.get_attribute("volume").is_err());
    }

    #[test]
    fn test_play_and_release_scale_position() {
        let mut instrument = instrument();
        instrument
            .call_method(PLAY_SCALE_POSITION, &[Value::Int(4)])
            .unwrap();
        assert_eq!(Some(4), instrument.scale_position());

        // Releasing a position that is not playing leaves the current one.
        instrument
            .call_method(RELEASE_SCALE_POSITION, &[Value::Int(0)])
            .unwrap();
        assert_eq!(Some(4), instrument.scale_position());

        instrument
            .call_method(RELEASE_SCALE_POSITION, &[Value::Int(4)])
            .unwrap();
        assert_eq!(None, instrument.scale_position());

        assert!(instrument.call_method("strum", &[Value::Int(4)]).is_err());
    }

    #[test]
    fn test_reset() {
        let mut instrument = Instrument::new(3);
        instrument.set_quality_modifier(&2.into()).unwrap();
        instrument.set_playing_notes([1, 2, 3].into_iter().collect());
        instrument.reset();
        assert_eq!(Instrument::new(3), instrument);
    }
}
