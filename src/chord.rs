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
use std::{fmt, ops::Deref};

const OCTAVE: i32 = 12;

/// The quality of a triad, which determines its third and fifth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Major,
    Minor,
    Diminished,
}

impl Quality {
    /// Semitones from the root to the third.
    pub fn third(&self) -> i32 {
        match self {
            Quality::Major => 4,
            Quality::Minor | Quality::Diminished => 3,
        }
    }

    /// Semitones from the root to the fifth.
    pub fn fifth(&self) -> i32 {
        match self {
            Quality::Major | Quality::Minor => 7,
            Quality::Diminished => 6,
        }
    }
}

/// An ordered set of absolute pitches, lowest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord(Vec<i32>);

impl Chord {
    /// Builds a chord from its root, quality and extensions (semitone offsets
    /// from the root) and voices it.
    ///
    /// The voicing picks the chord tone in the bass. Tones rotated past the top
    /// are raised an octave, and every full turn of
    /// the voicing moves the whole chord one octave, so voicing `v + n` is
    /// voicing `v` an octave up for a chord of `n` tones. Negative voicings
    /// rotate downward.
    pub fn new(root: i32, quality: Quality, extensions: &[i32], voicing: i32) -> Chord {
        let base: Vec<i32> = [root, root + quality.third(), root + quality.fifth()]
            .into_iter()
            .chain(extensions.iter().map(|e| root + e))
            .collect();

        let n = base.len() as i32;
        let rotation = voicing.rem_euclid(n);
        let octaves = (voicing - rotation) / n;
        let (wrapped, kept) = base.split_at(rotation as usize);

        Chord(
            kept.iter()
                .copied()
                .chain(wrapped.iter().map(|pitch| pitch + OCTAVE))
                .map(|pitch| pitch + OCTAVE * octaves)
                .collect(),
        )
    }

    /// The pitches of the chord.
    pub fn pitches(&self) -> &[i32] {
        &self.0
    }
}

impl Deref for Chord {
    type Target = [i32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Chord> for Vec<i32> {
    fn from(chord: Chord) -> Self {
        chord.0
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]",
            self.0
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        )
    }
}

#[cfg(test)]
mod test {
    use super::{Chord, Quality};

    #[test]
    fn test_qualities() {
        assert_eq!(&[60, 64, 67], Chord::new(60, Quality::Major, &[], 0).pitches());
        assert_eq!(&[60, 63, 67], Chord::new(60, Quality::Minor, &[], 0).pitches());
        assert_eq!(
            &[60, 63, 66],
            Chord::new(60, Quality::Diminished, &[], 0).pitches()
        );
    }

    #[test]
    fn test_extensions() {
        assert_eq!(
            &[60, 64, 67, 70],
            Chord::new(60, Quality::Major, &[10], 0).pitches()
        );
    }

    #[test]
    fn test_inversions() {
        for extensions in [vec![], vec![10], vec![10, 14]] {
            let root_position = Chord::new(60, Quality::Major, &extensions, 0);
            let n = root_position.len();

            for i in 1..n {
                let inversion = Chord::new(60, Quality::Major, &extensions, i as i32);
                let expected: Vec<i32> = root_position[i..]
                    .iter()
                    .copied()
                    .chain(root_position[..i].iter().map(|p| p + 12))
                    .collect();
                assert_eq!(expected.as_slice(), inversion.pitches());

                // Negative voicings sit one octave below their positive twin.
                let negative = Chord::new(60, Quality::Major, &extensions, i as i32 - n as i32);
                let raised: Vec<i32> = negative.iter().map(|p| p + 12).collect();
                assert_eq!(inversion.pitches(), raised.as_slice());
            }
        }
    }

    #[test]
    fn test_voicing_cycles_by_octave() {
        for quality in [Quality::Major, Quality::Minor, Quality::Diminished] {
            for extensions in [vec![], vec![11], vec![10, 14]] {
                let n = 3 + extensions.len() as i32;
                for voicing in -9..9 {
                    let chord = Chord::new(57, quality, &extensions, voicing);
                    let next = Chord::new(57, quality, &extensions, voicing + n);
                    let lowered: Vec<i32> = next.iter().map(|p| p - 12).collect();
                    assert_eq!(chord.pitches(), lowered.as_slice());
                }
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            "[64, 67, 72]",
            Chord::new(60, Quality::Major, &[], 1).to_string()
        );
    }
}
