//! Voice leading by exhaustive octave placement
//!
//! Each voice of the target chord keeps its index; only its octave moves.
//! Every combination of per-voice shifts from [`OCTAVE_SHIFTS`] is tried and
//! the one with the least total motion against the previous chord wins.

use crate::pitch::Pitch;

/// Candidate shifts per voice, in enumeration order
pub const OCTAVE_SHIFTS: [i32; 3] = [-Pitch::OCTAVE, 0, Pitch::OCTAVE];

/// Voices placed by the search. Later voices keep the octave they were given.
pub const MAX_LED_VOICES: usize = 8;

/// Sum of absolute semitone motion between voices at matching indices
pub fn total_displacement(previous: &[Pitch], target: &[Pitch]) -> u64 {
    previous
        .iter()
        .zip(target)
        .map(|(&from, &to)| from.distance(to) as u64)
        .sum()
}

/// Choose octave placements for `target` that minimize motion from `previous`.
///
/// Returns `target` unchanged when there is no previous chord. Combinations
/// are enumerated with voice 0 as the most significant digit and shifts in
/// `-12, 0, +12` order; the first minimum found is kept. Only the first
/// `min(len)` voices are placed, capped at [`MAX_LED_VOICES`].
pub fn optimize(previous: Option<&[Pitch]>, target: &[Pitch]) -> Vec<Pitch> {
    let Some(previous) = previous else {
        return target.to_vec();
    };

    let voices = previous.len().min(target.len()).min(MAX_LED_VOICES);
    let Some(combinations) = OCTAVE_SHIFTS.len().checked_pow(voices as u32) else {
        return target.to_vec();
    };
    if voices == 0 {
        return target.to_vec();
    }

    let mut candidate = target.to_vec();
    let mut best = target.to_vec();
    let mut best_total = u64::MAX;

    for combination in 0..combinations {
        let mut digits = combination;
        for voice in (0..voices).rev() {
            let shift = OCTAVE_SHIFTS[digits % OCTAVE_SHIFTS.len()];
            digits /= OCTAVE_SHIFTS.len();
            candidate[voice] = target[voice].transpose(shift);
        }

        let total = total_displacement(previous, &candidate[..voices]);
        if total < best_total {
            best_total = total;
            best.copy_from_slice(&candidate);
        }
    }

    best
}

/// Voice-leading memory for one playback session
#[derive(Debug, Clone, Default)]
pub struct Voicer {
    previous: Option<Vec<Pitch>>,
}

impl Voicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Voice `target` against the last voiced chord and remember the result
    pub fn voice(&mut self, target: &[Pitch]) -> Vec<Pitch> {
        let voiced = optimize(self.previous.as_deref(), target);
        self.previous = Some(voiced.clone());
        voiced
    }

    /// Forget the last chord so the next one is played as given
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitches(values: &[i32]) -> Vec<Pitch> {
        values.iter().copied().map(Pitch).collect()
    }

    /// Every candidate placement, for checking optimality independently
    fn all_placements(target: &[Pitch]) -> Vec<Vec<Pitch>> {
        target.iter().fold(vec![Vec::new()], |acc, &pitch| {
            acc.into_iter()
                .flat_map(|prefix| {
                    OCTAVE_SHIFTS.iter().map(move |&shift| {
                        let mut next = prefix.clone();
                        next.push(pitch.transpose(shift));
                        next
                    })
                })
                .collect()
        })
    }

    #[test]
    fn test_first_chord_unchanged() {
        let target = pitches(&[67, 71, 74]);
        assert_eq!(optimize(None, &target), target);
    }

    #[test]
    fn test_tonic_to_dominant() {
        // C major to G major: every voice drops an octave (5 semitones each)
        let previous = pitches(&[60, 64, 67]);
        let voiced = optimize(Some(&previous), &pitches(&[67, 71, 74]));
        assert_eq!(voiced, pitches(&[55, 59, 62]));
        assert_eq!(total_displacement(&previous, &voiced), 15);
    }

    #[test]
    fn test_common_tones_stay() {
        let previous = pitches(&[60, 64, 67]);
        let voiced = optimize(Some(&previous), &pitches(&[60, 64, 67]));
        assert_eq!(voiced, previous);
    }

    #[test]
    fn test_tie_prefers_first_enumerated() {
        // 66 is six semitones from both 60 and 72; -12 is tried before 0
        let voiced = optimize(Some(&pitches(&[60])), &pitches(&[66]));
        assert_eq!(voiced, pitches(&[54]));
        let voiced = optimize(Some(&pitches(&[72])), &pitches(&[66]));
        assert_eq!(voiced, pitches(&[66]));
    }

    #[test]
    fn test_optimal_against_every_placement() {
        let cases = [
            (vec![60, 64, 67], vec![65, 69, 72]),
            (vec![55, 59, 62], vec![69, 72, 76]),
            (vec![48, 67, 76], vec![62, 65, 69]),
            (vec![60, 63, 66, 70], vec![71, 74, 78, 81]),
        ];

        for (previous, target) in cases {
            let previous = pitches(&previous);
            let target = pitches(&target);
            let voiced = optimize(Some(&previous), &target);
            let best = total_displacement(&previous, &voiced);

            assert_eq!(voiced.len(), target.len());
            for placement in all_placements(&target) {
                assert!(total_displacement(&previous, &placement) >= best);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let previous = pitches(&[62, 65, 69]);
        let target = pitches(&[67, 71, 74]);
        assert_eq!(
            optimize(Some(&previous), &target),
            optimize(Some(&previous), &target)
        );
    }

    #[test]
    fn test_mismatched_lengths_keep_extra_voices() {
        let previous = pitches(&[60, 64]);
        let voiced = optimize(Some(&previous), &pitches(&[72, 76, 79]));
        assert_eq!(voiced, pitches(&[60, 64, 79]));
    }

    #[test]
    fn test_large_chord_leads_first_voices_only() {
        let previous: Vec<Pitch> = (0..41).map(|i| Pitch(40 + i)).collect();
        let target: Vec<Pitch> = (0..41).map(|i| Pitch(52 + i)).collect();
        let voiced = optimize(Some(&previous), &target);

        assert_eq!(voiced.len(), target.len());
        assert_eq!(&voiced[..MAX_LED_VOICES], &previous[..MAX_LED_VOICES]);
        assert_eq!(&voiced[MAX_LED_VOICES..], &target[MAX_LED_VOICES..]);
    }

    #[test]
    fn test_voicer_resets() {
        let mut voicer = Voicer::new();
        assert_eq!(voicer.voice(&pitches(&[60, 64, 67])), pitches(&[60, 64, 67]));
        assert_eq!(voicer.voice(&pitches(&[67, 71, 74])), pitches(&[55, 59, 62]));
        voicer.reset();
        assert_eq!(voicer.voice(&pitches(&[67, 71, 74])), pitches(&[67, 71, 74]));
    }
}
