use crate::shared::NUM_SLICES;

/// The step alphabet mirrors the pad grid: row by row, top-left first.
const SLICE_CHARS: [char; NUM_SLICES] = [
    '1', '2', '3', '4',
    'q', 'w', 'e', 'r',
    'a', 's', 'd', 'f',
    'z', 'x', 'c', 'v',
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// trigger this slice on the beat
    Slice(usize),
    /// stop the current voice, leave the beat silent
    Rest,
    /// let whatever is playing keep going
    Hold,
}

/// A compiled step program. Immutable once built; `play_sequence` always
/// replaces the whole thing rather than patching it, and the cursor lives
/// with the scheduler, never in here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceProgram {
    steps: Vec<Step>,
}

impl SequenceProgram {
    /// Compile never fails: slice characters (case-insensitive) become
    /// `Slice`, `.` and space become `Rest`, `-` becomes `Hold`, and
    /// anything else is silently dropped. Zero surviving characters
    /// yield an empty program, which the scheduler treats as idle.
    pub fn compile(text: &str) -> Self {
        let steps = text
            .chars()
            .filter_map(|c| {
                let c = c.to_ascii_lowercase();
                if let Some(i) = SLICE_CHARS.iter().position(|&s| s == c) {
                    Some(Step::Slice(i))
                } else {
                    match c {
                        '.' | ' ' => Some(Step::Rest),
                        '-' => Some(Step::Hold),
                        _ => None,
                    }
                }
            })
            .collect();
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, cursor: usize) -> Step {
        self.steps[cursor % self.steps.len()]
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_and_hold_steps_compile_in_place() {
        let p = SequenceProgram::compile("1.-2");
        assert_eq!(
            p.steps(),
            &[Step::Slice(0), Step::Rest, Step::Hold, Step::Slice(1)]
        );
    }

    #[test]
    fn full_alphabet_maps_in_pad_order() {
        let p = SequenceProgram::compile("1234qwerasdfzxcv");
        assert_eq!(p.len(), NUM_SLICES);
        for (i, s) in p.steps().iter().enumerate() {
            assert_eq!(*s, Step::Slice(i));
        }
    }

    #[test]
    fn uppercase_is_the_same_program() {
        assert_eq!(
            SequenceProgram::compile("QWER"),
            SequenceProgram::compile("qwer")
        );
    }

    #[test]
    fn unrecognized_characters_produce_no_steps() {
        let p = SequenceProgram::compile("1!@#[]2");
        assert_eq!(p.steps(), &[Step::Slice(0), Step::Slice(1)]);
        assert!(SequenceProgram::compile("!?[]{}").is_empty());
    }

    #[test]
    fn space_is_a_rest() {
        let p = SequenceProgram::compile("1 2");
        assert_eq!(p.steps(), &[Step::Slice(0), Step::Rest, Step::Slice(1)]);
    }

    #[test]
    fn compiling_twice_is_identical() {
        let text = "1234 qwer..asdf--zxcv";
        assert_eq!(
            SequenceProgram::compile(text),
            SequenceProgram::compile(text)
        );
    }
}
