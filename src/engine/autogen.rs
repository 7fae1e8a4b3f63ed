use rand::Rng;

use crate::shared::NUM_SLICES;

/// Odds that a chaos deviation repeats the current step instead of
/// jumping somewhere random. Fixed by design; changing it changes the
/// whole feel of auto mode.
const REPEAT_ODDS: f64 = 0.3;

/// Pick the next slice for auto mode.
///
/// With probability `chaos` the generator deviates from sequential
/// order: 30% of deviations re-hit the current step (a stutter-like
/// repeat), the rest jump to a uniform random slice. Otherwise the step
/// counter's own position plays. The caller advances the step counter
/// after every dispatch regardless.
pub fn next_slice<R: Rng>(chaos: f64, auto_step: usize, rng: &mut R) -> usize {
    if rng.gen_range(0.0..1.0) < chaos {
        if rng.gen_range(0.0..1.0) < REPEAT_ODDS {
            auto_step % NUM_SLICES
        } else {
            rng.gen_range(0..NUM_SLICES)
        }
    } else {
        auto_step % NUM_SLICES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_chaos_is_strictly_sequential() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut step = 0usize;
        for i in 0..10_000 {
            let slice = next_slice(0.0, step, &mut rng);
            assert_eq!(slice, i % NUM_SLICES);
            step = (step + 1) % NUM_SLICES;
        }
    }

    #[test]
    fn full_chaos_abandons_sequential_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut step = 0usize;
        let mut sequential = 0usize;
        let n = 10_000;
        for _ in 0..n {
            let slice = next_slice(1.0, step, &mut rng);
            if slice == step % NUM_SLICES {
                sequential += 1;
            }
            step = (step + 1) % NUM_SLICES;
        }
        // deviations dominate: 30% repeats plus a 1/16 chance of a random
        // pick landing on the step, roughly 34%, never the full sequence
        let ratio = sequential as f64 / n as f64;
        assert!(ratio > 0.25 && ratio < 0.45, "sequential ratio {ratio}");
    }

    #[test]
    fn half_chaos_still_mostly_sequential() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut step = 0usize;
        let mut sequential = 0usize;
        let n = 10_000;
        for _ in 0..n {
            if next_slice(0.5, step, &mut rng) == step % NUM_SLICES {
                sequential += 1;
            }
            step = (step + 1) % NUM_SLICES;
        }
        let ratio = sequential as f64 / n as f64;
        // 50% direct + 50% * (30% repeat + 70% * 1/16)
        assert!(ratio > 0.58 && ratio < 0.76, "sequential ratio {ratio}");
    }
}
