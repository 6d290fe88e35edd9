pub const DEFAULT_SNAP_STEP_MINUTES: u32 = 15;

/// Quantizes minute offsets onto a fixed step grid.
///
/// Ties round away from zero, so `snap(-x) == -snap(x)` and a drag by `+d`
/// followed by `-d` always lands back where it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapPolicy {
    step_minutes: u32,
}

impl Default for SnapPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_STEP_MINUTES)
    }
}

impl SnapPolicy {
    pub fn new(step_minutes: u32) -> Self {
        Self {
            step_minutes: step_minutes.max(1),
        }
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    /// Non-finite input snaps to zero.
    pub fn snap(&self, minutes: f64) -> i64 {
        if !minutes.is_finite() {
            return 0;
        }
        let step = f64::from(self.step_minutes);
        ((minutes / step).round() * step) as i64
    }

    pub fn snap_minutes(&self, minutes: i64) -> i64 {
        let step = i64::from(self.step_minutes);
        let remainder = minutes.rem_euclid(step);
        let floor = minutes - remainder;
        if remainder * 2 > step || (remainder * 2 == step && minutes > 0) {
            floor + step
        } else {
            floor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn snap_rounds_to_nearest_step() {
        let policy = SnapPolicy::default();
        assert_eq!(policy.snap(37.0), 30);
        assert_eq!(policy.snap(38.0), 45);
        assert_eq!(policy.snap(-37.0), -30);
        assert_eq!(policy.snap(7.0), 0);
        assert_eq!(policy.snap(0.0), 0);
    }

    #[test]
    fn snap_ties_round_away_from_zero() {
        let policy = SnapPolicy::default();
        assert_eq!(policy.snap(7.5), 15);
        assert_eq!(policy.snap(-7.5), -15);
        assert_eq!(policy.snap(22.5), 30);
        assert_eq!(policy.snap(-22.5), -30);

        let even = SnapPolicy::new(30);
        assert_eq!(even.snap_minutes(15), 30);
        assert_eq!(even.snap_minutes(-15), -30);
        assert_eq!(even.snap_minutes(45), 60);
        assert_eq!(even.snap_minutes(-45), -60);
    }

    #[test]
    fn zero_step_falls_back_to_one_minute() {
        let policy = SnapPolicy::new(0);
        assert_eq!(policy.step_minutes(), 1);
        assert_eq!(policy.snap(12.4), 12);
    }

    #[test]
    fn non_finite_input_snaps_to_zero() {
        let policy = SnapPolicy::default();
        assert_eq!(policy.snap(f64::NAN), 0);
        assert_eq!(policy.snap(f64::INFINITY), 0);
    }

    proptest! {
        #[test]
        fn snap_is_idempotent(minutes in -100_000.0f64..100_000.0f64, step in 1u32..120u32) {
            let policy = SnapPolicy::new(step);
            let once = policy.snap(minutes);
            prop_assert_eq!(policy.snap(once as f64), once);
            prop_assert_eq!(policy.snap_minutes(once), once);
            prop_assert_eq!(once % i64::from(step), 0);
        }

        #[test]
        fn snap_is_odd_symmetric(minutes in -100_000.0f64..100_000.0f64, step in 1u32..120u32) {
            let policy = SnapPolicy::new(step);
            prop_assert_eq!(policy.snap(-minutes), -policy.snap(minutes));
        }

        #[test]
        fn integer_snap_matches_float_snap(minutes in -100_000i64..100_000i64, step in 1u32..120u32) {
            let policy = SnapPolicy::new(step);
            prop_assert_eq!(policy.snap_minutes(minutes), policy.snap(minutes as f64));
        }
    }
}
