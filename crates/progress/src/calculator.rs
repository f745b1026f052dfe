//! Pure progress roll-up.
//!
//! Both functions are total: empty input yields 0 and the output is always
//! clamped to 0..=100. Rounding is half away from zero.

use bookwork_core::{effective_weight, Milestone, Task};

/// A milestone's progress paired with its weight, as seen by the booking roll-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedProgress {
    /// Milestone completion percentage
    pub progress: u8,
    /// Raw weight; unset or non-positive counts as 1
    pub weight: Option<f64>,
}

impl WeightedProgress {
    /// Pair a percentage with a weight.
    pub fn new(progress: u8, weight: Option<f64>) -> Self {
        Self { progress, weight }
    }
}

impl From<&Milestone> for WeightedProgress {
    fn from(milestone: &Milestone) -> Self {
        Self {
            progress: milestone.progress_percentage,
            weight: milestone.weight,
        }
    }
}

/// Milestone completion from its tasks.
///
/// Mean of each task's effective progress. Completed tasks count 100 whatever
/// their stored percentage; cancelled tasks stay in the denominator and
/// contribute 0.
pub fn milestone_progress(tasks: &[Task]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }

    let sum: f64 = tasks.iter().map(|t| f64::from(t.effective_progress())).sum();
    to_percentage(sum / tasks.len() as f64)
}

/// Booking completion from its milestones' progress and weights.
pub fn booking_progress(milestones: &[WeightedProgress]) -> u8 {
    if milestones.is_empty() {
        return 0;
    }

    let (weighted, total_weight) = milestones.iter().fold((0.0, 0.0), |(sum, total), m| {
        let w = effective_weight(m.weight);
        (sum + f64::from(m.progress.min(100)) * w, total + w)
    });

    if total_weight <= 0.0 {
        return 0;
    }
    to_percentage(weighted / total_weight)
}

/// [`booking_progress`] over stored milestone records.
pub fn booking_progress_of(milestones: &[Milestone]) -> u8 {
    let weighted: Vec<WeightedProgress> = milestones.iter().map(WeightedProgress::from).collect();
    booking_progress(&weighted)
}

/// Quotients are snapped to 9 decimal places before rounding so that an exact
/// half reached through fractional weights (1.4999999999999998) rounds up.
const SNAP: f64 = 1e9;

fn to_percentage(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    let snapped = (value * SNAP).round() / SNAP;
    snapped.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwork_core::{BookingId, MilestoneId, TaskStatus};
    use proptest::prelude::*;

    fn task(status: TaskStatus, pct: u8) -> Task {
        let mut t = Task::new(MilestoneId::new(), "t");
        t.status = status;
        t.progress_percentage = pct;
        t
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(milestone_progress(&[]), 0);
        assert_eq!(booking_progress(&[]), 0);
        assert_eq!(booking_progress_of(&[]), 0);
    }

    #[test]
    fn test_milestone_two_completed_one_half_done() {
        let tasks = vec![
            task(TaskStatus::Completed, 100),
            task(TaskStatus::Completed, 100),
            task(TaskStatus::InProgress, 50),
        ];
        // (100 + 100 + 50) / 3 = 83.33
        assert_eq!(milestone_progress(&tasks), 83);
    }

    #[test]
    fn test_completed_status_overrides_stale_percentage() {
        let tasks = vec![task(TaskStatus::Completed, 20), task(TaskStatus::Pending, 0)];
        assert_eq!(milestone_progress(&tasks), 50);
    }

    #[test]
    fn test_cancelled_counts_in_denominator() {
        let tasks = vec![
            task(TaskStatus::Completed, 100),
            task(TaskStatus::Cancelled, 90),
        ];
        assert_eq!(milestone_progress(&tasks), 50);
    }

    #[test]
    fn test_rounds_half_up() {
        let tasks = vec![task(TaskStatus::InProgress, 1), task(TaskStatus::InProgress, 2)];
        assert_eq!(milestone_progress(&tasks), 2);
    }

    #[test]
    fn test_milestone_output_is_bounded() {
        let tasks = vec![task(TaskStatus::InProgress, 255), task(TaskStatus::OnHold, 250)];
        assert_eq!(milestone_progress(&tasks), 100);

        for status in [TaskStatus::Pending, TaskStatus::Cancelled] {
            assert_eq!(milestone_progress(&[task(status, 255)]), 0);
        }
    }

    #[test]
    fn test_booking_weighted_mean() {
        let milestones = vec![
            WeightedProgress::new(80, Some(1.0)),
            WeightedProgress::new(40, Some(3.0)),
        ];
        // (80 * 1 + 40 * 3) / 4 = 50
        assert_eq!(booking_progress(&milestones), 50);
    }

    #[test]
    fn test_booking_uniform_weight_is_plain_mean() {
        let values = [10u8, 25, 90, 33, 0];
        let milestones: Vec<_> = values.iter().map(|&p| WeightedProgress::new(p, None)).collect();
        let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64;
        assert_eq!(booking_progress(&milestones), mean.round() as u8);
    }

    #[test]
    fn test_booking_bad_weights_default_to_one() {
        let milestones = vec![
            WeightedProgress::new(100, Some(0.0)),
            WeightedProgress::new(0, Some(-5.0)),
        ];
        assert_eq!(booking_progress(&milestones), 50);
    }

    #[test]
    fn test_booking_from_records() {
        let booking = BookingId::new();
        let mut a = Milestone::new(booking, "a");
        a.progress_percentage = 100;
        a.weight = Some(2.0);
        let mut b = Milestone::new(booking, "b");
        b.progress_percentage = 40;

        // (200 + 40) / 3 = 80
        assert_eq!(booking_progress_of(&[a, b]), 80);
    }

    #[test]
    fn test_fractional_uniform_weights_round_half_up() {
        // (0 + 3) / 2 = 1.5, computed as 2.1 / 1.4
        let milestones = vec![
            WeightedProgress::new(0, Some(0.7)),
            WeightedProgress::new(3, Some(0.7)),
        ];
        assert_eq!(booking_progress(&milestones), 2);

        // (0 + 31) / 2 = 15.5, computed as 9.3 / 0.6
        let milestones = vec![
            WeightedProgress::new(0, Some(0.3)),
            WeightedProgress::new(31, Some(0.3)),
        ];
        assert_eq!(booking_progress(&milestones), 16);
    }

    /// Integer mean rounded half up.
    fn rounded_mean(values: &[u8]) -> u8 {
        let n = values.len() as u32;
        let sum: u32 = values.iter().map(|&v| u32::from(v)).sum();
        ((2 * sum + n) / (2 * n)) as u8
    }

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop::sample::select(vec![
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::OnHold,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ])
    }

    /// Uniform weights, including fractional ones and the unset default.
    fn arb_uniform_weight() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![
            Just(None),
            (1u32..=100).prop_map(|k| Some(f64::from(k) / 10.0)),
            (0.01f64..50.0).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn prop_milestone_progress_is_bounded_rounded_mean(
            tasks in prop::collection::vec((arb_status(), any::<u8>()), 0..40)
        ) {
            let tasks: Vec<Task> = tasks.into_iter().map(|(s, p)| task(s, p)).collect();
            let progress = milestone_progress(&tasks);
            prop_assert!(progress <= 100);

            if tasks.is_empty() {
                prop_assert_eq!(progress, 0);
            } else {
                let effective: Vec<u8> = tasks.iter().map(Task::effective_progress).collect();
                prop_assert_eq!(progress, rounded_mean(&effective));
            }
        }

        #[test]
        fn prop_uniform_weight_booking_is_rounded_mean(
            values in prop::collection::vec(0u8..=100, 1..30),
            weight in arb_uniform_weight(),
        ) {
            let milestones: Vec<_> = values
                .iter()
                .map(|&p| WeightedProgress::new(p, weight))
                .collect();
            prop_assert_eq!(booking_progress(&milestones), rounded_mean(&values));
        }

        #[test]
        fn prop_booking_progress_is_bounded(
            milestones in prop::collection::vec(
                (any::<u8>(), prop::option::of(-10.0f64..10.0)),
                0..20,
            )
        ) {
            let milestones: Vec<_> = milestones
                .into_iter()
                .map(|(p, w)| WeightedProgress::new(p, w))
                .collect();
            prop_assert!(booking_progress(&milestones) <= 100);
        }
    }
}
