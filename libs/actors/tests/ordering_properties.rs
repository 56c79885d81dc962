//! Ordering Property Tests
//!
//! Properties that must hold for any set of scheduled times:
//! - deliveries are non-decreasing in simulation time
//! - each message is stamped with exactly the time it was scheduled for
//! - equal times are delivered in submission order
//! - the final clock is the latest scheduled time

mod common;

use common::*;
use des_actors::{ActorSystem, DispatchMode, KernelConfig};
use proptest::prelude::*;

fn times_strategy() -> impl Strategy<Value = Vec<f64>> {
    // A small grid of times makes ties common.
    prop::collection::vec((0u32..40).prop_map(|t| t as f64 * 0.5), 1..40)
}

fn simulate(times: &[f64], dispatch: DispatchMode) -> (Journal, des_actors::RunReport) {
    tokio_test::block_on(async {
        let mut config = KernelConfig::default();
        config.scheduler.dispatch = dispatch;
        let system = ActorSystem::with_config(config).unwrap();
        let journal = Journal::new();
        system
            .register_actor("sink", Recorder::new(&journal).stop_after(times.len()))
            .await
            .unwrap();

        for (seq, time) in times.iter().enumerate() {
            system
                .schedule_event(at(*time), tagged("tick", "sink", &seq.to_string()))
                .await
                .unwrap();
        }
        let report = run_bounded(&system).await.unwrap();
        (journal, report)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_delivery_order_is_time_then_submission(times in times_strategy()) {
        let (journal, report) = simulate(&times, DispatchMode::AwaitProcessed);

        let mut expected: Vec<(f64, usize)> = times.iter().copied().zip(0..).collect();
        expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let delivered: Vec<(f64, usize)> = journal
            .entries()
            .iter()
            .map(|d| (d.delivered, d.content.as_str().unwrap().parse().unwrap()))
            .collect();

        prop_assert_eq!(delivered, expected);
        prop_assert_eq!(report.metrics.late_events, 0);
    }

    #[test]
    fn prop_clock_never_moves_backwards(times in times_strategy()) {
        let (journal, report) = simulate(&times, DispatchMode::FireAndForget);

        let stamps = journal.times();
        prop_assert_eq!(stamps.len(), times.len());
        prop_assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

        let latest = times.iter().copied().fold(0.0, f64::max);
        prop_assert_eq!(report.final_clock.as_f64(), latest);
    }
}
