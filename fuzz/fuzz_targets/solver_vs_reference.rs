#![no_main]

use arbitrary::Unstructured;
use libfuzzer_sys::fuzz_target;
use slopeladder::align::{matching::bottleneck_by_dp, reference, solve};

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(costs) = slopeladder::arbitrary::cost_matrix(&mut u, 64) else {
        return;
    };
    let fast = solve(&costs);
    let slow = reference::solve(&costs);
    assert_eq!(fast, slow);
    assert!(fast.is_monotone());
    // Costs within 1e-6 count as ties.
    assert!((fast.bottleneck() - bottleneck_by_dp(&costs)).abs() <= 1e-6);
});
