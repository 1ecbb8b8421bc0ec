#![no_main]

use arbitrary::Unstructured;
use libfuzzer_sys::fuzz_target;
use slopeladder::{AlignConfig, Simplifier, SimplifyConfig};

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(stack) = slopeladder::arbitrary::isoline_stack(&mut u, 24) else {
        return;
    };
    let Ok(alignment) = slopeladder::align(&stack, &AlignConfig::default()) else {
        return;
    };
    let config = SimplifyConfig {
        samples: 50,
        ..SimplifyConfig::default()
    };
    let Ok(mut s) = Simplifier::new(&stack, &alignment, config) else {
        return;
    };
    while s.step().is_some() {
        assert!(s.map().check_ranges(&stack));
    }
});
