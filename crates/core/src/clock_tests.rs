// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances_both_instant_and_system_time() {
    let clock = FakeClock::new();
    let instant_before = clock.now();
    let system_before = clock.system_now();

    clock.advance(Duration::from_secs(5));

    assert_eq!(clock.now() - instant_before, Duration::from_secs(5));
    assert_eq!(
        clock
            .system_now()
            .duration_since(system_before)
            .unwrap(),
        Duration::from_secs(5)
    );
}

#[test]
fn fake_clock_is_independent_across_clones() {
    let clock = FakeClock::new();
    let cloned = clock.clone();
    clock.advance(Duration::from_secs(1));
    // clones share the same underlying Arc<Mutex<_>>
    assert_eq!(clock.now(), cloned.now());
}
