// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_are_unique_and_nonempty() {
    let a = generate_machine_id();
    let b = generate_machine_id();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}
