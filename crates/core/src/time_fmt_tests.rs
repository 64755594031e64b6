// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    seconds = { 5, "5s" },
    minutes = { 120, "2m" },
    hours = { 3600, "1h" },
    hours_and_minutes = { 5400, "1h30m" },
    days = { 259200, "3d" },
)]
fn formats(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(secs), expected);
}
