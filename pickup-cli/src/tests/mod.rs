//! Shared test harness modules for the pickup CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod helpers;
mod schedule_unit;
mod sync_unit;
mod unit;
