// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Readiness polling schedule.
//!
//! The delay before poll `attempt + 1` is `scale / (budget - attempt)`: short
//! while most of the budget remains, growing toward `scale` as it runs out.
//! The schedule is monotonically non-decreasing, never exceeds `scale`, and
//! the total wait is bounded by `scale * H(budget)` (harmonic number), about
//! 3.3 x `scale` for the default budget of 15.

use std::time::Duration;

pub const DEFAULT_READINESS_BUDGET: u32 = 15;
pub const DEFAULT_BACKOFF_SCALE: Duration = Duration::from_secs(25);

/// Delay to wait after poll number `attempt` (0-based) failed.
pub fn delay(attempt: u32, budget: u32, scale: Duration) -> Duration {
	if budget == 0 {
		return Duration::ZERO;
	}
	let remaining = budget.saturating_sub(attempt).max(1);
	scale / remaining
}

/// Poll budget and delay scale for one readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
	pub budget: u32,
	pub scale: Duration,
}

impl Default for ReadinessPolicy {
	fn default() -> Self {
		Self {
			budget: DEFAULT_READINESS_BUDGET,
			scale: DEFAULT_BACKOFF_SCALE,
		}
	}
}

impl ReadinessPolicy {
	pub fn new(budget: u32, scale: Duration) -> Self {
		Self { budget, scale }
	}

	pub fn delay(&self, attempt: u32) -> Duration {
		delay(attempt, self.budget, self.scale)
	}

	/// Sum of every sleep taken when all polls fail.
	pub fn worst_case_wait(&self) -> Duration {
		(0..self.budget.saturating_sub(1))
			.map(|attempt| self.delay(attempt))
			.sum()
	}
}
