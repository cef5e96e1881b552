// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide registry of compute units, keyed by derived name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use crate::unit::{ComputeUnit, UnitStatus};

/// State kept for one derived name.
///
/// `begin` serializes create and stop for the name. The published unit is
/// readable without that lock so invocations never queue behind a
/// provisioning wait; they see the unit as last published.
#[derive(Default)]
pub struct UnitSlot {
	operation: Mutex<()>,
	unit: RwLock<Option<ComputeUnit>>,
}

impl UnitSlot {
	/// Exclusive right to run a lifecycle operation on this name.
	pub async fn begin(&self) -> MutexGuard<'_, ()> {
		self.operation.lock().await
	}

	/// Snapshot of the last published unit.
	pub async fn current(&self) -> Option<ComputeUnit> {
		self.unit.read().await.clone()
	}

	pub async fn publish(&self, unit: &ComputeUnit) {
		*self.unit.write().await = Some(unit.clone());
	}

	pub async fn clear(&self) {
		*self.unit.write().await = None;
	}

	/// `Ready -> Running` after the first successful invocation. Any other
	/// status is left alone.
	pub async fn mark_running(&self) {
		let mut unit = self.unit.write().await;
		if let Some(unit) = unit.as_mut() {
			if unit.status() == UnitStatus::Ready {
				if let Err(e) = unit.transition(UnitStatus::Running) {
					warn!(unit = %unit.name, error = %e, "failed to mark unit running");
				}
			}
		}
	}
}

#[derive(Default)]
pub struct UnitRegistry {
	slots: Mutex<HashMap<String, Arc<UnitSlot>>>,
}

impl UnitRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Slot for `name`, created empty on first use.
	pub async fn slot(&self, name: &str) -> Arc<UnitSlot> {
		let mut slots = self.slots.lock().await;
		slots.entry(name.to_string()).or_default().clone()
	}

	/// Slot for `name` if one exists; never creates it.
	pub async fn get(&self, name: &str) -> Option<Arc<UnitSlot>> {
		self.slots.lock().await.get(name).cloned()
	}

	pub async fn contains(&self, name: &str) -> bool {
		self.slots.lock().await.contains_key(name)
	}

	/// Drop the slot for `name` once nothing is published in it and no caller
	/// holds it. Slots are only handed out under the map lock, so a slot seen
	/// here with no other holder cannot be picked up concurrently.
	pub async fn prune(&self, name: &str) -> bool {
		let mut slots = self.slots.lock().await;
		let Some(slot) = slots.get(name) else {
			return false;
		};
		if Arc::strong_count(slot) > 1 || slot.unit.read().await.is_some() {
			return false;
		}
		slots.remove(name);
		debug!(unit = %name, "pruned unit slot");
		true
	}

	/// Every unit currently published, sorted by name.
	pub async fn units(&self) -> Vec<ComputeUnit> {
		let slots: Vec<Arc<UnitSlot>> = self.slots.lock().await.values().cloned().collect();
		let mut units = Vec::with_capacity(slots.len());
		for slot in slots {
			if let Some(unit) = slot.current().await {
				units.push(unit);
			}
		}
		units.sort_by(|a, b| a.name.cmp(&b.name));
		units
	}
}
