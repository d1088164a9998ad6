//! Lock accounting.
//!
//! Two books per investor:
//!
//! * **Lock records** — explicit holds (reason, value, release time,
//!   optional partition scope). Over-locking is legal: the sum of active
//!   locks may exceed the balance, and the transferable amount clamps at
//!   zero. A release time of 0 never expires on its own; the lock must be
//!   removed explicitly.
//! * **Issuance records** — (value, issuance time) pairs driving the
//!   region hold-up checks. Records are consumed oldest-first as tokens
//!   leave the investor, so only still-held primary issuance stays subject
//!   to a lock period.
//!
//! Removal is swap-remove with the last element, which reorders the
//! remaining records. Callers iterating over lock indices must restart
//! after a removal; this is a documented contract, kept for O(1) deletes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;
use crate::partitions::PartitionId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Per-investor sequence number, monotonically increasing, never reused.
    pub seq: u64,
    pub reason_code: u32,
    pub reason: String,
    pub value: u64,
    /// Epoch seconds; 0 means "until explicitly removed".
    pub release_time: u64,
    /// Present when the lock binds a single partition instead of the whole
    /// balance.
    pub partition: Option<PartitionId>,
}

impl LockRecord {
    pub fn active_at(&self, time: u64) -> bool {
        self.release_time == 0 || self.release_time > time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    pub value: u64,
    pub time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAccounting {
    locks: HashMap<String, Vec<LockRecord>>,
    next_seq: HashMap<String, u64>,
    /// Sorted by issuance time, oldest first.
    issuances: HashMap<String, Vec<IssuanceRecord>>,
}

impl LockAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a lock and returns its sequence number. No validation against
    /// the investor's balance: over-locking is allowed.
    pub fn add_lock(
        &mut self,
        investor: &str,
        value: u64,
        reason_code: u32,
        reason: &str,
        release_time: u64,
        partition: Option<PartitionId>,
    ) -> Result<u64, PreconditionError> {
        if investor.is_empty() {
            return Err(PreconditionError::EmptyInvestorId);
        }
        if value == 0 {
            return Err(PreconditionError::ZeroValue);
        }
        let seq = self.next_seq.entry(investor.to_string()).or_insert(0);
        let assigned = *seq;
        *seq += 1;
        self.locks
            .entry(investor.to_string())
            .or_default()
            .push(LockRecord {
                seq: assigned,
                reason_code,
                reason: reason.to_string(),
                value,
                release_time,
                partition,
            });
        Ok(assigned)
    }

    pub fn locks_of(&self, investor: &str) -> &[LockRecord] {
        self.locks.get(investor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lock_count(&self, investor: &str) -> usize {
        self.locks_of(investor).len()
    }

    /// Swap-removes the lock at `index`. The last record takes its slot, so
    /// remaining indices are reordered; iterate-and-remove callers restart.
    pub fn remove_lock(
        &mut self,
        investor: &str,
        index: usize,
    ) -> Result<LockRecord, PreconditionError> {
        let records = self
            .locks
            .get_mut(investor)
            .filter(|r| index < r.len())
            .ok_or_else(|| PreconditionError::LockIndexOutOfRange {
                investor: investor.to_string(),
                index,
            })?;
        let removed = records.swap_remove(index);
        if records.is_empty() {
            self.locks.remove(investor);
        }
        Ok(removed)
    }

    /// Sum of lock values active at `time`, whole-balance and partition-scoped
    /// alike.
    pub fn locked_at(&self, investor: &str, time: u64) -> u64 {
        self.locks_of(investor)
            .iter()
            .filter(|l| l.active_at(time))
            .fold(0u64, |acc, l| acc.saturating_add(l.value))
    }

    /// Active locked value scoped to one partition.
    pub fn partition_locked_at(&self, investor: &str, partition: PartitionId, time: u64) -> u64 {
        self.locks_of(investor)
            .iter()
            .filter(|l| l.active_at(time) && l.partition == Some(partition))
            .fold(0u64, |acc, l| acc.saturating_add(l.value))
    }

    /// Balance minus active locks, clamped at zero.
    pub fn transferable_at(&self, investor: &str, balance: u64, time: u64) -> u64 {
        balance - self.locked_at(investor, time).min(balance)
    }

    /// Records a primary issuance for hold-up accounting, keeping the book
    /// sorted oldest-first (back-dated issuance lands in order).
    pub fn record_issuance(&mut self, investor: &str, value: u64, time: u64) {
        let book = self.issuances.entry(investor.to_string()).or_default();
        let pos = book.partition_point(|r| r.time <= time);
        book.insert(pos, IssuanceRecord { value, time });
    }

    pub fn issuances_of(&self, investor: &str) -> &[IssuanceRecord] {
        self.issuances
            .get(investor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Value still inside the hold-up window at `time` for the given lock
    /// period.
    pub fn held_under_lock(&self, investor: &str, time: u64, lock_period: u64) -> u64 {
        self.issuances_of(investor)
            .iter()
            .filter(|r| r.time.saturating_add(lock_period) > time)
            .fold(0u64, |acc, r| acc.saturating_add(r.value))
    }

    /// Balance minus still-held issuance under `lock_period`, clamped at zero.
    pub fn transferable_after_hold_up(
        &self,
        investor: &str,
        balance: u64,
        time: u64,
        lock_period: u64,
    ) -> u64 {
        balance - self.held_under_lock(investor, time, lock_period).min(balance)
    }

    /// Consumes issuance records oldest-first as `value` tokens leave the
    /// investor (transfer out, burn, seize).
    pub fn consume_issuances(&mut self, investor: &str, value: u64) {
        let Some(book) = self.issuances.get_mut(investor) else {
            return;
        };
        let mut remaining = value;
        while remaining > 0 {
            let Some(first) = book.first_mut() else { break };
            if first.value > remaining {
                first.value -= remaining;
                break;
            }
            remaining -= first.value;
            book.remove(0);
        }
        if book.is_empty() {
            self.issuances.remove(investor);
        }
    }
}
