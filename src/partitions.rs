//! Partitioned balances.
//!
//! Issuance buckets tokens into partitions keyed by (issuance-day, region).
//! Ids are assigned lazily on first use and stay stable for the life of the
//! book. Each wallet keeps its active partitions in insertion order: draws
//! without an explicit partition selection consume oldest-activated-first,
//! and a fully depleted partition is swap-removed from the active list
//! (same reordering caveat as lock removal).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PreconditionError;
use crate::region::Region;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Stable identifier assigned by the [`PartitionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub day_bucket: u64,
    pub region: Region,
}

impl PartitionKey {
    /// Deterministic mapping from an issuance timestamp and region.
    pub fn for_issuance(issuance_time: u64, region: Region) -> Self {
        Self {
            day_bucket: issuance_time / SECONDS_PER_DAY,
            region,
        }
    }
}

/// Assigns and resolves partition ids. A partition exists from the first
/// issuance into its (day, region) combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionManager {
    keys: Vec<PartitionKey>,
}

impl PartitionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&mut self, key: PartitionKey) -> PartitionId {
        if let Some(idx) = self.keys.iter().position(|k| *k == key) {
            return PartitionId(idx as u64);
        }
        self.keys.push(key);
        PartitionId((self.keys.len() - 1) as u64)
    }

    pub fn lookup(&self, key: PartitionKey) -> Option<PartitionId> {
        self.keys
            .iter()
            .position(|k| *k == key)
            .map(|i| PartitionId(i as u64))
    }

    pub fn key_of(&self, id: PartitionId) -> Option<PartitionKey> {
        self.keys.get(id.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One wallet's partition balances, active list in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct WalletPartitions {
    active: Vec<(PartitionId, u64)>,
}

impl WalletPartitions {
    fn balance(&self, id: PartitionId) -> u64 {
        self.active
            .iter()
            .find(|(p, _)| *p == id)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    fn credit(&mut self, id: PartitionId, value: u64) {
        match self.active.iter_mut().find(|(p, _)| *p == id) {
            Some((_, v)) => *v = v.saturating_add(value),
            None => self.active.push((id, value)),
        }
    }

    fn debit(&mut self, id: PartitionId, value: u64) {
        if let Some(idx) = self.active.iter().position(|(p, _)| *p == id) {
            let remaining = self.active[idx].1.saturating_sub(value);
            if remaining == 0 {
                // O(1) removal; reorders the remaining active list.
                self.active.swap_remove(idx);
            } else {
                self.active[idx].1 = remaining;
            }
        }
    }
}

/// Per-wallet partitioned balance book plus the shared partition manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedBook {
    manager: PartitionManager,
    wallets: HashMap<String, WalletPartitions>,
}

impl PartitionedBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manager(&self) -> &PartitionManager {
        &self.manager
    }

    /// Credits `value` into the wallet's partition for `key`, creating the
    /// partition on first use.
    pub fn issue(&mut self, wallet: &str, key: PartitionKey, value: u64) -> PartitionId {
        let id = self.manager.ensure(key);
        self.wallets
            .entry(wallet.to_string())
            .or_default()
            .credit(id, value);
        id
    }

    pub fn balance(&self, wallet: &str, id: PartitionId) -> u64 {
        self.wallets.get(wallet).map(|w| w.balance(id)).unwrap_or(0)
    }

    pub fn total(&self, wallet: &str) -> u64 {
        self.wallets
            .get(wallet)
            .map(|w| w.active.iter().fold(0u64, |a, (_, v)| a.saturating_add(*v)))
            .unwrap_or(0)
    }

    /// Active partitions in insertion order.
    pub fn active_partitions(&self, wallet: &str) -> Vec<PartitionId> {
        self.wallets
            .get(wallet)
            .map(|w| w.active.iter().map(|(p, _)| *p).collect())
            .unwrap_or_default()
    }

    /// Plans a draw of `value` in insertion order, holding back `locked(id)`
    /// per partition. Returns `None` when the drawable total cannot satisfy
    /// the request; no state changes either way.
    pub fn plan_draw(
        &self,
        wallet: &str,
        value: u64,
        locked: impl Fn(PartitionId) -> u64,
    ) -> Option<Vec<(PartitionId, u64)>> {
        let book = self.wallets.get(wallet)?;
        let mut remaining = value;
        let mut plan = Vec::new();
        for (id, balance) in &book.active {
            if remaining == 0 {
                break;
            }
            let drawable = balance.saturating_sub(locked(*id));
            let take = drawable.min(remaining);
            if take > 0 {
                plan.push((*id, take));
                remaining -= take;
            }
        }
        if remaining > 0 {
            return None;
        }
        Some(plan)
    }

    /// Validates an explicit (partition, amount) selection against the
    /// requested total and each partition's drawable balance. All-or-nothing:
    /// any failure leaves no trace.
    pub fn validate_explicit(
        &self,
        wallet: &str,
        partitions: &[PartitionId],
        amounts: &[u64],
        total: u64,
        locked: impl Fn(PartitionId) -> u64,
    ) -> Result<Vec<(PartitionId, u64)>, PreconditionError> {
        if partitions.len() != amounts.len() {
            return Err(PreconditionError::LengthMismatch {
                expected: partitions.len(),
                got: amounts.len(),
            });
        }
        let supplied = amounts.iter().fold(0u64, |a, v| a.saturating_add(*v));
        if supplied != total {
            return Err(PreconditionError::PartitionMismatch {
                requested: total,
                supplied,
            });
        }
        let mut plan: Vec<(PartitionId, u64)> = Vec::with_capacity(partitions.len());
        for (id, amount) in partitions.iter().zip(amounts) {
            if self.manager.key_of(*id).is_none() {
                return Err(PreconditionError::UnknownPartition(id.0));
            }
            // A partition may appear more than once in the selection; earlier
            // entries reduce what is still drawable from it.
            let already_drawn = plan
                .iter()
                .filter(|(p, _)| p == id)
                .fold(0u64, |a, (_, v)| a.saturating_add(*v));
            let drawable = self
                .balance(wallet, *id)
                .saturating_sub(locked(*id))
                .saturating_sub(already_drawn);
            if drawable < *amount {
                return Err(PreconditionError::PartitionInsufficient {
                    partition: id.0,
                    available: drawable,
                    needed: *amount,
                });
            }
            plan.push((*id, *amount));
        }
        Ok(plan)
    }

    /// Applies a previously validated plan against the source wallet.
    pub fn apply_draw(&mut self, wallet: &str, plan: &[(PartitionId, u64)]) {
        if let Some(book) = self.wallets.get_mut(wallet) {
            for (id, amount) in plan {
                book.debit(*id, *amount);
            }
        }
    }

    /// Credits a plan into the destination wallet, activating partitions in
    /// plan order on first receipt.
    pub fn apply_credit(&mut self, wallet: &str, plan: &[(PartitionId, u64)]) {
        let book = self.wallets.entry(wallet.to_string()).or_default();
        for (id, amount) in plan {
            book.credit(*id, *amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_LOCKS: fn(PartitionId) -> u64 = |_| 0;

    fn day(n: u64) -> u64 {
        n * SECONDS_PER_DAY
    }

    #[test]
    fn ids_are_stable_and_lazy() {
        let mut book = PartitionedBook::new();
        let a = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 10);
        let b = book.issue("w1", PartitionKey::for_issuance(day(2), Region::Us), 10);
        let a2 = book.issue("w2", PartitionKey::for_issuance(day(1), Region::Us), 5);
        assert_ne!(a, b);
        assert_eq!(a, a2);
        assert_eq!(book.manager().len(), 2);
    }

    #[test]
    fn same_day_different_region_is_a_new_partition() {
        let mut book = PartitionedBook::new();
        let us = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 10);
        let eu = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Eu), 10);
        assert_ne!(us, eu);
    }

    #[test]
    fn draw_consumes_in_insertion_order() {
        let mut book = PartitionedBook::new();
        let p1 = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 30);
        let p2 = book.issue("w1", PartitionKey::for_issuance(day(2), Region::Us), 50);
        let plan = book.plan_draw("w1", 60, NO_LOCKS).unwrap();
        assert_eq!(plan, vec![(p1, 30), (p2, 30)]);
        assert_eq!(plan.iter().map(|(_, v)| v).sum::<u64>(), 60);
        book.apply_draw("w1", &plan);
        // p1 depleted and swap-removed from the active set.
        assert_eq!(book.active_partitions("w1"), vec![p2]);
        assert_eq!(book.balance("w1", p2), 20);
    }

    #[test]
    fn draw_over_total_fails_without_mutation() {
        let mut book = PartitionedBook::new();
        book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 30);
        assert!(book.plan_draw("w1", 31, NO_LOCKS).is_none());
        assert_eq!(book.total("w1"), 30);
    }

    #[test]
    fn partition_locks_hold_back_drawable() {
        let mut book = PartitionedBook::new();
        let p1 = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 30);
        let p2 = book.issue("w1", PartitionKey::for_issuance(day(2), Region::Us), 50);
        let locked = move |id: PartitionId| if id == p1 { 25 } else { 0 };
        let plan = book.plan_draw("w1", 40, locked).unwrap();
        assert_eq!(plan, vec![(p1, 5), (p2, 35)]);
    }

    #[test]
    fn explicit_plan_must_reconcile() {
        let mut book = PartitionedBook::new();
        let p1 = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 30);
        let p2 = book.issue("w1", PartitionKey::for_issuance(day(2), Region::Us), 50);

        let err = book
            .validate_explicit("w1", &[p1, p2], &[10, 20], 40, NO_LOCKS)
            .unwrap_err();
        assert!(matches!(err, PreconditionError::PartitionMismatch { .. }));

        let err = book
            .validate_explicit("w1", &[p1, p2], &[40, 0], 40, NO_LOCKS)
            .unwrap_err();
        assert!(matches!(err, PreconditionError::PartitionInsufficient { .. }));

        let plan = book
            .validate_explicit("w1", &[p1, p2], &[10, 30], 40, NO_LOCKS)
            .unwrap();
        assert_eq!(plan, vec![(p1, 10), (p2, 30)]);
    }

    #[test]
    fn explicit_duplicate_partition_cannot_overdraw() {
        let mut book = PartitionedBook::new();
        let p1 = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 30);

        // Two entries for the same partition must be accounted cumulatively:
        // 20 + 20 against a 30-token partition is an overdraw.
        let err = book
            .validate_explicit("w1", &[p1, p1], &[20, 20], 40, NO_LOCKS)
            .unwrap_err();
        assert!(matches!(err, PreconditionError::PartitionInsufficient { .. }));
        assert_eq!(book.total("w1"), 30);

        // A duplicate selection inside the balance is legal and conserves
        // tokens end to end.
        let plan = book
            .validate_explicit("w1", &[p1, p1], &[20, 10], 30, NO_LOCKS)
            .unwrap();
        book.apply_draw("w1", &plan);
        book.apply_credit("w2", &plan);
        assert_eq!(book.total("w1"), 0);
        assert_eq!(book.total("w2"), 30);
    }

    #[test]
    fn credit_activates_in_plan_order() {
        let mut book = PartitionedBook::new();
        let p1 = book.issue("w1", PartitionKey::for_issuance(day(1), Region::Us), 30);
        let p2 = book.issue("w1", PartitionKey::for_issuance(day(2), Region::Us), 50);
        let plan = book.plan_draw("w1", 60, NO_LOCKS).unwrap();
        book.apply_draw("w1", &plan);
        book.apply_credit("w2", &plan);
        assert_eq!(book.active_partitions("w2"), vec![p1, p2]);
        assert_eq!(book.total("w2"), 60);
    }
}
