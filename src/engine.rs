//! Mutating validation entry points.
//!
//! The engine owns the mutable compliance books (config, counters, locks,
//! partitioned balances) and exposes decide-then-mutate operations to the
//! owning ledger. Atomicity is explicit: every fallible step — precondition
//! validation, the rule checklist, partition plan validation — runs before
//! the first mutation, so a rejected or malformed call leaves no partial
//! state behind.
//!
//! There is no internal concurrency. The engine is `Send`; a host with real
//! parallelism must serialize mutating access (`Mutex<ComplianceEngine>` or
//! equivalent) to preserve the serialized-execution semantics the checks
//! assume. Authorization is the caller's job: every mutating entry point
//! assumes a pre-authorized call.

use crate::config::ComplianceConfig;
use crate::counters::{Classification, InvestorCounters};
use crate::error::PreconditionError;
use crate::locks::{LockAccounting, LockRecord};
use crate::logging;
use crate::partitions::{PartitionId, PartitionKey, PartitionedBook};
use crate::registry::CheckContext;
use crate::rules::{pre_burn_check, EngineView, Reason, RegulatedRules, RuleSet, WhitelistedRules};
use crate::util::same_investor;

pub struct ComplianceEngine<R: RuleSet = RegulatedRules> {
    rules: R,
    config: ComplianceConfig,
    counters: InvestorCounters,
    locks: LockAccounting,
    partitions: PartitionedBook,
}

impl ComplianceEngine<RegulatedRules> {
    /// Engine running the full jurisdictional rule set.
    pub fn regulated() -> Self {
        Self::with_rules(RegulatedRules)
    }
}

impl ComplianceEngine<WhitelistedRules> {
    /// Engine running eligibility checks only.
    pub fn whitelisted() -> Self {
        Self::with_rules(WhitelistedRules)
    }
}

impl<R: RuleSet> ComplianceEngine<R> {
    pub fn with_rules(rules: R) -> Self {
        Self {
            rules,
            config: ComplianceConfig::new(),
            counters: InvestorCounters::new(),
            locks: LockAccounting::new(),
            partitions: PartitionedBook::new(),
        }
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    /// Parameter mutation path; caller must be the privileged role.
    pub fn config_mut(&mut self) -> &mut ComplianceConfig {
        &mut self.config
    }

    pub fn counters(&self) -> &InvestorCounters {
        &self.counters
    }

    /// Administrative counter-override path for bulk/omnibus accounting.
    pub fn counters_mut(&mut self) -> &mut InvestorCounters {
        &mut self.counters
    }

    pub fn locks(&self) -> &LockAccounting {
        &self.locks
    }

    pub fn partitions(&self) -> &PartitionedBook {
        &self.partitions
    }

    /// Restores the mutable books from a persisted snapshot.
    pub fn restore(
        &mut self,
        config: ComplianceConfig,
        counters: InvestorCounters,
        locks: LockAccounting,
        partitions: PartitionedBook,
    ) {
        self.config = config;
        self.counters = counters;
        self.locks = locks;
        self.partitions = partitions;
    }

    fn view(&self) -> EngineView<'_> {
        EngineView {
            counters: &self.counters,
            locks: &self.locks,
        }
    }

    // -- read-only checks ---------------------------------------------------

    pub fn pre_transfer_check(
        &self,
        ctx: &CheckContext,
        from: &str,
        to: &str,
        value: u64,
    ) -> Reason {
        self.rules
            .pre_transfer_check(ctx, self.view(), &self.config, from, to, value)
    }

    pub fn pre_issuance_check(&self, ctx: &CheckContext, to: &str, value: u64) -> Reason {
        self.rules
            .pre_issuance_check(ctx, self.view(), &self.config, to, value)
    }

    pub fn pre_internal_transfer_check(
        &self,
        ctx: &CheckContext,
        from: &str,
        to: &str,
        value: u64,
    ) -> Reason {
        self.rules
            .pre_internal_transfer_check(ctx, &self.config, from, to, value)
    }

    /// Tokens the investor could move at `time` given explicit locks.
    pub fn transferable_at(&self, investor: &str, balance: u64, time: u64) -> u64 {
        self.locks.transferable_at(investor, balance, time)
    }

    // -- lock administration ------------------------------------------------

    pub fn add_lock(
        &mut self,
        investor: &str,
        value: u64,
        reason_code: u32,
        reason: &str,
        release_time: u64,
    ) -> Result<u64, PreconditionError> {
        let seq = self
            .locks
            .add_lock(investor, value, reason_code, reason, release_time, None)?;
        logging::lock_event("lock_added", investor, value, release_time);
        Ok(seq)
    }

    pub fn add_partition_lock(
        &mut self,
        investor: &str,
        value: u64,
        reason_code: u32,
        reason: &str,
        release_time: u64,
        partition: PartitionId,
    ) -> Result<u64, PreconditionError> {
        let seq = self.locks.add_lock(
            investor,
            value,
            reason_code,
            reason,
            release_time,
            Some(partition),
        )?;
        logging::lock_event("lock_added", investor, value, release_time);
        Ok(seq)
    }

    pub fn remove_lock(
        &mut self,
        investor: &str,
        index: usize,
    ) -> Result<LockRecord, PreconditionError> {
        let removed = self.locks.remove_lock(investor, index)?;
        logging::lock_event("lock_removed", investor, removed.value, removed.release_time);
        Ok(removed)
    }

    // -- mutating operations ------------------------------------------------

    /// Full pre-transfer check; on approval, settles counters and issuance
    /// bookkeeping. The ledger applies the balance mutation only after this
    /// returns `Ok(Reason::Valid)`.
    pub fn validate_transfer(
        &mut self,
        ctx: &CheckContext,
        from: &str,
        to: &str,
        value: u64,
    ) -> Result<Reason, PreconditionError> {
        require_wallet(from)?;
        require_wallet(to)?;
        require_value(value)?;
        let reason = self.pre_transfer_check(ctx, from, to, value);
        logging::decision("transfer", from, to, value, reason.code(), reason.text());
        if !reason.is_valid() {
            return Ok(reason);
        }
        self.apply_transfer_effects(ctx, from, to, value);
        Ok(Reason::Valid)
    }

    pub fn validate_issuance(
        &mut self,
        ctx: &CheckContext,
        to: &str,
        value: u64,
        issuance_time: u64,
    ) -> Result<Reason, PreconditionError> {
        require_wallet(to)?;
        require_value(value)?;
        if self.config.disallow_back_dating() && issuance_time < ctx.now {
            return Err(PreconditionError::BackDatedIssuance);
        }
        let reason = self.pre_issuance_check(ctx, to, value);
        logging::decision("issuance", "", to, value, reason.code(), reason.text());
        if !reason.is_valid() {
            return Ok(reason);
        }
        if let Some(inv) = ctx.registry.investor_of(to) {
            if !ctx.wallets.is_special_wallet(to) {
                if ctx.registry.omnibus_controller(to).is_none()
                    && ctx.ledger.investor_balance(&inv) == 0
                {
                    self.counters.record_entry(&classify(ctx, &inv));
                }
                self.locks.record_issuance(&inv, value, issuance_time);
            }
        }
        Ok(Reason::Valid)
    }

    pub fn validate_burn(
        &mut self,
        ctx: &CheckContext,
        from: &str,
        value: u64,
    ) -> Result<Reason, PreconditionError> {
        require_wallet(from)?;
        require_value(value)?;
        let reason = pre_burn_check(ctx, from, value);
        logging::decision("burn", from, "", value, reason.code(), reason.text());
        if !reason.is_valid() {
            return Ok(reason);
        }
        self.apply_outflow_effects(ctx, from, value);
        Ok(Reason::Valid)
    }

    /// Regulatory override path: the destination must carry the issuer role;
    /// the business rule set is skipped by design.
    pub fn validate_seize(
        &mut self,
        ctx: &CheckContext,
        from: &str,
        to: &str,
        value: u64,
    ) -> Result<Reason, PreconditionError> {
        require_wallet(from)?;
        require_wallet(to)?;
        require_value(value)?;
        if !ctx.wallets.is_issuer_special_wallet(to) {
            return Err(PreconditionError::SeizeDestinationNotIssuer);
        }
        let reason = pre_burn_check(ctx, from, value);
        logging::decision("seize", from, to, value, reason.code(), reason.text());
        if !reason.is_valid() {
            return Ok(reason);
        }
        self.apply_outflow_effects(ctx, from, value);
        Ok(Reason::Valid)
    }

    // -- partitioned operations ---------------------------------------------

    /// Transfer drawing from the sender's partitions: oldest-activated-first
    /// when `explicit` is `None`, otherwise exactly the supplied
    /// (partition, amount) selection, which must reconcile to `value`.
    pub fn validate_partitioned_transfer(
        &mut self,
        ctx: &CheckContext,
        from: &str,
        to: &str,
        value: u64,
        explicit: Option<(&[PartitionId], &[u64])>,
    ) -> Result<Reason, PreconditionError> {
        require_wallet(from)?;
        require_wallet(to)?;
        require_value(value)?;
        let reason = self.pre_transfer_check(ctx, from, to, value);
        if !reason.is_valid() {
            logging::decision("transfer.part", from, to, value, reason.code(), reason.text());
            return Ok(reason);
        }
        let from_investor = ctx.registry.investor_of(from);
        let locked = |id: PartitionId| match from_investor.as_deref() {
            Some(inv) => self.locks.partition_locked_at(inv, id, ctx.now),
            None => 0,
        };
        let plan = match explicit {
            Some((parts, amounts)) => {
                self.partitions
                    .validate_explicit(from, parts, amounts, value, &locked)?
            }
            None => match self.partitions.plan_draw(from, value, &locked) {
                Some(plan) => plan,
                None => {
                    let reason = if self.partitions.total(from) < value {
                        Reason::NotEnoughTokens
                    } else {
                        Reason::TokensLocked
                    };
                    logging::decision(
                        "transfer.part",
                        from,
                        to,
                        value,
                        reason.code(),
                        reason.text(),
                    );
                    return Ok(reason);
                }
            },
        };
        logging::decision("transfer.part", from, to, value, 0, Reason::Valid.text());
        self.partitions.apply_draw(from, &plan);
        self.partitions.apply_credit(to, &plan);
        self.apply_transfer_effects(ctx, from, to, value);
        Ok(Reason::Valid)
    }

    /// Issuance into the (issuance-day, destination-region) partition,
    /// created lazily on first use.
    pub fn validate_partitioned_issuance(
        &mut self,
        ctx: &CheckContext,
        to: &str,
        value: u64,
        issuance_time: u64,
    ) -> Result<(Reason, Option<PartitionId>), PreconditionError> {
        let reason = self.validate_issuance(ctx, to, value, issuance_time)?;
        if !reason.is_valid() {
            return Ok((reason, None));
        }
        let region = ctx.region_of_wallet(to);
        let key = PartitionKey::for_issuance(issuance_time, region);
        let id = self.partitions.issue(to, key, value);
        Ok((Reason::Valid, Some(id)))
    }

    // -- effects ------------------------------------------------------------

    fn apply_transfer_effects(&mut self, ctx: &CheckContext, from: &str, to: &str, value: u64) {
        let from_investor = ctx.registry.investor_of(from);
        let to_investor = ctx.registry.investor_of(to);
        // Internal moves never change aggregates.
        if same_investor(from_investor.as_deref(), to_investor.as_deref()) {
            return;
        }
        self.apply_outflow_effects(ctx, from, value);
        if let Some(inv) = to_investor.as_deref() {
            if !ctx.wallets.is_special_wallet(to)
                && ctx.registry.omnibus_controller(to).is_none()
                && ctx.ledger.investor_balance(inv) == 0
            {
                self.counters.record_entry(&classify(ctx, inv));
            }
        }
    }

    /// Sender-side settlement shared by transfer, burn, and seize: consume
    /// held issuance oldest-first and record the exit transition when the
    /// aggregate balance crosses to zero.
    fn apply_outflow_effects(&mut self, ctx: &CheckContext, from: &str, value: u64) {
        let Some(inv) = ctx.registry.investor_of(from) else {
            return;
        };
        if ctx.wallets.is_special_wallet(from) || ctx.registry.omnibus_controller(from).is_some() {
            return;
        }
        let before = ctx.ledger.investor_balance(&inv);
        self.locks.consume_issuances(&inv, value.min(before));
        if before > 0 && before.saturating_sub(value) == 0 {
            self.counters.record_exit(&classify(ctx, &inv));
        }
    }
}

fn classify(ctx: &CheckContext, investor: &str) -> Classification {
    Classification {
        region: ctx.region_of_investor(investor),
        accredited: ctx.registry.is_accredited(investor),
        qualified: ctx.registry.is_qualified(investor),
        country: ctx.registry.country(investor),
    }
}

fn require_wallet(wallet: &str) -> Result<(), PreconditionError> {
    if wallet.is_empty() {
        return Err(PreconditionError::EmptyWallet);
    }
    Ok(())
}

fn require_value(value: u64) -> Result<(), PreconditionError> {
    if value == 0 {
        return Err(PreconditionError::ZeroValue);
    }
    Ok(())
}
