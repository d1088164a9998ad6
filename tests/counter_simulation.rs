//! Model-based counter verification.
//!
//! Drives a random walk of issuances, transfers, and burns through the
//! engine against an in-memory ledger, then recomputes every investor
//! counter from the ledger ground truth: an investor is counted iff their
//! aggregate balance is positive, classified by their current registry
//! attributes. The engine's incremental zero-crossing bookkeeping must match
//! the recomputation exactly, at every checkpoint.
//!
//! All limits stay at 0 (unlimited) so the only rejections are balance
//! rejections; approved operations are applied to the ledger, rejected ones
//! are not, mirroring the embedding-ledger contract.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use regtoken::{
    CheckContext, ComplianceEngine, CountryTable, InvestorCounters, LedgerView, MemoryLedger,
    MemoryRegistry, MemoryWallets, Region,
};

const BASE_TIME: u64 = 1_700_000_000;
const STEPS: usize = 500;

struct SimInvestor {
    id: String,
    wallets: Vec<String>,
    country: &'static str,
    accredited: bool,
    qualified: bool,
}

struct Sim {
    investors: Vec<SimInvestor>,
    registry: MemoryRegistry,
    wallets: MemoryWallets,
    ledger: MemoryLedger,
    countries: CountryTable,
    now: u64,
}

impl Sim {
    fn new(rng: &mut StdRng) -> Self {
        let mut countries = CountryTable::new();
        countries.set_country("US", Region::Us).unwrap();
        countries.set_country("JP", Region::Jp).unwrap();
        countries.set_country("DE", Region::Eu).unwrap();
        countries.set_country("FR", Region::Eu).unwrap();
        // "XX" stays unclassified: region none, counted in total only.

        let pool = ["US", "JP", "DE", "FR", "XX"];
        let mut registry = MemoryRegistry::new();
        let mut investors = Vec::new();
        for i in 0..12 {
            let id = format!("inv-{i}");
            let country = pool[rng.gen_range(0..pool.len())];
            let accredited = rng.gen_bool(0.5);
            let qualified = rng.gen_bool(0.3);
            registry.add_investor(&id, country, accredited, qualified);
            let wallet_count = rng.gen_range(1..=2);
            let mut wallets = Vec::new();
            for w in 0..wallet_count {
                let wallet = format!("w-{i}-{w}");
                registry.bind_wallet(&wallet, &id);
                wallets.push(wallet);
            }
            investors.push(SimInvestor {
                id,
                wallets,
                country,
                accredited,
                qualified,
            });
        }
        Sim {
            investors,
            registry,
            wallets: MemoryWallets::new(),
            ledger: MemoryLedger::new(),
            countries,
            now: BASE_TIME,
        }
    }

    fn ctx(&self) -> CheckContext<'_> {
        CheckContext {
            registry: &self.registry,
            wallets: &self.wallets,
            ledger: &self.ledger,
            countries: &self.countries,
            now: self.now,
        }
    }

    fn random_wallet(&self, rng: &mut StdRng) -> (usize, String) {
        let i = rng.gen_range(0..self.investors.len());
        let inv = &self.investors[i];
        let w = inv.wallets[rng.gen_range(0..inv.wallets.len())].clone();
        (i, w)
    }

    /// Counters recomputed from scratch: the ground truth the incremental
    /// bookkeeping must agree with.
    fn recompute(&self) -> InvestorCounters {
        let mut truth = InvestorCounters::new();
        let mut total = 0u64;
        let mut accredited = 0u64;
        let mut us = 0u64;
        let mut us_accredited = 0u64;
        let mut jp = 0u64;
        let mut eu_retail: Vec<(&str, u64)> = Vec::new();
        for inv in &self.investors {
            if self.ledger.investor_balance(&inv.id) == 0 {
                continue;
            }
            total += 1;
            if inv.accredited {
                accredited += 1;
            }
            match self.countries.region_of(Some(inv.country)) {
                Region::Us => {
                    us += 1;
                    if inv.accredited {
                        us_accredited += 1;
                    }
                }
                Region::Jp => jp += 1,
                Region::Eu if !inv.qualified => {
                    match eu_retail.iter_mut().find(|(c, _)| *c == inv.country) {
                        Some((_, n)) => *n += 1,
                        None => eu_retail.push((inv.country, 1)),
                    }
                }
                _ => {}
            }
        }
        truth.set_total_investors_count(total);
        truth.set_accredited_investors_count(accredited);
        truth.set_us_investors_count(us);
        truth.set_us_accredited_investors_count(us_accredited);
        truth.set_jp_investors_count(jp);
        for (country, n) in eu_retail {
            truth.set_eu_retail_investors_count(country, n);
        }
        truth
    }
}

fn assert_counters_match(engine_counters: &InvestorCounters, truth: &InvestorCounters, step: usize) {
    assert_eq!(
        engine_counters, truth,
        "counter drift from ground truth at step {step}"
    );
}

#[test]
fn counters_track_ground_truth_through_random_walk() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut sim = Sim::new(&mut rng);
    let mut engine = ComplianceEngine::regulated();
    let mut approved = 0usize;

    for step in 0..STEPS {
        sim.now += 60;
        match rng.gen_range(0..10) {
            // Issuance: mint into a random wallet.
            0..=3 => {
                let (i, wallet) = sim.random_wallet(&mut rng);
                let value = rng.gen_range(1..=50u64);
                let reason = engine
                    .validate_issuance(&sim.ctx(), &wallet, value, sim.now)
                    .unwrap();
                if reason.is_valid() {
                    let inv = sim.investors[i].id.clone();
                    let balance = sim.ledger.balance_of(&wallet);
                    sim.ledger.set_balance(&wallet, &inv, balance + value);
                    approved += 1;
                }
            }
            // Transfer between two distinct wallets.
            4..=7 => {
                let (_, from) = sim.random_wallet(&mut rng);
                let (_, to) = sim.random_wallet(&mut rng);
                if from == to {
                    continue;
                }
                let value = rng.gen_range(1..=60u64);
                let reason = engine
                    .validate_transfer(&sim.ctx(), &from, &to, value)
                    .unwrap();
                if reason.is_valid() {
                    sim.ledger.apply_transfer(&from, &to, value);
                    approved += 1;
                } else {
                    // With all limits at 0 the only rejection left is balance.
                    assert_eq!(reason.code(), 15, "unexpected rejection at step {step}");
                }
            }
            // Burn from a random wallet.
            _ => {
                let (i, wallet) = sim.random_wallet(&mut rng);
                let value = rng.gen_range(1..=40u64);
                let reason = engine.validate_burn(&sim.ctx(), &wallet, value).unwrap();
                if reason.is_valid() {
                    let inv = sim.investors[i].id.clone();
                    let balance = sim.ledger.balance_of(&wallet);
                    sim.ledger.set_balance(&wallet, &inv, balance - value);
                    approved += 1;
                }
            }
        }
        if step % 50 == 0 {
            assert_counters_match(engine.counters(), &sim.recompute(), step);
        }
    }

    assert_counters_match(engine.counters(), &sim.recompute(), STEPS);
    // A run where almost nothing was approved would prove nothing.
    assert!(approved > STEPS / 3, "only {approved} approved operations");
}

#[test]
fn internal_shuffling_never_moves_counters() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut sim = Sim::new(&mut rng);
    let mut engine = ComplianceEngine::regulated();

    // Fund the first wallet of every investor.
    for i in 0..sim.investors.len() {
        let (id, wallet) = {
            let inv = &sim.investors[i];
            (inv.id.clone(), inv.wallets[0].clone())
        };
        let reason = engine
            .validate_issuance(&sim.ctx(), &wallet, 100, sim.now)
            .unwrap();
        assert!(reason.is_valid());
        sim.ledger.set_balance(&wallet, &id, 100);
    }
    let baseline = engine.counters().clone();

    // Shuffle balances between each multi-wallet investor's own wallets.
    let moves: Vec<(String, String)> = sim
        .investors
        .iter()
        .filter(|inv| inv.wallets.len() > 1)
        .map(|inv| (inv.wallets[0].clone(), inv.wallets[1].clone()))
        .collect();
    for (from, to) in moves {
        for value in [100u64, 40, 60] {
            let reason = engine
                .validate_transfer(&sim.ctx(), &from, &to, value)
                .unwrap();
            if reason.is_valid() {
                sim.ledger.apply_transfer(&from, &to, value);
            }
        }
    }

    assert_eq!(engine.counters(), &baseline);
    assert_counters_match(engine.counters(), &sim.recompute(), 0);
}
