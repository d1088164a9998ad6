//! Collaborator interfaces.
//!
//! The engine decides; it does not own identity, wallet roles, or balances.
//! Those live behind the traits here, implemented by the embedding ledger.
//! A [`CheckContext`] bundles the handles plus the evaluation timestamp and
//! is rebuilt for every call — nothing derived from it (region included) may
//! be cached across checks.
//!
//! In-memory implementations ship for tests and for callers embedding the
//! engine without an external registry.

use std::collections::HashMap;

use crate::region::{CountryTable, Region};

/// Identity/KYC registry: wallet → investor resolution and investor
/// attributes.
pub trait InvestorRegistry {
    fn investor_of(&self, wallet: &str) -> Option<String>;
    fn country(&self, investor: &str) -> Option<String>;
    fn is_accredited(&self, investor: &str) -> bool;
    /// Non-qualified EU investors count as retail.
    fn is_qualified(&self, investor: &str) -> bool;
    /// Present when the wallet is an omnibus wallet run by a controller.
    fn omnibus_controller(&self, wallet: &str) -> Option<String>;
}

/// Wallet role classification (platform/issuer/exchange tagging).
pub trait WalletClassifier {
    fn is_platform_wallet(&self, wallet: &str) -> bool;
    /// Any special role: issuer, platform, or exchange.
    fn is_special_wallet(&self, wallet: &str) -> bool;
    fn is_issuer_special_wallet(&self, wallet: &str) -> bool;
}

/// The owning ledger's read surface.
pub trait LedgerView {
    fn balance_of(&self, wallet: &str) -> u64;
    /// Aggregate balance across all of the investor's wallets.
    fn investor_balance(&self, investor: &str) -> u64;
    fn total_supply(&self) -> u64;
    fn is_paused(&self) -> bool;
}

/// Everything a single check evaluation reads, passed explicitly.
pub struct CheckContext<'a> {
    pub registry: &'a dyn InvestorRegistry,
    pub wallets: &'a dyn WalletClassifier,
    pub ledger: &'a dyn LedgerView,
    pub countries: &'a CountryTable,
    /// Epoch seconds at which the check is evaluated.
    pub now: u64,
}

impl<'a> CheckContext<'a> {
    /// Region of the wallet's investor, recomputed from the current country.
    pub fn region_of_wallet(&self, wallet: &str) -> Region {
        match self.registry.investor_of(wallet) {
            Some(inv) => self.region_of_investor(&inv),
            None => Region::None,
        }
    }

    pub fn region_of_investor(&self, investor: &str) -> Region {
        self.countries
            .region_of(self.registry.country(investor).as_deref())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct InvestorEntry {
    country: Option<String>,
    accredited: bool,
    qualified: bool,
}

/// Simple map-backed registry for tests and embedded use.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    wallets: HashMap<String, String>,
    investors: HashMap<String, InvestorEntry>,
    omnibus: HashMap<String, String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_investor(&mut self, investor: &str, country: &str, accredited: bool, qualified: bool) {
        self.investors.insert(
            investor.to_string(),
            InvestorEntry {
                country: (!country.is_empty()).then(|| country.to_string()),
                accredited,
                qualified,
            },
        );
    }

    pub fn bind_wallet(&mut self, wallet: &str, investor: &str) {
        self.wallets.insert(wallet.to_string(), investor.to_string());
    }

    pub fn set_omnibus(&mut self, wallet: &str, controller: &str) {
        self.omnibus.insert(wallet.to_string(), controller.to_string());
    }

    pub fn set_country(&mut self, investor: &str, country: &str) {
        if let Some(entry) = self.investors.get_mut(investor) {
            entry.country = (!country.is_empty()).then(|| country.to_string());
        }
    }

    pub fn set_accredited(&mut self, investor: &str, accredited: bool) {
        if let Some(entry) = self.investors.get_mut(investor) {
            entry.accredited = accredited;
        }
    }
}

impl InvestorRegistry for MemoryRegistry {
    fn investor_of(&self, wallet: &str) -> Option<String> {
        self.wallets.get(wallet).cloned()
    }

    fn country(&self, investor: &str) -> Option<String> {
        self.investors.get(investor).and_then(|e| e.country.clone())
    }

    fn is_accredited(&self, investor: &str) -> bool {
        self.investors.get(investor).map(|e| e.accredited).unwrap_or(false)
    }

    fn is_qualified(&self, investor: &str) -> bool {
        self.investors.get(investor).map(|e| e.qualified).unwrap_or(false)
    }

    fn omnibus_controller(&self, wallet: &str) -> Option<String> {
        self.omnibus.get(wallet).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletRole {
    None,
    Issuer,
    Platform,
    Exchange,
}

/// Map-backed role classifier; unlisted wallets have no special role.
#[derive(Debug, Clone, Default)]
pub struct MemoryWallets {
    roles: HashMap<String, WalletRole>,
}

impl MemoryWallets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_role(&mut self, wallet: &str, role: WalletRole) {
        self.roles.insert(wallet.to_string(), role);
    }

    fn role(&self, wallet: &str) -> WalletRole {
        self.roles.get(wallet).copied().unwrap_or(WalletRole::None)
    }
}

impl WalletClassifier for MemoryWallets {
    fn is_platform_wallet(&self, wallet: &str) -> bool {
        self.role(wallet) == WalletRole::Platform
    }

    fn is_special_wallet(&self, wallet: &str) -> bool {
        self.role(wallet) != WalletRole::None
    }

    fn is_issuer_special_wallet(&self, wallet: &str) -> bool {
        self.role(wallet) == WalletRole::Issuer
    }
}

/// Map-backed balance view. The embedding ledger mutates this *after* the
/// engine approves; the engine itself only reads.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    balances: HashMap<String, u64>,
    wallet_owner: HashMap<String, String>,
    paused: bool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Sets a wallet balance and remembers the owning investor for the
    /// aggregate view.
    pub fn set_balance(&mut self, wallet: &str, investor: &str, value: u64) {
        self.balances.insert(wallet.to_string(), value);
        if investor.is_empty() {
            self.wallet_owner.remove(wallet);
        } else {
            self.wallet_owner.insert(wallet.to_string(), investor.to_string());
        }
    }

    /// Moves value between wallets, saturating at zero on the source.
    pub fn apply_transfer(&mut self, from: &str, to: &str, value: u64) {
        let from_bal = self.balance_of(from);
        let to_bal = self.balance_of(to);
        self.balances.insert(from.to_string(), from_bal.saturating_sub(value));
        self.balances.insert(to.to_string(), to_bal.saturating_add(value));
    }
}

impl LedgerView for MemoryLedger {
    fn balance_of(&self, wallet: &str) -> u64 {
        self.balances.get(wallet).copied().unwrap_or(0)
    }

    fn investor_balance(&self, investor: &str) -> u64 {
        self.balances
            .iter()
            .filter(|(w, _)| self.wallet_owner.get(*w).map(String::as_str) == Some(investor))
            .fold(0u64, |a, (_, v)| a.saturating_add(*v))
    }

    fn total_supply(&self) -> u64 {
        self.balances.values().fold(0u64, |a, v| a.saturating_add(*v))
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::CountryTable;

    #[test]
    fn aggregate_balance_spans_wallets() {
        let mut ledger = MemoryLedger::new();
        ledger.set_balance("w1", "inv-1", 60);
        ledger.set_balance("w2", "inv-1", 40);
        ledger.set_balance("w3", "inv-2", 5);
        assert_eq!(ledger.investor_balance("inv-1"), 100);
        assert_eq!(ledger.total_supply(), 105);
    }

    #[test]
    fn region_recomputed_from_current_country() {
        let mut registry = MemoryRegistry::new();
        registry.add_investor("inv-1", "US", true, false);
        registry.bind_wallet("w1", "inv-1");
        let wallets = MemoryWallets::new();
        let ledger = MemoryLedger::new();
        let mut countries = CountryTable::new();
        countries.set_country("US", Region::Us).unwrap();
        countries.set_country("DE", Region::Eu).unwrap();

        {
            let ctx = CheckContext {
                registry: &registry,
                wallets: &wallets,
                ledger: &ledger,
                countries: &countries,
                now: 0,
            };
            assert_eq!(ctx.region_of_wallet("w1"), Region::Us);
        }

        registry.set_country("inv-1", "DE");
        let ctx = CheckContext {
            registry: &registry,
            wallets: &wallets,
            ledger: &ledger,
            countries: &countries,
            now: 0,
        };
        assert_eq!(ctx.region_of_wallet("w1"), Region::Eu);
    }
}
