//! Compliance engine for regulated security tokens.
//!
//! Decides, for every attempted transfer, issuance, burn, or seizure of a
//! token balance, whether the operation is legal under a configurable set of
//! jurisdictional constraints: investor caps by country and category,
//! lock-up periods, accreditation rules, flow-back restrictions, omnibus
//! netting. The owning ledger calls a pre-check, mutates balances only on
//! approval, and the engine settles investor counters and lock bookkeeping
//! as a side effect.
//!
//! Flow:
//!
//! ```text
//! ┌──────────┐  pre-check   ┌────────────┐  Valid   ┌───────────────┐
//! │  Ledger  │─────────────►│  RuleSet   │─────────►│ Counters/Locks│
//! │ (caller) │◄─────────────│ (ordered   │          │  settlement   │
//! └──────────┘ (code,reason)│  checks)   │          └───────────────┘
//!                           └────────────┘
//! ```
//!
//! Identity/KYC, wallet roles, and balances stay behind the traits in
//! [`registry`]; the engine is pure decision logic plus counter maintenance.

pub mod config;
pub mod counters;
pub mod engine;
pub mod error;
pub mod locks;
pub mod logging;
pub mod partitions;
pub mod region;
pub mod registry;
pub mod rules;
pub mod storage;
pub mod util;

pub use config::ComplianceConfig;
pub use counters::{Classification, InvestorCounters};
pub use engine::ComplianceEngine;
pub use error::PreconditionError;
pub use locks::{LockAccounting, LockRecord};
pub use partitions::{PartitionId, PartitionKey, PartitionedBook};
pub use region::{CountryTable, Region};
pub use registry::{
    CheckContext, InvestorRegistry, LedgerView, MemoryLedger, MemoryRegistry, MemoryWallets,
    WalletClassifier, WalletRole,
};
pub use rules::{Reason, RegulatedRules, RuleSet, WhitelistedRules};
pub use storage::StateStore;
