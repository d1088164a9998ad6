//! Aggregate investor counters.
//!
//! A counter moves by exactly ±1 per investor per zero-crossing of that
//! investor's aggregate balance, classified at the moment of the transition.
//! An investor lands in exactly one regional bucket (US, JP, or EU-retail by
//! country); special wallets and omnibus wallets never trigger transitions.
//!
//! The `set_*_count` overrides are the administrative path for bulk/omnibus
//! accounting done off-engine. They perform no cross-validation against
//! balances; trust is delegated to the (pre-authorized) caller, and every
//! override is written to the audit log.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::logging;
use crate::region::Region;

/// How an investor looks at the instant of a zero-crossing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub region: Region,
    pub accredited: bool,
    pub qualified: bool,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorCounters {
    total: u64,
    accredited: u64,
    us_accredited: u64,
    us: u64,
    jp: u64,
    eu_retail: HashMap<String, u64>,
}

impl InvestorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_investors(&self) -> u64 {
        self.total
    }

    pub fn accredited_investors(&self) -> u64 {
        self.accredited
    }

    pub fn non_accredited_investors(&self) -> u64 {
        self.total.saturating_sub(self.accredited)
    }

    pub fn us_accredited_investors(&self) -> u64 {
        self.us_accredited
    }

    pub fn us_investors(&self) -> u64 {
        self.us
    }

    pub fn jp_investors(&self) -> u64 {
        self.jp
    }

    pub fn eu_retail_investors(&self, country: &str) -> u64 {
        self.eu_retail.get(country).copied().unwrap_or(0)
    }

    /// Aggregate balance crossed 0 → positive.
    pub fn record_entry(&mut self, c: &Classification) {
        self.total += 1;
        if c.accredited {
            self.accredited += 1;
        }
        match c.region {
            Region::Us => {
                self.us += 1;
                if c.accredited {
                    self.us_accredited += 1;
                }
            }
            Region::Jp => self.jp += 1,
            Region::Eu if !c.qualified => {
                if let Some(country) = &c.country {
                    *self.eu_retail.entry(country.clone()).or_insert(0) += 1;
                }
            }
            _ => {}
        }
    }

    /// Aggregate balance crossed positive → 0. Decrements the same buckets
    /// the matching entry incremented, per the classification *now* — if the
    /// registry reclassified the investor while they held a balance, the
    /// administrative overrides are the correction path.
    pub fn record_exit(&mut self, c: &Classification) {
        self.total = self.total.saturating_sub(1);
        if c.accredited {
            self.accredited = self.accredited.saturating_sub(1);
        }
        match c.region {
            Region::Us => {
                self.us = self.us.saturating_sub(1);
                if c.accredited {
                    self.us_accredited = self.us_accredited.saturating_sub(1);
                }
            }
            Region::Jp => self.jp = self.jp.saturating_sub(1),
            Region::Eu if !c.qualified => {
                if let Some(country) = &c.country {
                    if let Some(n) = self.eu_retail.get_mut(country) {
                        *n = n.saturating_sub(1);
                        if *n == 0 {
                            self.eu_retail.remove(country);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    pub fn set_total_investors_count(&mut self, value: u64) {
        logging::counter_override("total_investors", self.total, value);
        self.total = value;
    }

    pub fn set_accredited_investors_count(&mut self, value: u64) {
        logging::counter_override("accredited_investors", self.accredited, value);
        self.accredited = value;
    }

    pub fn set_us_accredited_investors_count(&mut self, value: u64) {
        logging::counter_override("us_accredited_investors", self.us_accredited, value);
        self.us_accredited = value;
    }

    pub fn set_us_investors_count(&mut self, value: u64) {
        logging::counter_override("us_investors", self.us, value);
        self.us = value;
    }

    pub fn set_jp_investors_count(&mut self, value: u64) {
        logging::counter_override("jp_investors", self.jp, value);
        self.jp = value;
    }

    pub fn set_eu_retail_investors_count(&mut self, country: &str, value: u64) {
        let old = self.eu_retail_investors(country);
        logging::counter_override(&format!("eu_retail_investors.{country}"), old, value);
        if value == 0 {
            self.eu_retail.remove(country);
        } else {
            self.eu_retail.insert(country.to_string(), value);
        }
    }
}
