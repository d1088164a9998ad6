//! Regulatory parameter store.
//!
//! A flat record of 16 uint and 5 bool parameters. 0 is the "unlimited"
//! sentinel for every limit field. Values are not range-validated beyond
//! their type (percentages above 100 are administrative discipline, not an
//! engine concern). Every setter emits a structured `rule_changed` audit
//! event so parameter history is reconstructable from the event log.
//!
//! The field order of [`ComplianceConfig::get_all`] / [`set_all`] is part of
//! the external contract:
//!
//! uints: total_investors_limit, min_us_tokens, min_eu_tokens,
//! us_investors_limit, us_accredited_investors_limit,
//! non_accredited_investors_limit, max_us_investors_percentage,
//! block_flowback_end_time, non_us_lock_period, minimum_total_investors,
//! minimum_holdings_per_investor, maximum_holdings_per_investor,
//! eu_retail_investors_limit, us_lock_period, jp_investors_limit,
//! authorized_securities
//!
//! bools: force_full_transfer, force_accredited, force_accredited_us,
//! world_wide_force_full_transfer, disallow_back_dating
//!
//! [`set_all`]: ComplianceConfig::set_all

use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;
use crate::logging;

pub const UINT_FIELDS: usize = 16;
pub const BOOL_FIELDS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    total_investors_limit: u64,
    min_us_tokens: u64,
    min_eu_tokens: u64,
    us_investors_limit: u64,
    us_accredited_investors_limit: u64,
    non_accredited_investors_limit: u64,
    max_us_investors_percentage: u64,
    block_flowback_end_time: u64,
    non_us_lock_period: u64,
    minimum_total_investors: u64,
    minimum_holdings_per_investor: u64,
    maximum_holdings_per_investor: u64,
    eu_retail_investors_limit: u64,
    us_lock_period: u64,
    jp_investors_limit: u64,
    authorized_securities: u64,
    force_full_transfer: bool,
    force_accredited: bool,
    force_accredited_us: bool,
    world_wide_force_full_transfer: bool,
    disallow_back_dating: bool,
}

macro_rules! uint_param {
    ($get:ident, $set:ident) => {
        pub fn $get(&self) -> u64 {
            self.$get
        }
        pub fn $set(&mut self, value: u64) {
            logging::rule_changed_uint(stringify!($get), self.$get, value);
            self.$get = value;
        }
    };
}

macro_rules! bool_param {
    ($get:ident, $set:ident) => {
        pub fn $get(&self) -> bool {
            self.$get
        }
        pub fn $set(&mut self, value: bool) {
            logging::rule_changed_flag(stringify!($get), self.$get, value);
            self.$get = value;
        }
    };
}

impl ComplianceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    uint_param!(total_investors_limit, set_total_investors_limit);
    uint_param!(min_us_tokens, set_min_us_tokens);
    uint_param!(min_eu_tokens, set_min_eu_tokens);
    uint_param!(us_investors_limit, set_us_investors_limit);
    uint_param!(
        us_accredited_investors_limit,
        set_us_accredited_investors_limit
    );
    uint_param!(
        non_accredited_investors_limit,
        set_non_accredited_investors_limit
    );
    uint_param!(max_us_investors_percentage, set_max_us_investors_percentage);
    uint_param!(block_flowback_end_time, set_block_flowback_end_time);
    uint_param!(non_us_lock_period, set_non_us_lock_period);
    uint_param!(minimum_total_investors, set_minimum_total_investors);
    uint_param!(
        minimum_holdings_per_investor,
        set_minimum_holdings_per_investor
    );
    uint_param!(
        maximum_holdings_per_investor,
        set_maximum_holdings_per_investor
    );
    uint_param!(eu_retail_investors_limit, set_eu_retail_investors_limit);
    uint_param!(us_lock_period, set_us_lock_period);
    uint_param!(jp_investors_limit, set_jp_investors_limit);
    uint_param!(authorized_securities, set_authorized_securities);

    bool_param!(force_full_transfer, set_force_full_transfer);
    bool_param!(force_accredited, set_force_accredited);
    bool_param!(force_accredited_us, set_force_accredited_us);
    bool_param!(
        world_wide_force_full_transfer,
        set_world_wide_force_full_transfer
    );
    bool_param!(disallow_back_dating, set_disallow_back_dating);

    /// Snapshot every parameter in the documented field order.
    pub fn get_all(&self) -> ([u64; UINT_FIELDS], [bool; BOOL_FIELDS]) {
        (
            [
                self.total_investors_limit,
                self.min_us_tokens,
                self.min_eu_tokens,
                self.us_investors_limit,
                self.us_accredited_investors_limit,
                self.non_accredited_investors_limit,
                self.max_us_investors_percentage,
                self.block_flowback_end_time,
                self.non_us_lock_period,
                self.minimum_total_investors,
                self.minimum_holdings_per_investor,
                self.maximum_holdings_per_investor,
                self.eu_retail_investors_limit,
                self.us_lock_period,
                self.jp_investors_limit,
                self.authorized_securities,
            ],
            [
                self.force_full_transfer,
                self.force_accredited,
                self.force_accredited_us,
                self.world_wide_force_full_transfer,
                self.disallow_back_dating,
            ],
        )
    }

    /// Bulk assignment in the documented field order. Length mismatches
    /// abort before any field is written.
    pub fn set_all(&mut self, uints: &[u64], flags: &[bool]) -> Result<(), PreconditionError> {
        if uints.len() != UINT_FIELDS {
            return Err(PreconditionError::LengthMismatch {
                expected: UINT_FIELDS,
                got: uints.len(),
            });
        }
        if flags.len() != BOOL_FIELDS {
            return Err(PreconditionError::LengthMismatch {
                expected: BOOL_FIELDS,
                got: flags.len(),
            });
        }
        self.set_total_investors_limit(uints[0]);
        self.set_min_us_tokens(uints[1]);
        self.set_min_eu_tokens(uints[2]);
        self.set_us_investors_limit(uints[3]);
        self.set_us_accredited_investors_limit(uints[4]);
        self.set_non_accredited_investors_limit(uints[5]);
        self.set_max_us_investors_percentage(uints[6]);
        self.set_block_flowback_end_time(uints[7]);
        self.set_non_us_lock_period(uints[8]);
        self.set_minimum_total_investors(uints[9]);
        self.set_minimum_holdings_per_investor(uints[10]);
        self.set_maximum_holdings_per_investor(uints[11]);
        self.set_eu_retail_investors_limit(uints[12]);
        self.set_us_lock_period(uints[13]);
        self.set_jp_investors_limit(uints[14]);
        self.set_authorized_securities(uints[15]);
        self.set_force_full_transfer(flags[0]);
        self.set_force_accredited(flags[1]);
        self.set_force_accredited_us(flags[2]);
        self.set_world_wide_force_full_transfer(flags[3]);
        self.set_disallow_back_dating(flags[4]);
        Ok(())
    }
}
