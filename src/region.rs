//! Country → region classification.
//!
//! Region is derived state: it is recomputed from the investor's current
//! country on every check and never cached across checks, because the
//! registry may reclassify an investor between calls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;
use crate::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    None,
    Us,
    Eu,
    Forbidden,
    Jp,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::None => "none",
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Forbidden => "forbidden",
            Region::Jp => "jp",
        }
    }
}

/// Mutable country-code → region table, administered alongside the
/// compliance configuration. Unknown countries classify as `Region::None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryTable {
    map: HashMap<String, Region>,
}

impl CountryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region_of(&self, country: Option<&str>) -> Region {
        match country {
            Some(c) => self.map.get(c).copied().unwrap_or(Region::None),
            None => Region::None,
        }
    }

    pub fn set_country(&mut self, country: &str, region: Region) -> Result<(), PreconditionError> {
        if country.is_empty() {
            return Err(PreconditionError::EmptyCountryCode);
        }
        let old = self.region_of(Some(country));
        logging::country_changed(country, old, region);
        self.map.insert(country.to_string(), region);
        Ok(())
    }

    /// Bulk assignment over parallel arrays. Mismatched lengths abort before
    /// any entry is written.
    pub fn set_countries(
        &mut self,
        countries: &[&str],
        regions: &[Region],
    ) -> Result<(), PreconditionError> {
        if countries.len() != regions.len() {
            return Err(PreconditionError::LengthMismatch {
                expected: countries.len(),
                got: regions.len(),
            });
        }
        if countries.iter().any(|c| c.is_empty()) {
            return Err(PreconditionError::EmptyCountryCode);
        }
        for (country, region) in countries.iter().zip(regions) {
            self.set_country(country, *region)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_country_is_none() {
        let table = CountryTable::new();
        assert_eq!(table.region_of(Some("US")), Region::None);
        assert_eq!(table.region_of(None), Region::None);
    }

    #[test]
    fn set_and_reclassify() {
        let mut table = CountryTable::new();
        table.set_country("US", Region::Us).unwrap();
        table.set_country("DE", Region::Eu).unwrap();
        assert_eq!(table.region_of(Some("US")), Region::Us);
        table.set_country("US", Region::Forbidden).unwrap();
        assert_eq!(table.region_of(Some("US")), Region::Forbidden);
    }

    #[test]
    fn empty_country_code_is_rejected() {
        let mut table = CountryTable::new();
        assert!(matches!(
            table.set_country("", Region::Us),
            Err(PreconditionError::EmptyCountryCode)
        ));
        assert!(matches!(
            table.set_countries(&["US", ""], &[Region::Us, Region::Eu]),
            Err(PreconditionError::EmptyCountryCode)
        ));
    }

    #[test]
    fn bulk_length_mismatch_writes_nothing() {
        let mut table = CountryTable::new();
        let err = table
            .set_countries(&["US", "JP"], &[Region::Us])
            .unwrap_err();
        assert!(matches!(err, PreconditionError::LengthMismatch { .. }));
        assert_eq!(table.region_of(Some("US")), Region::None);
    }
}
