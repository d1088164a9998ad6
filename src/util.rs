//! Small helpers shared across the engine.
//!
//! Investor ids are opaque strings owned by the external registry; the
//! engine never interprets them beyond emptiness and equality.

/// True when the id is absent or empty (an unregistered wallet).
pub fn id_is_empty(id: Option<&str>) -> bool {
    matches!(id, None) || matches!(id, Some(s) if s.is_empty())
}

/// True only when both ids are present, non-empty, and equal.
///
/// Two unregistered wallets never count as the same investor.
pub fn same_investor(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => !x.is_empty() && x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ids_never_match() {
        assert!(!same_investor(None, None));
        assert!(!same_investor(Some(""), Some("")));
        assert!(!same_investor(Some("inv-1"), None));
    }

    #[test]
    fn equal_nonempty_ids_match() {
        assert!(same_investor(Some("inv-1"), Some("inv-1")));
        assert!(!same_investor(Some("inv-1"), Some("inv-2")));
    }

    #[test]
    fn emptiness() {
        assert!(id_is_empty(None));
        assert!(id_is_empty(Some("")));
        assert!(!id_is_empty(Some("inv-1")));
    }
}
