//! Helper functions for common reconciliation patterns

use lunalytics_client::LunalyticsError;

/// Turns a "not found" answer into `Ok(None)`.
///
/// Used when the reconciler looks up a bound monitor: a missing record is a
/// normal branch (recreate or report stale), every other error is propagated.
pub fn check_existing<T>(result: Result<T, LunalyticsError>) -> Result<Option<T>, LunalyticsError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_existing_found() {
        assert_eq!(check_existing::<u8>(Ok(7)).unwrap(), Some(7));
    }

    #[test]
    fn test_check_existing_not_found() {
        let result = check_existing::<u8>(Err(LunalyticsError::NotFound("gone".to_string())));
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_check_existing_propagates_other_errors() {
        let result = check_existing::<u8>(Err(LunalyticsError::Authentication("bad token".to_string())));
        assert!(matches!(result, Err(LunalyticsError::Authentication(_))));
    }
}
