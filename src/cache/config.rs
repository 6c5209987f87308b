//! Cache configuration.
//!
//! Controls request fencing and post-mutation reconciliation. Built from the
//! resolved `[cache]` settings.

const DEFAULT_FENCING: bool = true;
const DEFAULT_RECONCILE_AFTER_MUTATION: bool = true;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Apply a fetch result only if it belongs to the newest request for its key.
    /// When off, the last response to complete wins.
    pub fencing: bool,
    /// Issue a reconciling refetch after every optimistic mutation.
    pub reconcile_after_mutation: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fencing: DEFAULT_FENCING,
            reconcile_after_mutation: DEFAULT_RECONCILE_AFTER_MUTATION,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            fencing: settings.fencing,
            reconcile_after_mutation: settings.reconcile_after_mutation,
        }
    }
}

impl CacheConfig {
    /// Configuration that reproduces last-completion-wins writes.
    pub fn unfenced() -> Self {
        Self {
            fencing: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.fencing);
        assert!(config.reconcile_after_mutation);
    }

    #[test]
    fn unfenced_keeps_reconciliation() {
        let config = CacheConfig::unfenced();
        assert!(!config.fencing);
        assert!(config.reconcile_after_mutation);
    }
}
