use thiserror::Error;

/// Invalid cache or store configuration.
///
/// Returned once, at construction time. A cache that was built successfully
/// never produces this error afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_cost must be greater than zero")]
    ZeroMaxCost,
    #[error("default_ttl must be greater than zero")]
    ZeroTtl,
    #[error("entry_cost must be greater than zero")]
    ZeroEntryCost,
}
