//! Runtime tunables.
//!
//! Installed once per process; later readers get the same instance.

use once_cell::sync::OnceCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Allocation volume after which `Gc::should_collect` reports true.
    pub gc_threshold_bytes: usize,
    /// Fixed seed for the select case-order RNG.
    pub select_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gc_threshold_bytes: 8 << 20,
            select_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `VO_GC_THRESHOLD` and `VO_SELECT_SEED`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_number("VO_GC_THRESHOLD") {
            cfg.gc_threshold_bytes = v as usize;
        }
        cfg.select_seed = env_number("VO_SELECT_SEED");
        cfg
    }
}

fn env_number(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(target: "vo::config", key, value = %raw, "ignoring malformed setting");
            None
        }
    }
}

static CONFIG: OnceCell<RuntimeConfig> = OnceCell::new();

/// Install the process configuration. Returns false if one was already in use.
pub fn init(cfg: RuntimeConfig) -> bool {
    CONFIG.set(cfg).is_ok()
}

/// The active configuration, read from the environment on first use.
pub fn get() -> &'static RuntimeConfig {
    CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.gc_threshold_bytes, 8 << 20);
        assert_eq!(cfg.select_seed, None);
    }
}
