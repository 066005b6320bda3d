//! Engine configuration, grounded in `abft/config.go`'s `DefaultConfig`/
//! `LiteConfig` split and `vecfc/index.go`'s cache-size config.

/// Cache sizes for the vector-clock indexer and the forkless-cause predicate.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub forkless_cause_pairs: usize,
    pub highest_before_rows: usize,
    pub lowest_after_rows: usize,
}

impl CacheConfig {
    pub fn default_scale() -> Self {
        Self {
            forkless_cause_pairs: 20_000,
            highest_before_rows: 20_000,
            lowest_after_rows: 20_000,
        }
    }

    /// Sized down for tests, mirroring the source's `LiteConfig` (a 100:1
    /// scale-down of the production cache sizes).
    pub fn lite() -> Self {
        Self {
            forkless_cause_pairs: 200,
            highest_before_rows: 200,
            lowest_after_rows: 200,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub caches: CacheConfig,
    /// Permissive replay mode: a `WrongFrame` mismatch is accepted as an
    /// overwrite instead of rejected, while still requiring the frame to
    /// monotonically agree with parents. Used only while replaying
    /// historical events whose frame was computed by an older engine
    /// version.
    pub suppress_frame_panic: bool,
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            caches: CacheConfig::default_scale(),
            suppress_frame_panic: false,
        }
    }

    pub fn lite() -> Self {
        Self {
            caches: CacheConfig::lite(),
            suppress_frame_panic: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
