/// config.rs — Feature-engine configuration loaded from .env
///
/// Levels and window sizes consumed by `FeatureEngine`.  Loading happens once
/// at startup; the engine owns its copy.
use anyhow::Result;
use std::env;

/// Levels carried by each snapshot of a depth-10 feed
pub const DEFAULT_BOOK_DEPTH:      usize = 10;
/// Snapshots in the PCA training window
pub const DEFAULT_TRAINING_WINDOW: usize = 1_000;
/// Snapshots in the cross-impact regression window
pub const DEFAULT_IMPACT_WINDOW:   usize = 2_000;

#[derive(Debug, Clone, PartialEq)]
pub struct OfiConfig {
    // ── Book shape ───────────────────────────────────────────────────
    /// Levels every snapshot must carry; `FeatureEngine` rejects any other
    /// depth and both level knobs are bounded by it
    pub book_depth: usize,

    // ── Feature levels ───────────────────────────────────────────────
    /// Levels used for deeper-level (normalised) OFI
    pub deeper_level:     usize,
    /// Levels used for integrated OFI (PCA columns)
    pub integrated_level: usize,

    // ── Training windows (in snapshots, not pairs) ───────────────────
    /// Leading snapshots used to build the PCA corpus
    pub training_window: usize,
    /// Leading snapshots used for the cross-impact fit
    pub impact_window:   usize,
}

impl Default for OfiConfig {
    fn default() -> Self {
        Self {
            book_depth:       DEFAULT_BOOK_DEPTH,
            deeper_level:     DEFAULT_BOOK_DEPTH,
            integrated_level: DEFAULT_BOOK_DEPTH,
            training_window:  DEFAULT_TRAINING_WINDOW,
            impact_window:    DEFAULT_IMPACT_WINDOW,
        }
    }
}

impl OfiConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let book_depth = parse_key(&lookup, "OFI_BOOK_DEPTH", DEFAULT_BOOK_DEPTH)?;
        let cfg = Self {
            book_depth,
            deeper_level:     parse_key(&lookup, "OFI_DEEPER_LEVEL",     book_depth)?,
            integrated_level: parse_key(&lookup, "OFI_INTEGRATED_LEVEL", book_depth)?,
            training_window:  parse_key(&lookup, "OFI_TRAINING_WINDOW",  DEFAULT_TRAINING_WINDOW)?,
            impact_window:    parse_key(&lookup, "OFI_IMPACT_WINDOW",    DEFAULT_IMPACT_WINDOW)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject levels outside 1..=book_depth and windows too short to train on.
    pub fn validate(&self) -> Result<()> {
        if self.book_depth == 0 {
            anyhow::bail!("OFI_BOOK_DEPTH must be at least 1");
        }
        for (key, level) in [
            ("OFI_DEEPER_LEVEL", self.deeper_level),
            ("OFI_INTEGRATED_LEVEL", self.integrated_level),
        ] {
            if level == 0 || level > self.book_depth {
                anyhow::bail!("{key}={level} outside 1..={}", self.book_depth);
            }
        }
        // covariance needs ≥ 2 pairs, i.e. ≥ 3 snapshots
        if self.training_window < 3 {
            anyhow::bail!("OFI_TRAINING_WINDOW={} must be at least 3", self.training_window);
        }
        if self.impact_window < 2 {
            anyhow::bail!("OFI_IMPACT_WINDOW={} must be at least 2", self.impact_window);
        }
        Ok(())
    }
}

fn parse_key<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        None => Ok(default),
    }
}
