/// data.rs — Order-book snapshot records
///
/// A `Snapshot` is one observation of the top `depth` levels of the book.
/// Bid prices are ordered best (highest) first, ask prices best (lowest)
/// first.  A `SnapshotPair` borrows two consecutive snapshots of equal depth;
/// every OFI feature is a function of one pair.
use serde::{Deserialize, Serialize};

use crate::error::{OfiError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord")]
pub struct Snapshot {
    timestamp: String,
    bid_px:    Vec<f64>,
    ask_px:    Vec<f64>,
    bid_sz:    Vec<f64>,
    ask_sz:    Vec<f64>,
}

/// Unvalidated wire shape; deserialisation funnels through `Snapshot::new`.
#[derive(Deserialize)]
struct SnapshotRecord {
    timestamp: String,
    bid_px:    Vec<f64>,
    ask_px:    Vec<f64>,
    bid_sz:    Vec<f64>,
    ask_sz:    Vec<f64>,
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = OfiError;

    fn try_from(r: SnapshotRecord) -> Result<Self> {
        Snapshot::new(r.timestamp, r.bid_px, r.ask_px, r.bid_sz, r.ask_sz)
    }
}

impl Snapshot {
    /// Build a snapshot.  All four level vectors must share one non-zero length.
    pub fn new(
        timestamp: impl Into<String>,
        bid_px: Vec<f64>,
        ask_px: Vec<f64>,
        bid_sz: Vec<f64>,
        ask_sz: Vec<f64>,
    ) -> Result<Self> {
        let depth = bid_px.len();
        if depth == 0 {
            return Err(OfiError::EmptyBook);
        }
        for (field, len) in [
            ("ask_px", ask_px.len()),
            ("bid_sz", bid_sz.len()),
            ("ask_sz", ask_sz.len()),
        ] {
            if len != depth {
                return Err(OfiError::LengthMismatch { field, len, expected: depth });
            }
        }
        Ok(Self { timestamp: timestamp.into(), bid_px, ask_px, bid_sz, ask_sz })
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Number of book levels carried by this snapshot (always ≥ 1).
    pub fn depth(&self) -> usize {
        self.bid_px.len()
    }

    pub fn bid_px(&self) -> &[f64] {
        &self.bid_px
    }

    pub fn ask_px(&self) -> &[f64] {
        &self.ask_px
    }

    pub fn bid_sz(&self) -> &[f64] {
        &self.bid_sz
    }

    pub fn ask_sz(&self) -> &[f64] {
        &self.ask_sz
    }

    /// Mid price at the best level:  m = ½·(bid₀ + ask₀)
    pub fn mid_price(&self) -> f64 {
        0.5 * (self.bid_px[0] + self.ask_px[0])
    }
}

/// Two consecutive snapshots.  Adjacency in the stream is the caller's job;
/// only equal depth is checked here, and `new` is the only way to build one.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPair<'a> {
    previous: &'a Snapshot,
    current:  &'a Snapshot,
}

impl<'a> SnapshotPair<'a> {
    pub fn new(previous: &'a Snapshot, current: &'a Snapshot) -> Result<Self> {
        if previous.depth() != current.depth() {
            return Err(OfiError::DepthMismatch {
                previous: previous.depth(),
                current:  current.depth(),
            });
        }
        Ok(Self { previous, current })
    }

    pub fn previous(&self) -> &'a Snapshot {
        self.previous
    }

    pub fn current(&self) -> &'a Snapshot {
        self.current
    }

    /// Levels addressable in both snapshots.
    pub fn depth(&self) -> usize {
        self.previous.depth().min(self.current.depth())
    }

    /// Fails with `LevelOutOfRange` unless 1 ≤ level ≤ depth.
    pub(crate) fn check_level(&self, level: usize) -> Result<()> {
        if level == 0 || level > self.depth() {
            return Err(OfiError::LevelOutOfRange { level, depth: self.depth() });
        }
        Ok(())
    }
}
