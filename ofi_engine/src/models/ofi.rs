/// models/ofi.rs — Best-level and multi-level Order Flow Imbalance
/// ```text
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL DEFINITION
/// ─────────────────────────────────────────────────────────────────────────
///
/// Based on: Cont, Cucuringu, Zhang (2023) — "Cross-impact of order flow
/// imbalance in equity markets", §2.1.
///
///   For level m between snapshots t−1 and t:
///
///     Bid flow:  e_b = q_b(t)            if P_b(t) >  P_b(t−1)
///                      q_b(t) − q_b(t−1)  if P_b(t) == P_b(t−1)
///                     −q_b(t)            if P_b(t) <  P_b(t−1)
///
///     Ask flow:  e_a = −q_a(t)           if P_a(t) >  P_a(t−1)
///                      q_a(t) − q_a(t−1)  if P_a(t) == P_a(t−1)
///                      q_a(t)            if P_a(t) <  P_a(t−1)
///
///     Raw OFI:   OFI_m = e_b − e_a
///
///   NOTE: the "price worsened" branches use the CURRENT size q(t), not the
///   size that left the book q(t−1).  Downstream datasets depend on this
///   exact rule table.
///
///   Best-level OFI:   OFI_1
///
///   Deeper-level OFI (one shared normaliser for the whole vector):
///
///     Q̄ = (1/M) · Σ_{m<M} [q_b,m(t) + q_a,m(t) + q_b,m(t−1) + q_a,m(t−1)] / 4
///     ofi_m = OFI_m / Q̄
///
///   Q̄ = 0 gives ±∞ / NaN entries.  They are returned unclamped.
/// ─────────────────────────────────────────────────────────────────────────
/// ```

use crate::data::SnapshotPair;
use crate::error::{OfiError, Result};

/// Signed bid / ask flow at one book level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelDelta {
    /// Bid contribution e_b
    pub bid: f64,
    /// Ask contribution e_a
    pub ask: f64,
}

impl LevelDelta {
    /// OFI at this level:  e_b − e_a
    pub fn ofi(&self) -> f64 {
        self.bid - self.ask
    }
}

/// Bid / ask contributions at level index `index` (0 = best).
pub fn level_delta(pair: &SnapshotPair<'_>, index: usize) -> Result<LevelDelta> {
    let depth = pair.depth();
    if index >= depth {
        return Err(OfiError::IndexOutOfRange { index, depth });
    }
    Ok(delta_at(pair, index))
}

fn delta_at(pair: &SnapshotPair<'_>, i: usize) -> LevelDelta {
    let (prev, cur) = (pair.previous(), pair.current());

    let (cur_bpx, prev_bpx) = (cur.bid_px()[i], prev.bid_px()[i]);
    let bid = if cur_bpx > prev_bpx {
        cur.bid_sz()[i]
    } else if cur_bpx == prev_bpx {
        cur.bid_sz()[i] - prev.bid_sz()[i]
    } else {
        -cur.bid_sz()[i]
    };

    let (cur_apx, prev_apx) = (cur.ask_px()[i], prev.ask_px()[i]);
    let ask = if cur_apx > prev_apx {
        -cur.ask_sz()[i]
    } else if cur_apx == prev_apx {
        cur.ask_sz()[i] - prev.ask_sz()[i]
    } else {
        cur.ask_sz()[i]
    };

    LevelDelta { bid, ask }
}

/// Raw (un-normalised) OFI for levels `0..level`, best level first.
pub fn raw_ofi(pair: &SnapshotPair<'_>, level: usize) -> Result<Vec<f64>> {
    pair.check_level(level)?;
    Ok((0..level).map(|i| delta_at(pair, i).ofi()).collect())
}

/// Best-level OFI.  Every snapshot has at least one level, so this cannot fail.
pub fn best_level_ofi(pair: &SnapshotPair<'_>) -> f64 {
    delta_at(pair, 0).ofi()
}

/// Shared depth normaliser Q̄ over levels `0..level`.
pub fn average_depth(pair: &SnapshotPair<'_>, level: usize) -> Result<f64> {
    pair.check_level(level)?;
    let (prev, cur) = (pair.previous(), pair.current());
    let sum: f64 = (0..level)
        .map(|i| {
            let depth = cur.bid_sz()[i] + cur.ask_sz()[i] + prev.bid_sz()[i] + prev.ask_sz()[i];
            depth / 4.0
        })
        .sum();
    Ok(sum / level as f64)
}

/// Deeper-level OFI: raw OFI divided by the single average depth Q̄.
pub fn deeper_level_ofi(pair: &SnapshotPair<'_>, level: usize) -> Result<Vec<f64>> {
    let raw = raw_ofi(pair, level)?;
    let q_bar = average_depth(pair, level)?;
    Ok(raw.into_iter().map(|ofi| ofi / q_bar).collect())
}
