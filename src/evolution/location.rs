//! Weighted sampling of the next site to mutate.
//!
//! Every site's weight is its rate-category multiplier times the total
//! outgoing rate of the base it currently holds (zero for `N` and for
//! invariant sites). Sites are grouped into fixed-size chunks with cached
//! per-chunk totals: a draw picks a chunk by its total, then scans the sites
//! inside it, so draws cost O(chunks + chunk size) instead of a full pass.
//!
//! Substitutions adjust a single chunk total in O(1). Indels shift every
//! downstream site, so they trigger a chunk rebuild over the active range;
//! they are a small fraction of all events, which keeps the amortized cost
//! near the substitution path.

use std::sync::Arc;

use rand::Rng;

use crate::errors::RateModelError;
use crate::evolution::events::EventTypeSampler;
use crate::evolution::gammas::GammaRegions;
use crate::genome::VariantChromosome;

/// Per-lineage site-weight state: rate-category indices per current site,
/// chunked weight totals, and the active `[start, end)` range.
#[derive(Debug, Clone)]
pub struct LocationSampler {
    /// Category index per site of the *current* sequence; `values.len()`
    /// is the invariant sentinel. Indels insert and remove entries so this
    /// stays parallel to the evolved sequence.
    rate_inds: Vec<u32>,
    /// Shared category multipliers.
    values: Arc<[f64]>,
    chunk_size: usize,
    chunk_rates: Vec<f64>,
    total: f64,
    start: usize,
    end_excl: usize,
    /// Scratch for materializing chunk bases during draws and rebuilds.
    scratch: Vec<u8>,
}

impl LocationSampler {
    /// Build per-site categories from gamma regions plus an invariant-site
    /// fraction in `[0, 1)`. Sites drawn invariant get the sentinel category
    /// and never mutate. The active range starts as the whole chromosome.
    pub fn new<R: Rng + ?Sized>(
        regions: &GammaRegions,
        invariant: f64,
        rng: &mut R,
    ) -> Result<Self, RateModelError> {
        if !(0.0..1.0).contains(&invariant) {
            return Err(RateModelError::InvalidParameter("invariant", invariant));
        }

        let seq_size = regions.seq_size();
        let values: Arc<[f64]> = regions.values().to_vec().into();
        let sentinel = values.len() as u32;

        let mut rate_inds = Vec::with_capacity(seq_size);
        for pos in 0..seq_size {
            if invariant > 0.0 && rng.random::<f64>() < invariant {
                rate_inds.push(sentinel);
            } else {
                rate_inds.push(regions.region_at(pos) as u32);
            }
        }

        let chunk_size = ((seq_size as f64).sqrt() as usize).clamp(16, 1 << 14);

        Ok(Self {
            rate_inds,
            values,
            chunk_size,
            chunk_rates: Vec::new(),
            total: 0.0,
            start: 0,
            end_excl: seq_size,
            scratch: Vec::new(),
        })
    }

    /// The rate-category multiplier at site `pos` (0 for invariant sites).
    #[inline]
    pub fn multiplier_at(&self, pos: usize) -> f64 {
        let ind = self.rate_inds[pos] as usize;
        if ind >= self.values.len() {
            0.0
        } else {
            self.values[ind]
        }
    }

    /// Category indices per current site; the sentinel (`n_categories`)
    /// marks invariant sites.
    #[inline]
    pub fn rate_inds(&self) -> &[u32] {
        &self.rate_inds
    }

    /// Number of non-sentinel rate categories.
    #[inline]
    pub fn n_categories(&self) -> usize {
        self.values.len()
    }

    /// The shared category multipliers.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Cached total weight over the active range.
    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Active range start.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Active range end (exclusive). Deletions pull this back; the range is
    /// exhausted once it reaches `start`.
    #[inline]
    pub fn end_excl(&self) -> usize {
        self.end_excl
    }

    /// Whether any sites remain in the active range.
    #[inline]
    pub fn range_active(&self) -> bool {
        self.end_excl > self.start
    }

    /// Restrict sampling to `[start, end)` and rebuild the chunk totals.
    pub fn set_range(
        &mut self,
        start: usize,
        end_excl: usize,
        chrom: &VariantChromosome,
        events: &EventTypeSampler,
    ) {
        debug_assert!(start <= end_excl && end_excl <= chrom.len());
        self.start = start;
        self.end_excl = end_excl;
        self.rebuild(chrom, events);
    }

    /// Recompute every chunk total (and the cached range total) from the
    /// chromosome's current bases.
    pub fn rebuild(&mut self, chrom: &VariantChromosome, events: &EventTypeSampler) {
        let span = self.end_excl.saturating_sub(self.start);
        let n_chunks = span.div_ceil(self.chunk_size.max(1));
        self.chunk_rates.clear();
        self.chunk_rates.resize(n_chunks, 0.0);
        self.total = 0.0;

        let mut scratch = std::mem::take(&mut self.scratch);
        for c in 0..n_chunks {
            let chunk_start = self.start + c * self.chunk_size;
            let chunk_len = self.chunk_size.min(self.end_excl - chunk_start);
            chrom.read_into(&mut scratch, chunk_start, chunk_len);

            let mut sum = 0.0;
            for (off, &byte) in scratch.iter().enumerate() {
                sum += self.multiplier_at(chunk_start + off) * events.byte_rate(byte);
            }
            self.chunk_rates[c] = sum;
            self.total += sum;
        }
        self.scratch = scratch;
    }

    /// Draw the next site, weighted by current per-site rate. Returns `None`
    /// when no site in range carries positive weight.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        chrom: &VariantChromosome,
        events: &EventTypeSampler,
        rng: &mut R,
    ) -> Option<usize> {
        if self.total <= 0.0 || !self.range_active() {
            return None;
        }

        let mut u = rng.random::<f64>() * self.total;

        // Pick the chunk by cumulative totals.
        let mut chunk = self.chunk_rates.len() - 1;
        for (c, &w) in self.chunk_rates.iter().enumerate() {
            if u < w {
                chunk = c;
                break;
            }
            u -= w;
        }

        // Scan the sites inside it.
        let chunk_start = self.start + chunk * self.chunk_size;
        let chunk_len = self.chunk_size.min(self.end_excl - chunk_start);
        let mut scratch = std::mem::take(&mut self.scratch);
        chrom.read_into(&mut scratch, chunk_start, chunk_len);

        let mut picked = None;
        let mut last_positive = None;
        for (off, &byte) in scratch.iter().enumerate() {
            let pos = chunk_start + off;
            let w = self.multiplier_at(pos) * events.byte_rate(byte);
            if w <= 0.0 {
                continue;
            }
            last_positive = Some(pos);
            if u < w {
                picked = Some(pos);
                break;
            }
            u -= w;
        }
        self.scratch = scratch;

        // Floating-point drift can push `u` past the last site; fall back to
        // the last weighted one in the chunk.
        picked.or(last_positive)
    }

    /// Apply a substitution's weight change at `pos` in O(1).
    pub fn apply_substitution(&mut self, pos: usize, delta: f64) {
        debug_assert!(pos >= self.start && pos < self.end_excl);
        let chunk = (pos - self.start) / self.chunk_size;
        if let Some(w) = self.chunk_rates.get_mut(chunk) {
            *w += delta;
            if *w < 0.0 {
                *w = 0.0;
            }
        }
        self.total += delta;
        if self.total < 0.0 {
            self.total = 0.0;
        }
    }

    /// Record a net insertion of `len` bases after `pos`: inserted sites
    /// inherit the anchor site's category, the range grows, and chunk
    /// totals are rebuilt.
    pub fn apply_insertion(
        &mut self,
        pos: usize,
        len: usize,
        chrom: &VariantChromosome,
        events: &EventTypeSampler,
    ) {
        let anchor = self.rate_inds[pos];
        self.rate_inds
            .splice(pos + 1..pos + 1, std::iter::repeat_n(anchor, len));
        self.end_excl += len;
        self.rebuild(chrom, events);
    }

    /// Record a deletion of `removed` bases starting at `pos`: their
    /// categories disappear, the range shrinks, and chunk totals are
    /// rebuilt.
    pub fn apply_deletion(
        &mut self,
        pos: usize,
        removed: usize,
        chrom: &VariantChromosome,
        events: &EventTypeSampler,
    ) {
        self.rate_inds.drain(pos..pos + removed);
        self.end_excl -= removed;
        self.rebuild(chrom, events);
    }
}
