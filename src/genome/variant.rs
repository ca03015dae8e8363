//! The variant-chromosome overlay.
//!
//! A variant chromosome stores an immutable reference plus an ordered list
//! of [`Mutation`] records instead of a materialized string: a genome of 10^9
//! bases carrying a few million mutations costs O(reference + mutations)
//! rather than O(tips x reference). Records live in a `VecDeque` (cheap at both
//! ends, O(sqrt n)-ish in the middle), ordered by `new_pos`, and positions
//! downstream of an edit are shifted rather than recomputed from scratch.
//!
//! The three add-operations interact with earlier records at overlapping
//! coordinates: substitutions overwrite into insertion strings, insertions
//! splice into them, and deletions run a reconciliation pass ("blow-up")
//! that erases covered records, absorbs inserted bases, trims partial
//! overlaps, and merges adjacent deletions.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::base::RefChromosome;
use crate::genome::Mutation;

/// A reference chromosome plus an ordered mutation list.
#[derive(Debug, Clone)]
pub struct VariantChromosome {
    ref_chrom: Arc<RefChromosome>,
    mutations: VecDeque<Mutation>,
    /// Current evolved length: `ref len + sum of size modifiers`.
    seq_size: usize,
}

impl VariantChromosome {
    /// Create a variant identical to its reference.
    pub fn new(ref_chrom: Arc<RefChromosome>) -> Self {
        let seq_size = ref_chrom.len();
        Self {
            ref_chrom,
            mutations: VecDeque::new(),
            seq_size,
        }
    }

    /// Current evolved sequence length.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq_size
    }

    /// Whether the evolved sequence has length zero.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.seq_size == 0
    }

    /// The shared reference chromosome.
    #[inline]
    pub fn ref_chrom(&self) -> &Arc<RefChromosome> {
        &self.ref_chrom
    }

    /// The chromosome name (inherited from the reference).
    #[inline]
    pub fn name(&self) -> &str {
        self.ref_chrom.name()
    }

    /// Iterate over the mutation records in `new_pos` order.
    pub fn mutations(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    /// Number of mutation records.
    #[inline]
    pub fn n_mutations(&self) -> usize {
        self.mutations.len()
    }

    /// Index of the nearest mutation at or before `new_pos`, or `None` if no
    /// record precedes it.
    ///
    /// When a deletion and another record share a `new_pos`, the non-deletion
    /// is returned: the search runs backward from the tail, and the deletion
    /// is ordered first. The deletion carries no sequence, so the record that
    /// owns the base at that position is the one callers want.
    fn preceding_index(&self, new_pos: usize) -> Option<usize> {
        if self.mutations.is_empty() {
            return None;
        }
        debug_assert!(new_pos < self.seq_size, "position {new_pos} past end {}", self.seq_size);

        if new_pos < self.mutations[0].new_pos {
            return None;
        }
        let last = self.mutations.len() - 1;
        if new_pos >= self.mutations[last].new_pos {
            return Some(last);
        }
        let mut i = last;
        while self.mutations[i].new_pos > new_pos {
            i -= 1;
        }
        Some(i)
    }

    /// Place a single-base substitution at `new_pos` on the evolved sequence.
    ///
    /// Panics if `new_pos >= len()`.
    pub fn add_substitution(&mut self, base: u8, new_pos: usize) {
        assert!(new_pos < self.seq_size, "substitution at {new_pos} past end {}", self.seq_size);

        match self.preceding_index(new_pos) {
            None => {
                self.mutations
                    .push_front(Mutation::substitution(new_pos, new_pos, base));
            }
            Some(i) => {
                let ind = new_pos - self.mutations[i].new_pos;
                if (ind as isize) <= self.mutations[i].size_modifier {
                    // Inside the record's replacement/insertion string.
                    self.mutations[i].nucleos[ind] = base;
                } else {
                    // In the reference segment following the record.
                    let m = &self.mutations[i];
                    let old_pos = (ind as isize + m.old_pos as isize - m.size_modifier) as usize;
                    self.mutations
                        .insert(i + 1, Mutation::substitution(old_pos, new_pos, base));
                }
            }
        }
    }

    /// Insert `bases` at `new_pos`: `bases[0]` replaces the base currently at
    /// `new_pos` and `bases[1..]` are new, so the sequence grows by
    /// `bases.len() - 1`.
    ///
    /// Panics if `bases` is empty or `new_pos >= len()`.
    pub fn add_insertion(&mut self, bases: &[u8], new_pos: usize) {
        assert!(!bases.is_empty(), "insertion needs at least the anchor base");
        assert!(new_pos < self.seq_size, "insertion at {new_pos} past end {}", self.seq_size);

        match self.preceding_index(new_pos) {
            None => {
                self.mutations
                    .push_front(Mutation::insertion(new_pos, new_pos, bases.to_vec()));
                self.apply_inserted(0);
            }
            Some(i) => {
                let ind = new_pos - self.mutations[i].new_pos;
                if (ind as isize) <= self.mutations[i].size_modifier {
                    // Splice into the record's string, replacing one base.
                    let growth = bases.len() as isize - 1;
                    let m = &mut self.mutations[i];
                    m.nucleos.splice(ind..ind + 1, bases.iter().copied());
                    m.size_modifier += growth;
                    self.shift_from(i + 1, growth);
                } else {
                    let m = &self.mutations[i];
                    let old_pos = (ind as isize + m.old_pos as isize - m.size_modifier) as usize;
                    self.mutations
                        .insert(i + 1, Mutation::insertion(old_pos, new_pos, bases.to_vec()));
                    self.apply_inserted(i + 1);
                }
            }
        }
    }

    /// Delete up to `size` bases starting at `new_pos` (clamped at the end
    /// of the sequence).
    ///
    /// Panics if `new_pos >= len()`.
    pub fn add_deletion(&mut self, size: usize, new_pos: usize) {
        if size == 0 {
            return;
        }
        assert!(new_pos < self.seq_size, "deletion at {new_pos} past end {}", self.seq_size);

        let deletion_start = new_pos;
        let deletion_end = (new_pos + size - 1).min(self.seq_size - 1);
        let mut size_mod = deletion_start as isize - deletion_end as isize - 1;

        if self.mutations.is_empty() {
            self.mutations
                .push_front(Mutation::deletion(new_pos, new_pos, size_mod));
            self.seq_size = (self.seq_size as isize + size_mod) as usize;
            return;
        }

        // Net length change; fixed even when insertions absorb part of the
        // deletion, because absorbed bases were themselves removed.
        let subseq_modifier = size_mod;

        let mut mut_i = self
            .preceding_index(deletion_start)
            .unwrap_or(self.mutations.len());

        self.deletion_blowup(&mut mut_i, deletion_start, deletion_end, &mut size_mod);

        // Fully absorbed by insertions: nothing left to record.
        if size_mod == 0 {
            self.shift_from(mut_i, subseq_modifier);
            return;
        }

        let old_pos = if mut_i > 0 {
            let m = &self.mutations[mut_i - 1];
            (deletion_start as isize - m.new_pos as isize + m.old_pos as isize - m.size_modifier)
                as usize
        } else {
            deletion_start
        };

        self.shift_from(mut_i, subseq_modifier);
        self.mutations
            .insert(mut_i, Mutation::deletion(old_pos, deletion_start, size_mod));
    }

    /// Reconcile the mutation list with a new deletion covering
    /// `[del_start, del_end]`.
    ///
    /// Erases substitutions the deletion covers, absorbs insertions (fully or
    /// partially) into `size_mod`, and folds adjacent deletions into it.
    /// Covered records are erased as the pass walks, so the list is
    /// consistent on every exit path. On return `mut_i` is the index where
    /// the surviving deletion record belongs.
    fn deletion_blowup(
        &mut self,
        mut_i: &mut usize,
        del_start: usize,
        del_end: usize,
        size_mod: &mut isize,
    ) {
        if *mut_i == self.mutations.len() {
            // Deletion starts before the first record.
            *mut_i = 0;
        } else {
            // A deletion may share `new_pos` with the (non-deletion) record
            // the search lands on; it is contiguous with the new deletion
            // and folds in first.
            if *mut_i > 0 && self.mutations[*mut_i].new_pos == del_start {
                let prev = &self.mutations[*mut_i - 1];
                if prev.is_deletion() && prev.new_pos == del_start {
                    *size_mod += prev.size_modifier;
                    self.mutations.remove(*mut_i - 1);
                    *mut_i -= 1;
                }
            }

            let (new_pos, modifier) = {
                let m = &self.mutations[*mut_i];
                (m.new_pos, m.size_modifier)
            };
            if modifier == 0 {
                match new_pos.cmp(&del_start) {
                    Ordering::Less => *mut_i += 1,
                    Ordering::Equal => {} // covered; the loop below erases it
                    Ordering::Greater => {
                        panic!("index past deletion start in deletion blow-up")
                    }
                }
            } else if modifier > 0 {
                self.merge_del_ins(mut_i, del_start, del_end, size_mod);
            } else if new_pos == del_start {
                // Two deletions at the same position merge.
                *size_mod += modifier;
                self.mutations.remove(*mut_i);
            } else {
                *mut_i += 1;
            }
        }

        if *size_mod == 0 {
            return;
        }

        while *mut_i < self.mutations.len() {
            let (new_pos, modifier) = {
                let m = &self.mutations[*mut_i];
                (m.new_pos, m.size_modifier)
            };
            if new_pos > del_end {
                // A deletion starting right past the deleted range is
                // contiguous with it on the result and must merge too.
                if modifier < 0 && new_pos == del_end + 1 {
                    *size_mod += modifier;
                    self.mutations.remove(*mut_i);
                }
                break;
            }
            if modifier == 0 {
                // Substitution fully inside the deletion.
                self.mutations.remove(*mut_i);
            } else if modifier > 0 {
                self.merge_del_ins(mut_i, del_start, del_end, size_mod);
                if *size_mod == 0 {
                    return;
                }
            } else {
                // A later deletion inside the range folds in.
                *size_mod += modifier;
                self.mutations.remove(*mut_i);
            }
        }
    }

    /// Merge the new deletion with the insertion at `insert_i`.
    ///
    /// `size_mod` grows (toward zero) by every "virtual" base the deletion
    /// removes from the insertion's string rather than from the reference.
    /// Advances `insert_i` past the record unless the deletion trimmed the
    /// front of a surviving insertion, whose anchor on the reference is
    /// unchanged and whose `new_pos` therefore moves forward instead.
    fn merge_del_ins(
        &mut self,
        insert_i: &mut usize,
        del_start: usize,
        del_end: usize,
        size_mod: &mut isize,
    ) {
        let insertion_start = self.mutations[*insert_i].new_pos;
        let insertion_end =
            (insertion_start as isize + self.mutations[*insert_i].size_modifier) as usize;

        if del_start > insertion_end || del_end < insertion_start {
            *insert_i += 1;
        } else if del_start <= insertion_start && del_end >= insertion_end {
            // Entire insertion covered.
            *size_mod += self.mutations[*insert_i].size_modifier;
            self.mutations.remove(*insert_i);
        } else {
            let erase0 = del_start.saturating_sub(insertion_start);
            let nucleos_len = self.mutations[*insert_i].nucleos.len();
            let erase1 = (del_end - insertion_start + 1).min(nucleos_len);

            *size_mod += (erase1 - erase0) as isize;

            let m = &mut self.mutations[*insert_i];
            m.nucleos.drain(erase0..erase1);
            m.size_modifier = m.nucleos.len() as isize - 1;

            if del_start <= insertion_start && del_end < insertion_end {
                m.new_pos += erase1 - erase0;
            } else {
                *insert_i += 1;
            }
        }
    }

    /// Shift `new_pos` of every record at or after `from` by `modifier` and
    /// adjust the cached length.
    fn shift_from(&mut self, from: usize, modifier: isize) {
        for m in self.mutations.range_mut(from..) {
            m.new_pos = (m.new_pos as isize + modifier) as usize;
        }
        self.seq_size = (self.seq_size as isize + modifier) as usize;
    }

    /// After inserting a new record at `i`, shift everything after it by the
    /// record's own size modifier.
    fn apply_inserted(&mut self, i: usize) {
        let modifier = self.mutations[i].size_modifier;
        self.shift_from(i + 1, modifier);
    }

    /// The base at `pos` on the evolved sequence.
    ///
    /// Panics if `pos >= len()`.
    #[inline]
    pub fn base_at(&self, pos: usize) -> u8 {
        self.base_at_hint(pos, self.preceding_index(pos))
    }

    /// The base at `pos`, given the index of the nearest record at or before
    /// `pos` (or `None` when no record precedes it). The hint is what an
    /// in-order traversal already has in hand; no search is performed.
    #[inline]
    pub fn base_at_hint(&self, pos: usize, hint: Option<usize>) -> u8 {
        match hint {
            None => self.ref_chrom.base(pos),
            Some(i) => {
                let m = &self.mutations[i];
                let ind = pos - m.new_pos;
                if (ind as isize) <= m.size_modifier {
                    m.nucleos[ind]
                } else {
                    let r = (ind as isize + m.old_pos as isize - m.size_modifier) as usize;
                    self.ref_chrom.base(r)
                }
            }
        }
    }

    /// Materialize `len` bases starting at `start` into `out` (cleared
    /// first), walking the mutation list and the reference in parallel.
    /// Truncated at the end of the sequence.
    pub fn read_into(&self, out: &mut Vec<u8>, start: usize, len: usize) {
        out.clear();
        let end = (start + len).min(self.seq_size);
        if start >= end {
            return;
        }
        out.reserve(end - start);

        let mut hint = self.preceding_index(start);
        let mut next = hint.map_or(0, |i| i + 1);
        for pos in start..end {
            while next < self.mutations.len() && self.mutations[next].new_pos <= pos {
                hint = Some(next);
                next += 1;
            }
            out.push(self.base_at_hint(pos, hint));
        }
    }

    /// Materialize the whole evolved sequence.
    pub fn materialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.read_into(&mut out, 0, self.seq_size);
        out
    }

    /// Re-sort records by reference anchor and rebuild `new_pos` and the
    /// cached length from scratch.
    fn recalc_positions(&mut self) {
        let mut records: Vec<Mutation> = self.mutations.drain(..).collect();
        records.sort();

        let mut modifier: isize = 0;
        for m in &mut records {
            m.new_pos = (m.old_pos as isize + modifier) as usize;
            modifier += m.size_modifier;
        }
        self.seq_size = (self.ref_chrom.len() as isize + modifier) as usize;
        self.mutations = records.into();
    }

    /// Append another variant's records (covering a disjoint reference
    /// range) and rebuild positions. Used when a chromosome is evolved one
    /// subrange at a time.
    pub fn merge_from(&mut self, other: &VariantChromosome) {
        self.mutations.extend(other.mutations.iter().cloned());
        self.recalc_positions();
    }
}

impl fmt::Display for VariantChromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VariantChromosome({}, {} bp, {} mutations)",
            self.name(),
            self.seq_size,
            self.mutations.len()
        )
    }
}
