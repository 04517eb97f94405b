use std::mem;

use crate::ckms::entry::{Entry, Ranked};
use crate::summary::Sample;
use crate::target::Targets;

/// The ordered entries of a summary.
///
/// Entry values never decrease. The first and last entries always hold the
/// exact minimum and maximum seen, with `delta == 0`. For every other entry
/// `g + delta` stays within the band of the rank mass below it, which is
/// checked when entries are merged away by `compress`.
#[derive(Clone, PartialEq, Debug)]
pub struct Store<T> {
    data: Vec<Entry<T>>,
    n: usize, // total samples ever stored
}

impl<T> Store<T>
where
    T: Sample,
{
    pub fn new() -> Store<T> {
        Store {
            data: Vec::new(),
            n: 0,
        }
    }

    /// Insert a single, comparable value.
    pub fn insert(&mut self, element: T) {
        // equal values go after their peers
        let idx = self.data.partition_point(|e| e.v <= element);
        let delta = match self.data.get(idx) {
            // interior: no more uncertain than the entry it now precedes
            Some(succ) if idx > 0 => succ.g + succ.delta - 1,
            // a new minimum or maximum has an exactly known rank
            _ => 0,
        };
        self.data.insert(
            idx,
            Entry {
                v: element,
                g: 1,
                delta,
            },
        );
        self.n += 1;
    }

    /// Insert comparable values sorted in ascending order
    ///
    /// Equivalent to inserting each in turn, in one pass over the entries.
    pub fn insert_sorted(&mut self, elements: &[T]) {
        if elements.is_empty() {
            return;
        }
        let mut merged = Vec::with_capacity(self.data.len() + elements.len());
        let mut old = mem::replace(&mut self.data, Vec::new()).into_iter().peekable();
        for &element in elements {
            while old.peek().map_or(false, |e| e.v <= element) {
                if let Some(e) = old.next() {
                    merged.push(e);
                }
            }
            let delta = match old.peek() {
                Some(succ) if !merged.is_empty() => succ.g + succ.delta - 1,
                _ => 0,
            };
            merged.push(Entry {
                v: element,
                g: 1,
                delta,
            });
        }
        merged.extend(old);
        self.data = merged;
        self.n += elements.len();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total stored entries
    ///
    /// This value will fluctuate as compression happens.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Total samples, ever
    ///
    /// This value will never decrease and may or may not be equivalent to
    /// `Self::len`
    pub fn count(&self) -> usize {
        self.n
    }

    /// Merge away entries whose rank mass fits in their neighbour's band
    ///
    /// Passes repeat until one removes nothing, so a second call is a no-op.
    pub fn compress(&mut self, targets: &Targets) {
        loop {
            let before = self.data.len();
            if before < 3 {
                return;
            }
            self.compress_pass(targets);
            if self.data.len() == before {
                return;
            }
        }
    }

    fn compress_pass(&mut self, targets: &Targets) {
        let n = self.n;
        let mut data = mem::replace(&mut self.data, Vec::new()).into_iter();
        let mut out = Vec::with_capacity(data.len());

        // The minimum is never merged away, so its value stays exact.
        let (first, mut cur) = match (data.next(), data.next()) {
            (Some(first), Some(second)) => (first, second),
            (first, second) => {
                out.extend(first);
                out.extend(second);
                self.data = out;
                return;
            }
        };
        let mut r = first.g;
        out.push(first);

        for nxt in data {
            // Folding cur into nxt leaves nxt's value and delta in place with
            // both g's, at a position where r samples rank below it.
            if cur.g + nxt.g + nxt.delta <= targets.band(r, n) {
                cur = Entry {
                    v: nxt.v,
                    g: cur.g + nxt.g,
                    delta: nxt.delta,
                };
            } else {
                r += cur.g;
                out.push(cur);
                cur = nxt;
            }
        }
        out.push(cur);
        self.data = out;
    }

    /// The stored value whose rank bounds sit closest to `q * n`
    ///
    /// Closeness is the worst case distance, `max(t - rmin, rmax - t)`. The
    /// first entry wins ties.
    pub fn query(&self, q: f64) -> Option<T> {
        let first = self.data.first()?;
        let t = q * (self.n as f64);

        let mut best = first.v;
        let mut best_err = f64::INFINITY;
        let mut rmin = 0;
        for e in &self.data {
            rmin += e.g;
            let lo = rmin as f64;
            let hi = (rmin + e.delta) as f64;
            // rmin only grows from here
            if lo - t > best_err {
                break;
            }
            let err = (t - lo).max(hi - t);
            if err < best_err {
                best_err = err;
                best = e.v;
            }
        }
        Some(best)
    }

    fn ranked(&self) -> Vec<Ranked<T>> {
        let mut rmin = 0;
        self.data
            .iter()
            .map(|e| {
                rmin += e.g;
                Ranked {
                    v: e.v,
                    rmin,
                    rmax: rmin + e.delta,
                }
            })
            .collect()
    }

    /// Combine two stores, recomputing every entry's rank bounds against the
    /// samples of the other side
    ///
    /// Ties are ordered with `self`'s samples first. An entry's lower bound
    /// gains the lower bound of the last entry on the other side strictly
    /// before it. Its upper bound gains one less than the upper bound of the
    /// first entry on the other side after it, or the whole of the other side
    /// if nothing there comes after it.
    pub fn merge(self, other: Store<T>) -> Store<T> {
        let lhs = self.ranked();
        let rhs = other.ranked();
        let (lhs_n, rhs_n) = (self.n, other.n);

        let mut ranked = Vec::with_capacity(lhs.len() + rhs.len());
        let (mut i, mut j) = (0, 0);
        while i < lhs.len() || j < rhs.len() {
            let take_lhs = j >= rhs.len() || (i < lhs.len() && lhs[i].v <= rhs[j].v);
            if take_lhs {
                let (lo, hi) = if j < rhs.len() {
                    let lo = if j > 0 { rhs[j - 1].rmin } else { 0 };
                    (lo, rhs[j].rmax - 1)
                } else {
                    (rhs_n, rhs_n)
                };
                let e = lhs[i];
                ranked.push(Ranked {
                    v: e.v,
                    rmin: e.rmin + lo,
                    rmax: e.rmax + hi,
                });
                i += 1;
            } else {
                let (lo, hi) = if i < lhs.len() {
                    let lo = if i > 0 { lhs[i - 1].rmin } else { 0 };
                    (lo, lhs[i].rmax - 1)
                } else {
                    (lhs_n, lhs_n)
                };
                let e = rhs[j];
                ranked.push(Ranked {
                    v: e.v,
                    rmin: e.rmin + lo,
                    rmax: e.rmax + hi,
                });
                j += 1;
            }
        }

        let mut data = Vec::with_capacity(ranked.len());
        let mut prev = 0;
        for e in ranked {
            assert!(
                e.rmin > prev && e.rmax >= e.rmin,
                "merged rank bounds out of order: {:?} after {}",
                (e.rmin, e.rmax),
                prev
            );
            data.push(Entry {
                v: e.v,
                g: e.rmin - prev,
                delta: e.rmax - e.rmin,
            });
            prev = e.rmin;
        }

        Store {
            data,
            n: lhs_n + rhs_n,
        }
    }

    #[cfg(test)]
    pub fn iter(&self) -> std::slice::Iter<'_, Entry<T>> {
        self.data.iter()
    }
}

impl<T> Default for Store<T>
where
    T: Sample,
{
    fn default() -> Self {
        Store::new()
    }
}

/// Whether every entry respects the band of the rank mass below it.
#[cfg(test)]
pub fn invariant_holds<T: Sample>(store: &Store<T>, targets: &Targets) -> bool {
    let mut r = 0;
    for (i, e) in store.iter().enumerate() {
        if i > 0 && e.g + e.delta > targets.band(r, store.count()) {
            return false;
        }
        r += e.g;
    }
    true
}
