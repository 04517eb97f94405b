/// One stored sample and the rank uncertainty around it.
///
/// `g` is the difference between the lowest possible rank of `v` and that of
/// the preceding entry. `delta` is how far above that lowest rank `v` may
/// actually sit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry<T> {
    pub g: usize,
    pub delta: usize,
    pub v: T,
}

/// An entry with its absolute rank bounds, used while merging stores.
#[derive(Debug, Clone, Copy)]
pub struct Ranked<T> {
    pub v: T,
    pub rmin: usize,
    pub rmax: usize,
}
