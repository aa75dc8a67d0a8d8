//! Fork-join execution over n-dimensional index boxes.
//!
//! The box is split in half along its largest extent with `rayon::join`
//! until a piece is small enough for one thread, the same recursive
//! strategy the strided kernels use for map/reduce.

use std::marker::PhantomData;

use smallvec::SmallVec;

/// Stack-allocated Vec for index boxes; 8 covers every padding loop nest.
type SVec<T> = SmallVec<[T; 8]>;

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data is valid for the
/// lifetime of any parallel operation and that different threads write to
/// disjoint regions.
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub(crate) fn as_ptr(self) -> *mut T {
        self.0
    }
}

/// Writes additive identities into a borrowed buffer from worker threads.
pub(crate) struct ZeroWriter<'a, T> {
    ptr: SendPtr<T>,
    len: usize,
    _buf: PhantomData<&'a mut [T]>,
}

impl<'a, T: num_traits::Zero + Copy> ZeroWriter<'a, T> {
    pub(crate) fn new(data: &'a mut [T]) -> Self {
        Self {
            ptr: SendPtr(data.as_mut_ptr()),
            len: data.len(),
            _buf: PhantomData,
        }
    }

    /// Zero `len` consecutive slots starting at `off`.
    ///
    /// # Safety
    /// No other thread may access `off..off + len` during the call.
    #[inline]
    pub(crate) unsafe fn zero_run(&self, off: usize, len: usize) {
        assert!(off + len <= self.len, "padding write out of bounds");
        let dst = std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(off), len);
        dst.fill(T::zero());
    }

    /// Zero the slot at `off`.
    ///
    /// # Safety
    /// No other thread may access `off` during the call.
    #[inline]
    pub(crate) unsafe fn zero(&self, off: usize) {
        self.zero_run(off, 1);
    }
}

/// Minimum number of iterations to justify multi-threaded execution.
#[cfg_attr(not(feature = "parallel"), allow(dead_code))]
pub(crate) const MIN_PARALLEL_LEN: usize = 1 << 12;

/// Call `f(idx)` once for every index of the box `0..extents[0] x ...`.
///
/// Iterations are independent and run in no particular order; the call
/// returns when all of them have finished.
pub(crate) fn parallel_nd<F>(extents: &[usize], f: &F)
where
    F: Fn(&[usize]) + Sync,
{
    let total: usize = extents.iter().product();
    if total == 0 {
        return;
    }
    let starts: SVec<usize> = SmallVec::from_elem(0, extents.len());

    #[cfg(feature = "parallel")]
    {
        if total > MIN_PARALLEL_LEN {
            return split_threaded(&starts, extents, rayon::current_num_threads(), f);
        }
    }

    for_each_index(&starts, extents, f);
}

/// Recursive halving along the largest extent.
#[cfg(feature = "parallel")]
fn split_threaded<F>(starts: &[usize], extents: &[usize], nthreads: usize, f: &F)
where
    F: Fn(&[usize]) + Sync,
{
    let total: usize = extents.iter().product();
    if nthreads <= 1 || total <= MIN_PARALLEL_LEN {
        return for_each_index(starts, extents, f);
    }

    // Ties go to the last (innermost) axis.
    let (i, &di) = extents
        .iter()
        .enumerate()
        .fold((0, &0usize), |best, cur| if cur.1 >= best.1 { cur } else { best });
    if di <= 1 {
        return for_each_index(starts, extents, f);
    }

    let ndi = di / 2;
    let nt_left = nthreads / 2;
    let nt_right = nthreads - nt_left;

    let mut left_extents: SVec<usize> = SmallVec::from_slice(extents);
    left_extents[i] = ndi;

    let mut right_starts: SVec<usize> = SmallVec::from_slice(starts);
    right_starts[i] += ndi;
    let mut right_extents: SVec<usize> = SmallVec::from_slice(extents);
    right_extents[i] = di - ndi;

    rayon::join(
        || split_threaded(starts, &left_extents, nt_left, f),
        || split_threaded(&right_starts, &right_extents, nt_right, f),
    );
}

/// Sequential odometer walk over `starts[k]..starts[k] + extents[k]`,
/// last axis fastest.
fn for_each_index<F>(starts: &[usize], extents: &[usize], f: &F)
where
    F: Fn(&[usize]),
{
    if extents.iter().any(|&e| e == 0) {
        return;
    }
    let rank = extents.len();
    let mut idx: SVec<usize> = SmallVec::from_slice(starts);
    loop {
        f(&idx);
        let mut k = rank;
        loop {
            if k == 0 {
                return;
            }
            k -= 1;
            idx[k] += 1;
            if idx[k] < starts[k] + extents[k] {
                break;
            }
            idx[k] = starts[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_for_each_index_order() {
        let seen = Mutex::new(Vec::new());
        for_each_index(&[1, 0], &[2, 3], &|idx| {
            seen.lock().unwrap().push((idx[0], idx[1]));
        });
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![(1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]
        );
    }

    #[test]
    fn test_rank_zero_box_runs_once() {
        let calls = AtomicUsize::new(0);
        parallel_nd(&[], &|idx| {
            assert!(idx.is_empty());
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_extent_runs_nothing() {
        let calls = AtomicUsize::new(0);
        parallel_nd(&[4, 0, 3], &|_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parallel_nd_visits_every_index_once() {
        // Large enough to be split across threads.
        let extents = [3usize, 70, 5, 9];
        let total: usize = extents.iter().product();
        let hits: Vec<AtomicUsize> = (0..total).map(|_| AtomicUsize::new(0)).collect();
        parallel_nd(&extents, &|idx| {
            let flat = ((idx[0] * 70 + idx[1]) * 5 + idx[2]) * 9 + idx[3];
            hits[flat].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_split_threaded_covers_box() {
        let calls = AtomicUsize::new(0);
        split_threaded(&[0, 0], &[100, 100], 4, &|_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 10_000);
    }

    #[test]
    fn test_zero_writer() {
        let mut data = vec![7i16; 10];
        let w = ZeroWriter::new(&mut data);
        unsafe {
            w.zero(0);
            w.zero_run(4, 3);
        }
        assert_eq!(data, vec![0, 7, 7, 7, 0, 0, 0, 7, 7, 7]);
    }
}
