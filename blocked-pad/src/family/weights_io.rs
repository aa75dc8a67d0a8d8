//! Weights blocked on output and input channels at once.
//!
//! A block is a `B x B` tile of (input lane, output lane) pairs laid out by
//! the tag's [`BlockOrder`]. Input padding lives in the last input block of
//! every output block, output padding in the last output block of every input
//! block; the corner tile belongs to both and is written twice.

use blocked_view::{BlockOrder, Element, LayoutMeta, MemoryDesc};

use super::WeightsGeometry;
use crate::threading::{parallel_nd, ZeroWriter};

pub(super) fn zero_pad_weights_io<T: Element>(
    md: &MemoryDesc,
    meta: &LayoutMeta,
    out: &ZeroWriter<'_, T>,
) {
    let Some(order) = meta.order else {
        debug_assert!(false, "{}: fused blocking without lane order", md.format());
        return;
    };
    let blksize = meta.block;
    let geo = WeightsGeometry::new(meta);
    let oc = geo.oc_axis();
    let dims = md.dims();
    let pdims = md.padded_dims();

    let groups = geo.groups(dims);
    let nb_oc = pdims[oc] / blksize;
    let nb_ic = pdims[oc + 1] / blksize;
    let [d, h, w] = geo.spatial_extents(dims);

    let oc_tail = pdims[oc] - dims[oc];
    let ic_tail = pdims[oc + 1] - dims[oc + 1];

    let ker = |base: usize, oc_tail: usize, ic_tail: usize| {
        zero_tile(out, base, order, blksize, oc_tail, ic_tail);
    };

    if ic_tail > 0 {
        parallel_nd(&[groups, nb_oc, d, h, w], &|idx| {
            let x = geo.blk_off(md, idx[0], idx[1], nb_ic - 1, idx[2], idx[3], idx[4]);
            ker(x, 0, ic_tail);
        });
    }

    // Runs after the input pass, so the shared corner tile is never written
    // from two threads at once.
    if oc_tail > 0 {
        parallel_nd(&[groups, nb_ic, d, h, w], &|idx| {
            let x = geo.blk_off(md, idx[0], nb_oc - 1, idx[1], idx[2], idx[3], idx[4]);
            ker(x, oc_tail, 0);
        });
    }
}

/// Zero the lanes of one tile with `oc >= B - oc_tail` or `ic >= B - ic_tail`.
fn zero_tile<T: Element>(
    out: &ZeroWriter<'_, T>,
    base: usize,
    order: BlockOrder,
    blksize: usize,
    oc_tail: usize,
    ic_tail: usize,
) {
    let mut oc = 0;
    while oc < blksize - oc_tail {
        for ic in blksize - ic_tail..blksize {
            // SAFETY: each tile is owned by exactly one iteration of a pass.
            unsafe { out.zero(base + order.index(ic, oc, blksize)) };
        }
        oc += 1;
    }
    while oc < blksize {
        for ic in 0..blksize {
            // SAFETY: as above.
            unsafe { out.zero(base + order.index(ic, oc, blksize)) };
        }
        oc += 1;
    }
}
