//! Weights blocked on input channels: `oIhw8i` ... `oIdhw16i`.

use blocked_view::{Element, LayoutMeta, MemoryDesc};

use super::WeightsGeometry;
use crate::threading::{parallel_nd, ZeroWriter};

pub(super) fn zero_pad_weights_i<T: Element>(
    md: &MemoryDesc,
    meta: &LayoutMeta,
    out: &ZeroWriter<'_, T>,
) {
    debug_assert!(!meta.groups, "{}: grouped input blocking", md.format());
    let blksize = meta.block;
    let geo = WeightsGeometry::new(meta);
    let dims = md.dims();
    let pdims = md.padded_dims();

    let nb_ic = pdims[1] / blksize;
    let ic_tail = pdims[1] - dims[1];
    debug_assert_ne!(ic_tail, 0, "{}: input channels have no tail", md.format());
    if ic_tail == 0 {
        return;
    }
    let [d, h, w] = geo.spatial_extents(dims);

    parallel_nd(&[dims[0], d, h, w], &|idx| {
        let x = geo.blk_off(md, 0, idx[0], nb_ic - 1, idx[1], idx[2], idx[3]);
        // SAFETY: the input lanes are innermost; each index owns one run.
        unsafe { out.zero_run(x + blksize - ic_tail, ic_tail) };
    });
}
