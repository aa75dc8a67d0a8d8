//! Weights blocked on output channels: `Oihw16o`, `gOdhwi8o`, ...

use blocked_view::{Element, LayoutMeta, MemoryDesc};

use super::WeightsGeometry;
use crate::threading::{parallel_nd, ZeroWriter};

pub(super) fn zero_pad_weights_o<T: Element>(
    md: &MemoryDesc,
    meta: &LayoutMeta,
    out: &ZeroWriter<'_, T>,
) {
    let blksize = meta.block;
    let geo = WeightsGeometry::new(meta);
    let oc = geo.oc_axis();
    let dims = md.dims();
    let pdims = md.padded_dims();

    let nb_oc = pdims[oc] / blksize;
    let oc_tail = pdims[oc] - dims[oc];
    debug_assert_ne!(oc_tail, 0, "{}: output channels have no tail", md.format());
    if oc_tail == 0 {
        return;
    }
    let [d, h, w] = geo.spatial_extents(dims);

    parallel_nd(&[geo.groups(dims), dims[oc + 1], d, h, w], &|idx| {
        let x = geo.blk_off(md, idx[0], nb_oc - 1, idx[1], idx[2], idx[3], idx[4]);
        // SAFETY: the output lanes are innermost; each index owns one run.
        unsafe { out.zero_run(x + blksize - oc_tail, oc_tail) };
    });
}
