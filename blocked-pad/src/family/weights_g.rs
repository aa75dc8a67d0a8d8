//! Weights blocked on groups: `Goihw8g`, `Goihw16g`.

use blocked_view::{Element, LayoutMeta, MemoryDesc};

use crate::threading::{parallel_nd, ZeroWriter};

pub(super) fn zero_pad_weights_g<T: Element>(
    md: &MemoryDesc,
    meta: &LayoutMeta,
    out: &ZeroWriter<'_, T>,
) {
    let blksize = meta.block;
    let dims = md.dims();
    let pdims = md.padded_dims();

    let g_last = pdims[0] / blksize - 1;
    let g_tail_start = dims[0] % blksize;
    debug_assert_ne!(g_tail_start, 0, "{}: group axis has no tail", md.format());
    if g_tail_start == 0 {
        return;
    }
    let sz_rest: usize = dims[1..].iter().product();
    let base = md.blk_off(&[g_last]);

    parallel_nd(&[sz_rest], &|idx| {
        // SAFETY: every flattened (o, i, h, w) owns one run of group lanes.
        unsafe {
            out.zero_run(base + idx[0] * blksize + g_tail_start, blksize - g_tail_start);
        }
    });
}
