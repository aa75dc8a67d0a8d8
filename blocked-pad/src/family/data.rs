//! Channel-blocked activations: `nCw8c` ... `nCdhw16c`.

use blocked_view::{Element, LayoutMeta, MemoryDesc};

use crate::threading::{parallel_nd, ZeroWriter};

/// Zero channel lanes `dims[1] % B .. B` of the last channel block.
///
/// Iterates over batch and the outermost spatial axis; the remaining spatial
/// axes are contiguous pixels of `B` lanes each.
pub(super) fn zero_pad_data<T: Element>(
    md: &MemoryDesc,
    meta: &LayoutMeta,
    out: &ZeroWriter<'_, T>,
) {
    let blksize = meta.block;
    let dims = md.dims();
    let pdims = md.padded_dims();

    let c_last = pdims[1] / blksize - 1;
    let c_tail_start = dims[1] % blksize;
    debug_assert_ne!(c_tail_start, 0, "{}: channel axis has no tail", md.format());
    if c_tail_start == 0 {
        return;
    }
    let sp_rest: usize = dims[3..].iter().product();

    parallel_nd(&[dims[0], dims[2]], &|idx| {
        let base = md.blk_off(&[idx[0], c_last, idx[1]]);
        for sp in 0..sp_rest {
            // SAFETY: every (n, sp0) owns a distinct row of the last block.
            unsafe {
                out.zero_run(base + sp * blksize + c_tail_start, blksize - c_tail_start);
            }
        }
    });
}
