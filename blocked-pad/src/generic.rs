//! Layout-agnostic padding from the mismatch between dims and padded dims.

use blocked_view::{Element, MemoryDesc};

use crate::dispatch::{check_data_type, check_len, skip_zeroing};
use crate::threading::{parallel_nd, ZeroWriter};
use crate::Result;

/// Zero every padding element of `data` without looking at the layout tag.
///
/// Slower than the family routines since every element goes through
/// [`MemoryDesc::off_l`], but valid for any descriptor whose storage is fully
/// addressed by its blocking description.
pub fn zero_pad_generic<T: Element>(md: &MemoryDesc, data: &mut [T]) -> Result<()> {
    check_data_type::<T>(md)?;
    if skip_zeroing(md) {
        return Ok(());
    }
    check_len(md, data.len())?;
    zero_pad_generic_blocked(md, &ZeroWriter::new(data));
    Ok(())
}

/// ```text
/// [D_0] .. [D_k][D_k+1] .. [D_ndims-1]
///            |  \                   /
///            |   -------------------
///           has       contiguous
///         padding
///
/// step     <-- D_k+1 * ... * D_ndims-1
/// step_dim <-- k
/// ```
pub(crate) fn zero_pad_generic_blocked<T: Element>(md: &MemoryDesc, out: &ZeroWriter<'_, T>) {
    let dims = md.dims();
    let pdims = md.padded_dims();

    let mut step = 1usize;
    let mut step_dim = None;
    for d in (0..md.ndims()).rev() {
        if dims[d] != pdims[d] {
            step_dim = Some(d);
            break;
        }
        step *= dims[d];
    }
    let Some(step_dim) = step_dim else {
        tracing::debug!(format = %md.format(), "generic zero padding: no padded axis");
        return;
    };

    parallel_nd(&[md.nelems(true) / step], &|idx| {
        let chunk = idx[0];
        let mut rem = chunk;
        let mut need_zero = false;
        for d in (0..=step_dim).rev() {
            if rem % pdims[d] >= dims[d] {
                need_zero = true;
                break;
            }
            rem /= pdims[d];
        }
        if need_zero {
            let e = chunk * step;
            for e0 in 0..step {
                // SAFETY: named layouts are dense and `with_blocking` rejects
                // aliasing strides, so distinct indices own distinct slots.
                unsafe { out.zero(md.off_l(e + e0, true)) };
            }
        }
    });
}
