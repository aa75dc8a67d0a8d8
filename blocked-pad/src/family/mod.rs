//! Specialised padding routines, one per layout family.
//!
//! Each routine locates the last block along the padded axis through
//! [`MemoryDesc::blk_off`] and zeroes only the tail lanes of that block.

mod data;
mod weights_g;
mod weights_i;
mod weights_io;
mod weights_o;

use blocked_view::{Element, LayoutMeta, MemoryDesc};

use crate::classify::Family;
use crate::threading::ZeroWriter;

/// Run the routine of `family` over the buffer behind `out`.
pub(crate) fn zero_pad_family<T: Element>(
    family: Family,
    md: &MemoryDesc,
    meta: &LayoutMeta,
    out: &ZeroWriter<'_, T>,
) {
    match family {
        Family::DataChannelBlocked => data::zero_pad_data(md, meta, out),
        Family::WeightsOutBlocked => weights_o::zero_pad_weights_o(md, meta, out),
        Family::WeightsInBlocked => weights_i::zero_pad_weights_i(md, meta, out),
        Family::WeightsInOutBlocked => weights_io::zero_pad_weights_io(md, meta, out),
        Family::WeightsGroupBlocked => weights_g::zero_pad_weights_g(md, meta, out),
    }
}

/// Axis bookkeeping shared by the weight routines.
///
/// Weight tensors are `[g,] o, i, [[d,] h,] w`; the loops always run over
/// `g, o, i, d, h, w` with absent axes of extent 1.
pub(crate) struct WeightsGeometry {
    groups: bool,
    spatial: usize,
}

impl WeightsGeometry {
    pub(crate) fn new(meta: &LayoutMeta) -> Self {
        Self {
            groups: meta.groups,
            spatial: meta.spatial_rank(),
        }
    }

    /// Index of the output-channel axis.
    #[inline]
    pub(crate) fn oc_axis(&self) -> usize {
        usize::from(self.groups)
    }

    /// Group count, 1 without a group axis.
    pub(crate) fn groups(&self, dims: &[usize]) -> usize {
        if self.groups {
            dims[0]
        } else {
            1
        }
    }

    /// `[D, H, W]` extents with absent spatial axes as 1.
    pub(crate) fn spatial_extents(&self, dims: &[usize]) -> [usize; 3] {
        let sp = &dims[self.oc_axis() + 2..];
        match *sp {
            [w] => [1, 1, w],
            [h, w] => [1, h, w],
            [d, h, w] => [d, h, w],
            _ => [1, 1, 1],
        }
    }

    /// Block offset of `(g, o, i, d, h, w)`, dropping the axes the layout
    /// does not have.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn blk_off(
        &self,
        md: &MemoryDesc,
        g: usize,
        o: usize,
        i: usize,
        d: usize,
        h: usize,
        w: usize,
    ) -> usize {
        let mut pos = [0usize; 6];
        let mut n = 0;
        if self.groups {
            pos[n] = g;
            n += 1;
        }
        pos[n] = o;
        pos[n + 1] = i;
        n += 2;
        let dhw = [d, h, w];
        let spatial = &dhw[3 - self.spatial.min(3)..];
        pos[n..n + spatial.len()].copy_from_slice(spatial);
        n += spatial.len();
        md.blk_off(&pos[..n])
    }
}
