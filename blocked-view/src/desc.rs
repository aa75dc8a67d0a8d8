//! Memory descriptor: logical shape, padded shape and offset arithmetic.

use smallvec::SmallVec;

use crate::format::{BlockOrder, Format, LayoutMeta};
use crate::{DataType, LayoutError, Result};

/// Maximum supported tensor rank.
pub const MAX_NDIMS: usize = 12;

/// Stack-allocated coordinate vector.
pub type Coords = SmallVec<[usize; MAX_NDIMS]>;

/// Physical blocking of a tensor.
///
/// An element at logical position `p` lives at
/// `offset_padding + sum_a (p[a] / block_dims[a]) * strides[0][a]
///                  + (p[a] % block_dims[a]) * strides[1][a]`.
/// Fused output/input tags replace the second term with their
/// [`BlockOrder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingDesc {
    /// Block size per axis (1 for axes that are not blocked).
    pub block_dims: Vec<usize>,
    /// Outer strides (per block index) and inner strides (per lane).
    pub strides: [Vec<usize>; 2],
    /// Physical extent per axis, a multiple of the block size.
    pub padding_dims: Vec<usize>,
    /// Offset of the first element.
    pub offset_padding: usize,
}

impl BlockingDesc {
    /// Row-major blocking with no blocks.
    fn plain(dims: &[usize]) -> Self {
        let order: Vec<usize> = (0..dims.len()).collect();
        Self::dense(dims, &order, &[], 1)
    }

    /// Dense blocking: outer axes in `outer` order (outermost first), blocked
    /// axes in `inner` order (outermost lane first).
    fn dense(dims: &[usize], outer: &[usize], inner: &[usize], block: usize) -> Self {
        let ndims = dims.len();
        let block_dims: Vec<usize> = (0..ndims)
            .map(|a| if inner.contains(&a) { block } else { 1 })
            .collect();
        let padding_dims: Vec<usize> = dims
            .iter()
            .zip(&block_dims)
            .map(|(&d, &b)| (d + b - 1) / b * b)
            .collect();

        let mut inner_strides = vec![1usize; ndims];
        let mut volume = 1usize;
        for &axis in inner.iter().rev() {
            inner_strides[axis] = volume;
            volume *= block;
        }

        let mut outer_strides = vec![0usize; ndims];
        let mut stride = volume;
        for &axis in outer.iter().rev() {
            outer_strides[axis] = stride;
            stride *= padding_dims[axis] / block_dims[axis];
        }

        Self {
            block_dims,
            strides: [outer_strides, inner_strides],
            padding_dims,
            offset_padding: 0,
        }
    }
}

/// Descriptor of a tensor's memory.
///
/// Holds the logical dims, the data type, the layout tag and the blocking
/// that maps coordinates to storage offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDesc {
    dims: Vec<usize>,
    data_type: DataType,
    format: Format,
    meta: Option<LayoutMeta>,
    blocking: BlockingDesc,
}

fn check_common(dims: &[usize], data_type: DataType) -> Result<()> {
    if dims.len() > MAX_NDIMS {
        return Err(LayoutError::TooManyDims(dims.len()));
    }
    if data_type == DataType::Undef {
        return Err(LayoutError::UndefinedDataType);
    }
    Ok(())
}

/// Reject blockings under which two positions of the padded box share a
/// storage slot.
///
/// Every `(extent, stride)` pair, outer and inner, must step over the whole
/// span of the pairs with smaller strides.
fn check_disjoint(blocking: &BlockingDesc) -> Result<()> {
    let mut pairs: Vec<(usize, usize, usize)> = Vec::with_capacity(2 * blocking.block_dims.len());
    for (axis, (&padded, &block)) in blocking
        .padding_dims
        .iter()
        .zip(&blocking.block_dims)
        .enumerate()
    {
        pairs.push((blocking.strides[0][axis], padded / block, axis));
        pairs.push((blocking.strides[1][axis], block, axis));
    }
    pairs.retain(|&(_, extent, _)| extent > 1);
    pairs.sort_unstable();

    let mut span = 1usize;
    for (stride, extent, axis) in pairs {
        if stride < span {
            return Err(LayoutError::OverlappingStrides { axis, stride, span });
        }
        span = span.saturating_add((extent - 1).saturating_mul(stride));
    }
    Ok(())
}

impl MemoryDesc {
    /// Describe a tensor with a named layout.
    ///
    /// Blocked axes are padded up to the next multiple of the block size.
    /// Opaque tags (`any`, `undef`, `wino_fmt`, `rnn_packed`) yield a
    /// descriptor for which [`is_blocking_desc`](Self::is_blocking_desc) is
    /// false; `blocked` yields plain row-major storage.
    pub fn new(dims: &[usize], data_type: DataType, format: Format) -> Result<Self> {
        check_common(dims, data_type)?;
        let meta = format.meta();
        let blocking = match meta {
            Some(meta) => {
                if meta.ndims() != dims.len() {
                    return Err(LayoutError::RankMismatch {
                        format,
                        expected: meta.ndims(),
                        got: dims.len(),
                    });
                }
                BlockingDesc::dense(dims, meta.outer, meta.inner, meta.block)
            }
            None => BlockingDesc::plain(dims),
        };
        Ok(Self {
            dims: dims.to_vec(),
            data_type,
            format,
            meta,
            blocking,
        })
    }

    /// Describe a tensor with a caller-supplied blocking ([`Format::blocked`]).
    ///
    /// The blocking must map every position of the padded box to its own
    /// storage slot; aliasing strides are rejected.
    pub fn with_blocking(dims: &[usize], data_type: DataType, blocking: BlockingDesc) -> Result<Self> {
        check_common(dims, data_type)?;
        let ndims = dims.len();
        if blocking.block_dims.len() != ndims
            || blocking.padding_dims.len() != ndims
            || blocking.strides.iter().any(|s| s.len() != ndims)
        {
            return Err(LayoutError::StrideLengthMismatch);
        }
        for (axis, ((&dim, &padded), &block)) in dims
            .iter()
            .zip(&blocking.padding_dims)
            .zip(&blocking.block_dims)
            .enumerate()
        {
            if padded < dim {
                return Err(LayoutError::InvalidPadding { axis, dim, padded });
            }
            if block == 0 || padded % block != 0 {
                return Err(LayoutError::InvalidBlock {
                    axis,
                    block,
                    padded,
                });
            }
        }
        check_disjoint(&blocking)?;
        Ok(Self {
            dims: dims.to_vec(),
            data_type,
            format: Format::blocked,
            meta: None,
            blocking,
        })
    }

    #[inline]
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Physical extents; equal to [`dims`](Self::dims) except on blocked axes.
    #[inline]
    pub fn padded_dims(&self) -> &[usize] {
        &self.blocking.padding_dims
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Layout record of the tag, `None` for caller-supplied and opaque layouts.
    #[inline]
    pub fn meta(&self) -> Option<&LayoutMeta> {
        self.meta.as_ref()
    }

    /// Blocking description, `None` for opaque layouts.
    pub fn blocking_desc(&self) -> Option<&BlockingDesc> {
        self.is_blocking_desc().then_some(&self.blocking)
    }

    /// Whether storage is described by a [`BlockingDesc`].
    #[inline]
    pub fn is_blocking_desc(&self) -> bool {
        self.format.is_blocking()
    }

    /// Element count, over the padded extents when `with_padding`.
    pub fn nelems(&self, with_padding: bool) -> usize {
        if self.ndims() == 0 {
            return 0;
        }
        let dims = if with_padding {
            self.padded_dims()
        } else {
            self.dims()
        };
        dims.iter().product()
    }

    /// True for rank-0 tensors and tensors with an empty axis.
    pub fn is_zero(&self) -> bool {
        self.ndims() == 0 || self.nelems(false) == 0
    }

    /// Number of storage elements a buffer must hold, including trailing
    /// compensation values.
    pub fn size(&self) -> usize {
        if self.is_zero() || self.padded_dims().iter().any(|&d| d == 0) {
            return 0;
        }
        let b = &self.blocking;
        let mut last = b.offset_padding;
        for a in 0..self.ndims() {
            let blk = b.block_dims[a];
            last += (b.padding_dims[a] / blk - 1) * b.strides[0][a] + (blk - 1) * b.strides[1][a];
        }
        last + 1 + self.compensation_len()
    }

    /// Storage size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.size() * self.data_type.size()
    }

    /// Elements taken by the trailing `i32` compensation of int8 layouts.
    fn compensation_len(&self) -> usize {
        match self.meta {
            Some(meta) if meta.compensation => {
                let oc_axis = usize::from(meta.groups);
                let groups = if meta.groups { self.dims[0] } else { 1 };
                let bytes = groups * self.padded_dims()[oc_axis] * std::mem::size_of::<i32>();
                let elem = self.data_type.size();
                (bytes + elem - 1) / elem
            }
            _ => 0,
        }
    }

    /// Storage offset of a block-structured coordinate.
    ///
    /// Blocked axes take the block index, other axes the element index.
    /// Omitted trailing coordinates are zero.
    #[inline]
    pub fn blk_off(&self, pos: &[usize]) -> usize {
        debug_assert!(pos.len() <= self.ndims());
        let b = &self.blocking;
        pos.iter()
            .zip(&b.strides[0])
            .fold(b.offset_padding, |off, (&p, &s)| off + p * s)
    }

    /// Storage offset of the element at logical position `pos`.
    ///
    /// Positions inside the padding region (`dims[a] <= pos[a] <
    /// padded_dims[a]`) are valid.
    pub fn off_v(&self, pos: &[usize]) -> usize {
        debug_assert_eq!(pos.len(), self.ndims());
        let b = &self.blocking;
        let fused = self.fused_order();
        let mut off = b.offset_padding;
        for (a, &p) in pos.iter().enumerate() {
            let blk = b.block_dims[a];
            off += (p / blk) * b.strides[0][a];
            if fused.is_none() {
                off += (p % blk) * b.strides[1][a];
            }
        }
        if let Some((order, oc_axis, block)) = fused {
            off += order.index(pos[oc_axis + 1] % block, pos[oc_axis] % block, block);
        }
        off
    }

    /// Storage offset of the `l`-th element in row-major order.
    ///
    /// With `is_pos_padded` the index runs over the padded extents, so
    /// padding slots have linear indices too.
    #[inline]
    pub fn off_l(&self, l: usize, is_pos_padded: bool) -> usize {
        self.off_v(&self.position(l, is_pos_padded))
    }

    /// Decode a row-major linear index into a position.
    pub fn position(&self, l: usize, is_pos_padded: bool) -> Coords {
        let dims = if is_pos_padded {
            self.padded_dims()
        } else {
            self.dims()
        };
        let mut pos: Coords = SmallVec::from_elem(0, dims.len());
        let mut rem = l;
        for (p, &d) in pos.iter_mut().zip(dims).rev() {
            *p = rem % d;
            rem /= d;
        }
        pos
    }

    /// Lane order, output-channel axis and block size of fused tags.
    fn fused_order(&self) -> Option<(BlockOrder, usize, usize)> {
        let meta = self.meta.as_ref()?;
        meta.order
            .map(|order| (order, usize::from(meta.groups), meta.block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(dims: &[usize], fmt: Format) -> MemoryDesc {
        MemoryDesc::new(dims, DataType::F32, fmt).unwrap()
    }

    #[test]
    fn test_channel_blocked_strides() {
        let md = desc(&[2, 5, 3, 4], Format::nChw8c);
        assert_eq!(md.padded_dims(), &[2, 8, 3, 4]);
        let b = md.blocking_desc().unwrap();
        assert_eq!(b.block_dims, vec![1, 8, 1, 1]);
        assert_eq!(b.strides[0], vec![96, 96, 32, 8]);
        assert_eq!(b.strides[1], vec![1, 1, 1, 1]);
        assert_eq!(md.size(), 192);
        // c=13 of a 16-channel tensor: block 1, lane 5.
        let md = desc(&[1, 16, 1, 1], Format::nChw8c);
        assert_eq!(md.off_v(&[0, 13, 0, 0]), 8 + 5);
    }

    #[test]
    fn test_output_blocked_outer_order() {
        // Ohwi8o: O, h, w, i blocks with the output lane innermost.
        let md = desc(&[10, 3, 2, 2], Format::Ohwi8o);
        assert_eq!(md.padded_dims(), &[16, 3, 2, 2]);
        assert_eq!(md.blocking_desc().unwrap().strides[0], vec![96, 8, 48, 24]);
        assert_eq!(md.off_v(&[9, 1, 1, 0]), 96 + 8 + 48 + 1);
        assert_eq!(md.blk_off(&[1, 1, 1, 0]), 96 + 8 + 48);
    }

    #[test]
    fn test_fused_lanes_follow_block_order() {
        let md = desc(&[32, 20, 3, 3], Format::OIhw8i16o2i);
        assert_eq!(md.padded_dims(), &[32, 32, 3, 3]);
        let tile = 16 * 16;
        let base = md.blk_off(&[1, 1, 2, 0]);
        assert_eq!(base, (2 * 9 + 1 * 9 + 2 * 3) * tile);
        assert_eq!(
            md.off_v(&[16 + 3, 16 + 5, 2, 0]),
            base + BlockOrder::InPairs.index(5, 3, 16)
        );

        let md = desc(&[2, 17, 9, 1], Format::gIOw16o16i);
        let base = md.blk_off(&[1, 1, 0, 0]);
        assert_eq!(md.off_v(&[1, 16, 8, 0]), base + 8);
    }

    #[test]
    fn test_blk_off_trailing_coordinates_default_to_zero() {
        let md = desc(&[3, 20, 4, 5], Format::nChw16c);
        assert_eq!(md.blk_off(&[2, 1]), md.blk_off(&[2, 1, 0, 0]));
        assert_eq!(md.blk_off(&[]), 0);
    }

    #[test]
    fn test_offsets_are_a_bijection_for_every_tag() {
        for &fmt in Format::ALL {
            let Some(meta) = fmt.meta() else { continue };
            let dims: Vec<usize> = (0..meta.ndims())
                .map(|a| {
                    if meta.is_blocked_axis(a) {
                        meta.block + 3
                    } else {
                        2 + a % 2
                    }
                })
                .collect();
            let md = desc(&dims, fmt);
            let n = md.nelems(true);
            let storage = md.size() - md.compensation_len();
            assert_eq!(n, storage, "{fmt}");
            let mut seen = vec![false; storage];
            for l in 0..n {
                let off = md.off_l(l, true);
                assert!(off < storage, "{fmt}: offset {off} out of range");
                assert!(!seen[off], "{fmt}: offset {off} hit twice");
                seen[off] = true;
            }
        }
    }

    #[test]
    fn test_position_round_trip() {
        let md = desc(&[2, 5, 3], Format::nCw8c);
        assert_eq!(md.position(0, true).as_slice(), &[0, 0, 0]);
        assert_eq!(md.position(47, true).as_slice(), &[1, 7, 2]);
        assert_eq!(md.position(29, false).as_slice(), &[1, 4, 2]);
    }

    #[test]
    fn test_rank_and_type_validation() {
        assert!(matches!(
            MemoryDesc::new(&[1, 2, 3], DataType::F32, Format::nChw8c),
            Err(LayoutError::RankMismatch {
                expected: 4,
                got: 3,
                ..
            })
        ));
        assert!(matches!(
            MemoryDesc::new(&[1, 2], DataType::Undef, Format::nc),
            Err(LayoutError::UndefinedDataType)
        ));
        assert!(matches!(
            MemoryDesc::new(&[1; 13], DataType::F32, Format::any),
            Err(LayoutError::TooManyDims(13))
        ));
    }

    #[test]
    fn test_with_blocking_validation() {
        let good = BlockingDesc {
            block_dims: vec![1, 4],
            strides: [vec![8, 4], vec![1, 1]],
            padding_dims: vec![3, 8],
            offset_padding: 0,
        };
        let md = MemoryDesc::with_blocking(&[3, 6], DataType::S8, good.clone()).unwrap();
        assert_eq!(md.format(), Format::blocked);
        assert_eq!(md.size(), 24);
        assert!(md.meta().is_none());

        let mut short = good.clone();
        short.padding_dims = vec![3, 4];
        assert!(matches!(
            MemoryDesc::with_blocking(&[3, 6], DataType::S8, short),
            Err(LayoutError::InvalidPadding { axis: 1, .. })
        ));

        let mut ragged = good.clone();
        ragged.padding_dims = vec![3, 10];
        assert!(matches!(
            MemoryDesc::with_blocking(&[3, 6], DataType::S8, ragged),
            Err(LayoutError::InvalidBlock { axis: 1, .. })
        ));

        let mut missing = good;
        missing.strides[1].pop();
        assert!(matches!(
            MemoryDesc::with_blocking(&[3, 6], DataType::S8, missing),
            Err(LayoutError::StrideLengthMismatch)
        ));
    }

    #[test]
    fn test_with_blocking_rejects_aliasing_strides() {
        // Every position on one slot.
        let collapsed = BlockingDesc {
            block_dims: vec![1, 4],
            strides: [vec![0, 0], vec![0, 0]],
            padding_dims: vec![2, 4],
            offset_padding: 0,
        };
        assert!(matches!(
            MemoryDesc::with_blocking(&[2, 3], DataType::U8, collapsed),
            Err(LayoutError::OverlappingStrides { stride: 0, .. })
        ));

        // Rows of 8 lanes placed 6 apart: the last two lanes of a row hit the next row.
        let overlapping = BlockingDesc {
            block_dims: vec![1, 4],
            strides: [vec![6, 4], vec![1, 1]],
            padding_dims: vec![3, 8],
            offset_padding: 0,
        };
        assert!(matches!(
            MemoryDesc::with_blocking(&[3, 6], DataType::U8, overlapping),
            Err(LayoutError::OverlappingStrides {
                axis: 0,
                stride: 6,
                span: 8,
            })
        ));

        // Unit extents never step, so their strides are free.
        let unit = BlockingDesc {
            block_dims: vec![1, 4],
            strides: [vec![0, 4], vec![0, 1]],
            padding_dims: vec![1, 8],
            offset_padding: 0,
        };
        assert!(MemoryDesc::with_blocking(&[1, 6], DataType::U8, unit).is_ok());
    }

    #[test]
    fn test_named_layouts_pass_the_overlap_check() {
        for &fmt in Format::ALL {
            let Some(meta) = fmt.meta() else { continue };
            if meta.order.is_some() {
                continue;
            }
            let dims: Vec<usize> = (0..meta.ndims()).map(|a| 2 + a % 3).collect();
            let md = desc(&dims, fmt);
            assert!(check_disjoint(&md.blocking).is_ok(), "{fmt}");
        }
    }

    #[test]
    fn test_opaque_and_zero_descriptors() {
        let md = desc(&[4, 4], Format::wino_fmt);
        assert!(!md.is_blocking_desc());
        assert!(md.blocking_desc().is_none());
        assert_eq!(md.nelems(true), 16);

        let md = desc(&[0, 5, 3], Format::nCw8c);
        assert!(md.is_zero());
        assert_eq!(md.size(), 0);
        assert!(desc(&[], Format::blocked).is_zero());
    }

    #[test]
    fn test_compensation_is_counted_in_size() {
        let md = MemoryDesc::new(&[20, 8, 1, 1], DataType::S8, Format::OIhw4i16o4i_s8s8).unwrap();
        assert_eq!(md.nelems(true), 32 * 16);
        assert_eq!(md.size(), 32 * 16 + 32 * 4);
        assert_eq!(md.size_in_bytes(), md.size());
    }
}
