//! Layout tags and the per-tag layout metadata table.
//!
//! Tag names follow the usual blocked-layout convention: lower-case letters
//! are plain axes (`n`, `c`, `g`, `o`, `i`, `d`, `h`, `w`), upper-case letters
//! are axes split into blocks, and the trailing `<size><axis>` groups spell
//! the block interior from the outermost lane to the innermost one. For
//! example `gOIhw8i16o2i` is a grouped weight tensor with output and input
//! channels blocked by 16, whose blocks store input channels in pairs.
//!
//! Instead of specialising code per tag, every tag maps to a small
//! [`LayoutMeta`] record. Descriptors and padding kernels read the record.

use std::fmt;
use std::str::FromStr;

use crate::LayoutError;

macro_rules! formats {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        /// Named memory layout of a tensor.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Format {
            $($(#[$doc])* $name,)*
        }

        impl Format {
            /// Every tag in the catalog.
            pub const ALL: &'static [Format] = &[$(Format::$name,)*];

            /// Canonical tag name, e.g. `"nChw8c"`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Format::$name => stringify!($name),)*
                }
            }
        }
    };
}

formats! {
    /// No layout.
    undef,
    /// Layout left for a primitive to choose.
    any,
    /// Caller-described blocking, see [`crate::MemoryDesc::with_blocking`].
    blocked,
    /// Winograd weights; opaque to offset arithmetic.
    wino_fmt,
    /// Packed RNN weights; opaque to offset arithmetic.
    rnn_packed,

    // plain data
    x, nc, ncw, nwc, nchw, nhwc, chwn, ncdhw, ndhwc,

    // plain weights
    oi, io, oiw, wio, oihw, hwio, ihwo, oidhw, dhwio, goiw, goihw, hwigo, goidhw,

    // channel-blocked data
    nCw8c, nCw16c, nChw8c, nChw16c, nCdhw8c, nCdhw16c,
    /// Batch and channels blocked together.
    NChw16n16c,

    // output-channel blocked weights
    Oiw16o, Owi16o, Owi8o, Oihw16o, Ohwi8o, Ohwi16o, Oidhw16o, Odhwi16o, Odhwi8o,
    gOiw16o, gOwi16o, gOwi8o, gOihw16o, gOhwi8o, gOhwi16o, gOidhw16o, gOdhwi16o, gOdhwi8o,

    // input-channel blocked weights
    oIhw8i, oIhw16i, oIdhw8i, oIdhw16i,

    // output and input channels blocked together
    OIw8i8o, OIw8o8i, OIw16i16o, OIw16o16i, OIw8i16o2i, OIw8o16i2o, IOw16o16i,
    OIhw8i8o, OIhw16i16o, OIhw4i16o4i, OIhw8i16o2i, OIhw8o16i2o, OIhw8o8i, OIhw16o16i,
    IOhw16o16i,
    OIdhw8i8o, OIdhw8o8i, OIdhw16i16o, OIdhw16o16i, OIdhw8i16o2i,
    gOIw8i8o, gOIw8o8i, gOIw16i16o, gOIw16o16i, gOIw8i16o2i, gOIw8o16i2o, gIOw16o16i,
    gOIhw8i8o, gOIhw16i16o, gOIhw4i16o4i, gOIhw8i16o2i, gOIhw8o16i2o, gOIhw8o8i,
    gOIhw16o16i, gIOhw16o16i,
    gOIdhw8i8o, gOIdhw8o8i, gOIdhw16i16o, gOIdhw16o16i, gOIdhw8i16o2i,

    // group blocked weights
    Goihw8g, Goihw16g,

    /// int8 weights followed by per-output-channel compensation.
    OIhw4i16o4i_s8s8,
    /// Grouped int8 weights followed by per-output-channel compensation.
    gOIhw4i16o4i_s8s8,
}

/// Lane arrangement inside a block whose output and input channels are both
/// blocked by the same size.
///
/// These orders are the physical layouts vector kernels read, so the
/// arithmetic in [`BlockOrder::index`] is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockOrder {
    /// `16o16i`, `8o8i`: output lane major.
    OutMajor,
    /// `16i16o`, `8i8o`: input lane major.
    InMajor,
    /// `8i16o2i`: input lanes interleaved in pairs.
    InPairs,
    /// `4i16o4i`: input lanes interleaved in quads.
    InQuads,
    /// `8o16i2o`: output lanes interleaved in pairs.
    OutPairs,
}

impl BlockOrder {
    /// Offset of lane `(ic, oc)` inside a `block x block` tile.
    #[inline]
    pub fn index(self, ic: usize, oc: usize, block: usize) -> usize {
        match self {
            BlockOrder::InPairs => (ic / 2) * block * 2 + 2 * oc + ic % 2,
            BlockOrder::InQuads => (ic / 4) * block * 4 + oc * 4 + ic % 4,
            BlockOrder::OutPairs => (oc / 2) * block * 2 + 2 * ic + oc % 2,
            BlockOrder::InMajor => ic * block + oc,
            BlockOrder::OutMajor => oc * block + ic,
        }
    }
}

/// Whether a tensor holds activations or convolution weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorKind {
    /// Axes `n, c, spatial...`.
    Data,
    /// Axes `[g,] o, i, spatial...`.
    Weights,
}

/// Layout record for one named tag.
///
/// Axis numbers are logical: `n=0, c=1` for data, `[g=0,] o, i` for weights,
/// followed by the spatial axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutMeta {
    pub kind: TensorKind,
    /// A leading group axis is present (weights only).
    pub groups: bool,
    /// Order of the block-index axes in memory, outermost first.
    pub outer: &'static [usize],
    /// Blocked axes, outermost lane first.
    pub inner: &'static [usize],
    /// Block size shared by all blocked axes (1 for plain tags).
    pub block: usize,
    /// Lane arrangement for fused output/input blocks.
    pub order: Option<BlockOrder>,
    /// Storage is followed by compensation values not described by offsets.
    pub compensation: bool,
}

impl LayoutMeta {
    const fn plain(kind: TensorKind, groups: bool, outer: &'static [usize]) -> Self {
        Self {
            kind,
            groups,
            outer,
            inner: &[],
            block: 1,
            order: None,
            compensation: false,
        }
    }

    const fn blocked(
        kind: TensorKind,
        groups: bool,
        outer: &'static [usize],
        inner: &'static [usize],
        block: usize,
    ) -> Self {
        Self {
            kind,
            groups,
            outer,
            inner,
            block,
            order: None,
            compensation: false,
        }
    }

    const fn fused(groups: bool, outer: &'static [usize], block: usize, order: BlockOrder) -> Self {
        let inner: &'static [usize] = match (groups, order) {
            (false, BlockOrder::InMajor) => &[1, 0],
            (false, _) => &[0, 1],
            (true, BlockOrder::InMajor) => &[2, 1],
            (true, _) => &[1, 2],
        };
        Self {
            kind: TensorKind::Weights,
            groups,
            outer,
            inner,
            block,
            order: Some(order),
            compensation: false,
        }
    }

    const fn compensated(self) -> Self {
        Self {
            compensation: true,
            ..self
        }
    }

    /// Tensor rank.
    #[inline]
    pub fn ndims(&self) -> usize {
        self.outer.len()
    }

    /// Number of spatial axes (`w`, `hw` or `dhw`).
    pub fn spatial_rank(&self) -> usize {
        match self.kind {
            TensorKind::Data => self.ndims().saturating_sub(2),
            TensorKind::Weights => self.ndims() - 2 - usize::from(self.groups),
        }
    }

    /// Whether `axis` is split into blocks.
    #[inline]
    pub fn is_blocked_axis(&self, axis: usize) -> bool {
        self.inner.contains(&axis)
    }

    /// Block size along `axis` (1 when the axis is not blocked).
    #[inline]
    pub fn block_of(&self, axis: usize) -> usize {
        if self.is_blocked_axis(axis) {
            self.block
        } else {
            1
        }
    }
}

use BlockOrder::{InMajor, InPairs, InQuads, OutMajor, OutPairs};
use TensorKind::{Data, Weights};

impl Format {
    /// Layout record for named tags; `None` for `undef`, `any`, `blocked` and
    /// the opaque tags.
    pub fn meta(self) -> Option<LayoutMeta> {
        use Format::*;
        let meta = match self {
            undef | any | blocked | wino_fmt | rnn_packed => return None,

            x => LayoutMeta::plain(Data, false, &[0]),
            nc => LayoutMeta::plain(Data, false, &[0, 1]),
            ncw => LayoutMeta::plain(Data, false, &[0, 1, 2]),
            nwc => LayoutMeta::plain(Data, false, &[0, 2, 1]),
            nchw => LayoutMeta::plain(Data, false, &[0, 1, 2, 3]),
            nhwc => LayoutMeta::plain(Data, false, &[0, 2, 3, 1]),
            chwn => LayoutMeta::plain(Data, false, &[1, 2, 3, 0]),
            ncdhw => LayoutMeta::plain(Data, false, &[0, 1, 2, 3, 4]),
            ndhwc => LayoutMeta::plain(Data, false, &[0, 2, 3, 4, 1]),

            oi => LayoutMeta::plain(Weights, false, &[0, 1]),
            io => LayoutMeta::plain(Weights, false, &[1, 0]),
            oiw => LayoutMeta::plain(Weights, false, &[0, 1, 2]),
            wio => LayoutMeta::plain(Weights, false, &[2, 1, 0]),
            oihw => LayoutMeta::plain(Weights, false, &[0, 1, 2, 3]),
            hwio => LayoutMeta::plain(Weights, false, &[2, 3, 1, 0]),
            ihwo => LayoutMeta::plain(Weights, false, &[1, 2, 3, 0]),
            oidhw => LayoutMeta::plain(Weights, false, &[0, 1, 2, 3, 4]),
            dhwio => LayoutMeta::plain(Weights, false, &[2, 3, 4, 1, 0]),
            goiw => LayoutMeta::plain(Weights, true, &[0, 1, 2, 3]),
            goihw => LayoutMeta::plain(Weights, true, &[0, 1, 2, 3, 4]),
            hwigo => LayoutMeta::plain(Weights, true, &[3, 4, 2, 0, 1]),
            goidhw => LayoutMeta::plain(Weights, true, &[0, 1, 2, 3, 4, 5]),

            nCw8c => LayoutMeta::blocked(Data, false, &[0, 1, 2], &[1], 8),
            nCw16c => LayoutMeta::blocked(Data, false, &[0, 1, 2], &[1], 16),
            nChw8c => LayoutMeta::blocked(Data, false, &[0, 1, 2, 3], &[1], 8),
            nChw16c => LayoutMeta::blocked(Data, false, &[0, 1, 2, 3], &[1], 16),
            nCdhw8c => LayoutMeta::blocked(Data, false, &[0, 1, 2, 3, 4], &[1], 8),
            nCdhw16c => LayoutMeta::blocked(Data, false, &[0, 1, 2, 3, 4], &[1], 16),
            NChw16n16c => LayoutMeta::blocked(Data, false, &[0, 1, 2, 3], &[0, 1], 16),

            Oiw16o => LayoutMeta::blocked(Weights, false, &[0, 1, 2], &[0], 16),
            Owi16o => LayoutMeta::blocked(Weights, false, &[0, 2, 1], &[0], 16),
            Owi8o => LayoutMeta::blocked(Weights, false, &[0, 2, 1], &[0], 8),
            Oihw16o => LayoutMeta::blocked(Weights, false, &[0, 1, 2, 3], &[0], 16),
            Ohwi8o => LayoutMeta::blocked(Weights, false, &[0, 2, 3, 1], &[0], 8),
            Ohwi16o => LayoutMeta::blocked(Weights, false, &[0, 2, 3, 1], &[0], 16),
            Oidhw16o => LayoutMeta::blocked(Weights, false, &[0, 1, 2, 3, 4], &[0], 16),
            Odhwi16o => LayoutMeta::blocked(Weights, false, &[0, 2, 3, 4, 1], &[0], 16),
            Odhwi8o => LayoutMeta::blocked(Weights, false, &[0, 2, 3, 4, 1], &[0], 8),
            gOiw16o => LayoutMeta::blocked(Weights, true, &[0, 1, 2, 3], &[1], 16),
            gOwi16o => LayoutMeta::blocked(Weights, true, &[0, 1, 3, 2], &[1], 16),
            gOwi8o => LayoutMeta::blocked(Weights, true, &[0, 1, 3, 2], &[1], 8),
            gOihw16o => LayoutMeta::blocked(Weights, true, &[0, 1, 2, 3, 4], &[1], 16),
            gOhwi8o => LayoutMeta::blocked(Weights, true, &[0, 1, 3, 4, 2], &[1], 8),
            gOhwi16o => LayoutMeta::blocked(Weights, true, &[0, 1, 3, 4, 2], &[1], 16),
            gOidhw16o => LayoutMeta::blocked(Weights, true, &[0, 1, 2, 3, 4, 5], &[1], 16),
            gOdhwi16o => LayoutMeta::blocked(Weights, true, &[0, 1, 3, 4, 5, 2], &[1], 16),
            gOdhwi8o => LayoutMeta::blocked(Weights, true, &[0, 1, 3, 4, 5, 2], &[1], 8),

            oIhw8i => LayoutMeta::blocked(Weights, false, &[0, 1, 2, 3], &[1], 8),
            oIhw16i => LayoutMeta::blocked(Weights, false, &[0, 1, 2, 3], &[1], 16),
            oIdhw8i => LayoutMeta::blocked(Weights, false, &[0, 1, 2, 3, 4], &[1], 8),
            oIdhw16i => LayoutMeta::blocked(Weights, false, &[0, 1, 2, 3, 4], &[1], 16),

            OIw8i8o => LayoutMeta::fused(false, &[0, 1, 2], 8, InMajor),
            OIw8o8i => LayoutMeta::fused(false, &[0, 1, 2], 8, OutMajor),
            OIw16i16o => LayoutMeta::fused(false, &[0, 1, 2], 16, InMajor),
            OIw16o16i => LayoutMeta::fused(false, &[0, 1, 2], 16, OutMajor),
            OIw8i16o2i => LayoutMeta::fused(false, &[0, 1, 2], 16, InPairs),
            OIw8o16i2o => LayoutMeta::fused(false, &[0, 1, 2], 16, OutPairs),
            IOw16o16i => LayoutMeta::fused(false, &[1, 0, 2], 16, OutMajor),
            OIhw8i8o => LayoutMeta::fused(false, &[0, 1, 2, 3], 8, InMajor),
            OIhw16i16o => LayoutMeta::fused(false, &[0, 1, 2, 3], 16, InMajor),
            OIhw4i16o4i => LayoutMeta::fused(false, &[0, 1, 2, 3], 16, InQuads),
            OIhw8i16o2i => LayoutMeta::fused(false, &[0, 1, 2, 3], 16, InPairs),
            OIhw8o16i2o => LayoutMeta::fused(false, &[0, 1, 2, 3], 16, OutPairs),
            OIhw8o8i => LayoutMeta::fused(false, &[0, 1, 2, 3], 8, OutMajor),
            OIhw16o16i => LayoutMeta::fused(false, &[0, 1, 2, 3], 16, OutMajor),
            IOhw16o16i => LayoutMeta::fused(false, &[1, 0, 2, 3], 16, OutMajor),
            OIdhw8i8o => LayoutMeta::fused(false, &[0, 1, 2, 3, 4], 8, InMajor),
            OIdhw8o8i => LayoutMeta::fused(false, &[0, 1, 2, 3, 4], 8, OutMajor),
            OIdhw16i16o => LayoutMeta::fused(false, &[0, 1, 2, 3, 4], 16, InMajor),
            OIdhw16o16i => LayoutMeta::fused(false, &[0, 1, 2, 3, 4], 16, OutMajor),
            OIdhw8i16o2i => LayoutMeta::fused(false, &[0, 1, 2, 3, 4], 16, InPairs),
            gOIw8i8o => LayoutMeta::fused(true, &[0, 1, 2, 3], 8, InMajor),
            gOIw8o8i => LayoutMeta::fused(true, &[0, 1, 2, 3], 8, OutMajor),
            gOIw16i16o => LayoutMeta::fused(true, &[0, 1, 2, 3], 16, InMajor),
            gOIw16o16i => LayoutMeta::fused(true, &[0, 1, 2, 3], 16, OutMajor),
            gOIw8i16o2i => LayoutMeta::fused(true, &[0, 1, 2, 3], 16, InPairs),
            gOIw8o16i2o => LayoutMeta::fused(true, &[0, 1, 2, 3], 16, OutPairs),
            gIOw16o16i => LayoutMeta::fused(true, &[0, 2, 1, 3], 16, OutMajor),
            gOIhw8i8o => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 8, InMajor),
            gOIhw16i16o => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 16, InMajor),
            gOIhw4i16o4i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 16, InQuads),
            gOIhw8i16o2i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 16, InPairs),
            gOIhw8o16i2o => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 16, OutPairs),
            gOIhw8o8i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 8, OutMajor),
            gOIhw16o16i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 16, OutMajor),
            gIOhw16o16i => LayoutMeta::fused(true, &[0, 2, 1, 3, 4], 16, OutMajor),
            gOIdhw8i8o => LayoutMeta::fused(true, &[0, 1, 2, 3, 4, 5], 8, InMajor),
            gOIdhw8o8i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4, 5], 8, OutMajor),
            gOIdhw16i16o => LayoutMeta::fused(true, &[0, 1, 2, 3, 4, 5], 16, InMajor),
            gOIdhw16o16i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4, 5], 16, OutMajor),
            gOIdhw8i16o2i => LayoutMeta::fused(true, &[0, 1, 2, 3, 4, 5], 16, InPairs),

            Goihw8g => LayoutMeta::blocked(Weights, true, &[0, 1, 2, 3, 4], &[0], 8),
            Goihw16g => LayoutMeta::blocked(Weights, true, &[0, 1, 2, 3, 4], &[0], 16),

            OIhw4i16o4i_s8s8 => LayoutMeta::fused(false, &[0, 1, 2, 3], 16, InQuads).compensated(),
            gOIhw4i16o4i_s8s8 => {
                LayoutMeta::fused(true, &[0, 1, 2, 3, 4], 16, InQuads).compensated()
            }
        };
        Some(meta)
    }

    /// Whether the tag is described by a blocking description at all.
    pub fn is_blocking(self) -> bool {
        !matches!(
            self,
            Format::undef | Format::any | Format::wino_fmt | Format::rnn_packed
        )
    }

    /// Collapse every tag whose storage is fully addressed by its blocking
    /// description to [`Format::blocked`].
    ///
    /// Opaque tags and tags with trailing compensation keep their own name.
    pub fn normalized(self) -> Format {
        match self.meta() {
            Some(meta) if !meta.compensation => Format::blocked,
            _ => self,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .iter()
            .copied()
            .find(|fmt| fmt.name() == s)
            .ok_or_else(|| LayoutError::UnknownFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_order_formulas() {
        // 8i16o2i: input lane 5 = pair 2, slot 1.
        assert_eq!(BlockOrder::InPairs.index(5, 3, 16), 2 * 32 + 6 + 1);
        // 4i16o4i: input lane 6 = quad 1, slot 2.
        assert_eq!(BlockOrder::InQuads.index(6, 3, 16), 64 + 12 + 2);
        assert_eq!(BlockOrder::OutPairs.index(3, 5, 16), 2 * 32 + 6 + 1);
        assert_eq!(BlockOrder::InMajor.index(2, 7, 8), 23);
        assert_eq!(BlockOrder::OutMajor.index(2, 7, 8), 58);
    }

    #[test]
    fn test_block_orders_are_permutations() {
        let orders = [
            BlockOrder::OutMajor,
            BlockOrder::InMajor,
            BlockOrder::InPairs,
            BlockOrder::InQuads,
            BlockOrder::OutPairs,
        ];
        for order in orders {
            for block in [8usize, 16] {
                let mut seen = vec![false; block * block];
                for ic in 0..block {
                    for oc in 0..block {
                        let k = order.index(ic, oc, block);
                        assert!(!seen[k], "{order:?} block {block} hits {k} twice");
                        seen[k] = true;
                    }
                }
            }
        }
    }

    #[test]
    fn test_meta_is_consistent() {
        for &fmt in Format::ALL {
            let Some(meta) = fmt.meta() else { continue };
            let mut axes = meta.outer.to_vec();
            axes.sort_unstable();
            assert_eq!(axes, (0..meta.ndims()).collect::<Vec<_>>(), "{fmt}");
            assert!(meta.inner.iter().all(|&a| a < meta.ndims()), "{fmt}");
            assert_eq!(meta.inner.is_empty(), meta.block == 1, "{fmt}");
            assert_eq!(meta.order.is_some(), meta.inner.len() == 2 && meta.kind == Weights);
        }
    }

    #[test]
    fn test_spatial_rank() {
        assert_eq!(Format::nChw8c.meta().unwrap().spatial_rank(), 2);
        assert_eq!(Format::gOIdhw8i8o.meta().unwrap().spatial_rank(), 3);
        assert_eq!(Format::Owi8o.meta().unwrap().spatial_rank(), 1);
        assert_eq!(Format::x.meta().unwrap().spatial_rank(), 0);
    }

    #[test]
    fn test_normalized() {
        assert_eq!(Format::nChw16c.normalized(), Format::blocked);
        assert_eq!(Format::nchw.normalized(), Format::blocked);
        assert_eq!(Format::blocked.normalized(), Format::blocked);
        assert_eq!(Format::wino_fmt.normalized(), Format::wino_fmt);
        assert_eq!(
            Format::OIhw4i16o4i_s8s8.normalized(),
            Format::OIhw4i16o4i_s8s8
        );
    }

    #[test]
    fn test_parse_names() {
        for &fmt in Format::ALL {
            assert_eq!(fmt.name().parse::<Format>().unwrap(), fmt);
        }
        assert!(matches!(
            "nChw32c".parse::<Format>(),
            Err(LayoutError::UnknownFormat(_))
        ));
    }
}
