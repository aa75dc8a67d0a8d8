//! Layout families.
//!
//! Every tag with a specialised padding routine belongs to exactly one
//! family. Tags outside all families fall back to the generic engine.

use blocked_view::Format;

/// Group of layout tags sharing one padding algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Activations with the channel axis blocked (`nChw8c`, ...).
    DataChannelBlocked,
    /// Weights blocked on output channels only (`Ohwi8o`, `gOihw16o`, ...).
    WeightsOutBlocked,
    /// Weights blocked on input channels only (`oIhw8i`, ...).
    WeightsInBlocked,
    /// Weights blocked on both channel axes (`OIhw8i16o2i`, ...).
    WeightsInOutBlocked,
    /// Weights blocked on the group axis (`Goihw8g`, `Goihw16g`).
    WeightsGroupBlocked,
}

/// Family of `fmt`, or `None` when no specialised routine covers it.
pub fn classify(fmt: Format) -> Option<Family> {
    use Format::*;
    let family = match fmt {
        nCw8c | nCw16c | nChw8c | nChw16c | nCdhw8c | nCdhw16c => Family::DataChannelBlocked,
        Oiw16o | Owi16o | Ohwi8o | Oihw16o | Ohwi16o | Oidhw16o | Odhwi16o | Odhwi8o | gOiw16o
        | gOwi16o | gOhwi8o | gOwi8o | Owi8o | gOihw16o | gOhwi16o | gOidhw16o | gOdhwi16o
        | gOdhwi8o => Family::WeightsOutBlocked,
        oIhw8i | oIhw16i | oIdhw8i | oIdhw16i => Family::WeightsInBlocked,
        IOhw16o16i | gIOhw16o16i | IOw16o16i | gIOw16o16i | OIdhw16i16o | OIdhw16o16i
        | OIhw8i8o | OIw8i8o | gOIw8i8o | OIw8o8i | gOIw8o8i | OIhw16i16o | OIhw4i16o4i
        | OIhw8i16o2i | OIdhw8i16o2i | OIhw8o16i2o | OIhw8o8i | OIhw16o16i | OIdhw8i8o
        | OIdhw8o8i | gOIhw8i8o | OIw8o16i2o | gOIw8o16i2o | gOIhw16i16o | gOIhw4i16o4i
        | gOIhw8i16o2i | gOIdhw8i16o2i | gOIhw8o16i2o | gOIhw8o8i | gOIhw16o16i | gOIdhw16i16o
        | gOIdhw16o16i | gOIdhw8i8o | gOIdhw8o8i | OIw8i16o2i | gOIw8i16o2i | OIw16i16o
        | OIw16o16i | gOIw16i16o | gOIw16o16i => Family::WeightsInOutBlocked,
        Goihw8g | Goihw16g => Family::WeightsGroupBlocked,
        _ => return None,
    };
    Some(family)
}

/// Channel-blocked activations.
pub fn is_data_blocked(fmt: Format) -> bool {
    classify(fmt) == Some(Family::DataChannelBlocked)
}

/// Weights blocked on output channels only.
pub fn is_wei_o_blocked(fmt: Format) -> bool {
    classify(fmt) == Some(Family::WeightsOutBlocked)
}

/// Weights blocked on input channels only.
pub fn is_wei_i_blocked(fmt: Format) -> bool {
    classify(fmt) == Some(Family::WeightsInBlocked)
}

/// Weights blocked on both channel axes.
pub fn is_wei_io_blocked(fmt: Format) -> bool {
    classify(fmt) == Some(Family::WeightsInOutBlocked)
}

/// Weights blocked on groups.
pub fn is_wei_g_blocked(fmt: Format) -> bool {
    classify(fmt) == Some(Family::WeightsGroupBlocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocked_view::TensorKind;

    #[test]
    fn test_family_sizes() {
        let count = |family| Format::ALL.iter().filter(|&&f| classify(f) == Some(family)).count();
        assert_eq!(count(Family::DataChannelBlocked), 6);
        assert_eq!(count(Family::WeightsOutBlocked), 18);
        assert_eq!(count(Family::WeightsInBlocked), 4);
        assert_eq!(count(Family::WeightsInOutBlocked), 40);
        assert_eq!(count(Family::WeightsGroupBlocked), 2);
        assert!(is_wei_io_blocked(Format::gOIdhw8o8i));
        assert!(!is_wei_o_blocked(Format::gOIdhw8o8i));
    }

    #[test]
    fn test_families_agree_with_layout_meta() {
        for &fmt in Format::ALL {
            let Some(family) = classify(fmt) else { continue };
            let meta = fmt.meta().unwrap();
            let g = usize::from(meta.groups);
            assert!(meta.block == 8 || meta.block == 16, "{fmt}");
            assert!(!meta.compensation, "{fmt}");
            match family {
                Family::DataChannelBlocked => {
                    assert_eq!(meta.kind, TensorKind::Data);
                    assert_eq!(meta.inner, &[1]);
                }
                Family::WeightsOutBlocked => assert_eq!(meta.inner, &[g]),
                Family::WeightsInBlocked => {
                    assert!(!meta.groups);
                    assert_eq!(meta.inner, &[1]);
                }
                Family::WeightsInOutBlocked => {
                    assert!(meta.order.is_some());
                    assert_eq!(meta.inner.len(), 2);
                }
                Family::WeightsGroupBlocked => {
                    assert!(meta.groups);
                    assert_eq!(meta.inner, &[0]);
                }
            }
        }
    }

    #[test]
    fn test_unclassified_tags() {
        assert_eq!(classify(Format::nchw), None);
        assert_eq!(classify(Format::blocked), None);
        assert_eq!(classify(Format::NChw16n16c), None);
        assert_eq!(classify(Format::OIhw4i16o4i_s8s8), None);
        assert_eq!(classify(Format::OIhw4i16o4i), Some(Family::WeightsInOutBlocked));
        assert_eq!(classify(Format::gOwi8o), Some(Family::WeightsOutBlocked));
    }
}
