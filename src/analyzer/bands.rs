//! Band parameter pipeline — spectra reduced to renderable scalars.
//!
//! Each tick the engine collapses both 33-bin spectra into three band
//! averages per direction: `low` (bins 0..3), `mid` (bins 4..10) and `high`
//! (bins 11..15), each normalized to `[0, 1]`.  The values are raw —
//! gain constants and lerp smoothing are the consumer's policy, not ours —
//! and are published over a `tokio::sync::watch` channel so the rendering
//! layer always reads the latest [`BandFrame`] without joining the tick loop.

// ---------------------------------------------------------------------------
// BandParameters
// ---------------------------------------------------------------------------

/// Normalized band averages for one audio direction.
///
/// All fields lie in `[0.0, 1.0]` for any valid 8-bit bin buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandParameters {
    /// Mean of bins `0..3`, normalized.
    pub low: f32,
    /// Mean of bins `4..10`, normalized.
    pub mid: f32,
    /// Mean of bins `11..15`, normalized.
    pub high: f32,
}

impl BandParameters {
    /// Reduce a magnitude-bin buffer into band averages.
    ///
    /// ```
    /// use live_voice::analyzer::BandParameters;
    ///
    /// let mut bins = [0u8; 33];
    /// bins[0] = 100;
    /// bins[1] = 120;
    /// bins[2] = 140;
    /// let bands = BandParameters::from_bins(&bins);
    /// assert!((bands.low - 120.0 / 255.0).abs() < 1e-6);
    /// ```
    pub fn from_bins(bins: &[u8]) -> Self {
        Self {
            low: band_average(bins, 0, 3),
            mid: band_average(bins, 4, 10),
            high: band_average(bins, 11, 15),
        }
    }
}

/// Mean of `bins[start..end]` normalized to `[0, 1]`.
///
/// Out-of-range portions are ignored; an empty slice yields `0.0`.
fn band_average(bins: &[u8], start: usize, end: usize) -> f32 {
    let end = end.min(bins.len());
    if start >= end {
        return 0.0;
    }
    let slice = &bins[start..end];
    let sum: u32 = slice.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / slice.len() as f32 / 255.0
}

// ---------------------------------------------------------------------------
// BandFrame
// ---------------------------------------------------------------------------

/// One tick's worth of band parameters for both directions.
///
/// This is the value the engine publishes every tick; the external renderer
/// applies its own gains (e.g. `low × 2.0`, `high × 20.0`) and its own lerp
/// blend factors on top.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandFrame {
    /// Microphone-side bands.
    pub input: BandParameters,
    /// Playback-side bands.
    pub output: BandParameters,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_band_is_mean_over_255() {
        let mut bins = [0u8; 33];
        bins[0] = 100;
        bins[1] = 120;
        bins[2] = 140;
        let bands = BandParameters::from_bins(&bins);
        assert!((bands.low - 120.0 / 255.0).abs() < 1e-6, "low = {}", bands.low);
    }

    #[test]
    fn band_slices_use_the_documented_ranges() {
        let mut bins = [0u8; 33];
        // Mark exactly one bin in each band at full scale.
        bins[2] = 255; // low: 0..3 → mean 255/3
        bins[9] = 255; // mid: 4..10 → mean 255/6
        bins[14] = 255; // high: 11..15 → mean 255/4

        let bands = BandParameters::from_bins(&bins);
        assert!((bands.low - 1.0 / 3.0).abs() < 1e-6);
        assert!((bands.mid - 1.0 / 6.0).abs() < 1e-6);
        assert!((bands.high - 1.0 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn all_bands_in_unit_range_for_any_bins() {
        // Exercise extremes and a sawtooth pattern.
        let patterns: Vec<[u8; 33]> = vec![
            [0; 33],
            [255; 33],
            {
                let mut p = [0u8; 33];
                for (i, v) in p.iter_mut().enumerate() {
                    *v = (i * 8) as u8;
                }
                p
            },
        ];

        for bins in &patterns {
            let b = BandParameters::from_bins(bins);
            for v in [b.low, b.mid, b.high] {
                assert!((0.0..=1.0).contains(&v), "band out of range: {v}");
            }
        }
    }

    #[test]
    fn full_scale_bins_give_unit_bands() {
        let bands = BandParameters::from_bins(&[255u8; 33]);
        assert!((bands.low - 1.0).abs() < 1e-6);
        assert!((bands.mid - 1.0).abs() < 1e-6);
        assert!((bands.high - 1.0).abs() < 1e-6);
    }

    #[test]
    fn short_buffer_is_handled() {
        // Only 8 bins: high band (11..15) is entirely out of range.
        let bins = [200u8; 8];
        let bands = BandParameters::from_bins(&bins);
        assert!(bands.low > 0.0);
        assert!(bands.mid > 0.0);
        assert_eq!(bands.high, 0.0);
    }

    #[test]
    fn empty_buffer_is_all_zero() {
        let bands = BandParameters::from_bins(&[]);
        assert_eq!(bands, BandParameters::default());
    }

    #[test]
    fn band_frame_default_is_silent() {
        let frame = BandFrame::default();
        assert_eq!(frame.input, BandParameters::default());
        assert_eq!(frame.output, BandParameters::default());
    }
}
