//! Signal analysis — magnitude spectra and band parameters.
//!
//! Two [`Analyzer`]s (input and output direction) tap the live audio paths
//! and refresh a 33-bin, 8-bit magnitude spectrum once per tick.  The
//! [`BandParameters`] reduction collapses each spectrum into `{low, mid,
//! high}` scalars in `[0, 1]`; both directions together form the
//! [`BandFrame`] consumed by the rendering layer.

pub mod bands;
pub mod spectrum;

pub use bands::{BandFrame, BandParameters};
pub use spectrum::{Analyzer, BIN_COUNT, FFT_SIZE};
