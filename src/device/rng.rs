//! Random source injected by the host.

use core::fmt::Debug;

/// Pseudo-random source injected by the caller so runs are reproducible.
pub trait Rng {
    /// Failure reported by the implementation.
    #[cfg(feature = "defmt")]
    type Error: Debug + defmt::Format;

    /// Failure reported by the implementation.
    #[cfg(not(feature = "defmt"))]
    type Error: Debug;

    /// Next 32 random bits.
    fn next_u32(&mut self) -> Result<u32, Self::Error>;

    /// Uniform-ish draw from `0..bound`, zero when `bound` is zero.
    fn next_below(&mut self, bound: u64) -> Result<u64, Self::Error> {
        if bound == 0 {
            return Ok(0);
        }
        let hi = self.next_u32()? as u64;
        let lo = self.next_u32()? as u64;
        Ok(((hi << 32) | lo) % bound)
    }
}
