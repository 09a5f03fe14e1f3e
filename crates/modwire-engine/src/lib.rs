//! Engine boundary for the modwire graph layer.
//!
//! This crate defines the `EngineBackend` trait that the native render
//! engine implements, the block/wire vocabulary both sides share, and
//! `NativeEngine`, an in-process reference backend used by tests and the
//! demo binary. The graph layer never talks to a backend except through
//! the trait, so alternative engines (FFI, remote) slot in without
//! touching graph code.

pub mod backend;
pub mod native;

pub use backend::{BlockDesc, BlockIo, EngineBackend, MixerSize, Transform};
pub use native::NativeEngine;

use modwire_core::{Frames, SampleRate};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: SampleRate,
    pub block_size: Frames,
    pub output_channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            output_channels: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.output_channels, 2);
    }
}
