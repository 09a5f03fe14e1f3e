//! Wire-type resolution.
//!
//! A pure, total function from (source width, target kind) to the
//! concrete transform a wire will use. Mixer targets carry the mixer's
//! declared capacity because the engine specializes summation per fixed
//! size; resolution must select the variant for the declared capacity,
//! never the current occupancy.

use modwire_core::{GraphError, Result, Width};
use modwire_engine::{MixerSize, Transform};

/// Tagged target-endpoint kind for wire resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireTarget {
    /// A named input parameter of a plain block
    Plain { width: Width },
    /// A slot of a mono mixer of the given capacity
    MonoMixer(MixerSize),
    /// A stereo slot of a stereo mixer of the given capacity
    StereoMixer(MixerSize),
}

impl WireTarget {
    /// Channel width of the target segment (slot width for mixers)
    #[must_use]
    pub fn width(self) -> Width {
        match self {
            Self::Plain { width } => width,
            Self::MonoMixer(_) => 1,
            Self::StereoMixer(_) => 2,
        }
    }
}

/// Select the wire transform for a source width feeding a target.
///
/// Any combination outside the supported table fails
/// `UnsupportedWireShape`; in particular a stereo source can never feed a
/// mono target.
pub fn resolve(source_width: Width, target: WireTarget) -> Result<Transform> {
    match (source_width, target) {
        (1, WireTarget::Plain { width: 1 }) => Ok(Transform::Direct1to1),
        (1, WireTarget::Plain { width: 2 }) => Ok(Transform::Broadcast1to2),
        (2, WireTarget::Plain { width: 2 }) => Ok(Transform::Direct2to2),
        (1, WireTarget::MonoMixer(size)) => Ok(Transform::MonoToMonoMixer(size)),
        (1, WireTarget::StereoMixer(size)) => Ok(Transform::MonoToStereoMixer(size)),
        (2, WireTarget::StereoMixer(size)) => Ok(Transform::StereoToStereoMixer(size)),
        (source, target) => Err(GraphError::UnsupportedWireShape {
            source,
            target: target.width(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [MixerSize; 5] = [
        MixerSize::M2,
        MixerSize::M4,
        MixerSize::M8,
        MixerSize::M16,
        MixerSize::M32,
    ];

    #[test]
    fn test_plain_block_transforms() {
        assert_eq!(
            resolve(1, WireTarget::Plain { width: 1 }).unwrap(),
            Transform::Direct1to1
        );
        assert_eq!(
            resolve(1, WireTarget::Plain { width: 2 }).unwrap(),
            Transform::Broadcast1to2
        );
        assert_eq!(
            resolve(2, WireTarget::Plain { width: 2 }).unwrap(),
            Transform::Direct2to2
        );
    }

    #[test]
    fn test_mixer_transforms_carry_declared_capacity() {
        for size in SIZES {
            assert_eq!(
                resolve(1, WireTarget::MonoMixer(size)).unwrap(),
                Transform::MonoToMonoMixer(size)
            );
            assert_eq!(
                resolve(1, WireTarget::StereoMixer(size)).unwrap(),
                Transform::MonoToStereoMixer(size)
            );
            assert_eq!(
                resolve(2, WireTarget::StereoMixer(size)).unwrap(),
                Transform::StereoToStereoMixer(size)
            );
        }
    }

    #[test]
    fn test_stereo_into_mono_always_fails() {
        assert!(matches!(
            resolve(2, WireTarget::Plain { width: 1 }),
            Err(GraphError::UnsupportedWireShape {
                source: 2,
                target: 1
            })
        ));
        for size in SIZES {
            assert!(resolve(2, WireTarget::MonoMixer(size)).is_err());
        }
    }

    #[test]
    fn test_unsupported_widths_fail() {
        assert!(resolve(4, WireTarget::Plain { width: 4 }).is_err());
        assert!(resolve(1, WireTarget::Plain { width: 4 }).is_err());
        assert!(resolve(0, WireTarget::Plain { width: 1 }).is_err());
        assert!(resolve(4, WireTarget::StereoMixer(MixerSize::M4)).is_err());
    }
}
