//! Block kinds and instances.
//!
//! A `Block` is an engine entity plus the parameter schema of its kind.
//! Kinds mirror the engine's `BlockDesc` vocabulary; the schemas here give
//! the engine's flat channel arrays their named, width-typed structure.

use std::sync::Arc;

use modwire_core::{Direction, Entity, GraphError, Result, Width};
use modwire_engine::{BlockDesc, MixerSize};

use crate::expr::AttachedParam;
use crate::schema::BlockSchema;

/// The block kinds the graph layer knows how to wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    SineOsc,
    MonoToStereo,
    Product,
    MonoMixer(MixerSize),
    StereoMixer(MixerSize),
}

impl BlockKind {
    /// Parameter schema of this kind.
    ///
    /// Builtin schemas are statically well-formed, so declaration cannot
    /// fail here; the validation still runs, catching table edits that
    /// break the invariants.
    pub fn schema(self) -> Result<Arc<BlockSchema>> {
        match self {
            Self::SineOsc => {
                BlockSchema::declare(&[("freq", 0), ("amplitude", 1)], 2, &[("out", 0)], 1)
            }
            Self::MonoToStereo => BlockSchema::declare(
                &[("input", 0), ("amp_db", 1), ("panning", 2)],
                3,
                &[("out", 0)],
                2,
            ),
            Self::Product => BlockSchema::declare(&[("a", 0), ("b", 1)], 2, &[("out", 0)], 1),
            Self::MonoMixer(size) => {
                BlockSchema::declare(&[], size.capacity(), &[("out", 0)], 1)
            }
            Self::StereoMixer(size) => {
                BlockSchema::declare(&[], 2 * size.capacity(), &[("out", 0)], 2)
            }
        }
    }

    /// Per-slot width, for mixer kinds
    #[must_use]
    pub fn slot_width(self) -> Option<Width> {
        match self {
            Self::MonoMixer(_) => Some(1),
            Self::StereoMixer(_) => Some(2),
            _ => None,
        }
    }

    /// Declared capacity, for mixer kinds
    #[must_use]
    pub fn mixer_size(self) -> Option<MixerSize> {
        match self {
            Self::MonoMixer(size) | Self::StereoMixer(size) => Some(size),
            _ => None,
        }
    }

    /// Whether this kind is a mixer
    #[must_use]
    pub fn is_mixer(self) -> bool {
        self.mixer_size().is_some()
    }
}

impl From<&BlockDesc> for BlockKind {
    fn from(desc: &BlockDesc) -> Self {
        match desc {
            BlockDesc::SineOsc { .. } => Self::SineOsc,
            BlockDesc::MonoToStereo { .. } => Self::MonoToStereo,
            BlockDesc::Product => Self::Product,
            BlockDesc::MonoMixer(size) => Self::MonoMixer(*size),
            BlockDesc::StereoMixer(size) => Self::StereoMixer(*size),
        }
    }
}

/// One block instance: an entity plus its kind's schema
#[derive(Debug, Clone)]
pub struct Block {
    entity: Entity,
    kind: BlockKind,
    schema: Arc<BlockSchema>,
}

impl Block {
    pub(crate) fn new(entity: Entity, kind: BlockKind, schema: Arc<BlockSchema>) -> Self {
        Self {
            entity,
            kind,
            schema,
        }
    }

    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    #[must_use]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<BlockSchema> {
        &self.schema
    }

    /// Reference a named input parameter. Pure accessor, no side effect.
    pub fn input(&self, name: &str) -> Result<AttachedParam> {
        self.attached(Direction::Input, name)
    }

    /// Reference a named output parameter. Pure accessor, no side effect.
    pub fn output(&self, name: &str) -> Result<AttachedParam> {
        self.attached(Direction::Output, name)
    }

    fn attached(&self, direction: Direction, name: &str) -> Result<AttachedParam> {
        self.schema
            .param(direction, name)
            .map(|param| AttachedParam::new(self.entity, param.clone()))
            .ok_or_else(|| GraphError::UnknownParam {
                block: self.entity,
                direction,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_declare() {
        for kind in [
            BlockKind::SineOsc,
            BlockKind::MonoToStereo,
            BlockKind::Product,
            BlockKind::MonoMixer(MixerSize::M8),
            BlockKind::StereoMixer(MixerSize::M32),
        ] {
            assert!(kind.schema().is_ok(), "schema for {kind:?} should declare");
        }
    }

    #[test]
    fn test_sine_osc_schema_shape() {
        let schema = BlockKind::SineOsc.schema().unwrap();
        let freq = schema.param(Direction::Input, "freq").unwrap();
        assert_eq!((freq.index, freq.width), (0, 1));
        let out = schema.param(Direction::Output, "out").unwrap();
        assert_eq!((out.index, out.width), (0, 1));
    }

    #[test]
    fn test_mono_to_stereo_output_is_stereo() {
        let schema = BlockKind::MonoToStereo.schema().unwrap();
        assert_eq!(schema.param(Direction::Output, "out").unwrap().width, 2);
    }

    #[test]
    fn test_mixer_kind_helpers() {
        let mono = BlockKind::MonoMixer(MixerSize::M4);
        assert_eq!(mono.slot_width(), Some(1));
        assert_eq!(mono.mixer_size(), Some(MixerSize::M4));
        assert!(mono.is_mixer());

        let stereo = BlockKind::StereoMixer(MixerSize::M16);
        assert_eq!(stereo.slot_width(), Some(2));
        assert_eq!(stereo.schema().unwrap().input_size(), 32);

        assert!(!BlockKind::SineOsc.is_mixer());
        assert_eq!(BlockKind::Product.slot_width(), None);
    }

    #[test]
    fn test_kind_from_desc() {
        assert_eq!(
            BlockKind::from(&BlockDesc::SineOsc {
                freq: 440.0,
                amp: 1.0
            }),
            BlockKind::SineOsc
        );
        assert_eq!(
            BlockKind::from(&BlockDesc::StereoMixer(MixerSize::M2)),
            BlockKind::StereoMixer(MixerSize::M2)
        );
    }

    #[test]
    fn test_unknown_param_lookup() {
        let schema = BlockKind::SineOsc.schema().unwrap();
        let block = Block::new(Entity(1), BlockKind::SineOsc, schema);

        assert!(block.input("freq").is_ok());
        assert!(matches!(
            block.input("detune"),
            Err(GraphError::UnknownParam { .. })
        ));
        // Direction matters: "out" is an output
        assert!(block.input("out").is_err());
        assert!(block.output("out").is_ok());
    }
}
