//! Graph registry: block and wire bookkeeping.
//!
//! The registry owns the engine handle and the authoritative mapping from
//! entity to block metadata and from wire id to `Wire`. Every graph
//! mutation funnels through here; a failed mutation leaves both the
//! registry and the engine exactly as they were before the call.

use std::collections::HashMap;

use modwire_core::{Direction, Entity, GraphError, Result, Sample, Width, WireId};
use modwire_engine::{BlockDesc, EngineBackend, MixerSize, Transform};

use crate::block::{Block, BlockKind};
use crate::expr::{AddedParams, AttachedParam, MultipliedParams, ParamExpr, ScaledParam};
use crate::resolve::{WireTarget, resolve};
use crate::slots::Occupancy;

/// One end of a committed wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub block: Entity,
    /// Channel index within the block's input or output range
    pub index: usize,
}

/// A committed, directional, width-matched connection
#[derive(Debug, Clone)]
pub struct Wire {
    pub id: WireId,
    pub source: Endpoint,
    pub target: Endpoint,
    /// Source segment width
    pub width: Width,
    pub gain: Sample,
    pub offset: Sample,
    pub transform: Transform,
    /// Channel start index of the mixer slot this wire occupies, if any
    pub mixer_slot: Option<usize>,
}

/// Result of realizing a summed expression: the auto-inserted mixer, the
/// per-member slot wires, and the wire from the mixer into the target
#[derive(Debug, Clone)]
pub struct MixDown {
    pub mixer: Block,
    pub slot_wires: Vec<WireId>,
    pub output_wire: WireId,
}

/// What a resolved expression committed to the graph
#[derive(Debug, Clone)]
pub enum Connection {
    Wire(WireId),
    Mix(MixDown),
}

/// A value being written to an input parameter
#[derive(Debug, Clone)]
pub enum WriteValue {
    Scalar(Sample),
    Channels(Vec<Sample>),
    Expr(ParamExpr),
}

impl From<Sample> for WriteValue {
    fn from(v: Sample) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<Sample>> for WriteValue {
    fn from(v: Vec<Sample>) -> Self {
        Self::Channels(v)
    }
}

impl From<&[Sample]> for WriteValue {
    fn from(v: &[Sample]) -> Self {
        Self::Channels(v.to_vec())
    }
}

impl From<ParamExpr> for WriteValue {
    fn from(v: ParamExpr) -> Self {
        Self::Expr(v)
    }
}

impl From<AttachedParam> for WriteValue {
    fn from(v: AttachedParam) -> Self {
        Self::Expr(v.into())
    }
}

impl From<ScaledParam> for WriteValue {
    fn from(v: ScaledParam) -> Self {
        Self::Expr(v.into())
    }
}

impl From<AddedParams> for WriteValue {
    fn from(v: AddedParams) -> Self {
        Self::Expr(v.into())
    }
}

impl From<MultipliedParams> for WriteValue {
    fn from(v: MultipliedParams) -> Self {
        Self::Expr(v.into())
    }
}

/// The signal-routing graph: blocks, wires, and the engine they live in
pub struct GraphRegistry<E: EngineBackend> {
    engine: E,
    blocks: HashMap<Entity, Block>,
    wires: HashMap<WireId, Wire>,
}

impl<E: EngineBackend> GraphRegistry<E> {
    /// Create a registry around an explicit engine handle
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            blocks: HashMap::new(),
            wires: HashMap::new(),
        }
    }

    /// Direct access to the engine, for reads the registry does not model
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Instantiate a block in the engine and register it
    pub fn create_block(&mut self, desc: &BlockDesc) -> Result<Block> {
        let kind = BlockKind::from(desc);
        let schema = kind.schema()?;
        let entity = self.engine.create_block(desc);
        let block = Block::new(entity, kind, schema);
        self.add_block(&block);
        Ok(block)
    }

    /// Register a block. Idempotent: a no-op if the entity is already
    /// present.
    pub fn add_block(&mut self, block: &Block) {
        if self.blocks.contains_key(&block.entity()) {
            tracing::debug!("Block {} already registered", block.entity());
            return;
        }
        tracing::debug!("Registered block {} ({:?})", block.entity(), block.kind());
        self.blocks.insert(block.entity(), block.clone());
    }

    /// Detach a block from the graph.
    ///
    /// Wires referencing the block must be disconnected first; removal
    /// with live wires is a caller error, surfaced as `DanglingWire`
    /// rather than silently cascaded.
    pub fn remove_block(&mut self, entity: Entity) -> Result<()> {
        if !self.blocks.contains_key(&entity) {
            return Err(GraphError::UnknownBlock(entity));
        }
        let live = self
            .wires
            .values()
            .filter(|w| w.source.block == entity || w.target.block == entity)
            .count();
        if live > 0 {
            return Err(GraphError::DanglingWire {
                block: entity,
                wires: live,
            });
        }
        self.engine.remove_block(entity)?;
        self.blocks.remove(&entity);
        tracing::debug!("Removed block {}", entity);
        Ok(())
    }

    /// Whether an entity is registered
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.blocks.contains_key(&entity)
    }

    /// Look up a registered block
    #[must_use]
    pub fn block(&self, entity: Entity) -> Option<&Block> {
        self.blocks.get(&entity)
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Look up a committed wire
    #[must_use]
    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// All wires terminating at a block
    pub fn wires_to_block(&self, entity: Entity) -> impl Iterator<Item = &Wire> {
        self.wires.values().filter(move |w| w.target.block == entity)
    }

    /// Occupancy bitmap of a mixer's input channels, derived from the
    /// wires currently terminating at it. `None` for non-mixer blocks.
    #[must_use]
    pub fn occupancy(&self, mixer: &Block) -> Option<Occupancy> {
        let slot_width = mixer.kind().slot_width()?;
        let channels = mixer.schema().input_size();
        let spans = self
            .wires_to_block(mixer.entity())
            .filter_map(|w| w.mixer_slot)
            .map(|slot| (slot, slot_width));
        Some(Occupancy::from_spans(channels, spans))
    }

    /// Commit one wire from a scaled output reference into an input
    /// parameter. If the target block is a mixer, the wire is routed into
    /// a freshly-allocated slot instead of the named parameter.
    pub fn connect(&mut self, source: &ScaledParam, target: &AttachedParam) -> Result<WireId> {
        self.check_endpoints(source.source(), target)?;

        let target_block = self
            .blocks
            .get(&target.block())
            .ok_or(GraphError::UnknownBlock(target.block()))?
            .clone();
        if target_block.kind().is_mixer() {
            return self.connect_to_mixer(source, &target_block);
        }

        let source_width = source.width();
        let target_width = target.width();
        // The algebra requires matching widths; the lone exception is the
        // table's mono-to-stereo broadcast.
        if source_width != target_width && !(source_width == 1 && target_width == 2) {
            return Err(GraphError::WidthMismatch {
                source: source_width,
                target: target_width,
            });
        }
        let transform = resolve(
            source_width,
            WireTarget::Plain {
                width: target_width,
            },
        )?;

        let id = self.engine.add_wire(
            source.source().block(),
            target.block(),
            source.source().param().index,
            target.param().index,
            transform,
            source.gain(),
            source.offset(),
        )?;
        self.record_wire(id, source, target.block(), target.param().index, transform, None);
        Ok(id)
    }

    /// Commit one wire from a scaled output reference into the
    /// lowest-indexed free slot of a mixer
    pub fn connect_to_mixer(&mut self, source: &ScaledParam, mixer: &Block) -> Result<WireId> {
        if source.source().param().direction != Direction::Output {
            return Err(GraphError::InvalidDirection(
                "cannot connect from an input parameter".to_string(),
            ));
        }
        if !self.blocks.contains_key(&source.source().block()) {
            return Err(GraphError::UnknownBlock(source.source().block()));
        }
        if !self.blocks.contains_key(&mixer.entity()) {
            return Err(GraphError::UnknownBlock(mixer.entity()));
        }

        let (wire_target, slot_width) = match mixer.kind() {
            BlockKind::MonoMixer(size) => (WireTarget::MonoMixer(size), 1),
            BlockKind::StereoMixer(size) => (WireTarget::StereoMixer(size), 2),
            _ => {
                return Err(GraphError::UnsupportedWireShape {
                    source: source.width(),
                    target: mixer.schema().input_size(),
                });
            }
        };
        let transform = resolve(source.width(), wire_target)?;

        let occupancy = self
            .occupancy(mixer)
            .unwrap_or_else(|| Occupancy::new(mixer.schema().input_size()));
        let slot = occupancy
            .first_fit(slot_width)
            .ok_or(GraphError::NoFreeSlot {
                mixer: mixer.entity(),
                width: slot_width,
            })?;

        let id = self.engine.add_wire_to_mixer(
            source.source().block(),
            mixer.entity(),
            source.source().param().index,
            slot,
            transform,
            source.gain(),
            source.offset(),
        )?;
        self.record_wire(id, source, mixer.entity(), slot, transform, Some(slot));
        Ok(id)
    }

    /// Realize a summed expression through an auto-inserted mixer.
    ///
    /// All validation happens before the first engine call; the mixer is
    /// sized so slot allocation cannot fail mid-way.
    pub fn connect_sum(&mut self, sum: &AddedParams, target: &AttachedParam) -> Result<MixDown> {
        let members = sum.members();
        let width = members.first().map_or(target.width(), ScaledParam::width);
        for member in members {
            if member.source().param().direction != Direction::Output {
                return Err(GraphError::InvalidDirection(
                    "cannot connect from an input parameter".to_string(),
                ));
            }
            if member.width() != width {
                return Err(GraphError::WidthMismatch {
                    source: member.width(),
                    target: width,
                });
            }
            if !self.blocks.contains_key(&member.source().block()) {
                return Err(GraphError::UnknownBlock(member.source().block()));
            }
        }
        if target.param().direction != Direction::Input {
            return Err(GraphError::InvalidDirection(
                "cannot connect to an output parameter".to_string(),
            ));
        }
        if !self.blocks.contains_key(&target.block()) {
            return Err(GraphError::UnknownBlock(target.block()));
        }
        if width != target.width() {
            return Err(GraphError::WidthMismatch {
                source: width,
                target: target.width(),
            });
        }
        if width > 2 {
            return Err(GraphError::UnsupportedWireShape {
                source: width,
                target: target.width(),
            });
        }
        // The target input must be free: the output hop is the last engine
        // call, and by then the mixer and slot wires are already committed.
        if let Some(wire) = self
            .wires_to_block(target.block())
            .find(|w| w.target.index == target.param().index)
        {
            return Err(GraphError::InputOccupied {
                block: target.block(),
                index: wire.target.index,
            });
        }

        let size = MixerSize::for_members(members.len())?;
        let desc = if width == 1 {
            BlockDesc::MonoMixer(size)
        } else {
            BlockDesc::StereoMixer(size)
        };
        let mixer = self.create_block(&desc)?;
        tracing::debug!(
            "Auto-inserted {:?} for {} summed member(s)",
            mixer.kind(),
            members.len()
        );

        let mut slot_wires = Vec::with_capacity(members.len());
        for member in members {
            slot_wires.push(self.connect_to_mixer(member, &mixer)?);
        }

        let out = mixer.output("out")?;
        let transform = resolve(
            width,
            WireTarget::Plain {
                width: target.width(),
            },
        )?;
        let output_wire = self.engine.add_wire(
            mixer.entity(),
            target.block(),
            out.param().index,
            target.param().index,
            transform,
            1.0,
            sum.constant(),
        )?;
        self.wires.insert(
            output_wire,
            Wire {
                id: output_wire,
                source: Endpoint {
                    block: mixer.entity(),
                    index: out.param().index,
                },
                target: Endpoint {
                    block: target.block(),
                    index: target.param().index,
                },
                width,
                gain: 1.0,
                offset: sum.constant(),
                transform,
                mixer_slot: None,
            },
        );

        Ok(MixDown {
            mixer,
            slot_wires,
            output_wire,
        })
    }

    /// Remove a committed wire, freeing any mixer slot it held
    pub fn disconnect(&mut self, wire: WireId) -> Result<()> {
        if !self.wires.contains_key(&wire) {
            return Err(GraphError::UnknownWire(wire));
        }
        self.engine.disconnect_wire(wire)?;
        self.wires.remove(&wire);
        tracing::debug!("Disconnected wire {}", wire);
        Ok(())
    }

    /// Write an input parameter: plain values go straight to the engine,
    /// expressions are resolved into wires
    pub fn write(
        &mut self,
        target: &AttachedParam,
        value: impl Into<WriteValue>,
    ) -> Result<Option<Connection>> {
        if target.param().direction != Direction::Input {
            return Err(GraphError::InvalidDirection(
                "cannot set an output parameter".to_string(),
            ));
        }
        match value.into() {
            WriteValue::Scalar(v) => {
                if target.width() != 1 {
                    return Err(GraphError::WidthMismatch {
                        source: 1,
                        target: target.width(),
                    });
                }
                self.engine
                    .set_value(target.block(), target.param().index, &[v])?;
                Ok(None)
            }
            WriteValue::Channels(values) => {
                if values.len() != target.width() {
                    return Err(GraphError::WidthMismatch {
                        source: values.len(),
                        target: target.width(),
                    });
                }
                self.engine
                    .set_value(target.block(), target.param().index, &values)?;
                Ok(None)
            }
            WriteValue::Expr(expr) => expr.connect(self, target).map(Some),
        }
    }

    /// Read a parameter's current channel values. Pure accessor.
    pub fn value(&self, param: &AttachedParam) -> Result<Vec<Sample>> {
        self.engine.get_value(
            param.block(),
            param.param().direction,
            param.param().index,
            param.width(),
        )
    }

    /// Adjust a committed wire's gain in place
    pub fn tweak_wire_gain(&mut self, wire: WireId, gain: Sample) -> Result<()> {
        self.engine.tweak_wire_gain(wire, gain)?;
        if let Some(record) = self.wires.get_mut(&wire) {
            record.gain = gain;
        }
        Ok(())
    }

    /// Adjust a committed wire's offset in place
    pub fn tweak_wire_offset(&mut self, wire: WireId, offset: Sample) -> Result<()> {
        self.engine.tweak_wire_offset(wire, offset)?;
        if let Some(record) = self.wires.get_mut(&wire) {
            record.offset = offset;
        }
        Ok(())
    }

    /// Route an output parameter to the audio device
    pub fn set_output(&mut self, source: &AttachedParam) -> Result<()> {
        if source.param().direction != Direction::Output {
            return Err(GraphError::InvalidDirection(
                "output routing requires an output parameter".to_string(),
            ));
        }
        self.engine.set_output(source.block(), source.width())
    }

    /// Start the render context
    pub fn start_audio(&mut self) {
        self.engine.start_audio();
    }

    /// Stop the render context, awaiting its acknowledgement
    pub fn stop_audio(&mut self) {
        self.engine.stop_audio();
    }

    fn check_endpoints(&self, source: &AttachedParam, target: &AttachedParam) -> Result<()> {
        if source.param().direction != Direction::Output {
            return Err(GraphError::InvalidDirection(
                "cannot connect from an input parameter".to_string(),
            ));
        }
        if target.param().direction != Direction::Input {
            return Err(GraphError::InvalidDirection(
                "cannot connect to an output parameter".to_string(),
            ));
        }
        if !self.blocks.contains_key(&source.block()) {
            return Err(GraphError::UnknownBlock(source.block()));
        }
        Ok(())
    }

    fn record_wire(
        &mut self,
        id: WireId,
        source: &ScaledParam,
        target_block: Entity,
        target_index: usize,
        transform: Transform,
        mixer_slot: Option<usize>,
    ) {
        self.wires.insert(
            id,
            Wire {
                id,
                source: Endpoint {
                    block: source.source().block(),
                    index: source.source().param().index,
                },
                target: Endpoint {
                    block: target_block,
                    index: target_index,
                },
                width: source.width(),
                gain: source.gain(),
                offset: source.offset(),
                transform,
                mixer_slot,
            },
        );
    }
}
