//! Backend abstraction layer.
//!
//! Defines the `EngineBackend` trait that the native render engine
//! implements, plus the vocabulary shared across the boundary: block
//! descriptors, mixer capacities, and wire transforms. The graph layer
//! works against this trait in a backend-agnostic way.

use modwire_core::{
    Direction, Entity, GraphError, MAX_MIXER_CAPACITY, Result, Sample, Width, WireId,
};

/// Supported mixer capacities.
///
/// The native engine specializes mixer summation per fixed size, so each
/// capacity is its own variant rather than a free integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MixerSize {
    M2,
    M4,
    M8,
    M16,
    M32,
}

impl MixerSize {
    /// Number of slots this capacity provides
    #[must_use]
    pub fn capacity(self) -> usize {
        match self {
            Self::M2 => 2,
            Self::M4 => 4,
            Self::M8 => 8,
            Self::M16 => 16,
            Self::M32 => 32,
        }
    }

    /// Look up the variant for an exact capacity
    pub fn from_capacity(capacity: usize) -> Result<Self> {
        match capacity {
            2 => Ok(Self::M2),
            4 => Ok(Self::M4),
            8 => Ok(Self::M8),
            16 => Ok(Self::M16),
            32 => Ok(Self::M32),
            other => Err(GraphError::UnsupportedMixerSize(other)),
        }
    }

    /// Smallest supported capacity that can hold `members` slots.
    ///
    /// Fails once the required power of two exceeds the engine's maximum
    /// specialization (32).
    pub fn for_members(members: usize) -> Result<Self> {
        if members > MAX_MIXER_CAPACITY {
            return Err(GraphError::UnsupportedMixerSize(
                members.next_power_of_two(),
            ));
        }
        let wanted = members.next_power_of_two().max(2);
        Self::from_capacity(wanted)
    }
}

impl std::fmt::Display for MixerSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.capacity())
    }
}

/// Concrete signal-combination rule a wire uses.
///
/// Selected from source/target width and target kind; the mixer variants
/// carry the target mixer's declared capacity because the engine
/// specializes summation per fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// One channel into one channel
    Direct1to1,
    /// One channel duplicated to both channels of a stereo input
    Broadcast1to2,
    /// Two channels into two channels, used for the mixer-output hop of a
    /// summed stereo connection
    Direct2to2,
    /// One channel into one slot of a mono mixer
    MonoToMonoMixer(MixerSize),
    /// One channel broadcast into one stereo slot of a stereo mixer
    MonoToStereoMixer(MixerSize),
    /// Two channels into one stereo slot of a stereo mixer
    StereoToStereoMixer(MixerSize),
}

impl Transform {
    /// Whether this transform terminates in a mixer slot
    #[must_use]
    pub fn targets_mixer(self) -> bool {
        !matches!(
            self,
            Self::Direct1to1 | Self::Broadcast1to2 | Self::Direct2to2
        )
    }
}

/// Descriptor the graph layer hands to `create_block`.
///
/// Construction arguments are the block's initial input values; the
/// backend owns everything past this point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockDesc {
    SineOsc { freq: Sample, amp: Sample },
    MonoToStereo { amp_db: Sample, panning: Sample },
    Product,
    MonoMixer(MixerSize),
    StereoMixer(MixerSize),
}

impl BlockDesc {
    /// Total input channel count of the described block
    #[must_use]
    pub fn input_size(&self) -> Width {
        match self {
            Self::SineOsc { .. } | Self::Product => 2,
            Self::MonoToStereo { .. } => 3,
            Self::MonoMixer(size) => size.capacity(),
            Self::StereoMixer(size) => 2 * size.capacity(),
        }
    }

    /// Total output channel count of the described block
    #[must_use]
    pub fn output_size(&self) -> Width {
        match self {
            Self::SineOsc { .. } | Self::Product | Self::MonoMixer(_) => 1,
            Self::MonoToStereo { .. } | Self::StereoMixer(_) => 2,
        }
    }

    /// Initial input values, in declaration order
    #[must_use]
    pub fn initial_inputs(&self) -> Vec<Sample> {
        match self {
            Self::SineOsc { freq, amp } => vec![*freq, *amp],
            Self::MonoToStereo { amp_db, panning } => vec![0.0, *amp_db, *panning],
            Self::Product => vec![1.0, 1.0],
            Self::MonoMixer(size) => vec![0.0; size.capacity()],
            Self::StereoMixer(size) => vec![0.0; 2 * size.capacity()],
        }
    }
}

/// Per-channel entity ids of one block, as the engine views it
#[derive(Debug, Clone)]
pub struct BlockIo {
    pub input_ids: Vec<Entity>,
    pub output_ids: Vec<Entity>,
}

/// Interface the native render engine exposes to the graph layer.
///
/// All calls are synchronous and fail immediately; none suspends. The
/// backend is responsible for never publishing a partially-constructed
/// block or wire to its render context.
pub trait EngineBackend: Send {
    /// Instantiate a block and return its entity id
    fn create_block(&mut self, desc: &BlockDesc) -> Entity;

    /// View a block's per-channel entity ids
    fn view_block(&self, block: Entity) -> Result<BlockIo>;

    /// Read `width` channels of a parameter starting at `index`
    fn get_value(
        &self,
        block: Entity,
        direction: Direction,
        index: usize,
        width: Width,
    ) -> Result<Vec<Sample>>;

    /// Write a block's input channels starting at `index`
    fn set_value(&mut self, block: Entity, index: usize, value: &[Sample]) -> Result<()>;

    /// Commit a wire between two plain block parameters
    #[allow(clippy::too_many_arguments)]
    fn add_wire(
        &mut self,
        src: Entity,
        dst: Entity,
        src_index: usize,
        dst_index: usize,
        transform: Transform,
        gain: Sample,
        offset: Sample,
    ) -> Result<WireId>;

    /// Commit a wire into a mixer slot (slot index in input channels)
    #[allow(clippy::too_many_arguments)]
    fn add_wire_to_mixer(
        &mut self,
        src: Entity,
        mixer: Entity,
        src_index: usize,
        slot_index: usize,
        transform: Transform,
        gain: Sample,
        offset: Sample,
    ) -> Result<WireId>;

    /// Remove a committed wire
    fn disconnect_wire(&mut self, wire: WireId) -> Result<()>;

    /// Remove a block. The caller (graph registry) guarantees no wires
    /// still reference it.
    fn remove_block(&mut self, block: Entity) -> Result<()>;

    /// Adjust the gain of a committed wire in place
    fn tweak_wire_gain(&mut self, wire: WireId, gain: Sample) -> Result<()>;

    /// Adjust the offset of a committed wire in place
    fn tweak_wire_offset(&mut self, wire: WireId, offset: Sample) -> Result<()>;

    /// Route a block output to the audio device
    fn set_output(&mut self, block: Entity, width: Width) -> Result<()>;

    /// Start the render context
    fn start_audio(&mut self);

    /// Stop the render context. Must not return until the render context
    /// has acknowledged the stop and can no longer observe graph state.
    fn stop_audio(&mut self);
}
