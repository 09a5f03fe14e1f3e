//! Core types, identifiers, and the error taxonomy shared across the
//! modwire ecosystem.
//!
//! This crate provides the fundamental vocabulary that all other modwire
//! crates depend on.

/// Audio sample type (32-bit float, matching the native engine)
pub type Sample = f32;

/// Channel count of a parameter or wire segment
pub type Width = usize;

/// Sample rate in Hz
pub type SampleRate = u32;

/// Number of audio frames (samples per channel)
pub type Frames = usize;

/// Opaque identifier issued by the native engine for one block instance.
///
/// Carries no semantics beyond identity and lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub u64);

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Identifier of one committed wire in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(pub u64);

impl std::fmt::Display for WireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wire#{}", self.0)
    }
}

/// Direction of a declared block parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Largest mixer capacity the native engine specializes for.
pub const MAX_MIXER_CAPACITY: usize = 32;

/// Convert a decibel value to a linear gain factor.
#[must_use]
pub fn db_to_linear(db: Sample) -> Sample {
    10.0_f32.powf(db / 20.0)
}

/// Errors raised by graph construction and mutation.
///
/// Every failure is local and synchronous; nothing here is retried or
/// transient. A failed mutation leaves the graph exactly as it was before
/// the call.
// Note: `Display` and `Error` are implemented by hand rather than via
// `thiserror::Error` because several variants have a field named `source`
// (a channel `Width`), which thiserror would otherwise infer as the error
// source and require to implement `std::error::Error`.
#[derive(Debug)]
pub enum GraphError {
    /// Endpoints have incompatible channel counts
    WidthMismatch { source: Width, target: Width },

    /// Connecting output to output, input to input, or writing an output parameter
    InvalidDirection(String),

    /// No wire transform exists for the given width/kind combination
    UnsupportedWireShape { source: Width, target: Width },

    /// Requested mixer capacity is not a supported power of two, or exceeds the maximum
    UnsupportedMixerSize(usize),

    /// Mixer has no contiguous free run of the required width
    NoFreeSlot { mixer: Entity, width: Width },

    /// Operating on a wire id that does not exist
    UnknownWire(WireId),

    /// Removing a block that still has live wires attached
    DanglingWire { block: Entity, wires: usize },

    /// Explicitly deferred feature
    NotImplemented(&'static str),

    /// Schema declaration failed (caught at block-kind construction, not instance use)
    InvalidSchema(String),

    /// Named parameter not declared on this block kind
    UnknownParam {
        block: Entity,
        direction: Direction,
        name: String,
    },

    /// Operating on an entity the registry has never seen
    UnknownBlock(Entity),

    /// An input already driven by a wire cannot accept a second one
    InputOccupied { block: Entity, index: usize },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WidthMismatch { source, target } => write!(
                f,
                "width mismatch: source is {source} channel(s), target is {target}"
            ),
            Self::InvalidDirection(msg) => write!(f, "invalid direction: {msg}"),
            Self::UnsupportedWireShape { source, target } => write!(
                f,
                "no wire transform for source width {source} into target width {target}"
            ),
            Self::UnsupportedMixerSize(size) => write!(
                f,
                "unsupported mixer capacity {size} (supported: 2, 4, 8, 16, 32)"
            ),
            Self::NoFreeSlot { mixer, width } => {
                write!(f, "mixer {mixer} has no free run of {width} slot(s)")
            }
            Self::UnknownWire(id) => write!(f, "unknown wire {id}"),
            Self::DanglingWire { block, wires } => write!(
                f,
                "block {block} still has {wires} wire(s) attached; disconnect them first"
            ),
            Self::NotImplemented(what) => write!(f, "not implemented: {what}"),
            Self::InvalidSchema(msg) => write!(f, "invalid schema: {msg}"),
            Self::UnknownParam {
                block,
                direction,
                name,
            } => write!(
                f,
                "block {block} has no {direction} parameter named '{name}'"
            ),
            Self::UnknownBlock(entity) => write!(f, "unknown block {entity}"),
            Self::InputOccupied { block, index } => write!(
                f,
                "input {index} of block {block} is already driven by a wire"
            ),
        }
    }
}

impl std::error::Error for GraphError {}

/// Result type alias using our error taxonomy
pub type Result<T> = std::result::Result<T, GraphError>;
