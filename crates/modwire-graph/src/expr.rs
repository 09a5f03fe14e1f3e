//! Parameter expression algebra.
//!
//! Parameter references combine with ordinary `+` and `*` into pending
//! connections: `a * 0.5 + b * 0.25 + 3.0` is a summed signal with
//! per-term gains and a constant offset, and `expr.connect(...)` performs
//! the structural graph surgery that realizes it — one wire for a scaled
//! reference, an auto-inserted fixed-capacity mixer for a sum.
//!
//! Expression values are transient and stack-lived; they reference blocks
//! but never own them, and they never mutate shared state except through
//! `connect`, which funnels into the registry. Operators are total: width
//! and direction validation happens once at `connect`, before any engine
//! call, so a failed connect leaves the graph untouched.

use std::ops::{Add, Mul};

use smallvec::{SmallVec, smallvec};

use modwire_core::{Entity, GraphError, Result, Sample, Width, WireId};
use modwire_engine::EngineBackend;

use crate::registry::{Connection, GraphRegistry, MixDown};
use crate::schema::Param;

/// A concrete reference to one parameter of one block instance
#[derive(Debug, Clone)]
pub struct AttachedParam {
    block: Entity,
    param: Param,
}

impl AttachedParam {
    pub(crate) fn new(block: Entity, param: Param) -> Self {
        Self { block, param }
    }

    #[must_use]
    pub fn block(&self) -> Entity {
        self.block
    }

    #[must_use]
    pub fn param(&self) -> &Param {
        &self.param
    }

    #[must_use]
    pub fn width(&self) -> Width {
        self.param.width
    }

    /// Promote to a unity-gain scaled reference
    #[must_use]
    pub fn scaled(&self) -> ScaledParam {
        ScaledParam {
            source: self.clone(),
            gain: 1.0,
            offset: 0.0,
        }
    }

    /// Connect this output directly to an input parameter
    pub fn connect<E: EngineBackend>(
        &self,
        registry: &mut GraphRegistry<E>,
        target: &AttachedParam,
    ) -> Result<WireId> {
        self.scaled().connect(registry, target)
    }
}

/// An affine transform of one parameter reference: `gain * x + offset`
#[derive(Debug, Clone)]
pub struct ScaledParam {
    pub(crate) source: AttachedParam,
    pub(crate) gain: Sample,
    pub(crate) offset: Sample,
}

impl ScaledParam {
    #[must_use]
    pub fn source(&self) -> &AttachedParam {
        &self.source
    }

    #[must_use]
    pub fn gain(&self) -> Sample {
        self.gain
    }

    #[must_use]
    pub fn offset(&self) -> Sample {
        self.offset
    }

    #[must_use]
    pub fn width(&self) -> Width {
        self.source.width()
    }

    /// Emit exactly one wire carrying this gain and offset
    pub fn connect<E: EngineBackend>(
        &self,
        registry: &mut GraphRegistry<E>,
        target: &AttachedParam,
    ) -> Result<WireId> {
        registry.connect(self, target)
    }
}

/// An ordered, flat collection of same-width scaled references plus a
/// pending constant, representing a summed signal with no destination yet
#[derive(Debug, Clone)]
pub struct AddedParams {
    pub(crate) members: SmallVec<[ScaledParam; 4]>,
    /// Bare numeric addends fold here and ride the mixer-output wire;
    /// they never consume a mixer slot
    pub(crate) constant: Sample,
}

impl AddedParams {
    fn pair(a: ScaledParam, b: ScaledParam) -> Self {
        Self {
            members: smallvec![a, b],
            constant: 0.0,
        }
    }

    #[must_use]
    pub fn members(&self) -> &[ScaledParam] {
        &self.members
    }

    #[must_use]
    pub fn constant(&self) -> Sample {
        self.constant
    }

    /// Realize the sum: instantiate a mixer sized to the member count,
    /// wire each member (with its own gain and offset) into successive
    /// slots, then wire the mixer output into `target`
    pub fn connect<E: EngineBackend>(
        &self,
        registry: &mut GraphRegistry<E>,
        target: &AttachedParam,
    ) -> Result<MixDown> {
        registry.connect_sum(self, target)
    }
}

/// A pending product of parameter expressions.
///
/// Constructed by `*` between two references; `connect` is deferred until
/// a product block is wired up by the algebra.
#[derive(Debug, Clone)]
pub struct MultipliedParams {
    pub(crate) lhs: ScaledParam,
    pub(crate) rhs: ScaledParam,
}

impl MultipliedParams {
    pub fn connect<E: EngineBackend>(
        &self,
        _registry: &mut GraphRegistry<E>,
        _target: &AttachedParam,
    ) -> Result<Connection> {
        Err(GraphError::NotImplemented(
            "multiplicative parameter expressions",
        ))
    }
}

/// Any parameter expression, for APIs that accept all of them
#[derive(Debug, Clone)]
pub enum ParamExpr {
    Attached(AttachedParam),
    Scaled(ScaledParam),
    Added(AddedParams),
    Multiplied(MultipliedParams),
}

impl ParamExpr {
    /// Resolve the expression into concrete wires targeting `target`
    pub fn connect<E: EngineBackend>(
        &self,
        registry: &mut GraphRegistry<E>,
        target: &AttachedParam,
    ) -> Result<Connection> {
        match self {
            Self::Attached(p) => p.connect(registry, target).map(Connection::Wire),
            Self::Scaled(p) => p.connect(registry, target).map(Connection::Wire),
            Self::Added(p) => p.connect(registry, target).map(Connection::Mix),
            Self::Multiplied(p) => p.connect(registry, target),
        }
    }
}

impl From<AttachedParam> for ParamExpr {
    fn from(p: AttachedParam) -> Self {
        Self::Attached(p)
    }
}

impl From<ScaledParam> for ParamExpr {
    fn from(p: ScaledParam) -> Self {
        Self::Scaled(p)
    }
}

impl From<AddedParams> for ParamExpr {
    fn from(p: AddedParams) -> Self {
        Self::Added(p)
    }
}

impl From<MultipliedParams> for ParamExpr {
    fn from(p: MultipliedParams) -> Self {
        Self::Multiplied(p)
    }
}

// --- AttachedParam operators -------------------------------------------------

impl Add<Sample> for AttachedParam {
    type Output = ScaledParam;

    fn add(self, rhs: Sample) -> ScaledParam {
        ScaledParam {
            source: self,
            gain: 1.0,
            offset: rhs,
        }
    }
}

impl Add<AttachedParam> for Sample {
    type Output = ScaledParam;

    fn add(self, rhs: AttachedParam) -> ScaledParam {
        rhs + self
    }
}

impl Add<AttachedParam> for AttachedParam {
    type Output = AddedParams;

    fn add(self, rhs: AttachedParam) -> AddedParams {
        AddedParams::pair(self.scaled(), rhs.scaled())
    }
}

impl Add<ScaledParam> for AttachedParam {
    type Output = AddedParams;

    fn add(self, rhs: ScaledParam) -> AddedParams {
        AddedParams::pair(self.scaled(), rhs)
    }
}

impl Mul<Sample> for AttachedParam {
    type Output = ScaledParam;

    fn mul(self, rhs: Sample) -> ScaledParam {
        ScaledParam {
            source: self,
            gain: rhs,
            offset: 0.0,
        }
    }
}

impl Mul<AttachedParam> for Sample {
    type Output = ScaledParam;

    fn mul(self, rhs: AttachedParam) -> ScaledParam {
        rhs * self
    }
}

impl Mul<AttachedParam> for AttachedParam {
    type Output = MultipliedParams;

    fn mul(self, rhs: AttachedParam) -> MultipliedParams {
        MultipliedParams {
            lhs: self.scaled(),
            rhs: rhs.scaled(),
        }
    }
}

// --- ScaledParam operators ---------------------------------------------------

impl Add<Sample> for ScaledParam {
    type Output = ScaledParam;

    fn add(mut self, rhs: Sample) -> ScaledParam {
        self.offset += rhs;
        self
    }
}

impl Add<ScaledParam> for Sample {
    type Output = ScaledParam;

    fn add(self, rhs: ScaledParam) -> ScaledParam {
        rhs + self
    }
}

impl Add<AttachedParam> for ScaledParam {
    type Output = AddedParams;

    fn add(self, rhs: AttachedParam) -> AddedParams {
        AddedParams::pair(self, rhs.scaled())
    }
}

impl Add<ScaledParam> for ScaledParam {
    type Output = AddedParams;

    fn add(self, rhs: ScaledParam) -> AddedParams {
        AddedParams::pair(self, rhs)
    }
}

impl Add<AddedParams> for ScaledParam {
    type Output = AddedParams;

    fn add(self, mut rhs: AddedParams) -> AddedParams {
        rhs.members.insert(0, self);
        rhs
    }
}

impl Mul<Sample> for ScaledParam {
    type Output = ScaledParam;

    /// Linearity: `(g·x + o)·k = (g·k)·x + (o·k)`
    fn mul(mut self, rhs: Sample) -> ScaledParam {
        self.gain *= rhs;
        self.offset *= rhs;
        self
    }
}

impl Mul<ScaledParam> for Sample {
    type Output = ScaledParam;

    fn mul(self, rhs: ScaledParam) -> ScaledParam {
        rhs * self
    }
}

impl Mul<ScaledParam> for ScaledParam {
    type Output = MultipliedParams;

    fn mul(self, rhs: ScaledParam) -> MultipliedParams {
        MultipliedParams {
            lhs: self,
            rhs,
        }
    }
}

// --- AddedParams operators ---------------------------------------------------

impl Add<Sample> for AddedParams {
    type Output = AddedParams;

    fn add(mut self, rhs: Sample) -> AddedParams {
        self.constant += rhs;
        self
    }
}

impl Add<AddedParams> for Sample {
    type Output = AddedParams;

    fn add(self, rhs: AddedParams) -> AddedParams {
        rhs + self
    }
}

impl Add<AttachedParam> for AddedParams {
    type Output = AddedParams;

    fn add(mut self, rhs: AttachedParam) -> AddedParams {
        self.members.push(rhs.scaled());
        self
    }
}

impl Add<ScaledParam> for AddedParams {
    type Output = AddedParams;

    fn add(mut self, rhs: ScaledParam) -> AddedParams {
        self.members.push(rhs);
        self
    }
}

impl Add<AddedParams> for AddedParams {
    type Output = AddedParams;

    /// Flattens: members stay one flat sequence, never nested
    fn add(mut self, rhs: AddedParams) -> AddedParams {
        self.members.extend(rhs.members);
        self.constant += rhs.constant;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modwire_core::Direction;

    fn attached(entity: u64, width: Width) -> AttachedParam {
        AttachedParam::new(
            Entity(entity),
            Param {
                name: "out".to_string(),
                index: 0,
                width,
                direction: Direction::Output,
            },
        )
    }

    #[test]
    fn test_attached_plus_number_folds_into_offset() {
        let scaled = attached(1, 1) + 3.0;
        assert_eq!(scaled.gain(), 1.0);
        assert_eq!(scaled.offset(), 3.0);

        // Commutes
        let scaled = 3.0 + attached(1, 1);
        assert_eq!(scaled.offset(), 3.0);
    }

    #[test]
    fn test_scaling_preserves_linearity() {
        // (x + 2) * 3 = 3x + 6
        let scaled = (attached(1, 1) + 2.0) * 3.0;
        assert_eq!(scaled.gain(), 3.0);
        assert_eq!(scaled.offset(), 6.0);

        let scaled = 0.5 * attached(1, 1);
        assert_eq!(scaled.gain(), 0.5);
        assert_eq!(scaled.offset(), 0.0);
    }

    #[test]
    fn test_sum_of_scaled_params() {
        let sum = attached(1, 1) * 0.5 + attached(2, 1) * 0.25;
        assert_eq!(sum.members().len(), 2);
        assert_eq!(sum.members()[0].gain(), 0.5);
        assert_eq!(sum.members()[1].gain(), 0.25);
        assert_eq!(sum.constant(), 0.0);
    }

    #[test]
    fn test_constant_addend_never_becomes_a_member() {
        let sum = attached(1, 1) * 0.5 + attached(2, 1) * 0.25 + 3.0;
        assert_eq!(sum.members().len(), 2);
        assert_eq!(sum.constant(), 3.0);
    }

    #[test]
    fn test_added_params_stay_flat() {
        let left = attached(1, 1) + attached(2, 1);
        let right = attached(3, 1) + attached(4, 1);
        let sum = left + right;
        assert_eq!(sum.members().len(), 4);

        // Prepending a scaled param keeps order
        let sum = attached(5, 1) * 2.0 + sum;
        assert_eq!(sum.members().len(), 5);
        assert_eq!(sum.members()[0].gain(), 2.0);
        assert_eq!(sum.members()[0].source().block(), Entity(5));
    }

    #[test]
    fn test_attached_plus_attached_promotes_to_unity_members() {
        let sum = attached(1, 1) + attached(2, 1);
        for member in sum.members() {
            assert_eq!(member.gain(), 1.0);
            assert_eq!(member.offset(), 0.0);
        }
    }

    #[test]
    fn test_multiplication_of_params_is_deferred() {
        let product = attached(1, 1) * attached(2, 1);
        assert_eq!(product.lhs.source().block(), Entity(1));
        assert_eq!(product.rhs.source().block(), Entity(2));
    }
}
