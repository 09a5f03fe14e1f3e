//! Parameter schema tables.
//!
//! Each block kind declares its named input and output parameters once as
//! a data table: ordered `(name, start index)` pairs plus the direction's
//! total channel count. Widths are derived from the gap between
//! consecutive start indices (the last parameter extends to the total).
//! Declaration validates the table eagerly, so a malformed schema fails
//! when the block kind is constructed, not when an instance is used.

use std::sync::Arc;

use modwire_core::{Direction, GraphError, Result, Width};

/// One declared named channel-group of a block kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Start index within this direction's channel range
    pub index: usize,
    /// Channel count
    pub width: Width,
    pub direction: Direction,
}

/// Ordered parameter tables for one block kind.
///
/// Shared across all instances of the kind via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSchema {
    inputs: Vec<Param>,
    outputs: Vec<Param>,
    input_size: Width,
    output_size: Width,
}

impl BlockSchema {
    /// Declare a schema from `(name, start index)` tables.
    ///
    /// Fails with `InvalidSchema` on non-increasing indices, an index past
    /// the direction's total size, or a derived width of zero.
    pub fn declare(
        inputs: &[(&str, usize)],
        input_size: Width,
        outputs: &[(&str, usize)],
        output_size: Width,
    ) -> Result<Arc<Self>> {
        let inputs = Self::derive_params(inputs, input_size, Direction::Input)?;
        let outputs = Self::derive_params(outputs, output_size, Direction::Output)?;
        Ok(Arc::new(Self {
            inputs,
            outputs,
            input_size,
            output_size,
        }))
    }

    fn derive_params(
        decls: &[(&str, usize)],
        total: Width,
        direction: Direction,
    ) -> Result<Vec<Param>> {
        if let Some(&(name, first)) = decls.first() {
            if first != 0 {
                return Err(GraphError::InvalidSchema(format!(
                    "first {direction} parameter '{name}' must start at index 0, got {first}"
                )));
            }
        }
        let mut params = Vec::with_capacity(decls.len());
        for (pos, &(name, index)) in decls.iter().enumerate() {
            let next_start = decls.get(pos + 1).map_or(total, |&(_, next)| next);
            if next_start <= index {
                return Err(GraphError::InvalidSchema(format!(
                    "{direction} parameter indices must be strictly increasing: \
                     '{name}' at {index} is followed by {next_start}"
                )));
            }
            params.push(Param {
                name: name.to_string(),
                index,
                width: next_start - index,
                direction,
            });
        }
        Ok(params)
    }

    /// Look up a declared parameter by direction and name
    #[must_use]
    pub fn param(&self, direction: Direction, name: &str) -> Option<&Param> {
        let table = match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        };
        table.iter().find(|p| p.name == name)
    }

    /// Declared input parameters, in index order
    #[must_use]
    pub fn inputs(&self) -> &[Param] {
        &self.inputs
    }

    /// Declared output parameters, in index order
    #[must_use]
    pub fn outputs(&self) -> &[Param] {
        &self.outputs
    }

    /// Total input channel count
    #[must_use]
    pub fn input_size(&self) -> Width {
        self.input_size
    }

    /// Total output channel count
    #[must_use]
    pub fn output_size(&self) -> Width {
        self.output_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_derived_from_index_gaps() {
        let schema =
            BlockSchema::declare(&[("freq", 0), ("phase", 1), ("shape", 2)], 4, &[("out", 0)], 2)
                .unwrap();

        let freq = schema.param(Direction::Input, "freq").unwrap();
        assert_eq!((freq.index, freq.width), (0, 1));

        // Last input extends to the direction total
        let shape = schema.param(Direction::Input, "shape").unwrap();
        assert_eq!((shape.index, shape.width), (2, 2));

        let out = schema.param(Direction::Output, "out").unwrap();
        assert_eq!((out.index, out.width), (0, 2));
        assert_eq!(out.direction, Direction::Output);
    }

    #[test]
    fn test_non_increasing_indices_fail_at_declaration() {
        let result = BlockSchema::declare(&[("a", 0), ("b", 0)], 2, &[], 0);
        assert!(matches!(result, Err(GraphError::InvalidSchema(_))));

        let result = BlockSchema::declare(&[("a", 0), ("b", 2), ("c", 1)], 4, &[], 0);
        assert!(matches!(result, Err(GraphError::InvalidSchema(_))));
    }

    #[test]
    fn test_last_param_must_fit_total() {
        // Last param starts at 2 but the direction only has 2 channels
        let result = BlockSchema::declare(&[("a", 0), ("b", 2)], 2, &[], 0);
        assert!(matches!(result, Err(GraphError::InvalidSchema(_))));
    }

    #[test]
    fn test_first_param_must_start_at_zero() {
        let result = BlockSchema::declare(&[("a", 1)], 2, &[], 0);
        assert!(matches!(result, Err(GraphError::InvalidSchema(_))));
    }

    #[test]
    fn test_empty_direction_is_valid() {
        // Mixers address their input region by slot, not by name
        let schema = BlockSchema::declare(&[], 8, &[("out", 0)], 1).unwrap();
        assert!(schema.inputs().is_empty());
        assert_eq!(schema.input_size(), 8);
        assert!(schema.param(Direction::Input, "anything").is_none());
    }

    #[test]
    fn test_lookup_respects_direction() {
        let schema = BlockSchema::declare(&[("level", 0)], 1, &[("level", 0)], 1).unwrap();
        assert_eq!(
            schema
                .param(Direction::Input, "level")
                .unwrap()
                .direction,
            Direction::Input
        );
        assert_eq!(
            schema
                .param(Direction::Output, "level")
                .unwrap()
                .direction,
            Direction::Output
        );
    }
}
