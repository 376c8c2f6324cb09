//! Field mapping and row validation.
//!
//! Provides rule types, source-column mapping, and a pure-logic evaluator
//! -- all without store or file dependencies.

pub mod evaluator;
pub mod mapping;
pub mod rules;

pub use evaluator::CompiledRules;
pub use mapping::{map_row, FieldMapping, RowRecord};
pub use rules::{CustomCheck, FieldType, ImportError, ValidationRule, ValidationRules};
