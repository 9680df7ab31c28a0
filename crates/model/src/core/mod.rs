pub mod identifiers;
pub mod operation;
