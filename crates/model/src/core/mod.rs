pub mod identifiers;
pub mod kind;
