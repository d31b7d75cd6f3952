//! The prelude exports the types which are useful in representing
//! things to do with the HP 2100 and HP 1000.  Providing this prelude
//! is the main purpose of the base crate.
pub use super::instruction::*;
pub use super::types::*;
pub use super::{la, sc};
