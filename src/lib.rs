// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod cmd;
pub mod emit;
pub mod resolve;
pub mod schema;
pub mod validate;
pub mod xml;
