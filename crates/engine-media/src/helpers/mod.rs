// crates/engine-media/src/helpers/mod.rs
//
// Internal helper modules for engine-media. Not re-exported from lib.rs.

pub mod seek;
