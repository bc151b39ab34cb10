//! Fixed size little-endian frames exchanged between clients and a replica.

#[macro_use]
extern crate quick_error;

mod codec;
pub use codec::*;

mod errors;
pub use errors::*;
