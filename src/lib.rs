#[macro_use]
extern crate quick_error;

pub mod conf;
pub mod replica;
pub mod server;
pub mod setup;

pub use conf::*;
pub use replica::*;
pub use server::*;
