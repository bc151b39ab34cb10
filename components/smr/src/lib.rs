#[macro_use]
extern crate quick_error;

#[macro_use]
pub mod macros;

pub mod command;
pub mod exec;
pub mod instance;
pub mod reply;
pub mod workload;

pub use command::*;
pub use exec::*;
pub use instance::*;
pub use reply::*;
pub use workload::*;
