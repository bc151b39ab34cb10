mod conf;
mod errors;

pub use self::conf::*;
pub use errors::*;
