mod errors;
pub use errors::*;

mod replica;
pub use replica::*;
