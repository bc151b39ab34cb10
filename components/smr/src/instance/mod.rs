mod errors;
pub use errors::*;

mod instance;
pub use instance::*;

mod space;
pub use space::*;
