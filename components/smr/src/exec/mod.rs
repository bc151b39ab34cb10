mod errors;
pub use errors::*;

mod exec;
pub use exec::*;

mod tarjan;

#[cfg(test)]
mod test_exec;
