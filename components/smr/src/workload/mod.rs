mod state;
pub use state::*;

mod workload;
pub use workload::*;
