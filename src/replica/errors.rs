use smr::{ExecError, SpaceError};

quick_error! {
    #[derive(Debug, PartialEq)]
    pub enum ReplicaError {
        Space(e: SpaceError) {
            from(e: SpaceError) -> (e)
            display("instance space: {}", e)
        }

        Exec(e: ExecError) {
            from(e: ExecError) -> (e)
            display("execute: {}", e)
        }

        Closed {
            display("replica stopped accepting proposals")
        }
    }
}
