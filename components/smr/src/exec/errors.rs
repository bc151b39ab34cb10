use crate::instance::SpaceError;

quick_error! {
    #[derive(Debug, Eq, PartialEq)]
    pub enum ExecError {
        Space(e: SpaceError) {
            from(err: SpaceError) -> (err)
            display("instance space: {}", e)
        }
    }
}
