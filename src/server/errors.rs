use tokio::task::JoinError;

quick_error! {
    #[derive(Debug)]
    pub enum ServerError {
        IOError(e: std::io::Error) {
            from(e: std::io::Error) -> (e)
            display("io error: {}", e)
        }

        Join(e: JoinError) {
            from(e: JoinError) -> (e)
            display("server task: {}", e)
        }

        NotStarted {
            display("server not started")
        }

        AlreadyStarted {
            display("server already started")
        }

        RxClosed {
            display("stop signal receiver closed")
        }
    }
}
