quick_error! {
    #[derive(Debug)]
    pub enum WireError {
        IOError(e: std::io::Error) {
            from(e: std::io::Error) -> (e)
            display("io error: {}", e)
        }

        BadTag(tag: u8) {
            display("unknown message tag: {}", tag)
        }

        BadOp(code: u8) {
            display("unknown operation code: {}", code)
        }
    }
}

impl PartialEq<WireError> for WireError {
    fn eq(&self, other: &WireError) -> bool {
        match (self, other) {
            (Self::IOError(a), Self::IOError(b)) => a.kind() == b.kind(),
            (Self::BadTag(a), Self::BadTag(b)) => a == b,
            (Self::BadOp(a), Self::BadOp(b)) => a == b,
            _ => false,
        }
    }
}
