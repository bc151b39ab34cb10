use std::fs::{self, File, OpenOptions};
use std::io::{self, Error, ErrorKind};
use std::path::Path;

use slog::{info, o, Drain, Logger};

use super::log_format::EgalFormat;

/// init_logger builds the root logger of a replica process.
///
/// Records go to `log_path` in append mode, or to stderr if it is None.
/// Formatting and writing happen on a background thread.
pub fn init_logger(log_path: Option<&Path>) -> io::Result<Logger> {
    let logger = match log_path {
        Some(p) => {
            let file = open_log_file(p)?;
            async_logger(slog_term::PlainDecorator::new(file))
        }
        None => async_logger(slog_term::PlainDecorator::new(io::stderr())),
    };

    info!(logger, "logger ready"; "path" => ?log_path);
    Ok(logger)
}

fn async_logger<W>(decorator: slog_term::PlainDecorator<W>) -> Logger
where
    W: io::Write + Send + 'static,
{
    let drain = EgalFormat::new(decorator).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

/// Opens log file with append mode. Creates a new log file if it doesn't exist.
fn open_log_file<P: AsRef<Path>>(path: P) -> io::Result<File> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| {
        Error::new(
            ErrorKind::Other,
            "Unable to get parent directory of log file",
        )
    })?;
    if !parent.as_os_str().is_empty() && !parent.is_dir() {
        fs::create_dir_all(parent)?
    }
    OpenOptions::new().append(true).create(true).open(path)
}
