use std::io;

use chrono::{Local, Utc};
use slog::{Drain, OwnedKVList, Record, KV};
use slog_term::{Decorator, RecordDecorator, Serializer};

pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f %:z";

/// EgalFormat writes one line per record:
/// `[timestamp] [LEVEL] [file:line] msg, k: v, k: v`.
pub struct EgalFormat<D>
where
    D: Decorator,
{
    decorator: D,
    utc: bool,
}

impl<D> Drain for EgalFormat<D>
where
    D: Decorator,
{
    type Ok = ();
    type Err = io::Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> io::Result<()> {
        self.decorator.with_record(record, values, |rd| {
            self.write_header(rd, record)?;

            rd.start_whitespace()?;
            write!(rd, " ")?;
            rd.start_msg()?;
            write!(rd, "{}", record.msg())?;

            // `, k: v` after the message; reversed so record kvs print in the order written
            let mut serializer = Serializer::new(rd, true, true);
            record.kv().serialize(record, &mut serializer)?;
            values.serialize(record, &mut serializer)?;
            serializer.finish()?;

            rd.start_whitespace()?;
            writeln!(rd)?;
            rd.flush()
        })
    }
}

impl<D> EgalFormat<D>
where
    D: Decorator,
{
    /// new formats timestamps in local time.
    pub fn new(decorator: D) -> EgalFormat<D> {
        EgalFormat {
            decorator,
            utc: false,
        }
    }

    /// utc formats timestamps in UTC.
    pub fn utc(decorator: D) -> EgalFormat<D> {
        EgalFormat {
            decorator,
            utc: true,
        }
    }

    fn write_header(&self, rd: &mut dyn RecordDecorator, record: &Record) -> io::Result<()> {
        rd.start_timestamp()?;
        if self.utc {
            write!(rd, "[{}]", Utc::now().format(TIMESTAMP_FORMAT))?;
        } else {
            write!(rd, "[{}]", Local::now().format(TIMESTAMP_FORMAT))?;
        }

        rd.start_whitespace()?;
        write!(rd, " ")?;
        rd.start_level()?;
        write!(rd, "[{}]", record.level().as_short_str())?;

        rd.start_whitespace()?;
        write!(rd, " ")?;

        // there is no `start_location()`
        rd.start_msg()?;
        write!(rd, "[{}:{}]", record.file(), record.line())
    }
}
