use chrono::Local;
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Stderr, Stdout, Write};
use std::path::{Path, PathBuf};
use std::thread::ThreadId;

/// Severity of a log record. Lower levels are more severe; a world configured
/// with `max_log_level = Info` forwards `Error`, `Warning` and `Info` records
/// and drops `Verbose` ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Verbose,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
        }
    }

    pub fn letter(self) -> char {
        match self {
            LogLevel::Error => 'E',
            LogLevel::Warning => 'W',
            LogLevel::Info => 'I',
            LogLevel::Verbose => 'V',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single structured log record. Wall-clock timestamps are not part of the
/// record; sinks stamp records as they write them.
#[derive(Clone, Debug)]
pub struct Record {
    pub level: LogLevel,
    pub world: String,
    pub thread_id: ThreadId,
    pub message: String,
}

/// Sink for world log records.
///
/// `log` may be called from several threads simultaneously, so implementations
/// must serialize writes themselves. Level filtering has already happened by
/// the time a record reaches the sink.
pub trait Logger: Send + Sync {
    fn log(&self, record: &Record) -> io::Result<()>;
}

fn timestamp() -> impl fmt::Display {
    Local::now().format("%Y-%m-%d %H:%M:%S")
}

/// Line-oriented sink writing
/// `YYYY-MM-DD HH:MM:SS | <E|W|I|V> | <world> | <thread> | <message>`.
pub struct StreamLogger<W: Write + Send> {
    stream: Mutex<W>,
}

impl<W: Write + Send> StreamLogger<W> {
    pub fn new(stream: W) -> StreamLogger<W> {
        StreamLogger {
            stream: Mutex::new(stream),
        }
    }
}

impl StreamLogger<Stdout> {
    pub fn stdout() -> StreamLogger<Stdout> {
        StreamLogger::new(io::stdout())
    }
}

impl StreamLogger<Stderr> {
    pub fn stderr() -> StreamLogger<Stderr> {
        StreamLogger::new(io::stderr())
    }
}

impl<W: Write + Send> Logger for StreamLogger<W> {
    fn log(&self, record: &Record) -> io::Result<()> {
        let mut stream = self.stream.lock();
        writeln!(
            stream,
            "{} | {} | {} | {:?} | {}",
            timestamp(),
            record.level.letter(),
            record.world,
            record.thread_id,
            record.message
        )?;
        stream.flush()
    }
}

/// CSV file sink. Writes a `time,log_level,world_name,thread_id,message`
/// header on creation; free-form fields are quoted with embedded quotes
/// doubled. Every record is flushed so a crash loses at most the record
/// being written.
pub struct CsvLogger {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl CsvLogger {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<CsvLogger> {
        let path = path.as_ref().to_path_buf();
        let mut file = BufWriter::new(File::create(&path)?);
        writeln!(file, "time,log_level,world_name,thread_id,message")?;
        file.flush()?;
        Ok(CsvLogger {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

impl Logger for CsvLogger {
    fn log(&self, record: &Record) -> io::Result<()> {
        let mut file = self.file.lock();
        writeln!(
            file,
            "{},{},{},{:?},{}",
            quote(&timestamp().to_string()),
            record.level,
            quote(&record.world),
            record.thread_id,
            quote(&record.message)
        )?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn new() -> SharedBuffer {
            SharedBuffer(Arc::new(Mutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(level: LogLevel, message: &str) -> Record {
        Record {
            level,
            world: "test".to_string(),
            thread_id: thread::current().id(),
            message: message.to_string(),
        }
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Verbose);
    }

    #[test]
    fn stream_logger_writes_pipe_separated_fields() {
        let buffer = SharedBuffer::new();
        let logger = StreamLogger::new(buffer.clone());
        logger.log(&record(LogLevel::Info, "it lives")).unwrap();

        let line = buffer.contents();
        let fields: Vec<&str> = line.trim_end().split(" | ").collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[1], "I");
        assert_eq!(fields[2], "test");
        assert_eq!(fields[4], "it lives");
        // timestamp looks like a date
        assert_eq!(fields[0].len(), 19);
    }

    #[test]
    fn stream_logger_serializes_concurrent_writers() {
        let buffer = SharedBuffer::new();
        let logger = Arc::new(StreamLogger::new(buffer.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let logger = logger.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        logger.log(&record(LogLevel::Info, "line")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = buffer.contents();
        assert_eq!(contents.lines().count(), 400);
        assert!(contents.lines().all(|l| l.ends_with("| line")));
    }

    #[test]
    fn csv_logger_writes_header_and_quotes_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.csv");
        let logger = CsvLogger::create(&path).unwrap();
        assert_eq!(logger.path(), path.as_path());

        logger
            .log(&record(LogLevel::Warning, "she said \"hi\""))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "time,log_level,world_name,thread_id,message"
        );
        let row = lines.next().unwrap();
        assert!(row.contains(",warning,"));
        assert!(row.contains("\"test\""));
        assert!(row.ends_with("\"she said \"\"hi\"\"\""));
    }

    #[test]
    fn csv_logger_create_fails_for_bad_path() {
        assert!(CsvLogger::create("/definitely/not/a/dir/world.csv").is_err());
    }
}
