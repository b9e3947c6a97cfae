use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared append handle on the JSONL log. Complete lines reach disk as soon
/// as they are written so `tail -f | jq` never sees a partial object.
#[derive(Clone)]
pub struct FileLogWriter {
    file: Arc<Mutex<LineWriter<File>>>,
}

impl FileLogWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(LineWriter::new(file))),
        })
    }
}

impl Write for FileLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for FileLogWriter {
    type Writer = FileLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_appended_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/client.jsonl");

        let writer = FileLogWriter::open(&path).unwrap();
        writer.make_writer().write_all(b"{\"n\":1}\n").unwrap();
        writer.make_writer().write_all(b"{\"n\":2}\n").unwrap();

        // Reopening must not truncate.
        FileLogWriter::open(&path)
            .unwrap()
            .make_writer()
            .write_all(b"{\"n\":3}\n")
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with("{\"n\":3}\n"));
    }
}
