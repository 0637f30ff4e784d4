use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Tees log output to stdout and, optionally, a file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(Arc::new(Mutex::new(File::create(path)?))),
            None => None,
        };
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = &self.file {
            let mut handle = file.lock().map_err(|_| io::Error::other("log file lock poisoned"))?;
            handle.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &self.file {
            let mut handle = file.lock().map_err(|_| io::Error::other("log file lock poisoned"))?;
            handle.flush()?;
        }
        Ok(())
    }
}

/// Keeps the first `head` and the last `tail` step lines so a failure can be
/// replayed without logging every step.
pub(crate) struct EventLog {
    head: Vec<String>,
    head_limit: usize,
    tail: VecDeque<String>,
    tail_limit: usize,
    dropped: u64,
}

impl EventLog {
    pub(crate) fn new(head_limit: usize, tail_limit: usize) -> Self {
        Self {
            head: Vec::with_capacity(head_limit),
            head_limit,
            tail: VecDeque::with_capacity(tail_limit),
            tail_limit,
            dropped: 0,
        }
    }

    pub(crate) fn record(&mut self, line: String) {
        if self.head.len() < self.head_limit {
            self.head.push(line);
            return;
        }
        if self.tail.len() == self.tail_limit {
            self.tail.pop_front();
            self.dropped += 1;
        }
        if self.tail_limit > 0 {
            self.tail.push_back(line);
        }
    }

    pub(crate) fn dump_failure(&self, reason: &str) {
        tracing::error!("invariant violated: {reason}");
        for line in &self.head {
            tracing::error!("{line}");
        }
        if self.dropped > 0 {
            tracing::error!("... {} steps omitted ...", self.dropped);
        }
        for line in &self.tail {
            tracing::error!("{line}");
        }
    }
}
