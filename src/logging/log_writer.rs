use anyhow::Context;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::MakeWriter;

enum LogTask {
    Write(usize, Vec<u8>),
    Flush(usize),
    Reopen,
    AddFile(usize, PathBuf, File),
    Shutdown,
}

fn channel_closed() -> io::Error {
    io::Error::other("log writer is not running")
}

pub struct Writer<'a> {
    id: usize,
    sender: &'a mpsc::Sender<LogTask>,
}

impl Write for Writer<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .try_send(LogTask::Write(self.id, buf.to_vec()))
            .map_err(|_| channel_closed())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sender
            .try_send(LogTask::Flush(self.id))
            .map_err(|_| channel_closed())
    }
}

pub struct FileWriter {
    id: usize,
    sender: mpsc::Sender<LogTask>,
}

impl<'a> MakeWriter<'a> for FileWriter {
    type Writer = Writer<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Writer {
            id: self.id,
            sender: &self.sender,
        }
    }
}

/// Funnels log lines to files through a single background task, so the log
/// files can be reopened after rotation without touching the subscriber.
pub struct LogWriter {
    next_id: usize,
    sender: mpsc::Sender<LogTask>,
    handles: HashMap<PathBuf, File>,
}

impl LogWriter {
    pub fn new() -> (Self, JoinHandle<anyhow::Result<()>>) {
        let (sender, mut tasks) = mpsc::channel::<LogTask>(256);
        let handle = tokio::spawn(async move {
            let mut files: HashMap<usize, (PathBuf, File)> = HashMap::new();
            while let Some(task) = tasks.recv().await {
                match task {
                    LogTask::Write(id, buf) => {
                        let Some((_, file)) = files.get_mut(&id) else {
                            continue;
                        };
                        if let Err(err) = file.write_all(&buf) {
                            eprintln!("Failed to write to log file: {err}");
                        }
                    }
                    LogTask::Flush(id) => {
                        let Some((_, file)) = files.get_mut(&id) else {
                            continue;
                        };
                        if let Err(err) = file.flush() {
                            eprintln!("Failed to flush log file: {err}");
                        }
                    }
                    LogTask::Reopen => {
                        for (path, file) in files.values_mut() {
                            *file = Self::open(path)?;
                        }
                    }
                    LogTask::AddFile(id, path, file) => {
                        files.insert(id, (path, file));
                    }
                    LogTask::Shutdown => break,
                }
            }
            for (_, file) in files.values_mut() {
                file.flush().ok();
            }
            Ok(())
        });
        (
            Self {
                next_id: 0,
                sender,
                handles: HashMap::new(),
            },
            handle,
        )
    }

    fn open(path: &Path) -> anyhow::Result<File> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("Failed to open log file '{}'", path.display()))
    }

    pub fn create_file_writer(&mut self, path: impl AsRef<Path>) -> anyhow::Result<FileWriter> {
        let path = path.as_ref().to_path_buf();
        let file = match self.handles.get(&path) {
            Some(file) => file.try_clone()?,
            None => {
                let file = Self::open(&path)?;
                let clone = file.try_clone()?;
                self.handles.insert(path.clone(), file);
                clone
            }
        };
        self.next_id += 1;
        self.sender
            .try_send(LogTask::AddFile(self.next_id, path, file))
            .map_err(|_| channel_closed())?;
        Ok(FileWriter {
            id: self.next_id,
            sender: self.sender.clone(),
        })
    }

    /// Reopens every log file, for use after logrotate moved them away.
    pub fn reopen(&self) -> anyhow::Result<()> {
        self.sender
            .try_send(LogTask::Reopen)
            .map_err(|_| channel_closed())?;
        Ok(())
    }

    pub fn shutdown(&self) {
        if self.sender.try_send(LogTask::Shutdown).is_err() {
            eprintln!("log writer already stopped");
        }
    }
}
