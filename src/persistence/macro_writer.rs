use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{channel, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No free file name left for {}", .0.display())]
    NoFreeName(PathBuf),

    #[error("Persistence worker is not running")]
    WorkerGone,
}

/// Renders opcode lines as file content: one per line, newline-terminated
pub fn render(lines: &[String]) -> String {
    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    content
}

/// Writes recordings to `<output_dir>/<prefix><timestamp>.txt`
#[derive(Debug, Clone)]
pub struct MacroWriter {
    output_dir: PathBuf,
    file_prefix: String,
}

impl MacroWriter {
    pub fn new(output_dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for a recording stopped at `stamp`. Later attempts get a
    /// `-<n>` suffix so two recordings in the same second do not collide.
    pub fn file_name(&self, stamp: DateTime<Local>, attempt: u32) -> String {
        let stamp = stamp.format(TIMESTAMP_FORMAT);
        if attempt == 0 {
            format!("{}{}.txt", self.file_prefix, stamp)
        } else {
            format!("{}{}-{}.txt", self.file_prefix, stamp, attempt)
        }
    }

    pub async fn write(&self, lines: &[String]) -> Result<PathBuf, PersistenceError> {
        self.write_at(Local::now(), lines).await
    }

    pub async fn write_at(
        &self,
        stamp: DateTime<Local>,
        lines: &[String],
    ) -> Result<PathBuf, PersistenceError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.output_dir.clone(),
                source,
            })?;

        let content = render(lines);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.output_dir.join(self.file_name(stamp, attempt));

            // create_new so an existing recording is never overwritten
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("{} already exists, trying next name", path.display());
                    continue;
                }
                Err(source) => return Err(PersistenceError::Io { path, source }),
            };

            return match write_contents(&mut file, &content).await {
                Ok(()) => {
                    info!("Saved {} opcodes to {}", lines.len(), path.display());
                    Ok(path)
                }
                Err(source) => Err(PersistenceError::Io { path, source }),
            };
        }

        Err(PersistenceError::NoFreeName(
            self.output_dir.join(self.file_name(stamp, 0)),
        ))
    }
}

async fn write_contents(file: &mut tokio::fs::File, content: &str) -> std::io::Result<()> {
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await
}

#[derive(Debug)]
pub enum StoreAction {
    Save {
        lines: Vec<String>,
        response_tx: oneshot::Sender<Result<PathBuf, PersistenceError>>,
    },
}

/// Client side of the persistence worker
#[derive(Debug, Clone)]
pub struct MacroStore {
    tx: Sender<StoreAction>,
}

impl MacroStore {
    /// Spawns the worker task that owns the writer
    pub fn spawn(writer: MacroWriter) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = channel::<StoreAction>(8);
        info!(
            "Recordings will be saved to {}",
            writer.output_dir().display()
        );

        let handle = tokio::spawn(async move {
            while let Some(action) = rx.recv().await {
                match action {
                    StoreAction::Save { lines, response_tx } => {
                        let result = writer.write(&lines).await;
                        if let Err(e) = &result {
                            error!("Failed to save recording: {}", e);
                        }
                        if response_tx.send(result).is_err() {
                            warn!("Save requester went away before the response");
                        }
                    }
                }
            }
            debug!("Persistence worker finished");
        });

        (Self { tx }, handle)
    }

    pub fn from_sender(tx: Sender<StoreAction>) -> Self {
        Self { tx }
    }

    pub async fn save(&self, lines: Vec<String>) -> Result<PathBuf, PersistenceError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(StoreAction::Save { lines, response_tx })
            .await
            .map_err(|_| PersistenceError::WorkerGone)?;
        response_rx.await.map_err(|_| PersistenceError::WorkerGone)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn render_terminates_every_line() {
        assert_eq!(render(&lines(&["sleep(3)", "pL1"])), "sleep(3)\npL1\n");
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn file_name_uses_prefix_and_timestamp() {
        let writer = MacroWriter::new("out", "ds4_log_");
        assert_eq!(writer.file_name(stamp(), 0), "ds4_log_20240309-140507.txt");
        assert_eq!(writer.file_name(stamp(), 2), "ds4_log_20240309-140507-2.txt");
    }

    #[tokio::test]
    async fn write_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MacroWriter::new(dir.path().join("macros"), "ds4_log_");

        let path = writer
            .write_at(stamp(), &lines(&["sleep(10)", "pLK()", "rLK()"]))
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "ds4_log_20240309-140507.txt");
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "sleep(10)\npLK()\nrLK()\n");
    }

    #[tokio::test]
    async fn same_second_recordings_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MacroWriter::new(dir.path(), "ds4_log_");

        let first = writer.write_at(stamp(), &lines(&["pL1"])).await.unwrap();
        let second = writer.write_at(stamp(), &lines(&["pR3"])).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "ds4_log_20240309-140507-1.txt");
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "pL1\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "pR3\n");
    }

    #[tokio::test]
    async fn store_saves_through_worker() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _worker) = MacroStore::spawn(MacroWriter::new(dir.path(), "rec_"));

        let path = store.save(lines(&["pPS", "sleep(4)", "rPS"])).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "pPS\nsleep(4)\nrPS\n");
    }

    #[tokio::test]
    async fn store_reports_missing_worker() {
        let (tx, rx) = channel(1);
        drop(rx);
        let store = MacroStore::from_sender(tx);
        assert!(matches!(
            store.save(Vec::new()).await,
            Err(PersistenceError::WorkerGone)
        ));
    }
}
