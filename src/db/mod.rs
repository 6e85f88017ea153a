//! SQLite-backed key/value persistence.
//!
//! A `rusqlite::Connection` cannot be shared between threads, so one worker
//! thread owns it. Async callers hand that thread a closure and await the
//! answer on a oneshot channel.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

pub use models::KvEntry;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Close,
}

struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };
        if self.jobs.send(Message::Close).is_err() {
            debug!("DB worker already gone at shutdown");
        }
        if let Err(err) = handle.join() {
            error!("DB worker panicked: {err:?}");
        }
    }
}

/// Handle to the key/value database. Clones share one worker thread, which
/// exits when the last clone is dropped.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Option<Arc<PathBuf>>,
}

impl Database {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let database = Self::spawn(Some(path.clone()))?;
        info!("Key/value store ready at {}", path.display());
        Ok(database)
    }

    /// Private database that disappears with the last handle.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    fn spawn(path: Option<PathBuf>) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Message>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_path = path.clone();

        let thread = thread::Builder::new()
            .name("storyfront-db".into())
            .spawn(move || {
                let mut conn = match open_connection(worker_path.as_deref()) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                while let Ok(message) = jobs_rx.recv() {
                    match message {
                        Message::Run(job) => job(&mut conn),
                        Message::Close => break,
                    }
                }
                debug!("DB worker stopped");
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited during startup")??;

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            path: path.map(Arc::new),
        })
    }

    /// Runs `job` on the worker thread and returns its result.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let message = Message::Run(Box::new(move |conn| {
            // The caller may have been cancelled; its answer is simply lost.
            let _ = reply_tx.send(job(conn));
        }));

        self.worker
            .jobs
            .send(message)
            .map_err(|_| anyhow!("database worker is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("database worker dropped the request"))?
    }
}

fn open_connection(path: Option<&Path>) -> Result<Connection> {
    let mut conn = match path {
        Some(path) => {
            let conn = Connection::open(path)
                .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
            if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                error!("Failed to enable WAL mode: {err}");
            }
            conn
        }
        None => Connection::open_in_memory().context("failed to open in-memory database")?,
    };
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}
