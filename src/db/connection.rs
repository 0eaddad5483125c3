use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;
use crate::error::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const IN_MEMORY: &str = ":memory:";

/// Applied to every connection before migrations. A failure here is logged
/// and the store keeps going with SQLite's defaults.
const CONNECTION_PRAGMAS: &[(&str, &str)] = &[("journal_mode", "WAL"), ("synchronous", "NORMAL")];

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Owns the thread holding the connection. Dropping the job sender ends the
/// thread's receive loop; the thread is joined once the last handle goes.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if let Err(err) = thread.join() {
                error!("Store thread panicked: {err:?}");
            }
        }
    }
}

/// SQLite-backed store. All statements run on one dedicated thread that owns
/// the connection; async callers hand it closures and await the reply.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<PathBuf>,
}

impl Database {
    /// Open (or create) the database file at `db_path` and bring its schema
    /// up to date.
    pub fn new(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::Unavailable(format!("cannot create {}: {err}", parent.display()))
            })?;
        }
        let path = db_path.clone();
        Self::spawn(db_path, move || Connection::open(&path))
    }

    /// A private database that lives as long as this handle.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::spawn(PathBuf::from(IN_MEMORY), Connection::open_in_memory)
    }

    fn spawn<O>(location: PathBuf, open: O) -> Result<Self, StoreError>
    where
        O: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), StoreError>>(1);

        let thread = thread::Builder::new()
            .name("signalmap-store".into())
            .spawn(move || {
                let mut conn = match prepare_connection(open) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in job_rx {
                    job(&mut conn);
                }
                debug!("Store thread exiting");
            })
            .map_err(|err| StoreError::Unavailable(format!("cannot spawn store thread: {err}")))?;

        let worker = Worker {
            jobs: Some(job_tx),
            thread: Some(thread),
        };
        ready_rx.recv().map_err(|_| {
            StoreError::Unavailable("store thread exited during startup".into())
        })??;

        info!("Store ready at {}", location.display());
        Ok(Self {
            worker: Arc::new(worker),
            location: Arc::new(location),
        })
    }

    /// File backing this store, or `:memory:`.
    pub fn path(&self) -> &Path {
        self.location.as_path()
    }

    /// Run `task` on the store thread. `op` names the work in errors.
    pub async fn execute<F, T>(&self, op: &'static str, task: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self
            .worker
            .jobs
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("store is shut down".into()))?;
        let (reply_tx, reply_rx) = oneshot::channel();

        jobs.send(Box::new(move |conn| {
            // The caller may have given up waiting; the work itself is done.
            let _ = reply_tx.send(task(conn));
        }))
        .map_err(|_| StoreError::Unavailable(format!("{op}: store thread is gone")))?;

        reply_rx
            .await
            .map_err(|_| StoreError::Unavailable(format!("{op}: store thread stopped mid-call")))?
            .map_err(|err| StoreError::Query(format!("{op}: {err}")))
    }
}

fn prepare_connection<O>(open: O) -> Result<Connection, StoreError>
where
    O: FnOnce() -> rusqlite::Result<Connection>,
{
    let mut conn = open().map_err(|err| StoreError::Unavailable(format!("cannot open: {err}")))?;

    for &(pragma, value) in CONNECTION_PRAGMAS {
        if let Err(err) = conn.pragma_update(None, pragma, value) {
            error!("Failed to set {pragma}={value}: {err}");
        }
    }
    if let Err(err) = conn.busy_timeout(BUSY_TIMEOUT) {
        error!("Failed to set busy timeout: {err}");
    }

    run_migrations(&mut conn).map_err(|err| StoreError::Unavailable(format!("{err:#}")))?;
    Ok(conn)
}
