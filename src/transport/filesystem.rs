//! Filesystem transport - a durable spool directory shared between processes.
//!
//! ```text
//! <root>/
//! ├── tmp/          writes in progress, renamed into queue/ when complete
//! ├── queue/        <due_ms>-<created_ns>-<pid>-<seq>.json, sorted by name
//! ├── processing/   claimed deliveries awaiting ack / reject
//! └── rejected/     dead-lettered deliveries
//! ```
//!
//! Claiming a delivery is an atomic `rename` from `queue/` to `processing/`,
//! so any number of consumer processes can share one spool directory.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::error::TransportError;
use super::transport::{Receiver, Sender};
use crate::envelope::{DelayStamp, Envelope, TransportMessageId};
use crate::serializer::Serializer;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Transport backed by files in a spool directory.
#[derive(Clone, Debug)]
pub struct FilesystemTransport {
    root: PathBuf,
    serializer: Serializer,
}

impl FilesystemTransport {
    /// Open (and create if needed) a spool directory.
    pub fn open(root: impl Into<PathBuf>, serializer: Serializer) -> Result<Self, TransportError> {
        let root = root.into();
        for dir in ["tmp", "queue", "processing", "rejected"] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root, serializer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Names of the files currently in `rejected/`.
    pub fn rejected(&self) -> Result<Vec<String>, TransportError> {
        sorted_names(&self.dir("rejected"))
    }

    /// Number of queued deliveries, due or not.
    pub fn pending(&self) -> Result<usize, TransportError> {
        Ok(sorted_names(&self.dir("queue"))?.len())
    }

    /// Move deliveries claimed longer than `older_than` ago back to the queue.
    ///
    /// A consumer that crashes between claiming and acking leaves its delivery
    /// in `processing/`; this makes it visible again (at-least-once). Age is
    /// counted from the claim: `get` stamps the modification time when it
    /// moves a file into `processing/`.
    pub fn requeue_stale(&self, older_than: Duration) -> Result<usize, TransportError> {
        let processing = self.dir("processing");
        let now = SystemTime::now();
        let mut moved = 0;

        for name in sorted_names(&processing)? {
            let path = processing.join(&name);
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < older_than {
                continue;
            }
            match fs::rename(&path, self.dir("queue").join(&name)) {
                Ok(()) => moved += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if moved > 0 {
            warn!(root = %self.root.display(), moved, "requeued stale deliveries");
        }
        Ok(moved)
    }

    fn move_delivery(&self, id: &str, from: &str, to: &str) -> Result<(), TransportError> {
        match fs::rename(self.dir(from).join(id), self.dir(to).join(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(TransportError::UnknownDelivery(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Sender for FilesystemTransport {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let bytes = self.serializer.encode(envelope)?;

        let delay = envelope
            .last::<DelayStamp>()
            .map(DelayStamp::delay)
            .unwrap_or(Duration::ZERO);
        let due = epoch_millis().saturating_add(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        let name = format!(
            "{:020}-{:020}-{}-{}.json",
            due,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed),
        );

        let staged = self.dir("tmp").join(&name);
        fs::write(&staged, bytes)?;
        fs::rename(&staged, self.dir("queue").join(&name))?;

        debug!(file = %name, message_type = envelope.message_name(), "spooled message");
        Ok(())
    }
}

impl Receiver for FilesystemTransport {
    fn get(&self) -> Result<Option<Envelope>, TransportError> {
        let now = epoch_millis();

        for name in sorted_names(&self.dir("queue"))? {
            // Names sort by due time, so the first one not yet due ends the scan.
            if due_millis(&name).is_some_and(|due| due > now) {
                break;
            }

            let claimed = self.dir("processing").join(&name);
            match fs::rename(self.dir("queue").join(&name), &claimed) {
                Ok(()) => {}
                // Claimed by another consumer.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            // An unreadable claim goes back to the queue.
            let bytes = match read_claimed(&claimed) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.move_delivery(&name, "processing", "queue")?;
                    warn!(file = %name, error = %err, "could not read claimed delivery");
                    return Err(err.into());
                }
            };
            return match self.serializer.decode(&bytes) {
                Ok(envelope) => Ok(Some(envelope.with(TransportMessageId::new(name)))),
                Err(err) => {
                    self.move_delivery(&name, "processing", "rejected")?;
                    Err(err.into())
                }
            };
        }

        Ok(None)
    }

    fn ack(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let id = delivery_id(envelope)?;
        match fs::remove_file(self.dir("processing").join(&id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TransportError::UnknownDelivery(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn reject(&self, envelope: &Envelope, requeue: bool) -> Result<(), TransportError> {
        let id = delivery_id(envelope)?;
        let target = if requeue { "queue" } else { "rejected" };
        self.move_delivery(&id, "processing", target)
    }
}

fn delivery_id(envelope: &Envelope) -> Result<String, TransportError> {
    envelope
        .last::<TransportMessageId>()
        .map(|stamp| stamp.id.clone())
        .ok_or_else(|| TransportError::UnknownDelivery("envelope has no transport message id".into()))
}

/// Touch the claimed file so `requeue_stale` ages it from now, then read it.
fn read_claimed(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = fs::File::options().read(true).write(true).open(path)?;
    file.set_modified(SystemTime::now())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn due_millis(name: &str) -> Option<u64> {
    name.split('-').next()?.parse().ok()
}

fn sorted_names(dir: &Path) -> Result<Vec<String>, TransportError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
