//! Tar archive output sink.
//!
//! Every render becomes one regular-file entry in a single shared archive.
//! Output is buffered in memory until the render finalizes, because the
//! header (size, and whatever SetOwner/SetGroup/SetMode changed) must be
//! written before the body.

use std::{
    fmt,
    io::{self, Write},
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use tar::{Builder, EntryType, Header};
use tracing::debug;

use p2_core::application::{
    OutputError,
    ports::{FileAttributes, OutputSink, PreparedOutput},
};
use p2_core::domain::{OutputTarget, normalize, relative_path};

use super::file::target_path;

/// Entry mode used when a template never calls SetMode.
pub const DEFAULT_ENTRY_MODE: u32 = 0o644;

type SharedBuilder = Arc<Mutex<Option<Builder<Box<dyn Write + Send>>>>>;

pub struct TarSink {
    builder: SharedBuilder,
    archive_name: String,
    root: PathBuf,
    prefix: Option<PathBuf>,
    base_dir: PathBuf,
    default_mode: u32,
}

impl TarSink {
    /// Archive written to `writer`.
    ///
    /// Entry names are target paths relative to `root`; `base_dir` anchors
    /// relative paths used by scripting filters.
    pub fn new(
        writer: Box<dyn Write + Send>,
        archive_name: impl Into<String>,
        root: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            builder: Arc::new(Mutex::new(Some(Builder::new(writer)))),
            archive_name: archive_name.into(),
            root: root.into(),
            prefix: None,
            base_dir: base_dir.into(),
            default_mode: DEFAULT_ENTRY_MODE,
        }
    }

    /// Prepend `prefix` to every entry name.
    pub fn with_prefix(mut self, prefix: Option<PathBuf>) -> Self {
        self.prefix = prefix.filter(|p| !p.as_os_str().is_empty());
        self
    }

    pub fn with_default_mode(mut self, mode: u32) -> Self {
        self.default_mode = mode;
        self
    }

    fn entry_name(&self, target: &OutputTarget) -> Result<PathBuf, OutputError> {
        let path = target_path(target)?;
        let rel = relative_path(&self.root, path)
            .map_err(|e| OutputError::new("name entry", target, e))?;
        let name = match &self.prefix {
            Some(prefix) => normalize(&prefix.join(rel)),
            None => rel,
        };
        // Archive members are always relative.
        Ok(name
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect())
    }
}

impl fmt::Debug for TarSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TarSink")
            .field("archive_name", &self.archive_name)
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("default_mode", &format!("{:o}", self.default_mode))
            .finish_non_exhaustive()
    }
}

impl OutputSink for TarSink {
    fn prepare(&self, target: &OutputTarget) -> Result<PreparedOutput, OutputError> {
        let name = self.entry_name(target)?;
        let body = SharedBuffer::default();
        let pending = Arc::new(Mutex::new(PendingHeader {
            mode: self.default_mode,
            uid: 0,
            gid: 0,
        }));

        let finalizer = {
            let builder = Arc::clone(&self.builder);
            let body = body.clone();
            let pending = Arc::clone(&pending);
            move || append_entry(&builder, &name, &body, &pending)
        };

        Ok(PreparedOutput::new(
            Box::new(body),
            self.base_dir.clone(),
            Arc::new(TarEntryAttributes { pending }),
        )
        .with_finalizer(finalizer))
    }

    /// Write the archive trailer and flush the underlying writer.
    fn finish(&self) -> Result<(), OutputError> {
        let Some(builder) = lock(&self.builder, &self.archive_name)?.take() else {
            return Ok(());
        };
        let mut inner = builder
            .into_inner()
            .map_err(|e| OutputError::io("write trailer", &self.archive_name, &e))?;
        inner
            .flush()
            .map_err(|e| OutputError::io("flush", &self.archive_name, &e))
    }
}

fn append_entry(
    builder: &Mutex<Option<Builder<Box<dyn Write + Send>>>>,
    name: &Path,
    body: &SharedBuffer,
    pending: &Mutex<PendingHeader>,
) -> Result<(), OutputError> {
    let entry = name.display();
    let data = lock(&body.0, &entry)?;
    let pending = *lock(pending, &entry)?;

    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(pending.mode);
    header.set_uid(pending.uid);
    header.set_gid(pending.gid);
    header.set_mtime(0);
    header.set_size(data.len() as u64);

    let mut guard = lock(builder, &entry)?;
    let builder = guard
        .as_mut()
        .ok_or_else(|| OutputError::new("append entry", &entry, "archive already finished"))?;
    builder
        .append_data(&mut header, name, data.as_slice())
        .map_err(|e| OutputError::io("append entry", &entry, &e))?;

    debug!(
        entry = %entry,
        size = data.len(),
        mode = %format!("{:o}", pending.mode),
        "Tar entry written"
    );
    Ok(())
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: impl fmt::Display) -> Result<MutexGuard<'a, T>, OutputError> {
    mutex
        .lock()
        .map_err(|_| OutputError::new("lock", what, "a previous render panicked"))
}

/// Header fields a template may change before the entry is written.
#[derive(Debug, Clone, Copy)]
struct PendingHeader {
    mode: u32,
    uid: u64,
    gid: u64,
}

/// Redirects owner/mode changes into the pending header.
#[derive(Debug)]
struct TarEntryAttributes {
    pending: Arc<Mutex<PendingHeader>>,
}

impl FileAttributes for TarEntryAttributes {
    fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> Result<(), OutputError> {
        let mut pending = lock(&self.pending, "tar entry")?;
        if let Some(uid) = uid {
            pending.uid = u64::from(uid);
        }
        if let Some(gid) = gid {
            pending.gid = u64::from(gid);
        }
        Ok(())
    }

    fn chmod(&self, mode: u32) -> Result<(), OutputError> {
        lock(&self.pending, "tar entry")?.mode = mode;
        Ok(())
    }
}

/// In-memory body of one pending entry.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("tar entry buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}
