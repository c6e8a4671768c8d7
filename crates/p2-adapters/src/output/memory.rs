//! In-memory output sink for testing.

use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, RwLock},
};

use p2_core::application::{
    OutputError,
    ports::{FileAttributes, OutputSink, PreparedOutput},
};
use p2_core::domain::OutputTarget;

/// Captures every render keyed by its target, plus any owner/mode changes.
#[derive(Debug, Clone)]
pub struct MemorySink {
    inner: Arc<RwLock<MemorySinkInner>>,
    base_dir: PathBuf,
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    outputs: BTreeMap<OutputTarget, Vec<u8>>,
    modes: BTreeMap<OutputTarget, u32>,
    owners: BTreeMap<OutputTarget, (Option<u32>, Option<u32>)>,
    finished: bool,
}

impl MemorySink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemorySinkInner::default())),
            base_dir: base_dir.into(),
        }
    }

    /// Rendered text for `target` (testing helper).
    pub fn output(&self, target: &OutputTarget) -> Option<String> {
        let inner = self.inner.read().ok()?;
        inner
            .outputs
            .get(target)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Last mode set on `target` via SetMode.
    pub fn mode(&self, target: &OutputTarget) -> Option<u32> {
        self.inner.read().ok()?.modes.get(target).copied()
    }

    /// Last `(uid, gid)` set on `target` via SetOwner/SetGroup.
    pub fn owner(&self, target: &OutputTarget) -> Option<(Option<u32>, Option<u32>)> {
        self.inner.read().ok()?.owners.get(target).copied()
    }

    pub fn targets(&self) -> Vec<OutputTarget> {
        self.inner
            .read()
            .map(|inner| inner.outputs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.read().map(|inner| inner.finished).unwrap_or(false)
    }
}

fn poisoned(target: &OutputTarget) -> OutputError {
    OutputError::new("lock", target, "memory sink poisoned")
}

impl OutputSink for MemorySink {
    fn prepare(&self, target: &OutputTarget) -> Result<PreparedOutput, OutputError> {
        self.inner
            .write()
            .map_err(|_| poisoned(target))?
            .outputs
            .insert(target.clone(), Vec::new());

        let handle = MemoryHandle {
            inner: Arc::clone(&self.inner),
            target: target.clone(),
        };
        Ok(PreparedOutput::new(
            Box::new(handle.clone()),
            self.base_dir.clone(),
            Arc::new(handle),
        ))
    }

    fn finish(&self) -> Result<(), OutputError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| OutputError::new("lock", "memory sink", "poisoned"))?;
        inner.finished = true;
        Ok(())
    }
}

/// Writer and attribute handle for one target.
#[derive(Debug, Clone)]
struct MemoryHandle {
    inner: Arc<RwLock<MemorySinkInner>>,
    target: OutputTarget,
}

impl Write for MemoryHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        inner
            .outputs
            .entry(self.target.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileAttributes for MemoryHandle {
    fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> Result<(), OutputError> {
        let mut inner = self.inner.write().map_err(|_| poisoned(&self.target))?;
        let entry = inner.owners.entry(self.target.clone()).or_default();
        if uid.is_some() {
            entry.0 = uid;
        }
        if gid.is_some() {
            entry.1 = gid;
        }
        Ok(())
    }

    fn chmod(&self, mode: u32) -> Result<(), OutputError> {
        self.inner
            .write()
            .map_err(|_| poisoned(&self.target))?
            .modes
            .insert(self.target.clone(), mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_output_and_attributes() {
        let sink = MemorySink::new("/cwd");
        let target = OutputTarget::File("/out/a".into());

        let mut prepared = sink.prepare(&target).unwrap();
        prepared.writer().write_all(b"hello").unwrap();
        prepared.attributes().chmod(0o600).unwrap();
        prepared.attributes().chown(Some(7), None).unwrap();
        prepared.finalize().unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.output(&target).as_deref(), Some("hello"));
        assert_eq!(sink.mode(&target), Some(0o600));
        assert_eq!(sink.owner(&target), Some((Some(7), None)));
        assert_eq!(sink.targets(), vec![target]);
        assert!(sink.is_finished());
    }

    #[test]
    fn prepare_truncates_previous_output() {
        let sink = MemorySink::new("/cwd");
        let target = OutputTarget::Stdout;
        let mut first = sink.prepare(&target).unwrap();
        first.writer().write_all(b"first").unwrap();
        first.finalize().unwrap();

        let second = sink.prepare(&target).unwrap();
        second.finalize().unwrap();
        assert_eq!(sink.output(&target).as_deref(), Some(""));
    }
}
