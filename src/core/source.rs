//! Log source descriptors.
//!
//! A [`SourceDescriptor`] names one source of event records: an offline
//! `.evtx` archive, a directory of archives, or a live channel. Directory
//! descriptors are expanded at resolution time into one file descriptor per
//! matching archive; each expanded file is then processed independently and
//! sequentially, so a failure opening one never aborts the others.

use std::path::{Path, PathBuf};

use crate::util::constants::OFFLINE_LOG_EXTENSION;
use crate::util::error::{EventCatError, Result};

/// One source of event records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// A static archive file read via `EvtQueryFilePath`.
    OfflineFile(PathBuf),
    /// A directory scanned for `*.evtx` archives at resolution time.
    OfflineDirectory(PathBuf),
    /// A named live channel read via `EvtQueryChannelPath` (or subscribed
    /// to in follow mode).
    OnlineChannel(String),
}

impl SourceDescriptor {
    /// Classify a `-sourcePath` argument.
    ///
    /// # Errors
    /// [`EventCatError::Config`] when the path does not exist.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.is_file() {
            Ok(Self::OfflineFile(path.to_path_buf()))
        } else if path.is_dir() {
            Ok(Self::OfflineDirectory(path.to_path_buf()))
        } else {
            Err(EventCatError::Config(format!(
                "sourcePath {} does not exist",
                path.display()
            )))
        }
    }

    /// Expand this descriptor into the concrete sources to process.
    ///
    /// A directory yields one [`SourceDescriptor::OfflineFile`] per `*.evtx`
    /// file directly inside it (case-insensitive extension match), sorted by
    /// name for deterministic processing order; a directory with no matching
    /// files expands to an empty list. File and channel descriptors expand
    /// to themselves.
    ///
    /// # Errors
    /// An unreadable directory surfaces as [`EventCatError::Io`].
    pub fn expand(self) -> Result<Vec<SourceDescriptor>> {
        let Self::OfflineDirectory(dir) = self else {
            return Ok(vec![self]);
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_archive_extension(p))
            .collect();
        files.sort();
        Ok(files.into_iter().map(Self::OfflineFile).collect())
    }

    /// Short label used for progress messages and export file naming.
    ///
    /// For paths this is the final component; for channels the part after
    /// the last separator (channel names may contain `/`, e.g.
    /// `Microsoft-Windows-Sysmon/Operational`).
    pub fn label(&self) -> String {
        match self {
            Self::OfflineFile(path) | Self::OfflineDirectory(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::OnlineChannel(name) => name
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(name)
                .to_string(),
        }
    }
}

fn has_archive_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(OFFLINE_LOG_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unique scratch directory per test; cleaned up on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "eventcat-source-test-{tag}-{}",
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn touch(&self, name: &str) -> PathBuf {
            let path = self.0.join(name);
            std::fs::write(&path, b"").unwrap();
            path
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_file_resolves_to_single_descriptor() {
        let dir = ScratchDir::new("single");
        let file = dir.touch("app.evtx");
        let sources = SourceDescriptor::from_path(&file).unwrap().expand().unwrap();
        assert_eq!(sources, vec![SourceDescriptor::OfflineFile(file)]);
    }

    #[test]
    fn test_path_classification() {
        let dir = ScratchDir::new("classify");
        let file = dir.touch("app.evtx");
        assert_eq!(
            SourceDescriptor::from_path(&file).unwrap(),
            SourceDescriptor::OfflineFile(file)
        );
        assert_eq!(
            SourceDescriptor::from_path(&dir.0).unwrap(),
            SourceDescriptor::OfflineDirectory(dir.0.clone())
        );
    }

    #[test]
    fn test_directory_expands_to_sorted_evtx_files() {
        let dir = ScratchDir::new("expand");
        let b = dir.touch("b.evtx");
        let a = dir.touch("a.EVTX"); // extension match is case-insensitive
        dir.touch("notes.txt");
        dir.touch("noext");

        let sources = SourceDescriptor::from_path(&dir.0).unwrap().expand().unwrap();
        assert_eq!(
            sources,
            vec![
                SourceDescriptor::OfflineFile(a),
                SourceDescriptor::OfflineFile(b),
            ]
        );
    }

    #[test]
    fn test_empty_directory_resolves_to_nothing() {
        let dir = ScratchDir::new("empty");
        let sources = SourceDescriptor::from_path(&dir.0).unwrap().expand().unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_channel_expands_to_itself() {
        let channel = SourceDescriptor::OnlineChannel("System".into());
        assert_eq!(channel.clone().expand().unwrap(), vec![channel]);
    }

    #[test]
    fn test_missing_path_is_a_config_error() {
        let err = SourceDescriptor::from_path(Path::new("/no/such/path-eventcat")).unwrap_err();
        assert!(matches!(err, EventCatError::Config(_)));
    }

    #[test]
    fn test_labels() {
        let file = SourceDescriptor::OfflineFile(PathBuf::from("/logs/system.evtx"));
        assert_eq!(file.label(), "system.evtx");

        let channel = SourceDescriptor::OnlineChannel(
            "Microsoft-Windows-Sysmon/Operational".into(),
        );
        assert_eq!(channel.label(), "Operational");

        let plain = SourceDescriptor::OnlineChannel("Application".into());
        assert_eq!(plain.label(), "Application");
    }
}
