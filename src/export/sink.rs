//! Output sink: console or export file.
//!
//! Record lines are the program's only stdout output; everything diagnostic
//! goes to stderr via `tracing`. When an export location is configured the
//! sink writes to `<dir>/<source>.txt` instead, first moving any existing
//! file of that name out of the way with an `.old.<timestamp>` suffix so
//! repeated runs never clobber earlier output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::util::constants::OUTPUT_EXTENSION;
use crate::util::error::Result;
use crate::util::time::rotation_suffix;

/// Where rendered lines go for one source.
///
/// Implements [`Write`]; sink I/O errors are fatal and abort the run.
pub enum OutputSink {
    Console(io::Stdout),
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
}

impl OutputSink {
    /// Open the sink for one source: stdout, or a fresh export file named
    /// after the source when `export_loc` is set.
    pub fn open(export_loc: Option<&Path>, source_label: &str) -> Result<Self> {
        let Some(dir) = export_loc else {
            return Ok(Self::Console(io::stdout()));
        };

        let path = build_output_path(dir, source_label);
        rotate_existing(&path)?;

        let file = File::create(&path)?;
        tracing::info!("Writing output to {}", path.display());
        Ok(Self::File {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Flush buffered output. Called once per processed source so write
    /// errors are not silently swallowed by `BufWriter::drop`.
    pub fn finish(&mut self) -> Result<()> {
        self.flush()?;
        if let Self::File { path, .. } = self {
            tracing::debug!("Finished writing {}", path.display());
        }
        Ok(())
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Console(out) => out.write(buf),
            Self::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Console(out) => out.flush(),
            Self::File { writer, .. } => writer.flush(),
        }
    }
}

/// `<dir>/<final path component of the source>.txt`
fn build_output_path(dir: &Path, source_label: &str) -> PathBuf {
    dir.join(source_label).with_extension(OUTPUT_EXTENSION)
}

/// Move an existing output file aside as `<stem>.old.<yyyyMMddHHmmss>`.
fn rotate_existing(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let suffix = rotation_suffix(&chrono::Local::now());
    let rotated = path.with_extension(format!("old.{suffix}"));
    std::fs::rename(path, &rotated)?;
    tracing::info!(
        "Existing {} moved to {}",
        path.display(),
        rotated.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "eventcat-sink-test-{tag}-{}",
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_console_sink_without_export_loc() {
        let sink = OutputSink::open(None, "Application").unwrap();
        assert!(matches!(sink, OutputSink::Console(_)));
    }

    #[test]
    fn test_file_sink_writes_lines() {
        let dir = ScratchDir::new("write");
        let mut sink = OutputSink::open(Some(&dir.0), "system.evtx").unwrap();
        writeln!(sink, "#1: line").unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(dir.0.join("system.txt")).unwrap();
        assert_eq!(contents, "#1: line\n");
    }

    #[test]
    fn test_existing_file_is_rotated() {
        let dir = ScratchDir::new("rotate");
        let out = dir.0.join("Application.txt");
        std::fs::write(&out, "previous run\n").unwrap();

        let mut sink = OutputSink::open(Some(&dir.0), "Application").unwrap();
        writeln!(sink, "fresh run").unwrap();
        sink.finish().unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "fresh run\n");

        let rotated: Vec<_> = std::fs::read_dir(&dir.0)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("Application.old."))
            .collect();
        assert_eq!(rotated.len(), 1, "exactly one rotated file: {rotated:?}");
        assert_eq!(
            std::fs::read_to_string(dir.0.join(&rotated[0])).unwrap(),
            "previous run\n"
        );
    }
}
