//! Where a finished [Module] ends up.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::ir::Module;

pub trait ArtifactSink {
    fn write_module(&mut self, module: &Module) -> io::Result<()>;
}

/// Writes the textual IR to a file, replacing whatever was there
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> FileSink {
        FileSink { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactSink for FileSink {
    fn write_module(&mut self, module: &Module) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        write!(out, "{}", module)?;
        out.flush()?;
        info!(path = %self.path.display(), "Wrote IR");
        Ok(())
    }
}

/// Keeps the textual IR in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    text: String,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ArtifactSink for MemorySink {
    fn write_module(&mut self, module: &Module) -> io::Result<()> {
        self.text = module.to_string();
        Ok(())
    }
}
