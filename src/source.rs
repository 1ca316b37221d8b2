use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// A loaded compilation unit. Owns the absolute path and the source bytes
/// for the lifetime of the whole pipeline; tokens and diagnostics refer
/// back into it by line/column.
///
/// The buffer always ends in a single NUL byte so the lexer can scan
/// without bounds checks at every step. String-escape processing shortens
/// the buffer in place, which is why the lexer needs mutable access.
pub struct SourceFile {
    path: PathBuf,
    data: Vec<u8>,
}

impl SourceFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().canonicalize()?;
        let data = fs::read(&path)?;

        Ok(Self::from_bytes(path, data))
    }

    pub fn new(path: impl Into<PathBuf>, text: &str) -> Self {
        Self::from_bytes(path.into(), text.as_bytes().to_vec())
    }

    fn from_bytes(path: PathBuf, mut data: Vec<u8>) -> Self {
        data.push(0);
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Source bytes, including the trailing NUL.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the two bytes of an escape sequence at `idx` with the single
    /// decoded byte, shrinking the buffer by one.
    pub(crate) fn collapse_escape(&mut self, idx: usize, byte: u8) {
        self.data.remove(idx);
        self.data[idx] = byte;
    }
}
