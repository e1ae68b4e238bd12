//! Byte-stream access used by loaders and writers.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

pub type ReadStream = Box<dyn Read + Send>;
pub type WriteStream = Box<dyn Write + Send>;

/// Where dictionaries are read from and written to. Folder listings are
/// returned in file-name order so multi-part sources load deterministically.
pub trait Storage: Send + Sync {
    fn open_read(&self, path: &str) -> Result<ReadStream>;
    fn open_read_all(&self, folder: &str) -> Result<Vec<ReadStream>>;
    fn open_write(&self, path: &str) -> Result<WriteStream>;
    /// Reopens every file already present in `folder` for writing.
    fn open_write_all(&self, folder: &str) -> Result<Vec<WriteStream>>;
}

/// Plain files below a root directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn list(&self, folder: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.resolve(folder))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Storage for FsStorage {
    fn open_read(&self, path: &str) -> Result<ReadStream> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_read_all(&self, folder: &str) -> Result<Vec<ReadStream>> {
        self.list(folder)?
            .into_iter()
            .map(|path| -> Result<ReadStream> { Ok(Box::new(BufReader::new(File::open(path)?))) })
            .collect()
    }

    fn open_write(&self, path: &str) -> Result<WriteStream> {
        let path = self.resolve(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn open_write_all(&self, folder: &str) -> Result<Vec<WriteStream>> {
        self.list(folder)?
            .into_iter()
            .map(|path| -> Result<WriteStream> { Ok(Box::new(BufWriter::new(File::create(path)?))) })
            .collect()
    }
}

/// In-memory files keyed by `/`-separated paths. Written bytes become
/// visible once the stream is flushed or dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    fn folder_keys(&self, folder: &str) -> Vec<String> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        self.files
            .lock()
            .keys()
            .filter(|key| key.strip_prefix(&prefix).is_some_and(|name| !name.contains('/')))
            .cloned()
            .collect()
    }

    fn writer(&self, path: String) -> WriteStream {
        Box::new(MemoryWriter {
            files: Arc::clone(&self.files),
            path,
            buffer: Vec::new(),
        })
    }
}

impl Storage for MemoryStorage {
    fn open_read(&self, path: &str) -> Result<ReadStream> {
        let bytes = self.get(path).ok_or_else(|| not_found(path))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn open_read_all(&self, folder: &str) -> Result<Vec<ReadStream>> {
        self.folder_keys(folder)
            .into_iter()
            .map(|key| self.open_read(&key))
            .collect()
    }

    fn open_write(&self, path: &str) -> Result<WriteStream> {
        Ok(self.writer(path.to_string()))
    }

    fn open_write_all(&self, folder: &str) -> Result<Vec<WriteStream>> {
        Ok(self
            .folder_keys(folder)
            .into_iter()
            .map(|key| self.writer(key))
            .collect())
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} does not exist"))
}

struct MemoryWriter {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    path: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.files.lock().insert(self.path.clone(), self.buffer.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let bytes = std::mem::take(&mut self.buffer);
        self.files.lock().insert(std::mem::take(&mut self.path), bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(mut stream: ReadStream) -> String {
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn memory_writes_commit_on_drop() {
        let storage = MemoryStorage::new();
        {
            let mut out = storage.open_write("dict/main.bin").unwrap();
            out.write_all(b"hello").unwrap();
            assert!(storage.get("dict/main.bin").is_none());
        }
        assert_eq!(storage.get("dict/main.bin").unwrap(), b"hello");
        assert_eq!(read_all(storage.open_read("dict/main.bin").unwrap()), "hello");
    }

    #[test]
    fn memory_folder_listing_is_sorted_and_shallow() {
        let storage = MemoryStorage::new();
        storage.insert("words/b.xml", "b");
        storage.insert("words/a.xml", "a");
        storage.insert("words/nested/c.xml", "c");
        storage.insert("other/d.xml", "d");
        let parts: Vec<_> = storage
            .open_read_all("words")
            .unwrap()
            .into_iter()
            .map(read_all)
            .collect();
        assert_eq!(parts, vec!["a", "b"]);

        let writers = storage.open_write_all("words").unwrap();
        assert_eq!(writers.len(), 2);
    }

    #[test]
    fn missing_memory_file_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.open_read("nope").err().unwrap();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn filesystem_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        for (name, body) in [("parts/2.xml", "two"), ("parts/1.xml", "one")] {
            let mut out = storage.open_write(name).unwrap();
            out.write_all(body.as_bytes()).unwrap();
            out.flush().unwrap();
        }
        let parts: Vec<_> = storage
            .open_read_all("parts")
            .unwrap()
            .into_iter()
            .map(read_all)
            .collect();
        assert_eq!(parts, vec!["one", "two"]);

        for mut out in storage.open_write_all("parts").unwrap() {
            out.write_all(b"x").unwrap();
            out.flush().unwrap();
        }
        assert_eq!(read_all(storage.open_read("parts/1.xml").unwrap()), "x");
    }
}
