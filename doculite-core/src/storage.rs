//! Backing-file abstraction for NDJSON persistence.
//!
//! A collection owns exactly one sink: either a real file on disk, opened
//! once in read-write mode, or (for the `:memory:` sentinel path) an
//! in-memory buffer with no filesystem I/O at all. File locking and
//! multi-process coordination are explicitly out of scope; callers must
//! serialize access to a given path themselves.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const MEMORY_SENTINEL: &str = ":memory:";

/// A seekable, truncatable byte sink standing in for an open file.
pub trait FileHandle: Read + Write + Seek + Send + Sync {
    fn set_len(&mut self, size: u64) -> io::Result<()>;
    fn sync_all(&mut self) -> io::Result<()>;
}

/// Filesystem abstraction so the collection can run against a real path
/// or an in-memory stand-in without branching on which one it has.
pub trait Storage: Send + Sync {
    type File: FileHandle;

    /// Open `path` for read-write access, creating it if absent. Mirrors
    /// the default `'a+'`-style open mode: existing content is preserved.
    fn open_or_create(&self, path: &Path) -> io::Result<Self::File>;
}

pub struct StdFile(fs::File);

impl FileHandle for StdFile {
    fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.0.set_len(size)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        self.0.sync_all()
    }
}

impl Read for StdFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for StdFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Seek for StdFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

#[derive(Clone, Default)]
pub struct StdStorage;

impl Storage for StdStorage {
    type File = StdFile;

    fn open_or_create(&self, path: &Path) -> io::Result<Self::File> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(StdFile(file))
    }
}

struct MemFileData {
    content: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<std::path::PathBuf, Arc<Mutex<MemFileData>>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    type File = MemFile;

    fn open_or_create(&self, path: &Path) -> io::Result<Self::File> {
        let mut files = self.files.lock().unwrap();
        let inner = files
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                Arc::new(Mutex::new(MemFileData {
                    content: Vec::new(),
                }))
            })
            .clone();
        Ok(MemFile { inner, pos: 0 })
    }
}

pub struct MemFile {
    inner: Arc<Mutex<MemFileData>>,
    pos: u64,
}

impl FileHandle for MemFile {
    fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.inner.lock().unwrap().content.resize(size as usize, 0);
        Ok(())
    }

    fn sync_all(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.inner.lock().unwrap();
        let len = data.content.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let available = (len - self.pos) as usize;
        let to_read = buf.len().min(available);
        buf[..to_read]
            .copy_from_slice(&data.content[self.pos as usize..self.pos as usize + to_read]);
        self.pos += to_read as u64;
        Ok(to_read)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.inner.lock().unwrap();
        let end = self.pos + buf.len() as u64;
        if end > data.content.len() as u64 {
            data.content.resize(end as usize, 0);
        }
        data.content[self.pos as usize..end as usize].copy_from_slice(buf);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.inner.lock().unwrap().content.len() as u64;
        let new_pos = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::End(p) => {
                if p < 0 {
                    len.checked_sub(p.unsigned_abs()).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "seek before start")
                    })?
                } else {
                    len + p as u64
                }
            }
            SeekFrom::Current(p) => {
                if p < 0 {
                    self.pos.checked_sub(p.unsigned_abs()).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "seek before start")
                    })?
                } else {
                    self.pos + p as u64
                }
            }
        };
        self.pos = new_pos;
        Ok(new_pos)
    }
}

/// An open sink abstracts over which `Storage` backend produced it, so the
/// collection can hold one without being generic over a `Storage` type
/// parameter itself.
pub enum Sink {
    Disk(StdFile),
    Memory(MemFile),
}

impl Sink {
    /// Open `path`, or bind the `:memory:` sentinel to a fresh in-memory
    /// buffer with no filesystem I/O.
    pub fn open(path: &str) -> io::Result<Self> {
        if path == MEMORY_SENTINEL {
            let storage = MemoryStorage::new();
            return Ok(Sink::Memory(
                storage.open_or_create(Path::new(MEMORY_SENTINEL))?,
            ));
        }
        let storage = StdStorage;
        Ok(Sink::Disk(storage.open_or_create(Path::new(path))?))
    }

    pub fn handle_mut(&mut self) -> &mut dyn FileHandle {
        match self {
            Sink::Disk(f) => f,
            Sink::Memory(f) => f,
        }
    }
}
