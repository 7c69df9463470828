//! The in-memory file system behind the mock emulator.

use std::io::SeekFrom;
use std::sync::{Arc, Mutex, RwLock};

use hashbrown::HashMap;

use guestbox::fs::{
    FileControl, FileFlags, FileRead, FileSeek, FileStat, FileSystem, FileTime, FileType, FsError,
    FileWrite, GuestFile, ReadlinkFs,
};

/// One regular file's shared contents.
struct MemNode {
    data: RwLock<Vec<u8>>,
    perm: u32,
    mtime: FileTime,
}

/// A path-keyed in-memory file system with a symlink side table.
pub struct MemFileSystem {
    nodes: RwLock<HashMap<String, Arc<MemNode>>>,
    links: RwLock<HashMap<String, String>>,
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_owned()
}

impl MemFileSystem {
    pub(crate) fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Create (or replace) a file at `path`.
    pub fn add_file(&self, path: &str, contents: &[u8]) {
        self.add_file_with(path, contents, 0o644, FileTime::default());
    }

    /// Create a file with explicit permissions and mtime.
    pub fn add_file_with(&self, path: &str, contents: &[u8], perm: u32, mtime: FileTime) {
        self.nodes.write().unwrap().insert(
            normalize(path),
            Arc::new(MemNode {
                data: RwLock::new(contents.to_vec()),
                perm,
                mtime,
            }),
        );
    }

    /// Register a symlink visible to `readlinkat`.
    pub fn add_symlink(&self, path: &str, target: &str) {
        self.links
            .write()
            .unwrap()
            .insert(normalize(path), target.to_owned());
    }

    /// Current contents of `path`, if it exists.
    pub fn read_back(&self, path: &str) -> Option<Vec<u8>> {
        let nodes = self.nodes.read().unwrap();
        let data = nodes.get(&normalize(path))?.data.read().unwrap().clone();
        Some(data)
    }

    /// Wrap this file system as a directory file, usable as a dir-FD.
    pub fn dir_file(fs: &Arc<Self>) -> Arc<dyn GuestFile> {
        Arc::new(MemDir { fs: fs.clone() })
    }
}

impl FileSystem for MemFileSystem {
    fn open(
        &self,
        path: &str,
        flags: FileFlags,
        _mode: u32,
    ) -> Result<Arc<dyn GuestFile>, FsError> {
        let key = normalize(path);
        let mut nodes = self.nodes.write().unwrap();
        let node = match nodes.get(&key) {
            Some(node) => {
                if flags.contains(FileFlags::CREATE | FileFlags::EXCL) {
                    return Err(FsError::AlreadyExists);
                }
                if flags.contains(FileFlags::TRUNC) {
                    node.data.write().unwrap().clear();
                }
                node.clone()
            }
            None => {
                if !flags.contains(FileFlags::CREATE) {
                    return Err(FsError::NotFound);
                }
                let node = Arc::new(MemNode {
                    data: RwLock::new(Vec::new()),
                    perm: 0o644,
                    mtime: FileTime::default(),
                });
                nodes.insert(key, node.clone());
                node
            }
        };
        let writable = flags.intersects(FileFlags::WRONLY | FileFlags::RDWR);
        let readable = !flags.contains(FileFlags::WRONLY) || flags.contains(FileFlags::RDWR);
        Ok(Arc::new(MemFile {
            node,
            pos: Mutex::new(0),
            readable,
            writable,
            append: flags.contains(FileFlags::APPEND),
        }))
    }

    fn stat(&self, path: &str) -> Result<FileStat, FsError> {
        let nodes = self.nodes.read().unwrap();
        let node = nodes.get(&normalize(path)).ok_or(FsError::NotFound)?;
        let stat = FileStat {
            perm: node.perm,
            file_type: FileType::Regular,
            size: node.data.read().unwrap().len() as i64,
            mtime: node.mtime,
        };
        Ok(stat)
    }

    fn as_readlink(&self) -> Option<&dyn ReadlinkFs> {
        Some(self)
    }
}

impl ReadlinkFs for MemFileSystem {
    fn read_link(&self, path: &str) -> Result<String, FsError> {
        self.links
            .read()
            .unwrap()
            .get(&normalize(path))
            .cloned()
            .ok_or(FsError::NotFound)
    }
}

/// An open handle onto a [`MemNode`].
struct MemFile {
    node: Arc<MemNode>,
    pos: Mutex<u64>,
    readable: bool,
    writable: bool,
    append: bool,
}

impl GuestFile for MemFile {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(FileStat {
            perm: self.node.perm,
            file_type: FileType::Regular,
            size: self.node.data.read().unwrap().len() as i64,
            mtime: self.node.mtime,
        })
    }

    fn as_reader(&self) -> Option<&dyn FileRead> {
        self.readable.then_some(self as &dyn FileRead)
    }

    fn as_writer(&self) -> Option<&dyn FileWrite> {
        self.writable.then_some(self as &dyn FileWrite)
    }

    fn as_seeker(&self) -> Option<&dyn FileSeek> {
        Some(self)
    }
}

impl FileRead for MemFile {
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        let data = self.node.data.read().unwrap();
        let mut pos = self.pos.lock().unwrap();
        let start = (*pos).min(data.len() as u64) as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        *pos = (start + n) as u64;
        Ok(n)
    }
}

impl FileWrite for MemFile {
    fn write(&self, buf: &[u8]) -> Result<usize, FsError> {
        let mut data = self.node.data.write().unwrap();
        let mut pos = self.pos.lock().unwrap();
        let start = if self.append {
            data.len()
        } else {
            (*pos).min(data.len() as u64) as usize
        };
        if start + buf.len() > data.len() {
            data.resize(start + buf.len(), 0);
        }
        data[start..start + buf.len()].copy_from_slice(buf);
        *pos = (start + buf.len()) as u64;
        Ok(buf.len())
    }
}

impl FileSeek for MemFile {
    fn seek(&self, target: SeekFrom) -> Result<u64, FsError> {
        let len = self.node.data.read().unwrap().len() as i64;
        let mut pos = self.pos.lock().unwrap();
        let next = match target {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => *pos as i64 + delta,
            SeekFrom::End(delta) => len + delta,
        };
        if next < 0 {
            return Err(FsError::Invalid);
        }
        *pos = next as u64;
        Ok(*pos)
    }
}

/// A directory-FD wrapper exposing the file system as a capability.
struct MemDir {
    fs: Arc<MemFileSystem>,
}

impl GuestFile for MemDir {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(FileStat {
            perm: 0o755,
            file_type: FileType::Directory,
            size: 0,
            mtime: FileTime::default(),
        })
    }

    fn as_dir(&self) -> Option<&dyn FileSystem> {
        Some(self.fs.as_ref())
    }
}

/// A control-capable file recording every `ioctl` forwarded to it.
#[derive(Default)]
pub struct MockControlFile {
    calls: Mutex<Vec<(u32, u64)>>,
    pub fail: bool,
}

impl MockControlFile {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn calls(&self) -> Vec<(u32, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl GuestFile for MockControlFile {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(FileStat {
            perm: 0o666,
            file_type: FileType::CharDevice,
            size: 0,
            mtime: FileTime::default(),
        })
    }

    fn as_control(&self) -> Option<&dyn FileControl> {
        Some(self)
    }
}

impl FileControl for MockControlFile {
    fn control(&self, cmd: u32, arg: u64) -> Result<(), FsError> {
        if self.fail {
            return Err(FsError::Invalid);
        }
        self.calls.lock().unwrap().push((cmd, arg));
        Ok(())
    }
}
