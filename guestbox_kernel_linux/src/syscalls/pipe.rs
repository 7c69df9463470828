//! The in-kernel pipe object backing `pipe2`.
//!
//! A pipe is a byte queue shared by a read end and a write end, each
//! registered as its own guest file. Reads block while the queue is empty and
//! a writer is still alive; once the write end closes, drained reads return
//! end-of-file. Writes to a pipe whose read end is gone fail.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use guestbox::fs::{FileRead, FileStat, FileTime, FileType, FsError, FileWrite, GuestFile};

struct PipeState {
    data: VecDeque<u8>,
    read_closed: bool,
    write_closed: bool,
}

struct PipeShared {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl PipeShared {
    fn stat(&self) -> FileStat {
        FileStat {
            perm: 0o600,
            file_type: FileType::NamedPipe,
            size: 0,
            mtime: FileTime::default(),
        }
    }
}

/// Create a connected pipe pair as `(read end, write end)`.
pub(crate) fn pipe() -> (Arc<dyn GuestFile>, Arc<dyn GuestFile>) {
    let shared = Arc::new(PipeShared {
        state: Mutex::new(PipeState {
            data: VecDeque::new(),
            read_closed: false,
            write_closed: false,
        }),
        readable: Condvar::new(),
    });
    (
        Arc::new(PipeReader {
            shared: shared.clone(),
        }),
        Arc::new(PipeWriter { shared }),
    )
}

struct PipeReader {
    shared: Arc<PipeShared>,
}

impl GuestFile for PipeReader {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(self.shared.stat())
    }

    fn close(&self) -> Result<(), FsError> {
        let mut state = self.shared.state.lock().unwrap();
        state.read_closed = true;
        Ok(())
    }

    fn as_reader(&self) -> Option<&dyn FileRead> {
        Some(self)
    }
}

impl FileRead for PipeReader {
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut state = self.shared.state.lock().unwrap();
        while state.data.is_empty() && !state.write_closed {
            state = self.shared.readable.wait(state).unwrap();
        }
        if state.data.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(state.data.len());
        for slot in buf[..n].iter_mut() {
            *slot = state.data.pop_front().unwrap();
        }
        Ok(n)
    }
}

struct PipeWriter {
    shared: Arc<PipeShared>,
}

impl GuestFile for PipeWriter {
    fn stat(&self) -> Result<FileStat, FsError> {
        Ok(self.shared.stat())
    }

    fn close(&self) -> Result<(), FsError> {
        let mut state = self.shared.state.lock().unwrap();
        state.write_closed = true;
        // Drained readers must observe end-of-file.
        self.shared.readable.notify_all();
        Ok(())
    }

    fn as_writer(&self) -> Option<&dyn FileWrite> {
        Some(self)
    }
}

impl FileWrite for PipeWriter {
    fn write(&self, buf: &[u8]) -> Result<usize, FsError> {
        let mut state = self.shared.state.lock().unwrap();
        if state.read_closed {
            return Err(FsError::Io);
        }
        state.data.extend(buf.iter().copied());
        self.shared.readable.notify_all();
        Ok(buf.len())
    }
}
