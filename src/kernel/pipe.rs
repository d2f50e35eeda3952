use crate::{
    condvar::Condvar,
    error::{Error::*, Result},
    fcntl::OMode,
    file::{File, VFile, FTABLE},
    proc::{copyin, copyout, myproc},
    spinlock::Mutex,
    vm::UVAddr,
};
use alloc::{collections::VecDeque, sync::Arc};

// A pipe is a bounded byte queue shared by one read session and one
// write session. Each end closes when its session is released.

const PIPESIZE: usize = 512;

#[derive(Debug)]
struct PipeData {
    buf: VecDeque<u8>,
    readopen: bool,  // read end is still open
    writeopen: bool, // write end is still open
}

#[derive(Debug)]
struct PipeInner {
    data: Mutex<PipeData>,
    read_cv: Condvar,  // data arrived or writer left
    write_cv: Condvar, // room freed or reader left
}

#[derive(Debug)]
pub struct Pipe {
    inner: Arc<PipeInner>,
    writable: bool,
}

impl Pipe {
    fn mode(&self) -> OMode {
        let mut omode = OMode::new();
        omode.read(!self.writable).write(self.writable);
        omode
    }

    // Allocate a connected pair of sessions, read end first.
    pub fn alloc() -> Result<(File, File)> {
        let inner = Arc::new(PipeInner {
            data: Mutex::new(
                PipeData {
                    buf: VecDeque::with_capacity(PIPESIZE),
                    readopen: true,
                    writeopen: true,
                },
                "pipe",
            ),
            read_cv: Condvar::new(),
            write_cv: Condvar::new(),
        });

        let p0 = Self {
            inner: Arc::clone(&inner),
            writable: false,
        };
        let p1 = Self {
            inner,
            writable: true,
        };
        // a failed allocation drops whatever was already built,
        // closing both ends.
        let f0 = FTABLE.alloc(p0.mode(), VFile::Pipe(p0))?;
        let f1 = FTABLE.alloc(p1.mode(), VFile::Pipe(p1))?;

        Ok((f0, f1))
    }

    pub fn write(&self, src: UVAddr, n: usize) -> Result<usize> {
        if !self.writable {
            return Err(BrokenPipe);
        }
        // the whole source range must lie inside the image.
        match src.into_usize().checked_add(n) {
            Some(end) if end <= myproc().data().sz => (),
            _ => return Err(BadVirtAddr),
        }

        let mut chunk = [0u8; PIPESIZE];
        let mut i = 0;
        let mut data = self.inner.data.lock();
        while i < n {
            if !data.readopen {
                return Err(BrokenPipe);
            }
            if data.buf.len() == PIPESIZE {
                self.inner.read_cv.notify_all();
                data = self.inner.write_cv.wait_killable(data)?;
                continue;
            }
            let m = core::cmp::min(PIPESIZE - data.buf.len(), n - i);
            copyin(&mut chunk[..m], src + i)?;
            data.buf.extend(&chunk[..m]);
            i += m;
        }
        self.inner.read_cv.notify_all();
        Ok(i)
    }

    // Read what is available, up to n bytes. Blocks only while the
    // queue is empty and a writer remains. Returns 0 at end of stream.
    // Bytes leave the queue only once they reach dst.
    pub fn read(&self, dst: UVAddr, n: usize) -> Result<usize> {
        if self.writable {
            return Err(BrokenPipe);
        }
        let mut data = self.inner.data.lock();
        while data.buf.is_empty() && data.writeopen {
            data = self.inner.read_cv.wait_killable(data)?;
        }
        let m = core::cmp::min(n, data.buf.len());
        let mut chunk = [0u8; PIPESIZE];
        for (c, b) in chunk.iter_mut().zip(data.buf.iter().take(m)) {
            *c = *b;
        }
        copyout(dst, &chunk[..m])?;
        data.buf.drain(..m);
        self.inner.write_cv.notify_all();
        Ok(m)
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        let mut data = self.inner.data.lock();
        if self.writable {
            data.writeopen = false;
        } else {
            data.readopen = false;
        }
        self.inner.read_cv.notify_all();
        self.inner.write_cv.notify_all();
    }
}
