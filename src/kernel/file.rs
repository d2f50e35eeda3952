use crate::{
    error::{Error::*, Result},
    fcntl::OMode,
    fdtable::fdalloc,
    fs::{create, BSIZE, Inode, Path},
    log::LOG,
    param::{MAXOPBLOCKS, NDEV, NFILE},
    pipe::Pipe,
    proc::copyout,
    spinlock::Mutex,
    stat::FileType,
    symlink::resolve,
    vm::UVAddr,
};
use alloc::sync::Arc;
use array_macro::array;
use core::cell::UnsafeCell;
use spin::{Lazy, Once};

pub static DEVSW: DevSW = DevSW::new();
pub static FTABLE: Lazy<FTable> = Lazy::new(|| Mutex::new(array![None; NFILE], "ftable"));

pub type FTable = Mutex<[Option<Arc<VFile>>; NFILE]>;

// An open file session. Clones share the session, and with it the
// offset.
#[derive(Clone, Debug)]
pub struct File {
    f: Option<Arc<VFile>>,
    readable: bool,
    writable: bool,
}

#[derive(Debug)]
pub enum VFile {
    Device(DNod),
    Inode(FNod),
    Pipe(Pipe),
}

// Device Node
#[derive(Debug)]
pub struct DNod {
    major: u16,
    ip: Inode,
}

// Device functions, map this trait using dyn
pub trait Device: Send + Sync {
    fn read(&self, dst: UVAddr, n: usize) -> Result<usize>;
    fn write(&self, src: UVAddr, n: usize) -> Result<usize>;
    fn major(&self) -> Major;
}

impl core::fmt::Debug for dyn Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Device fn {:?}", self.major())
    }
}

impl DNod {
    fn driver(&self) -> Result<&'static dyn Device> {
        DEVSW.get(self.major).ok_or(NoSuchNode)
    }
}

// File & directory Node
#[derive(Debug)]
pub struct FNod {
    off: UnsafeCell<u32>, // Safety: If inode lock is obtained.
    ip: Inode,
}
unsafe impl Send for FNod {}
unsafe impl Sync for FNod {}

impl FNod {
    pub fn new(ip: Inode, offset: u32) -> Self {
        Self {
            off: UnsafeCell::new(offset),
            ip,
        }
    }

    fn read(&self, dst: UVAddr, n: usize) -> Result<usize> {
        let ip = self.ip.lock();
        let off = unsafe { &mut *self.off.get() };

        let r = ip.read_user(dst, *off, n)?;
        *off += r as u32;
        Ok(r)
    }

    fn write(&self, mut src: UVAddr, n: usize) -> Result<usize> {
        // write a few blocks at a time to avoid exceeding the maximum
        // log transaction size, including i-node, indirect block,
        // allocation blocks, and 2 blocks of slop for non-aligned
        // writes.
        let max = ((MAXOPBLOCKS - 1 - 1 - 2) / 2) * BSIZE;
        let mut i: usize = 0;

        while i < n {
            let n1 = core::cmp::min(n - i, max);

            let _op = LOG.begin();
            let mut guard = self.ip.lock();
            let off = unsafe { &mut *self.off.get() };
            let r = guard.write_user(src, *off, n1)?;
            *off += r as u32;
            src += r;
            i += r;
        }
        Ok(i)
    }
}

impl VFile {
    fn read(&self, dst: UVAddr, n: usize) -> Result<usize> {
        match self {
            VFile::Device(d) => d.driver()?.read(dst, n),
            VFile::Inode(f) => f.read(dst, n),
            VFile::Pipe(p) => p.read(dst, n),
        }
    }

    fn write(&self, src: UVAddr, n: usize) -> Result<usize> {
        match self {
            VFile::Device(d) => d.driver()?.write(src, n),
            VFile::Inode(f) => f.write(src, n),
            VFile::Pipe(p) => p.write(src, n),
        }
    }

    // Get metadata about file.
    // addr pointing to a struct stat.
    pub fn stat(&self, addr: UVAddr) -> Result<()> {
        match self {
            VFile::Device(DNod { ref ip, .. }) | VFile::Inode(FNod { ref ip, .. }) => {
                let stat = ip.lock().stat();
                copyout(addr, &stat)
            }
            VFile::Pipe(_) => Err(BadFileDescriptor),
        }
    }
}

impl File {
    pub fn vfile(&self) -> &VFile {
        match self.f.as_ref() {
            Some(f) => f,
            None => panic!("file: released"),
        }
    }

    // Read from file.
    pub fn read(&self, dst: UVAddr, n: usize) -> Result<usize> {
        if !self.readable {
            return Err(InvalidArgument);
        }
        self.vfile().read(dst, n)
    }

    // Write to file.
    pub fn write(&self, src: UVAddr, n: usize) -> Result<usize> {
        if !self.writable {
            return Err(InvalidArgument);
        }
        self.vfile().write(src, n)
    }

    pub fn stat(&self, addr: UVAddr) -> Result<()> {
        self.vfile().stat(addr)
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn same_session(&self, other: &File) -> bool {
        match (&self.f, &other.f) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let Some(f) = self.f.take() else {
            return;
        };
        if Arc::strong_count(&f) < 2 {
            panic!("file drop");
        }

        if Arc::strong_count(&f) == 2 {
            let mut guard = FTABLE.lock();
            // drop arc<vfile> in table
            for ff in guard.iter_mut() {
                match ff {
                    Some(vff) if Arc::ptr_eq(&f, vff) => {
                        ff.take(); // drop ref in table. ref count = 1;
                    }
                    _ => (),
                }
            }
        }

        // if ref count == 1
        if let Ok(VFile::Inode(FNod { ip, .. }) | VFile::Device(DNod { ip, .. })) =
            Arc::try_unwrap(f)
        {
            let _op = LOG.begin();
            drop(ip);
        }
    }
}

impl FTable {
    // Allocate a file structure for vfile.
    // Must be called inside a transaction if vfile holds an inode.
    pub fn alloc(&self, opts: OMode, vfile: VFile) -> Result<File> {
        let inner = Arc::new(vfile);

        let mut guard = self.lock();
        let f = guard
            .iter_mut()
            .find(|f| f.is_none())
            .ok_or(FileTableOverflow)?;
        f.replace(inner);
        Ok(File {
            f: f.clone(), // ref count = 2
            readable: opts.is_read(),
            writable: opts.is_write(),
        })
    }
}

// Open path and return a descriptor for it.
pub fn open(path: &Path, opts: OMode) -> Result<usize> {
    let _op = LOG.begin();

    let ip = if opts.is_create() {
        create(path, FileType::File, 0, 0)?
    } else {
        resolve(path, !opts.is_nofollow())?
    };

    // ip moves into the session; the inode stays locked through lk
    // until the descriptor is bound.
    let lk = ip.dup();
    let mut guard = lk.lock();

    let itype = guard.itype();
    if itype == FileType::Dir && !opts.is_rdonly() {
        return Err(IsADirectory);
    }
    let vfile = match itype {
        FileType::Device if guard.major() as usize >= NDEV => return Err(NoSuchNode),
        FileType::Device => VFile::Device(DNod {
            major: guard.major(),
            ip,
        }),
        _ => VFile::Inode(FNod::new(ip, 0)),
    };

    let file = FTABLE.alloc(opts, vfile)?;
    let fd = fdalloc(file)?;

    if opts.is_trunc() && itype == FileType::File {
        guard.trunc();
    }
    Ok(fd)
}

pub struct DevSW {
    table: [Once<&'static dyn Device>; NDEV],
}

impl core::fmt::Debug for DevSW {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[")?;
        for (count, v) in self.table.iter().enumerate() {
            if count != 0 {
                write!(f, ", ")?;
            }
            if let Some(&v) = v.get() {
                write!(f, "{:?}", v)?;
            } else {
                write!(f, "None")?;
            }
        }
        write!(f, "]")
    }
}

impl DevSW {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: Once<&'static dyn Device> = Once::new();

    pub const fn new() -> Self {
        Self {
            table: [Self::EMPTY; NDEV],
        }
    }

    // Register dev under devnum. Fails if the slot is taken.
    pub fn set(&self, devnum: Major, dev: &'static dyn Device) -> Result<()> {
        let mut fresh = false;
        self.table[devnum as usize].call_once(|| {
            fresh = true;
            dev
        });
        if fresh {
            Ok(())
        } else {
            Err(AlreadyExists)
        }
    }

    pub fn get(&self, devnum: u16) -> Option<&'static dyn Device> {
        self.table.get(devnum as usize)?.get().copied()
    }
}

impl Default for DevSW {
    fn default() -> Self {
        Self::new()
    }
}

// Device Major Number
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Major {
    Null = 0,
    #[default]
    Invalid,
}
