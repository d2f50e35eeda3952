use crate::{
    error::{Error::*, Result},
    log::LOG,
    param::NINODE,
    proc::{copyin, copyout, myproc},
    ramdisk,
    sleeplock::{SleepLock, SleepLockGuard},
    spinlock::Mutex,
    stat::{FileType, Stat},
    vm::UVAddr,
};
use alloc::sync::Arc;
use array_macro::array;
use core::mem::size_of;
use core::ops::Deref;
use spin::Lazy;
use zerocopy::{AsBytes, FromBytes};

// File system implementation. Three layers on top of the ram disk:
//   - Files: inode allocator, reading, writing, metadata.
//   - Directories: inode with special contents (list of other inodes!)
//   - Names: paths like /usr/rtm/octox/fs.rs for convenient naming.
//
// This file contains the low-level file system manipulation
// routines and the directory mutations (create, link, unlink).
// The (higher-level) system call implementations are in syscall.rs

pub const ROOTINO: u32 = 1; // root i-number
pub const BSIZE: usize = 1024; // block size

pub const NDIRECT: usize = 11;
pub const NINDIRECT: usize = BSIZE / size_of::<u32>();
pub const MAXFILE: usize = NDIRECT + NINDIRECT;

// On-disk inode structure
#[derive(Debug, Clone, Copy, Default)]
pub struct DInode {
    pub itype: FileType, // File type
    pub major: u16,      // Major Device Number (T_DEVICE only)
    pub minor: u16,      // Minor Device Number (T_DEVICE only)
    pub nlink: u16,      // Number of links to inode in file system
    pub size: u32,       // Size of data (bytes)
}

// Directory is a file containing a sequence of dirent structures.
pub const DIRSIZ: usize = 14;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, AsBytes, FromBytes)]
pub struct DirEnt {
    pub inum: u16,
    pub name: [u8; DIRSIZ],
}

impl DirEnt {
    // Name up to the first NUL.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(DIRSIZ);
        &self.name[..len]
    }
}

// Inodes.
//
// An inode describes a single unnamed file.
// The inode disk structure holds metadata such as the type of file,
// its size and the number of links that reference that file.
//
// The kernel keeps a table of in-use inodes in memory to provide a
// place to synchronize access to inodes used by multiple processes.
// The in-memory inodes represented Arc<MInode> has book-keeping info
// that is not stored on disk: atomic ref count and ip.valid.
//
// * Allocation: ITABLE.alloc() claims an inode on disk by giving it a
//   type. put() frees it if Arc::strong_count has fallen to 2 and
//   the link count has fallen to zero.
//
// * Referencing in table: an entry in the inode table is free once
//   only the table holds it. get() finds or creates a table entry and
//   increments its Arc count; put() consumes Arc<MInode>.
//
// * Valid: the type and size in an inode table entry is only correct
//   when ip.valid is true. MInode.lock() reads the inode from the
//   disk and sets valid.
//
// * Locked: file system code may only examine and modify the
//   information in an inode if it has first locked the inode.
//
// Thus a typical sequence is:
//   ip = ITABLE.get(dev, inum);  // get inode
//   guard = ip.lock();           // return SleeplockGuard
//   .. examine and modify inode contents
//   // drop(guard)
//   // drop(inode)
//
// Dropping an Inode may free it, so it must happen inside a
// transaction unless the caller knows other links remain.

pub static ITABLE: Lazy<ITable> = Lazy::new(|| Mutex::new(array![None; NINODE], "itable"));

pub type ITable = Mutex<[Option<Arc<MInode>>; NINODE]>;

// Inode passed from ITABLE.
// Wrapper for in-memory inode i.e. MInode
#[derive(Debug)]
pub struct Inode {
    ip: Option<Arc<MInode>>,
}

// in-memory copy of an inode
#[derive(Debug)]
pub struct MInode {
    dev: u32,
    inum: u32,
    data: SleepLock<IData>,
}

#[derive(Debug, Default)]
pub struct IData {
    dev: u32,
    inum: u32,
    valid: bool,
    itype: FileType,
    major: u16,
    minor: u16,
    nlink: u16,
    size: u32,
}

enum LinkOp {
    Plus,
    Minus,
    Init(u16),
}

impl IData {
    fn new(dev: u32, inum: u32) -> Self {
        Self {
            dev,
            inum,
            ..Default::default()
        }
    }

    pub fn itype(&self) -> FileType {
        self.itype
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    pub fn nlink(&self) -> u16 {
        self.nlink
    }

    pub fn inum(&self) -> u32 {
        self.inum
    }

    // inode is write through, so change about MInode is also must be written into disk
    fn set_type(&mut self, itype: FileType) {
        self.itype = itype;
        self.update();
    }

    fn set_major_minor(&mut self, major: u16, minor: u16) {
        self.major = major;
        self.minor = minor;
        self.update();
    }

    fn set_size(&mut self, size: u32) {
        self.size = size;
        self.update();
    }

    fn set_nlink(&mut self, op: LinkOp) {
        match op {
            LinkOp::Plus => self.nlink += 1,
            LinkOp::Minus => self.nlink -= 1,
            LinkOp::Init(num) => self.nlink = num,
        }
        self.update();
    }

    // Copy a modified in-memory inode to disk.
    // Must be called after every change to an inode field
    // that lives on disk.
    // Caller must hold inode sleeplock.
    fn update(&self) {
        let dip = DInode {
            itype: self.itype,
            major: self.major,
            minor: self.minor,
            nlink: self.nlink,
            size: self.size,
        };
        ramdisk::write_inode(self.dev, self.inum, &dip);
        LOG.write(self.dev, self.inum);
    }

    // Truncate inode (discard contents).
    // Caller must hold inode sleeplock.
    pub fn trunc(&mut self) {
        ramdisk::trunc(self.dev, self.inum);
        self.set_size(0);
    }

    // Copy stat information from inode.
    // Caller must hold sleeplock
    pub fn stat(&self) -> Stat {
        let mut st = Stat::default();
        st.dev = self.dev;
        st.ino = self.inum;
        st.ftype = self.itype;
        st.nlink = self.nlink;
        st.size = self.size as u64;
        st
    }

    // Read data from inode into a kernel buffer.
    // Returns the number of bytes read, short at end of file.
    pub fn read(&self, dst: &mut [u8], off: u32) -> usize {
        let off = off as usize;
        let size = self.size as usize;
        if off > size {
            return 0;
        }
        let n = core::cmp::min(dst.len(), size - off);
        ramdisk::read(self.dev, self.inum, off, &mut dst[..n])
    }

    // Read data from inode into user memory, a block at a time.
    pub fn read_user(&self, mut dst: UVAddr, off: u32, n: usize) -> Result<usize> {
        let mut buf = [0u8; BSIZE];
        let mut tot = 0;
        let mut off = off;

        while tot < n {
            let m = core::cmp::min(n - tot, BSIZE - off as usize % BSIZE);
            let r = self.read(&mut buf[..m], off);
            if r == 0 {
                break;
            }
            copyout(dst, &buf[..r])?;
            tot += r;
            off += r as u32;
            dst += r;
        }
        Ok(tot)
    }

    // Write data to inode from a kernel buffer.
    // Caller must hold sleeplock.
    // Returns the number of bytes successfully written.
    pub fn write(&mut self, src: &[u8], off: u32) -> Result<usize> {
        let off = off as usize;
        if off > self.size as usize || off + src.len() > MAXFILE * BSIZE {
            return Err(FileTooLarge);
        }

        ramdisk::write(self.dev, self.inum, off, src);
        LOG.write(self.dev, self.inum);

        let end = off + src.len();
        if end > self.size as usize {
            self.set_size(end as u32);
        }
        Ok(src.len())
    }

    // Write data to inode from user memory, a block at a time.
    // If the return value is less than the requested n,
    // there was an error of some kind.
    pub fn write_user(&mut self, mut src: UVAddr, off: u32, n: usize) -> Result<usize> {
        let mut buf = [0u8; BSIZE];
        let mut tot = 0;
        let mut off = off;

        if off as usize + n > MAXFILE * BSIZE {
            return Err(FileTooLarge);
        }
        while tot < n {
            let m = core::cmp::min(n - tot, BSIZE - off as usize % BSIZE);
            copyin(&mut buf[..m], src)?;
            self.write(&buf[..m], off)?;
            tot += m;
            off += m as u32;
            src += m;
        }
        Ok(tot)
    }

    // Directories

    fn read_dirent(&self, de: &mut DirEnt, off: u32) -> usize {
        self.read(de.as_bytes_mut(), off)
    }

    // Look for a directory entry in a directory.
    // If found, set *poff to byte offset of entry.
    pub fn dirlookup(&self, name: &str, poff: Option<&mut u32>) -> Result<Inode> {
        let mut de: DirEnt = Default::default();
        if self.itype != FileType::Dir {
            return Err(NotADirectory);
        }

        for off in (0..self.size).step_by(size_of::<DirEnt>()) {
            if self.read_dirent(&mut de, off) != size_of::<DirEnt>() {
                panic!("dirlookup read");
            }
            if de.inum == 0 {
                continue;
            }
            if de.name() == name.as_bytes() {
                // entry matches path element
                if let Some(poff) = poff {
                    *poff = off;
                }
                return ITABLE.get(self.dev, de.inum as u32);
            }
        }
        Err(NotFound)
    }

    // Write a new directory entry (name, inum) into the directory dp.
    pub fn dirlink(&mut self, name: &str, inum: u32) -> Result<()> {
        let mut de: DirEnt = Default::default();

        // check that name is not present.
        self.dirlookup(name, None).map_or_else(
            |err| if err == NotFound { Ok(()) } else { Err(err) },
            |_| Err(AlreadyExists),
        )?;

        // Look for an empty dirent
        let mut off = 0;
        while off < self.size {
            if self.read_dirent(&mut de, off) != size_of::<DirEnt>() {
                panic!("dirlink read");
            }
            if de.inum == 0 {
                break;
            }
            off += size_of::<DirEnt>() as u32;
        }

        let len = core::cmp::min(name.len(), DIRSIZ);
        de.name = [0; DIRSIZ];
        de.name[..len].copy_from_slice(&name.as_bytes()[..len]);
        de.inum = inum as u16;
        self.write(de.as_bytes(), off)?;
        Ok(())
    }

    // Is the directory dp empty except for "." and ".." ?
    pub fn is_dir_empty(&self) -> bool {
        let mut de: DirEnt = Default::default();
        for off in ((2 * size_of::<DirEnt>() as u32)..self.size).step_by(size_of::<DirEnt>()) {
            if self.read_dirent(&mut de, off) != size_of::<DirEnt>() {
                log::error!("isdirempty: short read at {} of inode {}", off, self.inum);
                panic!("isdirempty: inode read");
            }
            if de.inum != 0 {
                return false;
            }
        }
        true
    }
}

impl MInode {
    fn new(dev: u32, inum: u32) -> Self {
        Self {
            dev,
            inum,
            data: SleepLock::new(IData::new(dev, inum), "inode"),
        }
    }

    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn inum(&self) -> u32 {
        self.inum
    }

    // unlock function is no need.
    // because SleepLockGuard impl Drop trait.

    // Lock the inode
    // Reads the inode from disk if necessary.
    pub fn lock(&self) -> SleepLockGuard<'_, IData> {
        let mut guard = self.data.lock();
        if !guard.valid {
            let dip = ramdisk::read_inode(self.dev, self.inum);
            guard.itype = dip.itype;
            guard.major = dip.major;
            guard.minor = dip.minor;
            guard.nlink = dip.nlink;
            guard.size = dip.size;
            guard.valid = true;
            if guard.itype == FileType::Empty {
                panic!("ilock: no type");
            }
        }
        guard
    }
}

impl Inode {
    fn new(ip: Arc<MInode>) -> Self {
        Self { ip: Some(ip) }
    }
    // Increments reference count fot Inode.
    // Return cloned Inode to enable ip = ip1.dup() idiom.
    pub fn dup(&self) -> Self {
        Self {
            ip: self.ip.clone(),
        }
    }
}

impl Drop for Inode {
    fn drop(&mut self) {
        if let Some(ip) = self.ip.take() {
            ITABLE.put(ip);
        }
    }
}

impl Deref for Inode {
    type Target = MInode;
    fn deref(&self) -> &Self::Target {
        match self.ip.as_ref() {
            Some(ip) => ip,
            None => panic!("inode: released"),
        }
    }
}

impl ITable {
    // Allocate an inode on device dev.
    // Mark it as allocated by giving it type.
    // Returns an unlocked but allocated and referenced inode.
    fn alloc(&self, dev: u32, itype: FileType) -> Result<Inode> {
        let inum = ramdisk::ialloc(dev, itype)?;
        LOG.write(dev, inum);
        self.get(dev, inum)
    }

    // Find the inode with number inum on device dev
    // and return the in-memoroy copy. Does not lock
    // the inode and does not read it from disk.
    pub fn get(&self, dev: u32, inum: u32) -> Result<Inode> {
        let mut guard = self.lock();

        // Is the inode already in the table?
        let mut empty: Option<&mut Option<Arc<MInode>>> = None;
        for ip in guard.iter_mut() {
            match ip {
                Some(ip) if ip.dev == dev && ip.inum == inum => {
                    return Ok(Inode::new(Arc::clone(ip)));
                }
                None if empty.is_none() => {
                    empty = Some(ip);
                }
                _ => (),
            }
        }

        // Recycle an inode entry
        let empty = match empty {
            Some(ip) => ip,
            None => return Err(FileTableOverflow),
        };

        let ip = Arc::new(MInode::new(dev, inum));
        empty.replace(Arc::clone(&ip));
        Ok(Inode::new(ip))
    }

    // Drop a reference to an in-memory inode.
    // If that was the last reference, the inode table entry can
    // be recycled.
    // If that was the last reference and the inode has no links
    // to it, free the inode (and its content) on disk.
    fn put(&self, inode: Arc<MInode>) {
        let guard = self.lock();

        if Arc::strong_count(&inode) == 2 {
            // no other process can have inode sleeplocked,
            // so this sleeplock won't block (or dead lock).
            let mut idata = inode.data.lock();
            let itable = Mutex::unlock(guard);

            if idata.valid && idata.nlink == 0 {
                // inode has no links and no other references: truncate and free.
                idata.trunc();
                idata.set_type(FileType::Empty);
                idata.valid = false;
            }
            drop(idata);

            let mut guard = itable.lock();
            // someone may have found it again while unlocked.
            if Arc::strong_count(&inode) != 2 {
                return;
            }
            // drop in-memory inode.
            for mip in guard.iter_mut() {
                match mip {
                    Some(ip) if Arc::ptr_eq(&inode, ip) => {
                        mip.take();
                    }
                    _ => (),
                }
            }
        }
    }
}

// Root directory of a formatted device.
pub fn root(dev: u32) -> Result<Inode> {
    ITABLE.get(dev, ROOTINO)
}

// Create the path new as a link to the same inode as old.
// The link count is raised first and rolled back if the entry
// cannot be made, all inside the caller's transaction.
pub fn link(old: &Path, new: &Path) -> Result<()> {
    let (_, ip) = old.namei()?;
    {
        let mut ip_guard = ip.lock();
        if ip_guard.itype == FileType::Dir {
            return Err(IsADirectory);
        }
        if ip_guard.nlink == u16::MAX {
            return Err(TooManyLinks);
        }
        ip_guard.set_nlink(LinkOp::Plus);
    }

    let res = (|| -> Result<()> {
        let (name, dp) = new.nameiparent()?;
        let mut dp_guard = dp.lock();
        if dp.dev != ip.dev {
            return Err(CrossesDevices);
        }
        dp_guard.dirlink(name, ip.inum)
    })();

    if res.is_err() {
        ip.lock().set_nlink(LinkOp::Minus);
    }
    res
}

pub fn unlink(path: &Path) -> Result<()> {
    let de: DirEnt = Default::default();
    let mut off: u32 = 0;

    let (name, dp) = path.nameiparent()?;
    let mut dp_guard = dp.lock();

    // Cannot unlink "." or ".."
    if name == "." || name == ".." {
        return Err(PermissionDenied);
    }

    let ip = dp_guard.dirlookup(name, Some(&mut off))?;
    let mut ip_guard = ip.lock();

    if ip_guard.nlink < 1 {
        panic!("unlink: nlink < 1");
    }
    if ip_guard.itype == FileType::Dir && !ip_guard.is_dir_empty() {
        return Err(DirectoryNotEmpty);
    }

    dp_guard.write(de.as_bytes(), off)?;
    if ip_guard.itype == FileType::Dir {
        dp_guard.set_nlink(LinkOp::Minus);
    }

    ip_guard.set_nlink(LinkOp::Minus);

    Ok(())
}

// Create a new inode named by path. Re-creating a plain file returns
// the existing file or device. The returned inode is unlocked.
// Must be called inside a transaction.
pub fn create(path: &Path, type_: FileType, major: u16, minor: u16) -> Result<Inode> {
    let (name, dp) = path.nameiparent()?;

    let ip: Inode;
    {
        let mut dp_guard = dp.lock();

        if let Ok(ip) = dp_guard.dirlookup(name, None) {
            SleepLock::unlock(dp_guard);
            let ip_guard = ip.lock();
            match type_ {
                FileType::File
                    if ip_guard.itype == FileType::File || ip_guard.itype == FileType::Device =>
                {
                    SleepLock::unlock(ip_guard);
                    return Ok(ip);
                }
                _ => return Err(AlreadyExists),
            }
        }

        ip = ITABLE.alloc(dp.dev, type_)?;
        let mut ip_guard = ip.lock();

        if type_ == FileType::Dir {
            // Create . and .. entries.
            // No ip->nlink++ for ".": avoid cyclic ref count.
            if ip_guard.dirlink(".", ip.inum).is_err()
                || ip_guard.dirlink("..", dp.inum).is_err()
            {
                panic!("create dots");
            }
        }

        // until this succeeds the new inode has no links and is
        // freed when ip is dropped.
        dp_guard.dirlink(name, ip.inum)?;

        // now that success is guaranteed

        if type_ == FileType::Dir {
            dp_guard.set_nlink(LinkOp::Plus); // for ".."
        }

        ip_guard.set_major_minor(major, minor);
        ip_guard.set_nlink(LinkOp::Init(1));
    }

    Ok(ip)
}

// Paths
// A slice of a path (akin to str)
#[derive(Debug)]
#[repr(transparent)]
pub struct Path {
    inner: str,
}

impl AsRef<Path> for str {
    fn as_ref(&self) -> &Path {
        Path::new(self)
    }
}

impl Path {
    pub fn new<S: AsRef<str> + ?Sized>(s: &S) -> &Path {
        unsafe { &*(s.as_ref() as *const str as *const Path) }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn file_name(&self) -> Option<&str> {
        if self.inner.ends_with("..") {
            return None;
        }
        match self.inner.trim_end_matches('/').rsplit_once('/') {
            Some((_, file_name)) => Some(file_name),
            None => Some(&self.inner),
        }
    }

    // Get next path element from path as name &str,
    // the element following the name as &Path
    //
    // Examples:
    //   skip_elem("a/bb/c") = (Some("a"), Some("bb/c")),
    //   skip_elem("///a//bb") = (Some("a"), Some("/bb")),
    //   skipelem("a") = (Some("a"), None)
    //   skipelem("") = skipelem("////") = (None, None)
    //   if name: &str > DIRSIZE return (None, None)
    pub fn skip_elem(&self) -> (Option<&str>, Option<&Path>) {
        let trimmed = self.inner.trim_matches('/');
        match trimmed.split_once('/') {
            Some((name, path)) if name.len() <= DIRSIZ => (Some(name), Some(Path::new(path))),
            None if !trimmed.is_empty() && trimmed.len() <= DIRSIZ => (Some(trimmed), None),
            _ => (None, None),
        }
    }

    // Look up and return the inode for a path name.
    // If `parent` is true, return the inode for the parent and the
    // final element.
    // Absolute paths start at the process's root directory, relative
    // ones at its current directory.
    // Must be called inside a transaction since it calls ITABLE.put()
    // when dropping an inode.
    pub fn namex(path: &Path, parent: bool) -> Result<(&str, Inode)> {
        let data = myproc().data();
        let start = match path.inner.get(0..1) {
            Some("/") => data.root.as_ref(),
            _ => data.cwd.as_ref(),
        };
        let mut ip = start.ok_or(NotFound)?.dup();

        let mut path = path;
        loop {
            let guard = ip.lock();
            if guard.itype != FileType::Dir {
                return Err(NotADirectory);
            }
            match path.skip_elem() {
                (Some(name), Some(npath)) => {
                    let nip = guard.dirlookup(name, None)?;
                    SleepLock::unlock(guard);
                    ip = nip;
                    path = npath;
                    continue;
                }
                (Some(name), None) if !parent => {
                    let ip = guard.dirlookup(name, None)?;
                    SleepLock::unlock(guard);
                    break Ok((name, ip));
                }
                (Some(name), None) => {
                    SleepLock::unlock(guard);
                    break Ok((name, ip));
                }
                _ if !parent
                    && path.inner.starts_with('/')
                    && path.inner.trim_matches('/').is_empty() =>
                {
                    SleepLock::unlock(guard);
                    break Ok(("/", ip));
                }
                _ => break Err(NotFound),
            }
        }
    }

    pub fn namei(&self) -> Result<(&str, Inode)> {
        Self::namex(self, false)
    }

    pub fn nameiparent(&self) -> Result<(&str, Inode)> {
        Self::namex(self, true)
    }
}
