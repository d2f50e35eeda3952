use crate::{
    error::{Error::*, Result},
    fs::{DInode, DirEnt, ROOTINO},
    param::FSSIZE,
    spinlock::Mutex,
    stat::FileType,
};
use alloc::vec::Vec;
use zerocopy::AsBytes;

// In-memory disks. Each formatted device holds a flat inode array
// and one byte stream per inode. Device numbers start at 1; device
// n lives at DISKS[n - 1].
//
// Callers serialize access to one inode through the inode sleeplock;
// the table lock only protects the vectors themselves.

static DISKS: Mutex<Vec<Disk>> = Mutex::new(Vec::new(), "disks");

#[derive(Debug)]
struct Disk {
    inodes: Vec<DInode>,
    data: Vec<Vec<u8>>,
}

impl Disk {
    fn new() -> Self {
        let mut inodes = Vec::with_capacity(FSSIZE as usize);
        inodes.resize(FSSIZE as usize, DInode::default());
        let mut data = Vec::with_capacity(FSSIZE as usize);
        data.resize(FSSIZE as usize, Vec::new());
        Self { inodes, data }
    }
}

// Format a new device holding an empty root directory and return
// its device number.
pub fn mkfs() -> u32 {
    let mut disk = Disk::new();

    let mut root = Vec::new();
    for name in [".", ".."] {
        let mut de = DirEnt::default();
        de.inum = ROOTINO as u16;
        de.name[..name.len()].copy_from_slice(name.as_bytes());
        root.extend_from_slice(de.as_bytes());
    }
    let ri = &mut disk.inodes[ROOTINO as usize];
    ri.itype = FileType::Dir;
    ri.nlink = 1;
    ri.size = root.len() as u32;
    disk.data[ROOTINO as usize] = root;

    let mut disks = DISKS.lock();
    disks.push(disk);
    let dev = disks.len() as u32;
    log::info!("mkfs: dev {} with {} inodes", dev, FSSIZE);
    dev
}

fn with_disk<R>(dev: u32, f: impl FnOnce(&mut Disk) -> R) -> R {
    let mut disks = DISKS.lock();
    match (dev as usize).checked_sub(1).and_then(|i| disks.get_mut(i)) {
        Some(disk) => f(disk),
        None => panic!("ramdisk: no device {}", dev),
    }
}

pub fn read_inode(dev: u32, inum: u32) -> DInode {
    with_disk(dev, |d| d.inodes[inum as usize])
}

pub fn write_inode(dev: u32, inum: u32, dip: &DInode) {
    with_disk(dev, |d| d.inodes[inum as usize] = *dip);
}

// Claim a free inode on dev by giving it a type.
pub fn ialloc(dev: u32, itype: FileType) -> Result<u32> {
    with_disk(dev, |d| {
        for inum in 1..FSSIZE {
            let dip = &mut d.inodes[inum as usize];
            if dip.itype == FileType::Empty {
                // a free inode
                *dip = DInode::default();
                dip.itype = itype;
                d.data[inum as usize].clear();
                return Ok(inum);
            }
        }
        Err(StorageFull) // no inodes
    })
}

// Copy up to dst.len() bytes starting at off.
// Returns the number of bytes copied.
pub fn read(dev: u32, inum: u32, off: usize, dst: &mut [u8]) -> usize {
    with_disk(dev, |d| {
        let src = &d.data[inum as usize];
        if off >= src.len() {
            return 0;
        }
        let n = core::cmp::min(dst.len(), src.len() - off);
        dst[..n].copy_from_slice(&src[off..off + n]);
        n
    })
}

// Store src at off, growing the stream with zeros if needed.
pub fn write(dev: u32, inum: u32, off: usize, src: &[u8]) {
    with_disk(dev, |d| {
        let dst = &mut d.data[inum as usize];
        if dst.len() < off + src.len() {
            dst.resize(off + src.len(), 0);
        }
        dst[off..off + src.len()].copy_from_slice(src);
    })
}

pub fn trunc(dev: u32, inum: u32) {
    with_disk(dev, |d| d.data[inum as usize] = Vec::new());
}
