use crate::{
    error::{Error::*, Result},
    fs::{create, IData, Inode, Path},
    param::{MAXDEREF, MAXPATH},
    proc::copyout,
    stat::FileType,
    vm::UVAddr,
};
use alloc::{string::String, vec, vec::Vec};
use core::mem::size_of;
use zerocopy::{AsBytes, FromBytes};

// Symbolic links.
//
// A symlink inode stores its target in its data:
//   [ SymlinkHeader | target bytes | NUL ]
// The target is resolved again from scratch on every hop, relative
// targets from the current directory.

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, AsBytes, FromBytes)]
pub struct SymlinkHeader {
    pub len: u32,
}

// Outcome of resolving a path once without following symlinks.
#[derive(Debug)]
pub enum Hop {
    Resolved(Inode),
    IsSymlink(String),
    NotFound,
    Corrupt,
}

// Read the stored target of a locked symlink inode.
// None if the payload is malformed.
fn read_target(ip: &IData) -> Option<Vec<u8>> {
    let mut hdr = SymlinkHeader::default();
    if ip.read(hdr.as_bytes_mut(), 0) != size_of::<SymlinkHeader>() {
        return None;
    }
    let len = hdr.len as usize;
    if len > MAXPATH {
        return None;
    }
    let mut target = vec![0u8; len];
    if ip.read(&mut target, size_of::<SymlinkHeader>() as u32) != len {
        return None;
    }
    Some(target)
}

// Resolve path once. A symlink at the end of the path is reported
// with its target instead of being followed.
// Must be called inside a transaction.
pub fn hop(path: &Path) -> Hop {
    let ip = match path.namei() {
        Ok((_, ip)) => ip,
        Err(_) => return Hop::NotFound,
    };
    let guard = ip.lock();
    if guard.itype() != FileType::Symlink {
        drop(guard);
        return Hop::Resolved(ip);
    }
    let target = read_target(&guard);
    match target.map(String::from_utf8) {
        Some(Ok(target)) => Hop::IsSymlink(target),
        _ => Hop::Corrupt,
    }
}

// Resolve path, following at most MAXDEREF symlinks.
// Must be called inside a transaction.
pub fn follow(path: &Path) -> Result<Inode> {
    let mut path = String::from(path.as_str());
    for _ in 0..=MAXDEREF {
        match hop(Path::new(&path)) {
            Hop::Resolved(ip) => return Ok(ip),
            Hop::IsSymlink(target) => path = target,
            Hop::NotFound => return Err(NotFound),
            Hop::Corrupt => {
                log::error!("symlink: bad payload on the way to {}", path);
                panic!("corrupted symlink inode");
            }
        }
    }
    Err(FilesystemLoop)
}

pub fn resolve(path: &Path, follow_links: bool) -> Result<Inode> {
    if follow_links {
        follow(path)
    } else {
        path.namei().map(|(_, ip)| ip)
    }
}

// Create a symlink at path pointing to target.
// Must be called inside a transaction.
pub fn symlink(target: &str, path: &Path) -> Result<()> {
    if target.len() > MAXPATH {
        return Err(NoBufferSpace);
    }
    let ip = create(path, FileType::Symlink, 0, 0)?;
    let mut guard = ip.lock();

    let hdr = SymlinkHeader {
        len: target.len() as u32,
    };
    let mut payload = Vec::with_capacity(size_of::<SymlinkHeader>() + target.len() + 1);
    payload.extend_from_slice(hdr.as_bytes());
    payload.extend_from_slice(target.as_bytes());
    payload.push(0);
    guard.write(&payload, 0)?;
    Ok(())
}

// Copy the target of the symlink at path into the user buffer.
// Returns the length of the target.
// Must be called inside a transaction.
pub fn readlink(path: &Path, buf: UVAddr, bufsize: usize) -> Result<usize> {
    let (_, ip) = path.namei()?;
    let guard = ip.lock();
    if guard.itype() != FileType::Symlink {
        return Err(InvalidArgument);
    }
    let target = match read_target(&guard) {
        Some(target) => target,
        None => panic!("corrupted symlink inode"),
    };
    if target.len() > bufsize {
        return Err(NoBufferSpace);
    }
    copyout(buf, target.as_slice())?;
    Ok(target.len())
}
