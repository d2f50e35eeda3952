use crate::error::{Error::*, Result};
use alloc::vec::Vec;
use core::ops::{Add, AddAssign, Sub, SubAssign};
use zerocopy::{AsBytes, FromBytes};

pub const PGSIZE: usize = 4096; // bytes per page
pub const MAXVA: usize = 1 << 24; // ceiling of a user image

pub const fn pgroundup(sz: usize) -> usize {
    (sz + PGSIZE - 1) & !(PGSIZE - 1)
}

// User virtual address
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UVAddr(usize);

impl UVAddr {
    pub fn into_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for UVAddr {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

impl Add<usize> for UVAddr {
    type Output = Self;
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<usize> for UVAddr {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

impl Sub<usize> for UVAddr {
    type Output = Self;
    fn sub(self, rhs: usize) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl SubAssign<usize> for UVAddr {
    fn sub_assign(&mut self, rhs: usize) {
        self.0 -= rhs;
    }
}

// User memory image. Addresses are offsets into a flat, zero-filled
// region [0, sz).
#[derive(Debug, Default, Clone)]
pub struct Uvm {
    mem: Vec<u8>,
}

impl Uvm {
    pub fn new(sz: usize) -> Self {
        Self {
            mem: alloc::vec![0; sz],
        }
    }

    // Grow the image from oldsz to newsz, which need not be page
    // aligned. Returns new size.
    pub fn alloc(&mut self, oldsz: usize, newsz: usize) -> Result<usize> {
        if newsz < oldsz {
            return Ok(oldsz);
        }
        if newsz > MAXVA {
            return Err(OutOfMemory);
        }
        let newsz = pgroundup(newsz);
        if newsz > self.mem.len() {
            self.mem.resize(newsz, 0);
        }
        Ok(newsz)
    }

    fn range(&self, va: UVAddr, len: usize) -> Result<core::ops::Range<usize>> {
        let start = va.into_usize();
        let end = start.checked_add(len).ok_or(BadVirtAddr)?;
        if end > self.mem.len() {
            return Err(BadVirtAddr);
        }
        Ok(start..end)
    }

    // Copy from kernel to user.
    pub fn copyout<T: AsBytes + ?Sized>(&mut self, dstva: UVAddr, src: &T) -> Result<()> {
        let src = src.as_bytes();
        let range = self.range(dstva, src.len())?;
        self.mem[range].copy_from_slice(src);
        Ok(())
    }

    // Copy from user to kernel.
    pub fn copyin<T: AsBytes + FromBytes + ?Sized>(&self, dst: &mut T, srcva: UVAddr) -> Result<()> {
        let dst = dst.as_bytes_mut();
        let range = self.range(srcva, dst.len())?;
        dst.copy_from_slice(&self.mem[range]);
        Ok(())
    }
}
