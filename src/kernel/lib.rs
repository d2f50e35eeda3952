#![allow(clippy::missing_safety_doc)]

extern crate alloc;

pub mod condvar;
pub mod elf;
pub mod error;
pub mod exec;
pub mod fcntl;
pub mod fdtable;
pub mod file;
pub mod fs;
pub mod log;
pub mod null;
pub mod param;
pub mod pipe;
pub mod proc;
pub mod ramdisk;
pub mod sleeplock;
pub mod spinlock;
pub mod stat;
pub mod symlink;
pub mod syscall;
pub mod vm;

#[cfg(test)]
pub mod testutil;
