// Harness for running system calls from tests. A Sandbox is a process
// bound to the calling thread, with its root and working directory on
// a freshly formatted ramdisk and a flat user image to pass arguments
// through.
//
// Sandboxes share the global file table. A test that needs all of it
// takes an exclusive sandbox, which waits out every other one.

use crate::{
    elf::{self, ElfHdr, ProgHdr},
    fs::{self, Inode, Path},
    log::LOG,
    null,
    proc::Proc,
    ramdisk,
    stat::{FileType, Stat},
    syscall::{syscall, SysCalls},
    vm::{UVAddr, Uvm, PGSIZE},
};
use alloc::vec::Vec;
use core::mem::size_of;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use zerocopy::AsBytes;

static GATE: RwLock<()> = RwLock::new(());

#[allow(dead_code)]
enum Gate {
    Shared(RwLockReadGuard<'static, ()>),
    Exclusive(RwLockWriteGuard<'static, ()>),
}

pub const IMAGE_PAGES: usize = 64;
pub const ENTRY: u64 = 0x40;

pub struct Sandbox {
    pub proc: &'static Proc,
    pub dev: u32,
    brk: usize,
    _gate: Option<Gate>,
}

impl Sandbox {
    pub fn new() -> Self {
        let gate = GATE.read().unwrap_or_else(PoisonError::into_inner);
        Self::format(Gate::Shared(gate))
    }

    // A sandbox that runs alone.
    pub fn exclusive() -> Self {
        let gate = GATE.write().unwrap_or_else(PoisonError::into_inner);
        Self::format(Gate::Exclusive(gate))
    }

    fn format(gate: Gate) -> Self {
        null::init();
        let mut sb = Self::attach(ramdisk::mkfs());
        sb._gate = Some(gate);
        sb
    }

    // A new process on the current thread, rooted at dev. Shares the
    // gate of the sandbox that formatted dev.
    pub fn attach(dev: u32) -> Self {
        let proc = Proc::alloc().unwrap();
        let data = proc.data_mut();
        data.root = Some(fs::root(dev).unwrap());
        data.cwd = Some(fs::root(dev).unwrap());
        data.uvm = Some(Uvm::new(IMAGE_PAGES * PGSIZE));
        data.sz = IMAGE_PAGES * PGSIZE;
        proc.bind();
        Self {
            proc,
            dev,
            brk: PGSIZE,
            _gate: None,
        }
    }

    pub fn root(&self) -> Inode {
        fs::root(self.dev).unwrap()
    }

    pub fn lookup(&self, path: &str) -> Inode {
        let _op = LOG.begin();
        Path::new(path).namei().unwrap().1
    }

    fn uvm(&self) -> &mut Uvm {
        self.proc.data_mut().uvm.as_mut().unwrap()
    }

    // Reserve n bytes of user memory. Wraps around when the image is
    // used up, so only recent buffers stay valid.
    pub fn ubuf(&mut self, n: usize) -> usize {
        if self.brk + n > IMAGE_PAGES * PGSIZE {
            self.brk = PGSIZE;
        }
        let addr = self.brk;
        self.brk = (self.brk + n + 15) & !15;
        addr
    }

    pub fn poke(&mut self, addr: usize, bytes: &[u8]) {
        self.uvm().copyout(UVAddr::from(addr), bytes).unwrap();
    }

    pub fn peek(&self, addr: usize, n: usize) -> Vec<u8> {
        let mut buf = alloc::vec![0u8; n];
        self.uvm().copyin(&mut buf[..], UVAddr::from(addr)).unwrap();
        buf
    }

    // A (ptr, len) descriptor in user memory.
    pub fn uslice(&mut self, ptr: usize, len: usize) -> usize {
        let addr = self.ubuf(2 * size_of::<usize>());
        self.poke(addr, [ptr, len][..].as_bytes());
        addr
    }

    // Copy s into user memory and return the address of its descriptor.
    pub fn ustr(&mut self, s: &str) -> usize {
        self.ubytes(s.as_bytes())
    }

    pub fn ubytes(&mut self, bytes: &[u8]) -> usize {
        let ptr = self.ubuf(bytes.len());
        self.poke(ptr, bytes);
        self.uslice(ptr, bytes.len())
    }

    // A null-terminated descriptor array for exec.
    pub fn uargv(&mut self, args: &[&str]) -> usize {
        let mut pairs = Vec::new();
        for a in args {
            let ptr = self.ubuf(a.len());
            self.poke(ptr, a.as_bytes());
            pairs.extend_from_slice(&[ptr, a.len()]);
        }
        pairs.extend_from_slice(&[0, 0]);
        let addr = self.ubuf(pairs.len() * size_of::<usize>());
        self.poke(addr, pairs.as_bytes());
        addr
    }

    pub fn call_raw(&mut self, num: usize, args: [usize; 3]) -> isize {
        let tf = &mut self.proc.data_mut().trapframe;
        tf.a0 = args[0];
        tf.a1 = args[1];
        tf.a2 = args[2];
        tf.a7 = num;
        syscall();
        self.proc.data().trapframe.a0 as isize
    }

    pub fn call(&mut self, id: SysCalls, args: [usize; 3]) -> isize {
        self.call_raw(id as usize, args)
    }

    pub fn open(&mut self, path: &str, mode: usize) -> isize {
        let p = self.ustr(path);
        self.call(SysCalls::Open, [p, mode, 0])
    }

    pub fn close(&mut self, fd: usize) -> isize {
        self.call(SysCalls::Close, [fd, 0, 0])
    }

    pub fn dup(&mut self, fd: usize) -> isize {
        self.call(SysCalls::Dup, [fd, 0, 0])
    }

    pub fn read(&mut self, fd: usize, n: usize) -> Option<Vec<u8>> {
        let buf = self.ubuf(n);
        let r = self.call(SysCalls::Read, [fd, buf, n]);
        (r >= 0).then(|| self.peek(buf, r as usize))
    }

    pub fn write(&mut self, fd: usize, bytes: &[u8]) -> isize {
        let buf = self.ubuf(bytes.len());
        self.poke(buf, bytes);
        self.call(SysCalls::Write, [fd, buf, bytes.len()])
    }

    pub fn fstat(&mut self, fd: usize) -> Option<Stat> {
        let buf = self.ubuf(size_of::<Stat>());
        if self.call(SysCalls::Fstat, [fd, buf, 0]) < 0 {
            return None;
        }
        let raw = self.peek(buf, size_of::<Stat>());
        let u32_at = |i: usize| u32::from_ne_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        let u16_at = |i: usize| u16::from_ne_bytes([raw[i], raw[i + 1]]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&raw[16..24]);

        let mut st = Stat::default();
        st.dev = u32_at(0);
        st.ino = u32_at(4);
        st.ftype = FileType::from_u16(u16_at(8));
        st.nlink = u16_at(10);
        st.size = u64::from_ne_bytes(size);
        Some(st)
    }

    pub fn mkdir(&mut self, path: &str) -> isize {
        let p = self.ustr(path);
        self.call(SysCalls::Mkdir, [p, 0, 0])
    }

    pub fn mknod(&mut self, path: &str, major: usize, minor: usize) -> isize {
        let p = self.ustr(path);
        self.call(SysCalls::Mknod, [p, major, minor])
    }

    pub fn unlink(&mut self, path: &str) -> isize {
        let p = self.ustr(path);
        self.call(SysCalls::Unlink, [p, 0, 0])
    }

    pub fn link(&mut self, old: &str, new: &str) -> isize {
        let o = self.ustr(old);
        let n = self.ustr(new);
        self.call(SysCalls::Link, [o, n, 0])
    }

    pub fn chdir(&mut self, path: &str) -> isize {
        let p = self.ustr(path);
        self.call(SysCalls::Chdir, [p, 0, 0])
    }

    pub fn symlink(&mut self, target: &str, path: &str) -> isize {
        let t = self.ustr(target);
        let p = self.ustr(path);
        self.call(SysCalls::Symlink, [t, p, 0])
    }

    pub fn readlink(&mut self, path: &str, bufsize: usize) -> Option<Vec<u8>> {
        let p = self.ustr(path);
        let buf = self.ubuf(bufsize);
        let r = self.call(SysCalls::Readlink, [p, buf, bufsize]);
        (r >= 0).then(|| self.peek(buf, r as usize))
    }

    pub fn pipe(&mut self) -> Option<(usize, usize)> {
        let buf = self.ubuf(2 * size_of::<usize>());
        if self.call(SysCalls::Pipe, [buf, 0, 0]) < 0 {
            return None;
        }
        let raw = self.peek(buf, 2 * size_of::<usize>());
        let (a, b) = raw.split_at(size_of::<usize>());
        let fd = |s: &[u8]| {
            let mut w = [0u8; size_of::<usize>()];
            w.copy_from_slice(s);
            usize::from_ne_bytes(w)
        };
        Some((fd(a), fd(b)))
    }

    pub fn exec(&mut self, path: &str, argv: &[&str]) -> isize {
        let p = self.ustr(path);
        let a = self.uargv(argv);
        self.call(SysCalls::Exec, [p, a, 0])
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.proc.exit();
    }
}

// A one-segment executable whose text is loaded at 0.
pub fn elf_image(text: &[u8]) -> Vec<u8> {
    let mut hdr = ElfHdr::default();
    hdr.e_ident[..4].copy_from_slice(&[elf::ELFMAG0, elf::ELFMAG1, elf::ELFMAG2, elf::ELFMAG3]);
    hdr.e_ident[elf::EI_CLSS] = elf::ELF64CL;
    hdr.e_ident[elf::EI_DATA] = elf::ELFDATA2LSB;
    hdr.e_entry = ENTRY;
    hdr.e_phoff = size_of::<ElfHdr>() as u64;
    hdr.e_phnum = 1;

    let off = size_of::<ElfHdr>() + size_of::<ProgHdr>();
    let ph = ProgHdr {
        p_type: elf::PT_LOAD,
        p_offset: off as u64,
        p_fsize: text.len() as u64,
        p_msize: text.len() as u64 + 100,
        ..Default::default()
    };
    let mut out = Vec::new();
    out.extend_from_slice(hdr.as_bytes());
    out.extend_from_slice(ph.as_bytes());
    out.extend_from_slice(text);
    out
}
