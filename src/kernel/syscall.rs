use crate::{
    error::{Error::*, Result},
    exec::exec,
    fcntl::OMode,
    fdtable::{self, fdalloc},
    file::{self, File},
    fs::{self, Path},
    log::LOG,
    param::{MAXARG, MAXPATH},
    pipe::Pipe,
    proc::{copyin, copyout, myproc},
    stat::FileType,
    symlink,
    vm::{UVAddr, PGSIZE},
};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::mem::size_of;
use core::str;
use zerocopy::{AsBytes, FromBytes};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum SysCalls {
    Pipe = 4,
    Read = 5,
    Exec = 7,
    Fstat = 8,
    Chdir = 9,
    Dup = 10,
    Open = 15,
    Write = 16,
    Mknod = 17,
    Unlink = 18,
    Link = 19,
    Mkdir = 20,
    Close = 21,
    Symlink = 22,
    Readlink = 23,
    Invalid = 0,
}

#[derive(Debug, Clone, Copy)]
pub enum Fn {
    U(fn() -> Result<()>),    // return unit type
    I(fn() -> Result<usize>), // return integer
}

impl Fn {
    // Every failure reaches user space as -1.
    pub fn call(self, id: SysCalls) -> isize {
        let res = match self {
            Fn::U(uni) => uni().map(|()| 0),
            Fn::I(int) => int().map(|i| i as isize),
        };
        match res {
            Ok(ret) => ret,
            Err(err) => {
                log::debug!("{:?}: {}", id, err);
                -1
            }
        }
    }
}

impl SysCalls {
    pub fn table(self) -> (Fn, &'static str) {
        match self {
            Self::Pipe => (Fn::U(Self::pipe), "(p: &mut [usize; 2])"), // Create a pipe, put read/write file descriptors in p[0] and p[1].
            Self::Read => (Fn::I(Self::read), "(fd: usize, buf: *mut u8, n: usize)"), // Read n bytes into buf; returns number read; or 0 if end of file
            Self::Exec => (Fn::I(Self::exec), "(filename: &str, argv: &[&str])"), // Load a file and execute it with arguments; only returns if error.
            Self::Fstat => (Fn::U(Self::fstat), "(fd: usize, st: &mut Stat)"), // Place info about an open file into st.
            Self::Chdir => (Fn::U(Self::chdir), "(dirname: &str)"), // Change the current directory.
            Self::Dup => (Fn::I(Self::dup), "(fd: usize)"), // Return a new file descriptor referring to the same file as fd.
            Self::Open => (Fn::I(Self::open), "(filename: &str, flags: usize)"), // Open a file; flags indicate read/write; returns an fd.
            Self::Write => (Fn::I(Self::write), "(fd: usize, buf: *const u8, n: usize)"), // Write n bytes from buf to file descriptor fd; returns n.
            Self::Mknod => (Fn::U(Self::mknod), "(file: &str, mj: usize, mi: usize)"), // Create a device file
            Self::Unlink => (Fn::U(Self::unlink), "(file: &str)"), // Remove a file
            Self::Link => (Fn::U(Self::link), "(file1: &str, file2: &str)"), // Create another name (file2) for the file file1.
            Self::Mkdir => (Fn::U(Self::mkdir), "(dir: &str)"), // Create a new directory.
            Self::Close => (Fn::U(Self::close), "(fd: usize)"), // Release open file fd.
            Self::Symlink => (Fn::U(Self::symlink), "(target: &str, linkpath: &str)"), // Create linkpath pointing at target.
            Self::Readlink => (Fn::I(Self::readlink), "(linkpath: &str, buf: *mut u8, bufsize: usize)"), // Copy the target of linkpath into buf; returns its length.
            Self::Invalid => (Fn::U(Self::invalid), "()"),
        }
    }

    pub fn invalid() -> Result<()> {
        Err(InvalidArgument)
    }

    pub fn from_usize(n: usize) -> Self {
        match n {
            4 => Self::Pipe,
            5 => Self::Read,
            7 => Self::Exec,
            8 => Self::Fstat,
            9 => Self::Chdir,
            10 => Self::Dup,
            15 => Self::Open,
            16 => Self::Write,
            17 => Self::Mknod,
            18 => Self::Unlink,
            19 => Self::Link,
            20 => Self::Mkdir,
            21 => Self::Close,
            22 => Self::Symlink,
            23 => Self::Readlink,
            _ => Self::Invalid,
        }
    }
}

// Dispatch the system call in a7 with arguments in a0..a2.
// The result goes back in a0.
pub fn syscall() {
    let p = myproc();
    let num = p.data().trapframe.a7;
    let syscall_id = SysCalls::from_usize(num);
    log::trace!("{}: {:?}", p.pid(), syscall_id);
    let ret = match syscall_id {
        SysCalls::Invalid => {
            log::warn!("{} {}: unknown sys call {}", p.pid(), p.data().name, num);
            -1
        }
        _ => syscall_id.table().0.call(syscall_id),
    };
    p.data_mut().trapframe.a0 = ret as usize;
}

// A (pointer, length) pair describing a byte string in user memory.
#[derive(Debug, Default, Clone, Copy, AsBytes, FromBytes)]
#[repr(C)]
struct SBInfo {
    ptr: usize,
    len: usize,
}

fn fetch_addr<T: AsBytes + FromBytes>(addr: UVAddr, buf: &mut T) -> Result<()> {
    let p_data = myproc().data();
    let end = addr
        .into_usize()
        .checked_add(size_of::<T>())
        .ok_or(BadVirtAddr)?;
    if addr.into_usize() >= p_data.sz || end > p_data.sz {
        return Err(BadVirtAddr);
    }
    copyin(buf, addr)
}

// Copy the bytes sbinfo describes into buf.
// None for a null pointer.
fn fetch_slice(sbinfo: SBInfo, buf: &mut [u8]) -> Result<Option<usize>> {
    if sbinfo.ptr == 0 {
        return Ok(None);
    }
    if sbinfo.len > buf.len() {
        return Err(NoBufferSpace);
    }
    copyin(&mut buf[..sbinfo.len], UVAddr::from(sbinfo.ptr))?;
    Ok(Some(sbinfo.len))
}

fn argraw(n: usize) -> usize {
    let tf = &myproc().data().trapframe;
    match n {
        0 => tf.a0,
        1 => tf.a1,
        2 => tf.a2,
        3 => tf.a3,
        4 => tf.a4,
        5 => tf.a5,
        _ => panic!("arg"),
    }
}

trait Arg {
    type Out<'a>;
    type In<'a>;
    fn from_arg<'a>(n: usize, input: &'a mut Self::In<'a>) -> Result<Self::Out<'a>>;
}

impl Arg for Path {
    type In<'a> = [u8; MAXPATH];
    type Out<'a> = &'a Self;
    fn from_arg<'a>(n: usize, input: &'a mut Self::In<'a>) -> Result<Self::Out<'a>> {
        let mut sbinfo = SBInfo::default();
        fetch_addr(UVAddr::from(argraw(n)), &mut sbinfo)?;
        let len = fetch_slice(sbinfo, &mut input[..])?.ok_or(InvalidArgument)?;
        Ok(Self::new(
            str::from_utf8(&input[..len])
                .or(Err(Utf8Error))?
                .trim_end_matches(char::from(0)),
        ))
    }
}

// The session behind a descriptor argument; the descriptor lands in
// input.
impl Arg for File {
    type In<'a> = usize;
    type Out<'a> = File;
    fn from_arg<'a>(n: usize, input: &'a mut Self::In<'a>) -> Result<Self::Out<'a>> {
        *input = argraw(n);
        fdtable::file(*input)
    }
}

#[derive(Debug)]
struct Argv(Vec<String>);

impl Arg for Argv {
    type In<'a> = [u8; PGSIZE];
    type Out<'a> = Self;
    fn from_arg<'a>(n: usize, input: &'a mut Self::In<'a>) -> Result<Self::Out<'a>> {
        let uargv = UVAddr::from(argraw(n));
        let mut argv = Vec::new();
        loop {
            if argv.len() >= MAXARG {
                return Err(ArgumentListTooLong);
            }
            let mut sbinfo = SBInfo::default();
            fetch_addr(uargv + argv.len() * size_of::<SBInfo>(), &mut sbinfo)?;
            let Some(len) = fetch_slice(sbinfo, &mut input[..])? else {
                break;
            };
            let arg = str::from_utf8(&input[..len]).or(Err(Utf8Error))?;
            argv.push(arg.to_string());
        }
        Ok(Argv(argv))
    }
}

// System Calls related to File operations
impl SysCalls {
    pub fn dup() -> Result<usize> {
        let mut _fd = 0;
        let f = File::from_arg(0, &mut _fd)?;
        fdalloc(f)
    }
    pub fn read() -> Result<usize> {
        let mut _fd = 0;
        let f = File::from_arg(0, &mut _fd)?;
        let buf = UVAddr::from(argraw(1));
        let n = argraw(2);

        f.read(buf, n)
    }
    pub fn write() -> Result<usize> {
        let mut _fd = 0;
        let f = File::from_arg(0, &mut _fd)?;
        let buf = UVAddr::from(argraw(1));
        let n = argraw(2);

        f.write(buf, n)
    }
    pub fn close() -> Result<()> {
        let mut fd = 0;
        File::from_arg(0, &mut fd)?;
        fdtable::close(fd)
    }
    pub fn fstat() -> Result<()> {
        let mut fd = 0;
        let st = UVAddr::from(argraw(1));
        let f = File::from_arg(0, &mut fd)?;

        f.stat(st)
    }
    pub fn link() -> Result<()> {
        let mut old = [0; MAXPATH];
        let mut new = [0; MAXPATH];
        let old_path = Path::from_arg(0, &mut old)?;
        let new_path = Path::from_arg(1, &mut new)?;

        let _op = LOG.begin();
        fs::link(old_path, new_path)
    }
    pub fn unlink() -> Result<()> {
        let mut path = [0; MAXPATH];
        let path = Path::from_arg(0, &mut path)?;

        let _op = LOG.begin();
        fs::unlink(path)
    }
    pub fn open() -> Result<usize> {
        let mut path = [0u8; MAXPATH];
        let omode = argraw(1);
        let path = Path::from_arg(0, &mut path)?;

        file::open(path, OMode::from_usize(omode))
    }
    pub fn mkdir() -> Result<()> {
        let mut path = [0u8; MAXPATH];
        let path = Path::from_arg(0, &mut path)?;

        let _op = LOG.begin();
        fs::create(path, FileType::Dir, 0, 0).and(Ok(()))
    }
    pub fn mknod() -> Result<()> {
        let mut path = [0u8; MAXPATH];
        let path = Path::from_arg(0, &mut path)?;
        let major = u16::try_from(argraw(1)).or(Err(InvalidArgument))?;
        let minor = u16::try_from(argraw(2)).or(Err(InvalidArgument))?;

        let _op = LOG.begin();
        fs::create(path, FileType::Device, major, minor).and(Ok(()))
    }
    pub fn chdir() -> Result<()> {
        let mut path = [0u8; MAXPATH];
        let path = Path::from_arg(0, &mut path)?;

        let _op = LOG.begin();
        let ip = symlink::follow(path)?;
        if ip.lock().itype() != FileType::Dir {
            return Err(NotADirectory);
        }
        myproc().data_mut().cwd.replace(ip);
        Ok(())
    }
    pub fn symlink() -> Result<()> {
        let mut target = [0u8; MAXPATH];
        let mut path = [0u8; MAXPATH];
        let target = Path::from_arg(0, &mut target)?;
        let path = Path::from_arg(1, &mut path)?;

        let _op = LOG.begin();
        symlink::symlink(target.as_str(), path)
    }
    pub fn readlink() -> Result<usize> {
        let mut path = [0u8; MAXPATH];
        let path = Path::from_arg(0, &mut path)?;
        let buf = UVAddr::from(argraw(1));
        let bufsize = argraw(2);

        let _op = LOG.begin();
        symlink::readlink(path, buf, bufsize)
    }
    pub fn exec() -> Result<usize> {
        let mut path = [0u8; MAXPATH];
        let mut buf = [0u8; PGSIZE];
        let path = Path::from_arg(0, &mut path)?;
        let argv = Argv::from_arg(1, &mut buf)?;
        exec(path, argv.0)
    }
    pub fn pipe() -> Result<()> {
        let fdarray = UVAddr::from(argraw(0));

        let (rf, wf) = Pipe::alloc()?;
        let fd0 = fdalloc(rf)?;
        let fd1 = match fdalloc(wf) {
            Ok(fd) => fd,
            Err(err) => {
                fdtable::close(fd0)?;
                return Err(err);
            }
        };

        if let Err(err) = copyout(fdarray, &[fd0, fd1][..]) {
            fdtable::close(fd0)?;
            fdtable::close(fd1)?;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcntl::omode;
    use crate::file::{FNod, Major, VFile, FTABLE};
    use crate::param::{MAXDEREF, NOFILE};
    use crate::testutil::{elf_image, Sandbox};
    use alloc::{format, vec};
    use std::thread;

    fn mkfile(sb: &mut Sandbox, path: &str, content: &[u8]) {
        let fd = sb.open(path, omode::CREATE | omode::WRONLY);
        assert!(fd >= 0, "create {}", path);
        assert_eq!(sb.write(fd as usize, content), content.len() as isize);
        assert_eq!(sb.close(fd as usize), 0);
    }

    fn cat(sb: &mut Sandbox, path: &str) -> Option<Vec<u8>> {
        let fd = sb.open(path, omode::RDONLY);
        if fd < 0 {
            return None;
        }
        let content = sb.read(fd as usize, 4096);
        sb.close(fd as usize);
        content
    }

    #[test]
    fn syscall_numbers() {
        for n in 0..32 {
            let id = SysCalls::from_usize(n);
            if id != SysCalls::Invalid {
                assert_eq!(id as usize, n);
            }
        }
        assert_eq!(SysCalls::from_usize(2), SysCalls::Invalid);
    }

    #[test]
    fn unknown_syscall_fails() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.call_raw(99, [0, 0, 0]), -1);
        assert_eq!(sb.call_raw(0, [0, 0, 0]), -1);
        assert_eq!(sb.call_raw(1, [0, 0, 0]), -1);
    }

    #[test]
    fn create_close_reopen() {
        let mut sb = Sandbox::new();
        let fd = sb.open("/a", omode::CREATE | omode::RDWR);
        assert_eq!(fd, 0);
        assert_eq!(sb.close(0), 0);
        let fd = sb.open("/a", omode::RDONLY);
        assert_eq!(fd, 0);
        assert_eq!(sb.read(0, 10), Some(vec![]));
        assert_eq!(sb.close(0), 0);
        assert_eq!(sb.close(0), -1);
    }

    #[test]
    fn link_then_unlink_keeps_content() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/a", b"shared");
        assert_eq!(sb.link("/a", "/b"), 0);
        assert_eq!(sb.link("/a", "/b"), -1);
        assert_eq!(sb.unlink("/a"), 0);
        assert_eq!(cat(&mut sb, "/a"), None);
        assert_eq!(cat(&mut sb, "/b"), Some(b"shared".to_vec()));

        let fd = sb.open("/b", omode::RDONLY) as usize;
        assert_eq!(sb.fstat(fd).unwrap().nlink, 1);
    }

    #[test]
    fn directory_unlink_and_parent_links() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.mkdir("/d"), 0);
        assert_eq!(sb.mkdir("/d"), -1);
        let root_links = |sb: &mut Sandbox| {
            let fd = sb.open("/", omode::RDONLY) as usize;
            let n = sb.fstat(fd).unwrap().nlink;
            sb.close(fd);
            n
        };
        assert_eq!(root_links(&mut sb), 2);

        mkfile(&mut sb, "/d/f", b"");
        assert_eq!(sb.unlink("/d"), -1);
        assert_eq!(sb.unlink("/d/."), -1);
        assert_eq!(sb.unlink("/d/.."), -1);
        assert_eq!(sb.unlink("/d/f"), 0);
        assert_eq!(sb.unlink("/d"), 0);
        assert_eq!(root_links(&mut sb), 1);
        assert_eq!(sb.open("/d", omode::RDONLY), -1);
    }

    #[test]
    fn directories_cannot_be_hard_linked() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.mkdir("/d"), 0);
        assert_eq!(sb.link("/d", "/e"), -1);
        assert_eq!(sb.open("/e", omode::RDONLY), -1);
        let fd = sb.open("/d", omode::RDONLY) as usize;
        assert_eq!(sb.fstat(fd).unwrap().nlink, 1);
    }

    #[test]
    fn symlink_hop_limit() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/t", b"end");
        assert_eq!(sb.symlink("/t", &format!("/s{}", MAXDEREF)), 0);
        for i in (1..MAXDEREF).rev() {
            assert_eq!(sb.symlink(&format!("/s{}", i + 1), &format!("/s{}", i)), 0);
        }
        assert_eq!(cat(&mut sb, "/s1"), Some(b"end".to_vec()));

        assert_eq!(sb.symlink("/s1", "/s0"), 0);
        assert_eq!(sb.open("/s0", omode::RDONLY), -1);
        assert!(sb.open("/s0", omode::NOFOLLOW) >= 0);
    }

    #[test]
    fn readlink_contract() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/f", b"");
        assert_eq!(sb.symlink("/f", "/l"), 0);
        assert_eq!(sb.readlink("/l", 64), Some(b"/f".to_vec()));
        assert_eq!(sb.readlink("/l", 2), Some(b"/f".to_vec()));
        // too small
        assert_eq!(sb.readlink("/l", 1), None);
        // not a symlink
        assert_eq!(sb.readlink("/f", 64), None);
        assert_eq!(sb.readlink("/missing", 64), None);

        // a chain is not followed
        assert_eq!(sb.symlink("/l", "/ll"), 0);
        assert_eq!(sb.readlink("/ll", 64), Some(b"/l".to_vec()));
        // existing name
        assert_eq!(sb.symlink("/x", "/f"), -1);
    }

    #[test]
    fn pipe_round_trip() {
        let mut sb = Sandbox::new();
        let (r, w) = sb.pipe().unwrap();
        assert_ne!(r, w);
        assert_eq!(sb.write(w, b"ping"), 4);
        assert_eq!(sb.read(r, 16), Some(b"ping".to_vec()));
        assert_eq!(sb.read(w, 1), None);
        assert_eq!(sb.write(r, b"x"), -1);
        assert!(sb.fstat(r).is_none());
        assert_eq!(sb.close(w), 0);
        assert_eq!(sb.read(r, 16), Some(vec![]));
    }

    #[test]
    fn pipe_calls_reject_bad_buffers() {
        let mut sb = Sandbox::new();
        let (r, w) = sb.pipe().unwrap();
        let buf = sb.ubuf(4);
        sb.poke(buf, b"abc");
        assert_eq!(sb.call(SysCalls::Write, [w, buf, usize::MAX]), -1);
        assert_eq!(sb.call(SysCalls::Write, [w, buf, 3]), 3);
        assert_eq!(sb.call(SysCalls::Read, [r, usize::MAX - 1, 3]), -1);
        assert_eq!(sb.close(w), 0);
        assert_eq!(sb.read(r, 8), Some(b"abc".to_vec()));
        assert_eq!(sb.read(r, 8), Some(vec![]));
    }

    #[test]
    fn failed_pipe_leaks_nothing() {
        let mut sb = Sandbox::new();
        // bad fdarray address
        assert_eq!(sb.call(SysCalls::Pipe, [usize::MAX - 4, 0, 0]), -1);
        assert_eq!(sb.proc.data().ofile.count(), 0);

        // room for one descriptor only
        let fd = sb.open("/", omode::RDONLY) as usize;
        for _ in 2..NOFILE {
            assert!(sb.dup(fd) >= 0);
        }
        assert_eq!(sb.proc.data().ofile.count(), NOFILE - 1);
        assert_eq!(sb.pipe(), None);
        assert_eq!(sb.proc.data().ofile.count(), NOFILE - 1);
    }

    #[test]
    fn pipe_with_one_free_session_leaks_nothing() {
        let mut sb = Sandbox::exclusive();
        let free = || FTABLE.lock().iter().filter(|f| f.is_none()).count();
        let spare = free();
        let held: Vec<File> = {
            let _op = LOG.begin();
            (1..spare)
                .map(|_| FTABLE.alloc(OMode::new(), VFile::Inode(FNod::new(sb.root(), 0))))
                .collect::<Result<_>>()
                .unwrap()
        };
        assert_eq!(free(), 1);

        assert_eq!(sb.pipe(), None);
        assert_eq!(free(), 1);
        assert_eq!(sb.proc.data().ofile.count(), 0);

        drop(held);
        assert_eq!(free(), spare);
        assert!(sb.pipe().is_some());
    }

    #[test]
    fn dup_shares_offset() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/f", b"abcdef");
        let fd = sb.open("/f", omode::RDONLY) as usize;
        let d = sb.dup(fd) as usize;
        assert_eq!(sb.read(fd, 2), Some(b"ab".to_vec()));
        assert_eq!(sb.read(d, 2), Some(b"cd".to_vec()));
        assert_eq!(sb.close(fd), 0);
        assert_eq!(sb.read(d, 8), Some(b"ef".to_vec()));
        assert_eq!(sb.dup(fd), -1);
        assert_eq!(sb.dup(NOFILE), -1);
    }

    #[test]
    fn fstat_reports_inode() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/f", b"12345");
        let fd = sb.open("/f", omode::RDONLY) as usize;
        let st = sb.fstat(fd).unwrap();
        assert_eq!(st.dev, sb.dev);
        assert_eq!(st.ino, sb.lookup("/f").inum());
        assert_eq!(st.file_type(), FileType::File);
        assert_eq!(st.size, 5);
        assert!(sb.fstat(fd + 1).is_none());
    }

    #[test]
    fn mknod_null_device() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.mknod("/null", Major::Null as usize, 0), 0);
        assert_eq!(sb.mknod("/null", Major::Null as usize, 0), -1);
        let fd = sb.open("/null", omode::RDWR) as usize;
        assert_eq!(sb.write(fd, b"gone"), 4);
        assert_eq!(sb.read(fd, 4), Some(vec![]));
    }

    #[test]
    fn mknod_rejects_wide_device_numbers() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.mknod("/big", 1 << 16, 0), -1);
        assert_eq!(sb.mknod("/big", Major::Null as usize, usize::MAX), -1);
        assert_eq!(sb.open("/big", omode::RDWR), -1);
        assert_eq!(sb.mknod("/big", u16::MAX as usize, u16::MAX as usize), 0);
        assert_eq!(sb.open("/big", omode::RDWR), -1);
    }

    #[test]
    fn chdir_follows_symlinks() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.mkdir("/d"), 0);
        mkfile(&mut sb, "/d/f", b"inside");
        assert_eq!(sb.symlink("/d", "/ln"), 0);
        assert_eq!(sb.chdir("/ln"), 0);
        assert_eq!(cat(&mut sb, "f"), Some(b"inside".to_vec()));
        assert_eq!(sb.chdir("f"), -1);
        assert_eq!(sb.chdir("/nope"), -1);
        assert_eq!(sb.chdir(".."), 0);
        assert_eq!(cat(&mut sb, "d/f"), Some(b"inside".to_vec()));
    }

    #[test]
    fn string_arguments_are_checked() {
        let mut sb = Sandbox::new();
        // null pointer
        let null = sb.uslice(0, 3);
        assert_eq!(sb.call(SysCalls::Open, [null, omode::CREATE, 0]), -1);
        // longer than MAXPATH
        let long = "a".repeat(MAXPATH + 1);
        assert_eq!(sb.open(&long, omode::CREATE), -1);
        // not utf-8
        let bad = sb.ubytes(&[b'/', 0xff, 0xfe]);
        assert_eq!(sb.call(SysCalls::Mkdir, [bad, 0, 0]), -1);
        // descriptor outside the image
        assert_eq!(sb.call(SysCalls::Unlink, [usize::MAX, 0, 0]), -1);
        // trailing NULs are ignored
        let padded = sb.ubytes(b"/p\0\0");
        assert_eq!(sb.call(SysCalls::Mkdir, [padded, 0, 0]), 0);
        assert!(sb.open("/p", omode::RDONLY) >= 0);
        // a component longer than a directory entry name
        assert_eq!(sb.mkdir("/fifteen_chars_x"), -1);
        assert_eq!(sb.mkdir("/fourteen_chars"), 0);
    }

    #[test]
    fn exec_marshals_arguments() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/prog", &elf_image(b"code"));
        assert_eq!(sb.exec("/prog", &["prog", "a", "bb"]), 3);
        let data = sb.proc.data();
        assert_eq!(data.argv, ["prog", "a", "bb"]);
        assert_eq!(data.name, "prog");
    }

    #[test]
    fn exec_argument_limits() {
        let mut sb = Sandbox::new();
        mkfile(&mut sb, "/prog", &elf_image(b"code"));

        let many: Vec<&str> = core::iter::repeat("x").take(MAXARG).collect();
        assert_eq!(sb.exec("/prog", &many), -1);

        let long = "y".repeat(PGSIZE + 1);
        assert_eq!(sb.exec("/prog", &[long.as_str()]), -1);

        // an argument that is not utf-8
        let p = sb.ustr("/prog");
        let bad = sb.ubuf(1);
        sb.poke(bad, &[0xc3]);
        let argv = sb.ubuf(4 * size_of::<usize>());
        sb.poke(argv, [bad, 1, 0, 0][..].as_bytes());
        assert_eq!(sb.call(SysCalls::Exec, [p, argv, 0]), -1);
        assert!(sb.proc.data().argv.is_empty());

        let fewer: Vec<&str> = core::iter::repeat("x").take(MAXARG - 1).collect();
        assert_eq!(sb.exec("/prog", &fewer), (MAXARG - 1) as isize);
    }

    #[test]
    fn concurrent_creates_in_one_directory() {
        let mut sb = Sandbox::new();
        assert_eq!(sb.mkdir("/shared"), 0);
        let dev = sb.dev;

        let workers: Vec<_> = (0..4)
            .map(|t| {
                thread::spawn(move || {
                    let mut sb = Sandbox::attach(dev);
                    for i in 0..8 {
                        let path = format!("/shared/t{}f{}", t, i);
                        let fd = sb.open(&path, omode::CREATE | omode::RDWR);
                        assert!(fd >= 0, "{}", path);
                        assert_eq!(sb.close(fd as usize), 0);
                    }
                    // everyone also races on one name
                    let fd = sb.open("/shared/common", omode::CREATE | omode::RDWR);
                    assert!(fd >= 0);
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        for t in 0..4 {
            for i in 0..8 {
                assert!(sb.open(&format!("/shared/t{}f{}", t, i), omode::RDONLY) >= 0);
                sb.close(0);
            }
        }
        let fd = sb.open("/shared/common", omode::RDONLY) as usize;
        assert_eq!(sb.fstat(fd).unwrap().nlink, 1);
        assert_eq!(sb.unlink("/shared"), -1);
    }
}
