use crate::{
    elf::{self, ElfHdr, ProgHdr},
    error::{Error::*, Result},
    fs::{IData, Path},
    log::LOG,
    param::{MAXARG, STACK_PAGE_NUM},
    proc::myproc,
    symlink,
    vm::{pgroundup, UVAddr, Uvm, PGSIZE},
};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::mem::size_of;
use zerocopy::AsBytes;

// Load a program segment into the image at virtual address va.
// va must be page-aligned
// and the pages from va to va+sz must already be allocated.
impl Uvm {
    pub fn loadseg(&mut self, va: UVAddr, ip: &IData, offset: usize, sz: usize) -> Result<()> {
        if va.into_usize() % PGSIZE != 0 {
            panic!("loadseg(): va must be aligned.");
        }

        let mut page = [0u8; PGSIZE];
        let mut i: usize = 0;

        while i < sz {
            let n = core::cmp::min(sz - i, PGSIZE);
            if ip.read(&mut page[..n], (offset + i) as u32) != n {
                return Err(ExecFileFormatError);
            }
            self.copyout(va + i, &page[..n])?;
            i += PGSIZE;
        }
        Ok(())
    }
}

// Build a new image from the executable at path, sizing the image to sz.
fn load(path: &Path, elf: &mut ElfHdr, sz: &mut usize) -> Result<Uvm> {
    let _op = LOG.begin();
    let ip = symlink::follow(path)?;
    let guard = ip.lock();

    // Load & Check ELF header
    if guard.read(elf.as_bytes_mut(), 0) != size_of::<ElfHdr>() || !elf.is_valid() {
        return Err(ExecFileFormatError);
    }

    let mut uvm = Uvm::new(0);

    // Load program into memory.
    let mut phdr = ProgHdr::default();
    let mut off = elf.e_phoff as usize;
    for _ in 0..elf.e_phnum {
        if guard.read(phdr.as_bytes_mut(), off as u32) != size_of::<ProgHdr>() {
            return Err(ExecFileFormatError);
        }
        off += size_of::<ProgHdr>();
        if phdr.p_type != elf::PT_LOAD {
            continue;
        }
        let vaddr = phdr.p_vaddr as usize;
        let msize = phdr.p_msize as usize;
        if phdr.p_msize < phdr.p_fsize {
            return Err(ExecFileFormatError);
        }
        let end = vaddr.checked_add(msize).ok_or(ExecFileFormatError)?;
        if vaddr % PGSIZE != 0 {
            return Err(ExecFileFormatError);
        }
        *sz = uvm.alloc(*sz, end)?;
        uvm.loadseg(
            UVAddr::from(vaddr),
            &guard,
            phdr.p_offset as usize,
            phdr.p_fsize as usize,
        )?;
    }
    Ok(uvm)
}

// Replace the current image with the program at path, passing it argv.
// Returns argc, which ends up in a0.
// argv is consumed on every path out.
pub fn exec(path: &Path, argv: Vec<String>) -> Result<usize> {
    if argv.len() > MAXARG {
        return Err(ArgumentListTooLong);
    }
    let mut elf = ElfHdr::default();
    let mut sz = 0;
    let mut uvm = load(path, &mut elf, &mut sz)?;

    // Allocate some pages at the next page boundary.
    // Make the first inaccessible as a stack guard.
    // Use the next STACK_PAGE_NUM pages as the user stack.
    let pgnum = 1 + STACK_PAGE_NUM;
    sz = pgroundup(sz);
    sz = uvm.alloc(sz, sz + pgnum * PGSIZE)?;
    let mut sp = UVAddr::from(sz);
    let stackbase = sp - PGSIZE * STACK_PAGE_NUM;

    // Push argument strings, prepare rest of stack in ustack.
    // Each entry is a (pointer, length) pair.
    let mut ustack = [0usize; MAXARG * 2];
    let mut argc = 0;
    for arg in argv.iter() {
        if sp.into_usize() < arg.len() {
            return Err(NoBufferSpace);
        }
        sp -= arg.len();
        sp -= sp.into_usize() % 16; // sp must be 16-byte aligned
        if sp < stackbase {
            return Err(NoBufferSpace);
        }
        uvm.copyout(sp, arg.as_bytes())?;
        ustack[argc * 2] = sp.into_usize();
        ustack[argc * 2 + 1] = arg.len();
        argc += 1;
    }

    // Push the pair array.
    sp -= size_of::<[usize; MAXARG * 2]>();
    sp -= sp.into_usize() % 16;
    if sp < stackbase {
        return Err(NoBufferSpace);
    }
    uvm.copyout(sp, &ustack[..])?;

    // Push a slice header over it: (pointer, argc).
    let slice: [usize; 2] = [sp.into_usize(), argc];
    sp -= size_of::<[usize; 2]>();
    sp -= sp.into_usize() % 16;
    if sp < stackbase {
        return Err(NoBufferSpace);
    }
    uvm.copyout(sp, &slice[..])?;

    // Commit to the user image.
    let data = myproc().data_mut();
    let tf = &mut data.trapframe;
    tf.a1 = if argc > 0 { sp.into_usize() } else { 0 };
    tf.epc = elf.e_entry as usize; // initial program counter = main
    tf.sp = sp.into_usize(); // initial stack pointer

    // Save program name for debugging.
    if let Some(name) = path.file_name() {
        data.name = name.to_string();
    }
    data.uvm = Some(uvm);
    data.sz = sz;
    data.argv = argv;

    log::debug!("exec: pid {} runs {} argc {}", myproc().pid(), data.name, argc);
    Ok(argc)
}
