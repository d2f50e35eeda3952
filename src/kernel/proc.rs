use crate::{
    error::{Error::*, Result},
    fdtable::FdTable,
    fs::Inode,
    log::LOG,
    param::NPROC,
    spinlock::{Mutex, MutexGuard},
    vm::{UVAddr, Uvm},
};
use alloc::string::String;
use array_macro::array;
use core::cell::{Cell, UnsafeCell};
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Lazy;
use zerocopy::{AsBytes, FromBytes};

// Each process runs on its own kernel thread. The thread records which
// process slot it is executing on behalf of.
std::thread_local! {
    static CURRENT: Cell<Option<&'static Proc>> = const { Cell::new(None) };
}

pub static PROCS: Lazy<[Proc; NPROC]> = Lazy::new(|| array![_ => Proc::new(); NPROC]);

static NEXTPID: AtomicUsize = AtomicUsize::new(1);

// per-process data for the trap handling code.
// only the argument registers, the program counter and the stack pointer
// are consumed by the system call layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrapFrame {
    pub epc: usize,
    pub sp: usize,
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a4: usize,
    pub a5: usize,
    pub a6: usize,
    pub a7: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcState {
    #[default]
    Unused,
    Used,
}

// lock must be held when using these
#[derive(Debug, Default)]
pub struct ProcInner {
    pub state: ProcState,
    pub killed: bool, // If true, have been killed
    pub pid: usize,   // Process ID
}

// these are private to the process, so lock need not be held.
#[derive(Debug, Default)]
pub struct ProcData {
    pub sz: usize,              // Size of process memory (bytes)
    pub uvm: Option<Uvm>,       // User memory
    pub trapframe: TrapFrame,   // data page for trampoline.S
    pub ofile: FdTable,         // Open files
    pub cwd: Option<Inode>,     // Current directory
    pub root: Option<Inode>,    // Directory absolute paths start from
    pub argv: alloc::vec::Vec<String>, // Arguments of the current image
    pub name: String,           // Process name (debugging)
}

#[derive(Debug)]
pub struct Proc {
    pub inner: Mutex<ProcInner>,
    data: UnsafeCell<ProcData>,
}
// ProcData is only touched from the thread bound to the process.
unsafe impl Sync for Proc {}

impl Proc {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Default::default(), "proc"),
            data: UnsafeCell::new(Default::default()),
        }
    }

    // Look in the process table for an UNUSED proc.
    // If found, initialize state required to run in the kernel.
    // The new process has an empty descriptor table and no image.
    pub fn alloc() -> Result<&'static Proc> {
        for p in PROCS.iter() {
            let mut inner = p.inner.lock();
            if inner.state == ProcState::Unused {
                inner.state = ProcState::Used;
                inner.killed = false;
                inner.pid = NEXTPID.fetch_add(1, Ordering::Relaxed);
                *p.data_mut() = ProcData::default();
                return Ok(p);
            }
        }
        Err(OutOfMemory)
    }

    pub fn pid(&self) -> usize {
        self.inner.lock().pid
    }

    pub fn data(&self) -> &'static ProcData {
        unsafe { &*self.data.get() }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn data_mut(&self) -> &'static mut ProcData {
        unsafe { &mut *self.data.get() }
    }

    // Run the calling kernel thread on behalf of this process.
    pub fn bind(&'static self) {
        CURRENT.with(|c| c.set(Some(self)));
    }

    // Kill the process. The victim won't exit until it next
    // observes the flag in an interruptible wait.
    pub fn kill(&self) {
        self.inner.lock().killed = true;
        wakeup(self as *const _ as usize);
    }

    pub fn killed(&self) -> bool {
        self.inner.lock().killed
    }

    // Tear down a process: close all open files, drop the working
    // directory and the image, and return the slot to the table.
    pub fn exit(&'static self) {
        let data = self.data_mut();
        data.ofile.close_all();
        {
            let _op = LOG.begin();
            data.cwd.take();
            data.root.take();
        }
        data.uvm.take();
        data.sz = 0;
        data.argv.clear();

        CURRENT.with(|c| {
            if matches!(c.get(), Some(p) if core::ptr::eq(p, self)) {
                c.set(None);
            }
        });
        let mut inner = self.inner.lock();
        inner.state = ProcState::Unused;
        inner.pid = 0;
        inner.killed = false;
    }
}

// Return the current process.
// Every system call runs on a thread bound to a process.
pub fn myproc() -> &'static Proc {
    match CURRENT.with(|c| c.get()) {
        Some(p) => p,
        None => panic!("myproc: no process"),
    }
}

pub fn try_myproc() -> Option<&'static Proc> {
    CURRENT.with(|c| c.get())
}

// Sleep and wakeup stand in for the scheduler. A sleeper queues up on
// WAITQ before releasing the spinlock, so a wakeup issued after the
// condition changed under that spinlock cannot be lost.
static WAITQ_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
static WAITQ: std::sync::Condvar = std::sync::Condvar::new();

// Atomically release lock and sleep on chan.
// Reacquires lock when awakened.
pub fn sleep<T>(_chan: usize, guard: MutexGuard<'_, T>) -> MutexGuard<'_, T> {
    let ticket = WAITQ_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let mutex = Mutex::unlock(guard);
    log::trace!("sleep on {}", mutex.name());
    // a kill issued before we queued up would never wake us.
    let ticket = if try_myproc().map_or(false, |p| p.killed()) {
        ticket
    } else {
        WAITQ
            .wait(ticket)
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    };
    drop(ticket);
    mutex.lock()
}

// Wake up all processes sleeping on chan.
// Sleepers recheck their condition, so waking everyone is safe.
pub fn wakeup(_chan: usize) {
    let _ticket = WAITQ_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    WAITQ.notify_all();
}

// Copy to the current process's user memory.
pub fn copyout<T: AsBytes + ?Sized>(dst: UVAddr, src: &T) -> Result<()> {
    myproc()
        .data_mut()
        .uvm
        .as_mut()
        .ok_or(BadVirtAddr)?
        .copyout(dst, src)
}

// Copy from the current process's user memory.
pub fn copyin<T: AsBytes + FromBytes + ?Sized>(dst: &mut T, src: UVAddr) -> Result<()> {
    myproc()
        .data()
        .uvm
        .as_ref()
        .ok_or(BadVirtAddr)?
        .copyin(dst, src)
}
