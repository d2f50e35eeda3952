use crate::{
    param::LOGSIZE,
    proc,
    spinlock::Mutex,
};
use core::ops::Deref;
use spin::Lazy;

// Transaction boundary for FS system calls.
//
// A log transaction contains the updates of multiple FS system
// calls. The log only commits when there are no FS system calls
// active, so a commit never carries an unfinished call's updates.
//
// A system call should call begin_op()/end_op() to mark its start
// and end, or hold the guard returned by begin(). Updates to inodes
// are recorded with write() and must happen inside a transaction.
//
// The ram disk applies updates in place, so committing only
// publishes the set of touched inodes; there is no log space to
// run out of and begin_op() never waits for it. Nested transactions
// from the same call are therefore harmless.

pub static LOG: Lazy<Mutex<Log>> = Lazy::new(|| Mutex::new(Log::new(), "log"));

// In-memory log header: inodes touched by the current transaction.
#[derive(Default, Debug, Clone, Copy)]
struct LogHeader {
    n: u32,
    block: [(u32, u32); LOGSIZE],
}

#[derive(Debug)]
pub struct Log {
    outstanding: u32,
    committing: bool,
    commits: usize,
    lh: LogHeader,
}

impl Log {
    pub fn new() -> Self {
        Self {
            outstanding: 0,
            committing: false,
            commits: 0,
            lh: LogHeader {
                n: 0,
                block: [(0, 0); LOGSIZE],
            },
        }
    }

    fn commit(&mut self) {
        if self.lh.n > 0 {
            log::trace!("log: commit {} inodes", self.lh.n);
            self.lh.n = 0;
            self.commits += 1;
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

// Scoped transaction. end_op() runs when it goes out of scope, so
// every return path ends the transaction exactly once.
#[derive(Debug)]
pub struct Op<'a> {
    log: &'a Mutex<Log>,
}

impl Drop for Op<'_> {
    fn drop(&mut self) {
        self.log.end_op();
    }
}

impl Mutex<Log> {
    // called at the start of each FS system call.
    pub fn begin_op(&self) {
        let mut guard = self.lock();
        while guard.committing {
            guard = proc::sleep(guard.deref() as *const _ as usize, guard);
        }
        guard.outstanding += 1;
    }

    pub fn begin(&self) -> Op<'_> {
        self.begin_op();
        Op { log: self }
    }

    // called at the end of each FS system call.
    // commits if this was the last outstanding operation.
    pub fn end_op(&self) {
        let mut guard = self.lock();
        if guard.committing {
            panic!("log.committing");
        }
        guard.outstanding -= 1;
        if guard.outstanding == 0 {
            guard.committing = true;
            guard.commit();
            guard.committing = false;
        }
        proc::wakeup(guard.deref() as *const _ as usize);
    }

    // Record that inode (dev, inum) was modified by the running
    // transaction. Repeated updates are absorbed.
    pub fn write(&self, dev: u32, inum: u32) {
        let mut guard = self.lock();
        if guard.outstanding < 1 {
            panic!("LOG.write outside of trans");
        }
        let n = guard.lh.n as usize;
        if guard.lh.block[..n].contains(&(dev, inum)) {
            // log absorption
            return;
        }
        if n >= LOGSIZE {
            // the ram disk is already up to date; start a new header.
            guard.commit();
        }
        let n = guard.lh.n as usize;
        guard.lh.block[n] = (dev, inum);
        guard.lh.n += 1;
    }

    pub fn outstanding(&self) -> u32 {
        self.lock().outstanding
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }
}
