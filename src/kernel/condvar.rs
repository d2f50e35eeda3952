use crate::{
    error::{Error::Interrupted, Result},
    proc::{self, try_myproc},
    spinlock::MutexGuard,
};

#[derive(Debug)]
pub struct Condvar;

impl Condvar {
    pub const fn new() -> Self {
        Self
    }

    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        proc::sleep(self as *const _ as usize, guard)
    }

    // Like wait, but gives up once the current process is killed.
    pub fn wait_killable<'a, T>(&self, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>> {
        if killed() {
            return Err(Interrupted);
        }
        let guard = self.wait(guard);
        if killed() {
            return Err(Interrupted);
        }
        Ok(guard)
    }

    pub fn notify_all(&self) {
        proc::wakeup(self as *const _ as usize);
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

fn killed() -> bool {
    try_myproc().map_or(false, |p| p.killed())
}
