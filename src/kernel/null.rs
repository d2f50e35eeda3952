use crate::error::{Error::AlreadyExists, Result};
use crate::file::{Device, Major, DEVSW};
use crate::vm::UVAddr;

pub static NULL: Null = Null;

// The null device: reads hit end of file at once, writes vanish.
#[derive(Debug)]
pub struct Null;

impl Device for Null {
    fn read(&self, _dst: UVAddr, _n: usize) -> Result<usize> {
        Ok(0)
    }
    fn write(&self, _src: UVAddr, n: usize) -> Result<usize> {
        Ok(n)
    }
    fn major(&self) -> Major {
        Major::Null
    }
}

// Register the null driver. Registering twice is harmless.
pub fn init() {
    match DEVSW.set(Major::Null, &NULL) {
        Ok(()) => log::info!("null: registered as major {}", Major::Null as u16),
        Err(AlreadyExists) => (),
        Err(e) => panic!("null init: {}", e),
    }
}
