use crate::{
    error::{Error::*, Result},
    file::File,
    param::NOFILE,
    proc::myproc,
    vm::UVAddr,
};

// Per-process open file table. A descriptor is an index into it;
// duplicated descriptors share one session.
#[derive(Debug, Default)]
pub struct FdTable {
    ofile: [Option<File>; NOFILE],
}

impl FdTable {
    pub fn get(&self, fd: usize) -> Result<&File> {
        self.ofile
            .get(fd)
            .ok_or(FileDescriptorTooLarge)?
            .as_ref()
            .ok_or(BadFileDescriptor)
    }

    // Install file in the lowest free slot.
    // The file is handed back if the table is full.
    pub fn alloc(&mut self, file: File) -> core::result::Result<usize, File> {
        match self.ofile.iter_mut().enumerate().find(|(_, f)| f.is_none()) {
            Some((fd, f)) => {
                *f = Some(file);
                Ok(fd)
            }
            None => Err(file),
        }
    }

    pub fn dup(&mut self, fd: usize) -> Result<usize> {
        let f = self.get(fd)?.clone();
        self.alloc(f).or(Err(FileDescriptorTooLarge))
    }

    pub fn take(&mut self, fd: usize) -> Result<File> {
        self.get(fd)?;
        self.ofile[fd].take().ok_or(BadFileDescriptor)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        drop(self.take(fd)?);
        Ok(())
    }

    pub fn close_all(&mut self) {
        for f in self.ofile.iter_mut() {
            f.take();
        }
    }

    pub fn count(&self) -> usize {
        self.ofile.iter().filter(|f| f.is_some()).count()
    }
}

// Descriptor operations of the current process. The session is
// cloned out of the table first, so a blocking read or write does
// not hold on to the process's table.

pub fn file(fd: usize) -> Result<File> {
    myproc().data().ofile.get(fd).cloned()
}

pub fn fdalloc(file: File) -> Result<usize> {
    myproc()
        .data_mut()
        .ofile
        .alloc(file)
        .or(Err(FileDescriptorTooLarge))
}

pub fn dup(fd: usize) -> Result<usize> {
    myproc().data_mut().ofile.dup(fd)
}

pub fn read(fd: usize, dst: UVAddr, n: usize) -> Result<usize> {
    file(fd)?.read(dst, n)
}

pub fn write(fd: usize, src: UVAddr, n: usize) -> Result<usize> {
    file(fd)?.write(src, n)
}

pub fn stat(fd: usize, addr: UVAddr) -> Result<()> {
    file(fd)?.stat(addr)
}

pub fn close(fd: usize) -> Result<()> {
    let f = myproc().data_mut().ofile.take(fd)?;
    drop(f);
    Ok(())
}
