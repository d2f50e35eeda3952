pub const NPROC: usize = 128; // maximum number of processes
pub const NOFILE: usize = 16; // open files per process
pub const NFILE: usize = 512; // open files per system
pub const NINODE: usize = 512; // maximum number of active i-nodes
pub const NDEV: usize = 10; // maximum major device number
pub const MAXARG: usize = 32; // max exec arguments
pub const MAXOPBLOCKS: usize = 10; // max # of blocks any FS op writes
pub const LOGSIZE: usize = MAXOPBLOCKS * 3; // max data blocks in on-disk log
pub const FSSIZE: u32 = 200; // inodes per formatted device
pub const MAXPATH: usize = 128; // maximum file path name
pub const MAXDEREF: usize = 31; // maximum symbolic link hops
pub const STACK_PAGE_NUM: usize = 1; // user stack pages
