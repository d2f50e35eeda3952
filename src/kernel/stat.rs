use zerocopy::AsBytes;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AsBytes)]
pub enum FileType {
    #[default]
    Empty = 0,
    Dir = 1,
    File = 2,
    Device = 3,
    Symlink = 4,
}

impl FileType {
    pub fn from_u16(bits: u16) -> Self {
        match bits {
            1 => Self::Dir,
            2 => Self::File,
            3 => Self::Device,
            4 => Self::Symlink,
            _ => Self::Empty,
        }
    }
}

#[derive(Default, Debug, Clone, Copy, AsBytes)]
#[repr(C)]
pub struct Stat {
    pub dev: u32,        // File system's disk device
    pub ino: u32,        // Inode number
    pub ftype: FileType, // Type of file
    pub nlink: u16,      // Number of links to file
    _reserved: u32,
    pub size: u64, // Size of file in bytes
}

impl Stat {
    pub fn file_type(&self) -> FileType {
        self.ftype
    }
}
