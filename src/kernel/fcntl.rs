use bitflags::bitflags;

bitflags! {
    // O_RDONLY is the absence of both access bits.
    pub struct OFlags: usize {
        const WRONLY = 0x001;
        const RDWR = 0x002;
        const NOFOLLOW = 0x004;
        const CREATE = 0x200;
        const TRUNC = 0x400;
    }
}

pub mod omode {
    use super::OFlags;
    pub const RDONLY: usize = 0x000;
    pub const WRONLY: usize = OFlags::WRONLY.bits();
    pub const RDWR: usize = OFlags::RDWR.bits();
    pub const NOFOLLOW: usize = OFlags::NOFOLLOW.bits();
    pub const CREATE: usize = OFlags::CREATE.bits();
    pub const TRUNC: usize = OFlags::TRUNC.bits();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OMode {
    read: bool,
    write: bool,
    truncate: bool,
    create: bool,
    nofollow: bool,
}

impl OMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&mut self, read: bool) -> &mut Self {
        self.read = read;
        self
    }
    pub fn write(&mut self, write: bool) -> &mut Self {
        self.write = write;
        self
    }
    pub fn nofollow(&mut self, nofollow: bool) -> &mut Self {
        self.nofollow = nofollow;
        self
    }
    fn truncate(&mut self, truncate: bool) -> &mut Self {
        self.truncate = truncate;
        self
    }
    fn create(&mut self, create: bool) -> &mut Self {
        self.create = create;
        self
    }

    // Unknown bits are ignored.
    pub fn from_usize(bits: usize) -> Self {
        let flags = OFlags::from_bits_truncate(bits);
        let mut mode = Self::new();
        mode.read(!flags.contains(OFlags::WRONLY))
            .write(flags.intersects(OFlags::WRONLY | OFlags::RDWR))
            .create(flags.contains(OFlags::CREATE))
            .truncate(flags.contains(OFlags::TRUNC))
            .nofollow(flags.contains(OFlags::NOFOLLOW));
        mode
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn is_write(&self) -> bool {
        self.write
    }

    pub fn is_create(&self) -> bool {
        self.create
    }

    pub fn is_trunc(&self) -> bool {
        self.truncate
    }

    pub fn is_nofollow(&self) -> bool {
        self.nofollow
    }

    pub fn is_rdonly(&self) -> bool {
        self.read && !self.write
    }
}
