use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[repr(isize)]
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Error {
    Uncategorized,
    NotFound = -3,
    OutOfMemory = -4,
    BadVirtAddr = -5,
    StorageFull = -6,
    TooManyLinks = -7,
    NoBufferSpace = -10,
    Interrupted = -12,
    BadFileDescriptor = -13,
    FileDescriptorTooLarge = -14,
    FileTooLarge = -15,
    AlreadyExists = -16,
    IsADirectory = -17,
    NotADirectory = -18,
    CrossesDevices = -19,
    PermissionDenied = -20,
    DirectoryNotEmpty = -21,
    FileTableOverflow = -22,
    InvalidArgument = -23,
    NoSuchNode = -24,
    BrokenPipe = -25,
    ExecFileFormatError = -26,
    ArgumentListTooLong = -27,
    Utf8Error = -28,
    FilesystemLoop = -31,
}

impl Error {
    pub fn as_str(&self) -> &'static str {
        use Error::*;
        match *self {
            NotFound => "entry not found",
            OutOfMemory => "out of memory",
            StorageFull => "no storage space",
            TooManyLinks => "too many links",
            BadVirtAddr => "bad virtual address",
            NoBufferSpace => "no buffer space available",
            Interrupted => "operation interrupted",
            BadFileDescriptor => "bad file descriptor",
            FileDescriptorTooLarge => "file descriptor value too large",
            FileTooLarge => "file too large",
            AlreadyExists => "entity already exists",
            IsADirectory => "is a directory",
            NotADirectory => "not a directory",
            CrossesDevices => "cross-device link or rename",
            PermissionDenied => "permission denied",
            DirectoryNotEmpty => "directory not empty",
            FileTableOverflow => "inode or file table overflow in system",
            InvalidArgument => "invalid argument",
            NoSuchNode => "no such node or address",
            BrokenPipe => "broken pipe",
            ExecFileFormatError => "executable file format error",
            ArgumentListTooLong => "argument list too long",
            Utf8Error => "slice is not utf8",
            FilesystemLoop => "too many levels of symbolic links",
            Uncategorized => "uncategorized error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
