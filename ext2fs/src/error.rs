use block_dev::DevError;
use thiserror::Error;

use crate::InodeNumber;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 位图或超级块已无空闲索引节点，或两者不一致；未作任何修改
    #[error("no free inodes")]
    NoSpace,
    #[error(transparent)]
    Io(#[from] DevError),
    /// 编号不在 [1, 索引节点总数] 内
    #[error("no such inode: {0}")]
    InvalidInode(InodeNumber),
    /// 块缓存已满且没有可换出的块
    #[error("run out of block cache")]
    CacheExhausted,
    /// 不可恢复的磁盘损坏，调用者必须将其视为致命错误
    #[error("fatal corruption: {0}")]
    Corruption(#[from] Corruption),
    /// 发生致命损坏后文件系统被强制只读
    #[error("filesystem is read-only after a fatal corruption")]
    ReadOnly,
    #[error("invalid filesystem: {0}")]
    Format(&'static str),
}

impl Error {
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// 位图显示空闲，但索引节点仍在使用
    #[error("dup alloc mode {mode:#o}, nlinks {links}, inum {ino}")]
    DuplicateAlloc { ino: InodeNumber, mode: u16, links: u16 },
    #[error("freeing free inode {ino}")]
    DoubleFree { ino: InodeNumber },
    #[error("inode {ino} outside [{first}, {last}]")]
    OutOfRange { ino: InodeNumber, first: u32, last: u32 },
}
