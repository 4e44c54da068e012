#![no_std]

extern crate alloc;

/* ext2fs 的整体架构，自上而下 */

// 索引节点号分配/回收：分配器与回收器
mod ialloc;

// 文件系统层：挂载、格式化、同步
mod efs;
mod format;

// 内存中的文件系统状态：超级块计数与组描述符表
mod state;

// 柱面组索引：索引节点号与 (组号, 组内位) 之间的换算
mod group;

// 索引节点句柄解析层
mod inode;

// 磁盘数据结构层
mod layout;

// 块缓存层：内存上的磁盘块数据缓存
mod block_cache;

mod error;
mod util;

pub use self::{
    block_cache::{BlockCache, BlockCacheManager},
    efs::{Ext2FileSystem, FreeIoPolicy, Geometry, MountOptions},
    error::{Corruption, Error, Result},
    format::FormatOptions,
    group::{GroupIndex, InGroupBit, InodeNumber},
    inode::{InodeHandle, InodeResolver, InodeTable, ResolveCtx, TableInode},
    layout::{BlockAddress, InodeBitmap, InodeMode},
    state::{FsState, GroupDescriptor},
};

pub const EXT2_MAGIC: u16 = 0xEF53;
/// 根目录的索引节点号
pub const ROOT_INO: u32 = 2;
/// ext2 第 1 版的首个通用索引节点号
pub const DEFAULT_FIRST_INO: u32 = 11;
/// 超级块总位于设备的第 1024 字节处
pub const SUPER_BLOCK_OFFSET: usize = 1024;
pub const SUPER_BLOCK_SIZE: usize = 1024;
pub const INODE_SIZE: usize = 128;
pub const GROUP_DESC_SIZE: usize = 32;
