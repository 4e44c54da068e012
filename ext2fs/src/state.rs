//! # 文件系统状态
//!
//! 挂载期间常驻内存的超级块计数与组描述符表，由分配器和回收器原地修改，
//! 由 [`Ext2FileSystem::sync`](crate::Ext2FileSystem::sync) 写回。

use alloc::vec::Vec;

use crate::{BlockAddress, Corruption};

#[derive(Debug)]
pub struct FsState {
    pub(crate) total_inodes: u32,
    /// 全局空闲索引节点数，应等于各组之和，但不强制
    pub(crate) free_inodes: u32,
    pub(crate) dirty: bool,
    /// 挂载后长度固定
    pub(crate) groups: Vec<GroupDescriptor>,
    /// 首次致命损坏，之后文件系统只读
    pub(crate) fault: Option<Corruption>,
}

/// 组描述符在内存中的副本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub(crate) free_inodes: u32,
    pub(crate) dir_count: u32,
    pub(crate) bitmap_block: BlockAddress,
    pub(crate) inode_table: BlockAddress,
}

impl FsState {
    pub(crate) fn new(total_inodes: u32, free_inodes: u32, groups: Vec<GroupDescriptor>) -> Self {
        Self {
            total_inodes,
            free_inodes,
            dirty: false,
            groups,
            fault: None,
        }
    }

    #[inline]
    pub fn total_inodes(&self) -> u32 {
        self.total_inodes
    }

    #[inline]
    pub fn free_inodes(&self) -> u32 {
        self.free_inodes
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn groups(&self) -> &[GroupDescriptor] {
        &self.groups
    }

    #[inline]
    pub fn fault(&self) -> Option<Corruption> {
        self.fault
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.fault.is_some()
    }

    /// 各组空闲数之和与全局计数是否一致
    pub fn counters_consistent(&self) -> bool {
        self.groups.iter().map(|g| g.free_inodes as u64).sum::<u64>() == self.free_inodes as u64
    }
}

impl GroupDescriptor {
    pub(crate) fn new(
        free_inodes: u32,
        dir_count: u32,
        bitmap_block: BlockAddress,
        inode_table: BlockAddress,
    ) -> Self {
        Self {
            free_inodes,
            dir_count,
            bitmap_block,
            inode_table,
        }
    }

    #[inline]
    pub fn free_inodes(&self) -> u32 {
        self.free_inodes
    }

    #[inline]
    pub fn dir_count(&self) -> u32 {
        self.dir_count
    }

    /// 索引节点位图所在块
    #[inline]
    pub fn bitmap_block(&self) -> BlockAddress {
        self.bitmap_block
    }

    #[inline]
    pub fn inode_table(&self) -> BlockAddress {
        self.inode_table
    }
}
