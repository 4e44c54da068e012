//! # 磁盘数据结构层
//!
//! ext2fs 的磁盘布局：
//! 引导块 | 超级块 | 组描述符表 | (索引节点位图 | 索引节点表) * 组数

mod super_block;
pub use super_block::SuperBlock;

mod group_desc;
pub use group_desc::GroupDesc;

mod bitmap;
pub use bitmap::InodeBitmap;

mod inode;
pub use inode::{DiskInode, InodeMode};

use block_dev::SECTOR_SIZE;
use derive_more::{Add, Display, From, Into};

/// 文件系统块号
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Add, From, Into,
)]
#[repr(transparent)]
pub struct BlockAddress(u32);

impl core::ops::Add<u32> for BlockAddress {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        self + Self(rhs)
    }
}

impl BlockAddress {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 拉伸块号至扇区号
    #[inline]
    pub fn sector(self, block_size: usize) -> usize {
        self.0 as usize * (block_size / SECTOR_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_address_arithmetic() {
        assert_eq!(BlockAddress::new(0), BlockAddress::default());
        assert_eq!(BlockAddress::new(5), BlockAddress::new(3) + 2);
        assert_eq!(6, BlockAddress::new(3).sector(1024));
        assert_eq!(24, BlockAddress::new(3).sector(4096));
    }
}
