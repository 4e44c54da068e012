//! # 格式化
//!
//! 构建出磁盘的布局：
//! 超级块 | 组描述符表 | 每组一个索引节点位图块，后接该组的索引节点表

use alloc::sync::Arc;
use alloc::vec;

use block_dev::{BlockDevice, SECTOR_SIZE};
use spin::Mutex;

use crate::layout::{DiskInode, GroupDesc, SuperBlock};
use crate::{
    BlockAddress, DEFAULT_FIRST_INO, Error, Ext2FileSystem, GROUP_DESC_SIZE, INODE_SIZE, InGroupBit,
    InodeBitmap, InodeMode, InodeTable, ROOT_INO, Result, SUPER_BLOCK_OFFSET, SUPER_BLOCK_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub block_size: usize,
    pub groups: usize,
    pub inodes_per_group: u32,
    /// 首个通用索引节点号，之前的编号都被保留
    pub first_ino: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            block_size: 1024,
            groups: 1,
            inodes_per_group: 256,
            first_ino: DEFAULT_FIRST_INO,
        }
    }
}

impl FormatOptions {
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.block_size, 1024 | 2048 | 4096) {
            return Err(Error::Format("block size must be 1024, 2048 or 4096"));
        }
        if self.groups == 0 {
            return Err(Error::Format("at least one group is required"));
        }
        let ipg = self.inodes_per_group as usize;
        if ipg == 0 || ipg > self.block_size * 8 {
            return Err(Error::Format("inodes per group do not fit one bitmap block"));
        }
        if ipg % (self.block_size / INODE_SIZE) != 0 {
            return Err(Error::Format("inode table must fill whole blocks"));
        }
        if self.first_ino <= ROOT_INO || self.first_ino > self.inodes_per_group {
            return Err(Error::Format("first inode is out of group 0"));
        }
        Ok(())
    }

    #[inline]
    fn inode_table_blocks(&self) -> u32 {
        (self.inodes_per_group as usize * INODE_SIZE / self.block_size) as u32
    }

    #[inline]
    fn gdt_blocks(&self) -> u32 {
        (self.groups * GROUP_DESC_SIZE).div_ceil(self.block_size) as u32
    }

    /// 第`group`组的索引节点位图块，索引节点表紧随其后
    #[inline]
    fn inode_bitmap(&self, group: usize) -> BlockAddress {
        SuperBlock::group_desc_table(self.block_size)
            + self.gdt_blocks()
            + group as u32 * (1 + self.inode_table_blocks())
    }

    pub fn total_blocks(&self) -> u32 {
        self.inode_bitmap(self.groups).get()
    }

    /// 映像文件的最小字节数
    pub fn image_bytes(&self) -> u64 {
        self.total_blocks() as u64 * self.block_size as u64
    }

    /// 在`dev`上写出一个全新的文件系统
    pub fn write(&self, dev: &Arc<dyn BlockDevice>) -> Result<()> {
        self.validate()?;
        let block_size = self.block_size;
        let ipg = self.inodes_per_group;
        let reserved = self.first_ino - 1;
        let total_inodes = ipg * self.groups as u32;

        // 全部清零
        let zero = vec![0u8; block_size];
        for block in 0..self.total_blocks() {
            dev.write_block(BlockAddress::new(block).sector(block_size), &zero)?;
        }

        let mut raw = [0u8; SUPER_BLOCK_SIZE];
        SuperBlock::new(
            total_inodes,
            self.total_blocks(),
            total_inodes - reserved,
            (SUPER_BLOCK_OFFSET / block_size) as u32,
            (block_size / 1024).trailing_zeros(),
            ipg,
            self.first_ino,
        )
        .encode(&mut raw);
        dev.write_block(SUPER_BLOCK_OFFSET / SECTOR_SIZE, &raw)?;

        let mut gdt = vec![0u8; self.gdt_blocks() as usize * block_size];
        for group in 0..self.groups {
            let bitmap = self.inode_bitmap(group);
            let (free, dirs) = if group == 0 { (ipg - reserved, 1) } else { (ipg, 0) };
            GroupDesc {
                inode_bitmap: bitmap,
                inode_table: bitmap + 1,
                free_inodes_count: free as u16,
                used_dirs_count: dirs,
                ..GroupDesc::default()
            }
            .encode(&mut gdt[group * GROUP_DESC_SIZE..(group + 1) * GROUP_DESC_SIZE]);
        }
        dev.write_block(
            SuperBlock::group_desc_table(block_size).sector(block_size),
            &gdt,
        )?;

        for group in 0..self.groups {
            let mut block = vec![0u8; block_size];
            let mut bitmap = InodeBitmap::new(&mut block[..], (block_size * 8) as u32);
            // 超出本组的填充位永远置位
            for offset in ipg..(block_size * 8) as u32 {
                bitmap.set(InGroupBit::from_offset(offset));
            }
            if group == 0 {
                for offset in 0..reserved {
                    bitmap.set(InGroupBit::from_offset(offset));
                }
            }
            dev.write_block(self.inode_bitmap(group).sector(block_size), &block)?;
        }

        // 根目录
        let mut table = vec![0u8; block_size];
        let root = (ROOT_INO as usize - 1) * INODE_SIZE;
        let record = &mut table[root..root + INODE_SIZE];
        DiskInode::set_mode(record, InodeMode::directory(0o755));
        DiskInode::set_links(record, 2);
        dev.write_block((self.inode_bitmap(0) + 1).sector(block_size), &table)?;

        log::info!(
            "formatted ext2fs: {} groups * {ipg} inodes, {} blocks of {block_size} bytes",
            self.groups,
            self.total_blocks()
        );
        Ok(())
    }
}

impl Ext2FileSystem<InodeTable> {
    /// 格式化后立即挂载
    pub fn format(dev: Arc<dyn BlockDevice>, options: &FormatOptions) -> Result<Arc<Mutex<Self>>> {
        options.write(&dev)?;
        Self::open(dev)
    }
}
