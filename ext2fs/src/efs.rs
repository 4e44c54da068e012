//! # 文件系统层
//!
//! 挂载磁盘上的 ext2 布局，持有块缓存与 [`FsState`]。
//! 挂载结果包在`Mutex`中，分配与回收都需要`&mut self`，
//! 同一文件系统上同时至多有一个分配或回收在进行。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::{BlockDevice, SECTOR_SIZE};
use spin::Mutex;

use crate::layout::{GroupDesc, SuperBlock};
use crate::{
    BlockAddress, BlockCacheManager, Corruption, Error, FsState, GROUP_DESC_SIZE, GroupDescriptor,
    GroupIndex, INODE_SIZE, InodeBitmap, InodeNumber, InodeResolver, InodeTable, ROOT_INO,
    ResolveCtx, Result, SUPER_BLOCK_OFFSET, SUPER_BLOCK_SIZE,
};

/// 回收索引节点时如何对待设备读写错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreeIoPolicy {
    /// 返回带类型的错误
    #[default]
    Propagate,
    /// 记录日志后吞掉错误，什么也不修改
    Swallow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOptions {
    /// 块缓存个数的上限
    pub cache_capacity: usize,
    pub free_io: FreeIoPolicy,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 16,
            free_io: FreeIoPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub inode_size: usize,
    pub index: GroupIndex,
}

impl Geometry {
    /// 索引节点在磁盘上的位置：**块号**以及**块内偏移**
    pub fn inode_pos(&self, state: &FsState, ino: InodeNumber) -> Result<(BlockAddress, usize)> {
        let (group, slot) = self
            .index
            .table_slot(ino)
            .ok_or(Error::InvalidInode(ino))?;
        let desc = self
            .index
            .descriptor(state, group)
            .ok_or(Error::InvalidInode(ino))?;
        let per_block = (self.block_size / self.inode_size) as u32;

        Ok((
            desc.inode_table() + slot / per_block,
            (slot % per_block) as usize * self.inode_size,
        ))
    }

    #[inline]
    fn group_desc_pos(&self, group: usize) -> (BlockAddress, usize) {
        let per_block = self.block_size / GROUP_DESC_SIZE;
        (
            SuperBlock::group_desc_table(self.block_size) + (group / per_block) as u32,
            group % per_block * GROUP_DESC_SIZE,
        )
    }
}

pub struct Ext2FileSystem<R = InodeTable> {
    pub(crate) cache: BlockCacheManager,
    pub(crate) geometry: Geometry,
    pub(crate) state: FsState,
    pub(crate) options: MountOptions,
    pub(crate) resolver: R,
}

impl Ext2FileSystem<InodeTable> {
    pub fn open(dev: Arc<dyn BlockDevice>) -> Result<Arc<Mutex<Self>>> {
        Self::open_with(dev, MountOptions::default(), InodeTable)
    }
}

impl<R: InodeResolver> Ext2FileSystem<R> {
    pub fn open_with(
        dev: Arc<dyn BlockDevice>,
        options: MountOptions,
        resolver: R,
    ) -> Result<Arc<Mutex<Self>>> {
        let super_block = {
            let mut raw = [0u8; SUPER_BLOCK_SIZE];
            dev.read_block(SUPER_BLOCK_OFFSET / SECTOR_SIZE, &mut raw)?;
            SuperBlock::decode(&raw)
        };
        let geometry = Self::check(&super_block)?;

        let cache = BlockCacheManager::new(dev, geometry.block_size, options.cache_capacity);
        let mut groups = Vec::with_capacity(geometry.index.groups());
        for group in 0..geometry.index.groups() {
            let (block, offset) = geometry.group_desc_pos(group);
            let desc = cache.get(block)?.lock().map(|data| {
                GroupDesc::decode(&data[offset..offset + GROUP_DESC_SIZE])
            });
            groups.push(GroupDescriptor::new(
                desc.free_inodes_count.into(),
                desc.used_dirs_count.into(),
                desc.inode_bitmap,
                desc.inode_table,
            ));
        }

        let state = FsState::new(
            super_block.inodes_count,
            super_block.free_inodes_count,
            groups,
        );
        if !state.counters_consistent() {
            log::warn!(
                "superblock records {} free inodes, group descriptors disagree",
                state.free_inodes()
            );
        }
        log::info!(
            "mounted ext2fs: {} groups * {} inodes, {} free, block size {}",
            geometry.index.groups(),
            geometry.index.inodes_per_group(),
            state.free_inodes(),
            geometry.block_size
        );

        Ok(Arc::new(Mutex::new(Self {
            cache,
            geometry,
            state,
            options,
            resolver,
        })))
    }

    fn check(super_block: &SuperBlock) -> Result<Geometry> {
        if !super_block.is_valid() {
            return Err(Error::Format("bad magic number"));
        }
        let block_size = super_block.block_size()?;

        let ipg = super_block.inodes_per_group;
        if ipg == 0 || ipg as usize > block_size * 8 {
            return Err(Error::Format("inodes per group do not fit one bitmap block"));
        }
        if super_block.inodes_count == 0 || super_block.inodes_count % ipg != 0 {
            return Err(Error::Format("inode count is not a whole number of groups"));
        }

        // 第 0 版没有这两个字段
        let (first_ino, inode_size) = if super_block.rev_level == 0 {
            (crate::DEFAULT_FIRST_INO, INODE_SIZE)
        } else {
            (super_block.first_ino, super_block.inode_size as usize)
        };
        if first_ino <= ROOT_INO || first_ino > ipg {
            return Err(Error::Format("first inode is out of group 0"));
        }
        if inode_size < INODE_SIZE || block_size % inode_size != 0 {
            return Err(Error::Format("unsupported inode size"));
        }

        Ok(Geometry {
            block_size,
            inode_size,
            index: GroupIndex::new(ipg, first_ino, super_block.group_count()),
        })
    }

    #[inline]
    pub fn state(&self) -> &FsState {
        &self.state
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    #[inline]
    pub fn cache(&self) -> &BlockCacheManager {
        &self.cache
    }

    /// 从位图读取编号是否已分配
    pub fn is_allocated(&self, ino: InodeNumber) -> Result<bool> {
        let index = self.geometry.index;
        let (group, bit) = index.locate(ino).ok_or(Error::InvalidInode(ino))?;
        let desc = index
            .descriptor(&self.state, group)
            .ok_or(Error::InvalidInode(ino))?;

        Ok(self
            .cache
            .get(desc.bitmap_block())?
            .lock()
            .map(|data| InodeBitmap::new(data, index.inodes_per_group()).test(bit)))
    }

    /// 解析已分配的索引节点，供调用者在回收前拆除它
    pub fn resolve(&self, ino: InodeNumber) -> Result<R::Handle> {
        if ino.get() == 0 || ino.get() > self.state.total_inodes {
            return Err(Error::InvalidInode(ino));
        }
        self.resolver.resolve(&self.ctx(), ino)
    }

    /// 把内存中的计数写回超级块与组描述符表，再写回全部脏块
    pub fn sync(&mut self) -> Result<()> {
        if self.state.dirty {
            let (block, offset) = SuperBlock::location(self.geometry.block_size);
            let free_inodes = self.state.free_inodes;
            self.cache.get(block)?.lock().map_mut(|data| {
                let raw = &mut data[offset..offset + SUPER_BLOCK_SIZE];
                let mut super_block = SuperBlock::decode(raw);
                super_block.free_inodes_count = free_inodes;
                super_block.encode(raw);
            });

            for (group, desc) in self.state.groups.iter().enumerate() {
                let (block, offset) = self.geometry.group_desc_pos(group);
                self.cache.get(block)?.lock().map_mut(|data| {
                    let raw = &mut data[offset..offset + GROUP_DESC_SIZE];
                    let mut on_disk = GroupDesc::decode(raw);
                    on_disk.free_inodes_count = narrow(desc.free_inodes, group, "free inodes");
                    on_disk.used_dirs_count = narrow(desc.dir_count, group, "directory count");
                    on_disk.encode(raw);
                });
            }
        }

        self.cache.sync_all()?;
        self.state.dirty = false;
        Ok(())
    }

    #[inline]
    pub(crate) fn ctx(&self) -> ResolveCtx<'_> {
        ResolveCtx {
            cache: &self.cache,
            state: &self.state,
            geometry: &self.geometry,
        }
    }

    #[inline]
    pub(crate) fn ensure_writable(&self) -> Result<()> {
        match self.state.fault {
            Some(_) => Err(Error::ReadOnly),
            None => Ok(()),
        }
    }

    /// 记下致命损坏并强制只读，交由调用者上报
    pub(crate) fn fatal(&mut self, corruption: Corruption) -> Error {
        log::error!("{corruption}; filesystem forced read-only");
        if self.state.fault.is_none() {
            self.state.fault = Some(corruption);
        }
        Error::Corruption(corruption)
    }
}

/// 组描述符中的计数只有 16 位，越界时截为上限
fn narrow(counter: u32, group: usize, what: &str) -> u16 {
    u16::try_from(counter).unwrap_or_else(|_| {
        log::warn!(
            "group {group} {what} {counter} overflows the descriptor, stored as {}",
            u16::MAX
        );
        u16::MAX
    })
}
