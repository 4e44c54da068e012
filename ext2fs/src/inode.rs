//! # 索引节点句柄解析层
//!
//! 把索引节点号解析为内存中可修改的记录，分配器借此确认编号确实未被使用。
//! 句柄由调用者独占，丢弃即释放。

use alloc::sync::Arc;

use spin::Mutex;

use crate::layout::DiskInode;
use crate::{BlockCache, BlockCacheManager, FsState, Geometry, InodeMode, InodeNumber, Result};

/// 解析时可见的文件系统上下文
pub struct ResolveCtx<'a> {
    pub cache: &'a BlockCacheManager,
    pub state: &'a FsState,
    pub geometry: &'a Geometry,
}

pub trait InodeResolver {
    type Handle: InodeHandle;

    fn resolve(&self, ctx: &ResolveCtx<'_>, ino: InodeNumber) -> Result<Self::Handle>;
}

pub trait InodeHandle {
    fn ino(&self) -> InodeNumber;
    fn mode(&self) -> InodeMode;
    fn set_mode(&mut self, mode: InodeMode);
    /// 硬链接个数
    fn link_count(&self) -> u16;
    fn set_link_count(&mut self, links: u16);
    /// 把整条记录清零
    fn reset(&mut self);

    /// 类型非零且仍有链接，说明编号正在使用
    #[inline]
    fn is_live(&self) -> bool {
        self.mode().bits() != 0 && self.link_count() > 0
    }
}

/// 通过块缓存访问各组索引节点表的默认解析器
#[derive(Debug, Clone, Copy, Default)]
pub struct InodeTable;

/// 索引节点表中的一条记录，持有期间钉住所在块
pub struct TableInode {
    ino: InodeNumber,
    block: Arc<Mutex<BlockCache>>,
    /// 记录的块内偏移
    offset: usize,
    size: usize,
}

impl InodeResolver for InodeTable {
    type Handle = TableInode;

    fn resolve(&self, ctx: &ResolveCtx<'_>, ino: InodeNumber) -> Result<TableInode> {
        let (block, offset) = ctx.geometry.inode_pos(ctx.state, ino)?;
        let block = ctx.cache.get(block)?;

        Ok(TableInode {
            ino,
            block,
            offset,
            size: ctx.geometry.inode_size,
        })
    }
}

impl TableInode {
    #[inline]
    fn on_disk<V>(&self, f: impl FnOnce(&[u8]) -> V) -> V {
        self.block
            .lock()
            .map(|data| f(&data[self.offset..self.offset + self.size]))
    }

    #[inline]
    fn on_disk_mut<V>(&mut self, f: impl FnOnce(&mut [u8]) -> V) -> V {
        let (offset, size) = (self.offset, self.size);
        self.block
            .lock()
            .map_mut(|data| f(&mut data[offset..offset + size]))
    }
}

impl InodeHandle for TableInode {
    #[inline]
    fn ino(&self) -> InodeNumber {
        self.ino
    }

    fn mode(&self) -> InodeMode {
        self.on_disk(DiskInode::mode)
    }

    fn set_mode(&mut self, mode: InodeMode) {
        self.on_disk_mut(|raw| DiskInode::set_mode(raw, mode))
    }

    fn link_count(&self) -> u16 {
        self.on_disk(DiskInode::links)
    }

    fn set_link_count(&mut self, links: u16) {
        self.on_disk_mut(|raw| DiskInode::set_links(raw, links))
    }

    fn reset(&mut self) {
        self.on_disk_mut(|raw| raw.fill(0))
    }
}
