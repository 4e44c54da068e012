//! # 索引节点号的分配与回收
//!
//! 全局空闲计数、各组计数与磁盘位图三者必须保持一致。
//! 两个方向都先在位图副本上暂存修改，写入设备成功后才同时改动缓存与计数；
//! 写入失败时三者都保持原样。

use alloc::sync::Arc;

use spin::Mutex;

use crate::{
    BlockCache, Corruption, Error, Ext2FileSystem, FreeIoPolicy, FsState, InGroupBit, InodeBitmap,
    InodeHandle, InodeMode, InodeNumber, InodeResolver, Result,
};

/// 尚未生效的一次计数修改
struct PendingCommit {
    group: usize,
    directory: bool,
    kind: CommitKind,
}

enum CommitKind {
    Alloc,
    Free,
}

impl PendingCommit {
    fn apply(self, state: &mut FsState) {
        let desc = &mut state.groups[self.group];
        match self.kind {
            CommitKind::Alloc => {
                decrement(&mut state.free_inodes, "superblock free inodes");
                decrement(&mut desc.free_inodes, "group free inodes");
                if self.directory {
                    increment(&mut desc.dir_count, "group directory count");
                }
            }
            CommitKind::Free => {
                increment(&mut state.free_inodes, "superblock free inodes");
                increment(&mut desc.free_inodes, "group free inodes");
                if self.directory {
                    decrement(&mut desc.dir_count, "group directory count");
                }
            }
        }
        state.dirty = true;
    }
}

/// 计数与位图不一致时不修复，只记录
#[inline]
fn decrement(counter: &mut u32, what: &str) {
    match counter.checked_sub(1) {
        Some(value) => *counter = value,
        None => log::warn!("{what} already zero, left unchanged"),
    }
}

#[inline]
fn increment(counter: &mut u32, what: &str) {
    match counter.checked_add(1) {
        Some(value) => *counter = value,
        None => log::warn!("{what} already at maximum, left unchanged"),
    }
}

impl<R: InodeResolver> Ext2FileSystem<R> {
    /// 分配一个空闲的索引节点号，返回编号与清零后的句柄。
    ///
    /// 逐组寻找位图中的首个空位；0 号组中低于首个通用编号的位置不会被分配。
    pub fn alloc_inode(&mut self, mode: InodeMode) -> Result<(InodeNumber, R::Handle)> {
        self.ensure_writable()?;
        if self.state.free_inodes == 0 {
            return Err(Error::NoSpace);
        }

        let Some((group, bit, buffer)) = self.find_free_bit()? else {
            // 位图已满，超级块却说还有空闲：不尝试修复
            log::warn!(
                "inconsistent inode bitmap and superblock: {} free inodes recorded",
                self.state.free_inodes
            );
            return Err(Error::NoSpace);
        };
        let ino = self.geometry.index.compose(group, bit);

        // 先解析并检查，此时尚未修改任何状态
        let mut handle = self.resolver.resolve(&self.ctx(), ino)?;
        if handle.is_live() {
            let corruption = Corruption::DuplicateAlloc {
                ino,
                mode: handle.mode().bits(),
                links: handle.link_count(),
            };
            drop(handle);
            drop(buffer);
            return Err(self.fatal(corruption));
        }

        let pending = PendingCommit {
            group,
            directory: mode.is_dir(),
            kind: CommitKind::Alloc,
        };
        {
            let mut cache = buffer.lock();
            let mut staged = InodeBitmap::new(cache.snapshot(), self.geometry.index.inodes_per_group());
            staged.set(bit);
            // 失败时句柄随之释放
            cache.persist(staged.as_bytes())?;
        }
        pending.apply(&mut self.state);
        handle.reset();

        log::debug!(
            "alloc inode {ino} in group {group} (mode {:#o})",
            mode.bits()
        );
        Ok((ino, handle))
    }

    /// 回收索引节点号。
    ///
    /// 编号越界或位已清除都属于致命损坏；设备读写错误按 [`FreeIoPolicy`] 处理。
    pub fn free_inode(&mut self, ino: InodeNumber, mode: InodeMode) -> Result<()> {
        self.ensure_writable()?;

        let index = self.geometry.index;
        let (first, last) = (index.first_ino(), self.state.total_inodes);
        let located = (first..=last)
            .contains(&ino.get())
            .then(|| index.locate(ino))
            .flatten();
        let Some((group, bit)) = located else {
            return Err(self.fatal(Corruption::OutOfRange { ino, first, last }));
        };

        match self.release_bit(ino, group, bit, mode) {
            Err(err @ (Error::Io(_) | Error::CacheExhausted))
                if self.options.free_io == FreeIoPolicy::Swallow =>
            {
                log::warn!("free inode {ino}: {err}, ignored");
                Ok(())
            }
            result => result,
        }
    }

    fn release_bit(
        &mut self,
        ino: InodeNumber,
        group: usize,
        bit: InGroupBit,
        mode: InodeMode,
    ) -> Result<()> {
        let buffer = self.cache.get(self.state.groups[group].bitmap_block)?;
        let mut cache = buffer.lock();
        let mut staged = InodeBitmap::new(cache.snapshot(), self.geometry.index.inodes_per_group());
        if !staged.test(bit) {
            drop(cache);
            drop(buffer);
            return Err(self.fatal(Corruption::DoubleFree { ino }));
        }
        staged.clear(bit);

        let pending = PendingCommit {
            group,
            directory: mode.is_dir(),
            kind: CommitKind::Free,
        };
        cache.persist(staged.as_bytes())?;
        drop(cache);
        pending.apply(&mut self.state);

        log::debug!("free inode {ino} in group {group}");
        Ok(())
    }

    /// 返回首个可分配的 (组号, 组内位)，并钉住该组的位图块
    fn find_free_bit(&self) -> Result<Option<(usize, InGroupBit, Arc<Mutex<BlockCache>>)>> {
        let index = self.geometry.index;

        for (group, desc) in self.state.groups.iter().enumerate() {
            let buffer = self.cache.get(desc.bitmap_block)?;
            let found = buffer.lock().map(|data| {
                let bitmap = InodeBitmap::new(data, index.inodes_per_group());
                let mut avail = bitmap.find_first_zero();
                while let Some(bit) = avail.filter(|&bit| index.is_reserved(group, bit)) {
                    avail = bitmap.find_next_zero(bit);
                }
                avail
            });

            if let Some(bit) = found {
                return Ok(Some((group, bit, buffer)));
            }
        }

        Ok(None)
    }
}
