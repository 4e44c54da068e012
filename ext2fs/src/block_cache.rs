//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此我们在内存中开辟缓冲区，
//! 把即将操作的块复制到内存中，同时尝试返回已缓存的块。
//!
//! 持有 [`BlockCache`] 的`Arc`即**钉住**该块，缓存管理器不会换出它；
//! 丢弃`Arc`即释放，任何退出路径上都会发生。
//!
//! 每个挂载的文件系统独占一个 [`BlockCacheManager`]。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::{BlockAddress, Error, Result};

/// 块缓存管理，缓存、调度块缓存
pub struct BlockCacheManager {
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    block_size: usize,
    /// 块缓存个数的上限
    capacity: usize,
    queue: Mutex<Vec<(BlockAddress, Arc<Mutex<BlockCache>>)>>,
}

/// 内存中的块缓存
pub struct BlockCache {
    /// 缓存的数据
    data: Vec<u8>,
    /// 对应的块号
    block: BlockAddress,
    dev: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl BlockCache {
    fn load(block: BlockAddress, block_size: usize, dev: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut data = vec![0; block_size];
        dev.read_block(block.sector(block_size), &mut data)?;

        Ok(Self {
            data,
            block,
            dev,
            modified: false,
        })
    }

    #[inline]
    pub fn block(&self) -> BlockAddress {
        self.block
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// 写回脏块
    pub fn sync(&mut self) -> Result<()> {
        if self.modified {
            self.write()?;
        }
        Ok(())
    }

    /// 同步写回，无论是否为脏块
    pub fn write(&mut self) -> Result<()> {
        self.dev
            .write_block(self.block.sector(self.data.len()), &self.data)?;
        self.modified = false;
        Ok(())
    }

    /// 先把`staged`写入设备，成功后才替换缓存内容。
    /// 写入失败时缓存保持原样。
    pub fn persist(&mut self, staged: &[u8]) -> Result<()> {
        assert_eq!(staged.len(), self.data.len());
        self.dev
            .write_block(self.block.sector(self.data.len()), staged)?;
        self.data.copy_from_slice(staged);
        self.modified = false;
        Ok(())
    }

    /// 复制一份缓存内容，用于暂存修改
    #[inline]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.clone()
    }

    #[inline]
    pub fn map<V>(&self, f: impl FnOnce(&[u8]) -> V) -> V {
        f(&self.data)
    }

    #[inline]
    pub fn map_mut<V>(&mut self, f: impl FnOnce(&mut [u8]) -> V) -> V {
        self.modified = true;
        f(&mut self.data)
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(err) = self.sync() {
            log::error!("lost write-back of block {}: {err}", self.block);
        }
    }
}

impl BlockCacheManager {
    pub fn new(dev: Arc<dyn BlockDevice>, block_size: usize, capacity: usize) -> Self {
        Self {
            dev,
            block_size,
            capacity: capacity.max(1),
            queue: Mutex::default(),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    // 块缓存调度策略：踢走闲置块
    pub fn get(&self, block: BlockAddress) -> Result<Arc<Mutex<BlockCache>>> {
        let mut queue = self.queue.lock();

        // 尝试从缓冲区中读取块
        if let Some(cache) = queue
            .iter()
            .find_map(|(id, cache)| (block == *id).then_some(cache))
        {
            return Ok(Arc::clone(cache));
        };

        // 触及上限，写回一个块
        if queue.len() == self.capacity {
            let index = queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1) // 没有其它引用的才能写回
                .ok_or(Error::CacheExhausted)?;
            queue[index].1.lock().sync()?;
            queue.remove(index);
        }

        // 缓存新块
        let cache = Arc::new(Mutex::new(BlockCache::load(
            block,
            self.block_size,
            self.dev.clone(),
        )?));
        queue.push((block, cache.clone()));

        Ok(cache)
    }

    /// 写回全部脏块，遇错即止
    pub fn sync_all(&self) -> Result<()> {
        self.queue
            .lock()
            .iter()
            .try_for_each(|(_, cache)| cache.lock().sync())
    }

    /// 当前缓存的块数
    pub fn cached(&self) -> usize {
        self.queue.lock().len()
    }
}
