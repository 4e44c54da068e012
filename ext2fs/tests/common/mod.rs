#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use block_dev::{BlockDevice, DevError, SECTOR_SIZE};
use ext2fs::{Ext2FileSystem, FormatOptions, InodeResolver, MountOptions};

/// 内存中的块设备，可注入读写故障
#[derive(Debug)]
pub struct MemDevice {
    data: Mutex<Vec<u8>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemDevice {
    pub fn new(bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(vec![0; bytes]),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn formatted(options: &FormatOptions) -> Arc<Self> {
        let dev = Self::new(options.image_bytes() as usize);
        options.write(&(dev.clone() as Arc<dyn BlockDevice>)).unwrap();
        dev
    }

    pub fn peek(&self, offset: usize, len: usize) -> Vec<u8> {
        self.data.lock().unwrap()[offset..offset + len].to_vec()
    }

    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        self.data.lock().unwrap()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn range(&self, block_id: usize, len: usize) -> Result<std::ops::Range<usize>, DevError> {
        let start = block_id * SECTOR_SIZE;
        if start + len > self.data.lock().unwrap().len() {
            return Err(DevError::OutOfRange(block_id));
        }
        Ok(start..start + len)
    }
}

impl BlockDevice for MemDevice {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DevError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DevError::Io(block_id));
        }
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock().unwrap()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DevError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DevError::Io(block_id));
        }
        let range = self.range(block_id, buf.len())?;
        self.data.lock().unwrap()[range].copy_from_slice(buf);
        Ok(())
    }
}

/// 组大小 8、首个通用编号 3 的两组文件系统
pub fn tiny() -> FormatOptions {
    FormatOptions {
        block_size: 1024,
        groups: 2,
        inodes_per_group: 8,
        first_ino: 3,
    }
}

pub fn mount(dev: &Arc<MemDevice>) -> Arc<spin::Mutex<Ext2FileSystem>> {
    Ext2FileSystem::open(dev.clone()).unwrap()
}

pub fn mount_with<R: InodeResolver>(
    dev: &Arc<MemDevice>,
    options: MountOptions,
    resolver: R,
) -> Arc<spin::Mutex<Ext2FileSystem<R>>> {
    Ext2FileSystem::open_with(dev.clone(), options, resolver).unwrap()
}

/// 第`group`组位图块在设备上的字节偏移
pub fn bitmap_offset(fs: &Ext2FileSystem, group: usize) -> usize {
    fs.state().groups()[group].bitmap_block().get() as usize * fs.geometry().block_size
}

/// 索引节点记录在设备上的字节偏移
pub fn inode_offset(fs: &Ext2FileSystem, ino: u32) -> usize {
    let (block, offset) = fs
        .geometry()
        .inode_pos(fs.state(), ino.into())
        .unwrap();
    block.get() as usize * fs.geometry().block_size + offset
}
