//! 以宿主机文件作为块设备，在映像上格式化、分配与回收索引节点

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BlockDevice, DevError, SECTOR_SIZE};
use ext2fs::{Ext2FileSystem, InodeHandle, InodeNumber, Result};
use send_wrapper::SendWrapper;

#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
}

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(fd)),
        }
    }
}

fn dev_error(sector: usize, want: usize, err: io::Error) -> DevError {
    log::error!("image I/O at sector {sector} failed: {err}");
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => DevError::ShortTransfer {
            sector,
            done: 0,
            want,
        },
        _ => DevError::Io(sector),
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> core::result::Result<(), DevError> {
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .and_then(|_| file.read_exact(buf))
            .map_err(|err| dev_error(block_id, buf.len(), err))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> core::result::Result<(), DevError> {
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .and_then(|_| file.write_all(buf))
            .map_err(|err| dev_error(block_id, buf.len(), err))
    }
}

/// 回收一个索引节点号。
///
/// 编号真正归还到位图后才断开记录的链接；回收被拒绝时记录保持原样。
pub fn release_inode(efs: &mut Ext2FileSystem, ino: InodeNumber) -> Result<()> {
    let mut inode = efs.resolve(ino)?;
    efs.free_inode(ino, inode.mode())?;
    if !efs.is_allocated(ino)? {
        inode.set_link_count(0);
    }
    Ok(())
}
