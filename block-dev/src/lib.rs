//! # 块设备接口层
//!
//! 块设备是以**扇区**为单位存储数据的设备，例如磁盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 一次读写可跨越多个连续扇区，缓冲区长度必须是 [`SECTOR_SIZE`] 的整数倍。

#![no_std]

use core::any::Any;

use thiserror::Error;

/// The standard sector size of a VirtIO block device.
pub const SECTOR_SIZE: usize = 512;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 从`block_id`号扇区起，读满`buf`
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DevError>;
    /// 从`block_id`号扇区起，写入整个`buf`
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DevError>;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DevError {
    #[error("sector {0} is out of range")]
    OutOfRange(usize),
    #[error("device I/O failure at sector {0}")]
    Io(usize),
    /// 设备只完成了部分传输
    #[error("incomplete transfer at sector {sector}: {done} of {want} bytes")]
    ShortTransfer {
        sector: usize,
        done: usize,
        want: usize,
    },
}
