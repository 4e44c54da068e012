use crate::BlockAddress;
use crate::util::{le_u16, le_u32, put_u16, put_u32};

/// 磁盘上的组描述符，32 字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupDesc {
    pub block_bitmap: u32,
    pub inode_bitmap: BlockAddress,
    pub inode_table: BlockAddress,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
}

impl GroupDesc {
    pub fn decode(raw: &[u8]) -> Self {
        Self {
            block_bitmap: le_u32(raw, 0),
            inode_bitmap: le_u32(raw, 4).into(),
            inode_table: le_u32(raw, 8).into(),
            free_blocks_count: le_u16(raw, 12),
            free_inodes_count: le_u16(raw, 14),
            used_dirs_count: le_u16(raw, 16),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        put_u32(raw, 0, self.block_bitmap);
        put_u32(raw, 4, self.inode_bitmap.get());
        put_u32(raw, 8, self.inode_table.get());
        put_u16(raw, 12, self.free_blocks_count);
        put_u16(raw, 14, self.free_inodes_count);
        put_u16(raw, 16, self.used_dirs_count);
    }
}
