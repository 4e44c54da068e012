use crate::util::{le_u16, le_u32, put_u16, put_u32};
use crate::{BlockAddress, EXT2_MAGIC, Error, INODE_SIZE, Result, SUPER_BLOCK_OFFSET};

const S_INODES_COUNT: usize = 0;
const S_BLOCKS_COUNT: usize = 4;
const S_FREE_BLOCKS_COUNT: usize = 12;
const S_FREE_INODES_COUNT: usize = 16;
const S_FIRST_DATA_BLOCK: usize = 20;
const S_LOG_BLOCK_SIZE: usize = 24;
const S_BLOCKS_PER_GROUP: usize = 32;
const S_INODES_PER_GROUP: usize = 40;
const S_MAGIC: usize = 56;
const S_STATE: usize = 58;
const S_REV_LEVEL: usize = 76;
const S_FIRST_INO: usize = 84;
const S_INODE_SIZE: usize = 88;

/// 干净卸载
const STATE_VALID: u16 = 1;
const DYNAMIC_REV: u32 = 1;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录全局的索引节点计数与组的几何参数
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuperBlock {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    magic: u16,
    pub rev_level: u32,
    pub first_ino: u32,
    pub inode_size: u16,
}

impl SuperBlock {
    pub fn new(
        inodes_count: u32,
        blocks_count: u32,
        free_inodes_count: u32,
        first_data_block: u32,
        log_block_size: u32,
        inodes_per_group: u32,
        first_ino: u32,
    ) -> Self {
        Self {
            inodes_count,
            blocks_count,
            free_blocks_count: 0,
            free_inodes_count,
            first_data_block,
            log_block_size,
            blocks_per_group: (1024 << log_block_size) * 8,
            inodes_per_group,
            magic: EXT2_MAGIC,
            rev_level: DYNAMIC_REV,
            first_ino,
            inode_size: INODE_SIZE as u16,
        }
    }

    pub fn decode(raw: &[u8]) -> Self {
        Self {
            inodes_count: le_u32(raw, S_INODES_COUNT),
            blocks_count: le_u32(raw, S_BLOCKS_COUNT),
            free_blocks_count: le_u32(raw, S_FREE_BLOCKS_COUNT),
            free_inodes_count: le_u32(raw, S_FREE_INODES_COUNT),
            first_data_block: le_u32(raw, S_FIRST_DATA_BLOCK),
            log_block_size: le_u32(raw, S_LOG_BLOCK_SIZE),
            blocks_per_group: le_u32(raw, S_BLOCKS_PER_GROUP),
            inodes_per_group: le_u32(raw, S_INODES_PER_GROUP),
            magic: le_u16(raw, S_MAGIC),
            rev_level: le_u32(raw, S_REV_LEVEL),
            first_ino: le_u32(raw, S_FIRST_INO),
            inode_size: le_u16(raw, S_INODE_SIZE),
        }
    }

    /// 只覆盖已知字段，其余字节保持原样
    pub fn encode(&self, raw: &mut [u8]) {
        put_u32(raw, S_INODES_COUNT, self.inodes_count);
        put_u32(raw, S_BLOCKS_COUNT, self.blocks_count);
        put_u32(raw, S_FREE_BLOCKS_COUNT, self.free_blocks_count);
        put_u32(raw, S_FREE_INODES_COUNT, self.free_inodes_count);
        put_u32(raw, S_FIRST_DATA_BLOCK, self.first_data_block);
        put_u32(raw, S_LOG_BLOCK_SIZE, self.log_block_size);
        put_u32(raw, S_BLOCKS_PER_GROUP, self.blocks_per_group);
        put_u32(raw, S_INODES_PER_GROUP, self.inodes_per_group);
        put_u16(raw, S_MAGIC, self.magic);
        put_u16(raw, S_STATE, STATE_VALID);
        put_u32(raw, S_REV_LEVEL, self.rev_level);
        put_u32(raw, S_FIRST_INO, self.first_ino);
        put_u16(raw, S_INODE_SIZE, self.inode_size);
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == EXT2_MAGIC
    }

    pub fn block_size(&self) -> Result<usize> {
        match self.log_block_size {
            0..=2 => Ok(1024 << self.log_block_size),
            _ => Err(Error::Format("unsupported block size")),
        }
    }

    pub fn group_count(&self) -> usize {
        self.inodes_count.div_ceil(self.inodes_per_group) as usize
    }

    /// 超级块所在的块及其块内偏移
    pub fn location(block_size: usize) -> (BlockAddress, usize) {
        (
            BlockAddress::new((SUPER_BLOCK_OFFSET / block_size) as u32),
            SUPER_BLOCK_OFFSET % block_size,
        )
    }

    /// 组描述符表紧跟在超级块所在块之后
    pub fn group_desc_table(block_size: usize) -> BlockAddress {
        Self::location(block_size).0 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SUPER_BLOCK_SIZE;

    #[test]
    fn field_offsets_follow_ext2() {
        let sb = SuperBlock::new(64, 40, 54, 1, 0, 16, 11);
        let mut raw = [0u8; SUPER_BLOCK_SIZE];
        sb.encode(&mut raw);

        assert_eq!([0x53, 0xEF], raw[56..58]);
        assert_eq!(54, le_u32(&raw, 16));
        assert_eq!(11, le_u32(&raw, 84));
        assert_eq!(128, le_u16(&raw, 88));
        assert_eq!(sb, SuperBlock::decode(&raw));
        assert!(SuperBlock::decode(&raw).is_valid());
    }

    #[test]
    fn location_depends_on_block_size() {
        assert_eq!((BlockAddress::new(1), 0), SuperBlock::location(1024));
        assert_eq!((BlockAddress::new(0), 1024), SuperBlock::location(4096));
        assert_eq!(BlockAddress::new(2), SuperBlock::group_desc_table(1024));
        assert_eq!(BlockAddress::new(1), SuperBlock::group_desc_table(2048));
    }

    #[test]
    fn rejects_huge_block_size() {
        let sb = SuperBlock {
            log_block_size: 6,
            ..SuperBlock::default()
        };
        assert_eq!(Err(Error::Format("unsupported block size")), sb.block_size());
    }
}
