use derive_more::{From, Into};

use crate::util::{le_u16, put_u16};

const I_MODE: usize = 0;
const I_LINKS_COUNT: usize = 26;

/// 索引节点的类型与权限位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, From, Into)]
#[repr(transparent)]
pub struct InodeMode(u16);

impl InodeMode {
    pub const S_IFMT: u16 = 0o170000;
    pub const S_IFDIR: u16 = 0o040000;
    pub const S_IFREG: u16 = 0o100000;

    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn directory(perm: u16) -> Self {
        Self(Self::S_IFDIR | (perm & !Self::S_IFMT))
    }

    #[inline]
    pub const fn regular(perm: u16) -> Self {
        Self(Self::S_IFREG | (perm & !Self::S_IFMT))
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_dir(self) -> bool {
        self.0 & Self::S_IFMT == Self::S_IFDIR
    }
}

/// 磁盘索引节点中分配器关心的字段，直接在记录字节上读写
pub struct DiskInode;

impl DiskInode {
    #[inline]
    pub fn mode(raw: &[u8]) -> InodeMode {
        InodeMode(le_u16(raw, I_MODE))
    }

    #[inline]
    pub fn set_mode(raw: &mut [u8], mode: InodeMode) {
        put_u16(raw, I_MODE, mode.0)
    }

    /// 硬链接个数
    #[inline]
    pub fn links(raw: &[u8]) -> u16 {
        le_u16(raw, I_LINKS_COUNT)
    }

    #[inline]
    pub fn set_links(raw: &mut [u8], links: u16) {
        put_u16(raw, I_LINKS_COUNT, links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::INODE_SIZE;

    #[test]
    fn file_kind_is_the_whole_type_field() {
        assert!(InodeMode::directory(0o755).is_dir());
        assert!(!InodeMode::regular(0o644).is_dir());
        // 块设备 0o060000 与目录共享一位
        assert!(!InodeMode::new(0o060600).is_dir());
        assert!(!InodeMode::default().is_dir());
    }

    #[test]
    fn record_fields() {
        let mut raw = [0u8; INODE_SIZE];
        DiskInode::set_mode(&mut raw, InodeMode::directory(0o755));
        DiskInode::set_links(&mut raw, 2);

        assert_eq!(0o040755, DiskInode::mode(&raw).bits());
        assert_eq!(2, DiskInode::links(&raw));
        assert_eq!([0x02, 0x00], raw[26..28]);
    }
}
