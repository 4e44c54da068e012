//! # 柱面组索引
//!
//! 全局索引节点号从 1 开始编号，组号从 0 开始，组内位图位置又从 1 开始；
//! 三者之间的换算只发生在这里。

use derive_more::{Display, From, Into};

use crate::{FsState, GroupDescriptor};

/// 全局索引节点号，从 1 开始
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct InodeNumber(u32);

/// 组内位图位置，从 1 开始
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct InGroupBit(u32);

impl InodeNumber {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl InGroupBit {
    /// 位置 0 不存在
    #[inline]
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 由位图中从 0 开始的位偏移构造
    #[inline]
    pub(crate) const fn from_offset(offset: u32) -> Self {
        Self(offset + 1)
    }

    /// 在位图中从 0 开始的位偏移
    #[inline]
    pub(crate) const fn offset(self) -> u32 {
        self.0 - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupIndex {
    inodes_per_group: u32,
    first_ino: u32,
    groups: usize,
}

impl GroupIndex {
    pub const fn new(inodes_per_group: u32, first_ino: u32, groups: usize) -> Self {
        Self {
            inodes_per_group,
            first_ino,
            groups,
        }
    }

    #[inline]
    pub fn inodes_per_group(&self) -> u32 {
        self.inodes_per_group
    }

    /// 首个通用索引节点号
    #[inline]
    pub fn first_ino(&self) -> u32 {
        self.first_ino
    }

    #[inline]
    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn total_inodes(&self) -> u32 {
        self.inodes_per_group * self.groups as u32
    }

    /// 索引节点号 -> (组号, 组内位)。
    /// 0 号或超出最后一组的编号返回空。
    pub fn locate(&self, ino: InodeNumber) -> Option<(usize, InGroupBit)> {
        let index = ino.0.checked_sub(1)?;
        let group = (index / self.inodes_per_group) as usize;
        (group < self.groups).then_some((group, InGroupBit(index % self.inodes_per_group + 1)))
    }

    /// 索引节点号 -> (组号, 本组索引节点表中从 0 开始的槽位)
    #[inline]
    pub fn table_slot(&self, ino: InodeNumber) -> Option<(usize, u32)> {
        self.locate(ino).map(|(group, bit)| (group, bit.offset()))
    }

    /// (组号, 组内位) -> 索引节点号
    #[inline]
    pub fn compose(&self, group: usize, bit: InGroupBit) -> InodeNumber {
        InodeNumber(group as u32 * self.inodes_per_group + bit.0)
    }

    /// 0 号组中低于首个通用编号的位置永久保留
    #[inline]
    pub fn is_reserved(&self, group: usize, bit: InGroupBit) -> bool {
        group == 0 && bit.0 < self.first_ino
    }

    #[inline]
    pub fn descriptor<'s>(&self, state: &'s FsState, group: usize) -> Option<&'s GroupDescriptor> {
        state.groups().get(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_and_compose() {
        let index = GroupIndex::new(8, 3, 4);

        assert_eq!(None, index.locate(InodeNumber(0)));
        assert_eq!(Some((0, InGroupBit(1))), index.locate(InodeNumber(1)));
        assert_eq!(Some((0, InGroupBit(8))), index.locate(InodeNumber(8)));
        assert_eq!(Some((1, InGroupBit(1))), index.locate(InodeNumber(9)));
        assert_eq!(Some((3, InGroupBit(8))), index.locate(InodeNumber(32)));
        assert_eq!(None, index.locate(InodeNumber(33)));

        for raw in 1..=index.total_inodes() {
            let (group, bit) = index.locate(InodeNumber(raw)).unwrap();
            assert_eq!(InodeNumber(raw), index.compose(group, bit));
        }
        assert_eq!(Some((1, 0)), index.table_slot(InodeNumber(9)));
    }

    #[test]
    fn reserved_only_in_group_zero() {
        let index = GroupIndex::new(8, 3, 2);

        assert!(index.is_reserved(0, InGroupBit(1)));
        assert!(index.is_reserved(0, InGroupBit(2)));
        assert!(!index.is_reserved(0, InGroupBit(3)));
        assert!(!index.is_reserved(1, InGroupBit(1)));
    }

    #[test]
    fn zero_bit_position_does_not_exist() {
        assert_eq!(None, InGroupBit::new(0));
        assert_eq!(Some(5), InGroupBit::new(5).map(InGroupBit::get));
    }
}
