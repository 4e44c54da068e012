use crate::InGroupBit;

/// 一个组的索引节点位图，1 表示已分配。
///
/// 位置从 1 开始；位置`p`位于第`(p-1)/8`字节的第`(p-1)%8`位。
/// 位图块中超出`len`的填充位不参与查找。
#[derive(Debug)]
pub struct InodeBitmap<B> {
    bits: B,
    len: u32,
}

impl<B: AsRef<[u8]>> InodeBitmap<B> {
    #[inline]
    pub fn new(bits: B, len: u32) -> Self {
        debug_assert!(len as usize <= bits.as_ref().len() * 8);
        Self { bits, len }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_ref()
    }

    #[inline]
    pub fn test(&self, bit: InGroupBit) -> bool {
        let offset = bit.offset();
        offset < self.len && self.bits.as_ref()[(offset / 8) as usize] & (1 << (offset % 8)) != 0
    }

    /// 首个空闲位置
    #[inline]
    pub fn find_first_zero(&self) -> Option<InGroupBit> {
        self.find_zero_from(0)
    }

    /// `after`之后的首个空闲位置
    #[inline]
    pub fn find_next_zero(&self, after: InGroupBit) -> Option<InGroupBit> {
        self.find_zero_from(after.get())
    }

    pub fn count_zeros(&self) -> u32 {
        (0..self.len)
            .filter(|&offset| !self.test(InGroupBit::from_offset(offset)))
            .count() as u32
    }

    fn find_zero_from(&self, start: u32) -> Option<InGroupBit> {
        let bits = self.bits.as_ref();
        let mut offset = start;

        while offset < self.len {
            // 把起点之前的位视作已占用
            let byte = bits[(offset / 8) as usize] | ((1u8 << (offset % 8)) - 1);
            if byte != u8::MAX {
                let found = offset / 8 * 8 + byte.trailing_ones();
                return (found < self.len).then(|| InGroupBit::from_offset(found));
            }
            offset = (offset / 8 + 1) * 8;
        }

        None
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InodeBitmap<B> {
    #[inline]
    pub fn set(&mut self, bit: InGroupBit) {
        let offset = bit.offset();
        debug_assert!(offset < self.len);
        self.bits.as_mut()[(offset / 8) as usize] |= 1 << (offset % 8);
    }

    #[inline]
    pub fn clear(&mut self, bit: InGroupBit) {
        let offset = bit.offset();
        debug_assert!(offset < self.len);
        self.bits.as_mut()[(offset / 8) as usize] &= !(1 << (offset % 8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(raw: u32) -> InGroupBit {
        InGroupBit::new(raw).unwrap()
    }

    #[test]
    fn first_zero_is_one_based() {
        let bitmap = InodeBitmap::new([0b0000_0111u8], 8);
        assert_eq!(Some(bit(4)), bitmap.find_first_zero());
        assert!(bitmap.test(bit(3)));
        assert!(!bitmap.test(bit(4)));
    }

    #[test]
    fn next_zero_skips_past_position() {
        let bitmap = InodeBitmap::new([0b0010_0100u8, 0], 16);
        assert_eq!(Some(bit(1)), bitmap.find_first_zero());
        assert_eq!(Some(bit(2)), bitmap.find_next_zero(bit(1)));
        assert_eq!(Some(bit(4)), bitmap.find_next_zero(bit(2)));
        assert_eq!(Some(bit(7)), bitmap.find_next_zero(bit(5)));
        assert_eq!(Some(bit(9)), bitmap.find_next_zero(bit(8)));
        assert_eq!(None, bitmap.find_next_zero(bit(16)));
    }

    #[test]
    fn padding_bits_are_never_found() {
        // 只有前 12 位有效
        let bitmap = InodeBitmap::new([0xFFu8, 0x0F], 12);
        assert_eq!(None, bitmap.find_first_zero());
        assert_eq!(0, bitmap.count_zeros());
        assert!(!bitmap.test(bit(13)));
    }

    #[test]
    fn set_and_clear() {
        let mut bitmap = InodeBitmap::new([0u8; 2], 16);
        bitmap.set(bit(10));
        assert!(bitmap.test(bit(10)));
        assert_eq!(15, bitmap.count_zeros());
        assert_eq!(Some(bit(11)), bitmap.find_next_zero(bit(9)));

        bitmap.clear(bit(10));
        assert!(!bitmap.test(bit(10)));
        assert_eq!(16, bitmap.count_zeros());
    }

    #[test]
    fn full_bitmap() {
        let bitmap = InodeBitmap::new([u8::MAX; 4], 32);
        assert_eq!(None, bitmap.find_first_zero());
    }
}
