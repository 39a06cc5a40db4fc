use std::fmt::Display;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(u64);

impl Addr {
    pub const fn new(v: u64) -> Self {
        Self(v)
    }
    pub const fn inner(self) -> u64 {
        self.0
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u64> for Addr {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// mask of the lower `bits` bits.
#[inline]
pub const fn bit_range_lower(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// log2 of `x`. assumes `x` is a power of two.
#[inline]
pub const fn log2(x: u64) -> u32 {
    x.trailing_zeros()
}

/// splits an address into `[ tag | set index | block offset ]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddrLayout {
    block_offset_bits: u32,
    set_index_bits: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decomposed {
    pub set_index: usize,
    pub tag: u64,
    pub block_id: u64,
}

impl AddrLayout {
    pub const fn new(block_offset_bits: u32, set_index_bits: u32) -> Self {
        Self {
            block_offset_bits,
            set_index_bits,
        }
    }
    pub const fn block_offset_bits(&self) -> u32 {
        self.block_offset_bits
    }
    pub const fn set_index_bits(&self) -> u32 {
        self.set_index_bits
    }
    #[inline]
    pub const fn block_id(&self, addr: Addr) -> u64 {
        addr.0 >> self.block_offset_bits
    }
    #[inline]
    pub const fn set_index(&self, addr: Addr) -> usize {
        (self.block_id(addr) & bit_range_lower(self.set_index_bits)) as usize
    }
    #[inline]
    pub const fn tag(&self, addr: Addr) -> u64 {
        addr.0 >> (self.block_offset_bits + self.set_index_bits)
    }
    #[inline]
    pub const fn block_offset(&self, addr: Addr) -> u64 {
        addr.0 & bit_range_lower(self.block_offset_bits)
    }
    pub const fn decompose(&self, addr: Addr) -> Decomposed {
        Decomposed {
            set_index: self.set_index(addr),
            tag: self.tag(addr),
            block_id: self.block_id(addr),
        }
    }
    /// inverse of [`AddrLayout::decompose`] given the offset bits.
    pub const fn compose(&self, tag: u64, set_index: usize, block_offset: u64) -> Addr {
        let tag_shift = self.block_offset_bits + self.set_index_bits;
        let tag_part = if tag_shift >= u64::BITS {
            0
        } else {
            tag << tag_shift
        };
        let set_part = ((set_index as u64) & bit_range_lower(self.set_index_bits))
            << self.block_offset_bits;
        Addr(tag_part | set_part | (block_offset & bit_range_lower(self.block_offset_bits)))
    }
    /// first address of the block following the one containing `addr`.
    #[inline]
    pub const fn next_block(&self, addr: Addr) -> Addr {
        Addr(self.block_id(addr).wrapping_add(1) << self.block_offset_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_range_lower() {
        assert_eq!(0, bit_range_lower(0));
        assert_eq!(0b111, bit_range_lower(3));
        assert_eq!(u64::MAX, bit_range_lower(64));
    }
    #[test]
    fn test_log2() {
        assert_eq!(0, log2(1));
        assert_eq!(2, log2(4));
        assert_eq!(15, log2(32768));
    }
    #[test]
    fn test_decompose() {
        // 4-byte blocks, 8 sets
        let l = AddrLayout::new(2, 3);
        let d = l.decompose(Addr::new(0b1011_101_10));
        assert_eq!(0b101, d.set_index);
        assert_eq!(0b1011, d.tag);
        assert_eq!(0b1011_101, d.block_id);
        assert_eq!(0b10, l.block_offset(Addr::new(0b1011_101_10)));
    }
    #[test]
    fn test_single_set() {
        let l = AddrLayout::new(2, 0);
        assert_eq!(0, l.set_index(Addr::new(0xffff_fffc)));
        assert_eq!(0x3fff_ffff, l.tag(Addr::new(0xffff_fffc)));
    }
    #[test]
    fn test_round_trip() {
        let layouts = [
            AddrLayout::new(0, 0),
            AddrLayout::new(2, 3),
            AddrLayout::new(6, 0),
            AddrLayout::new(6, 10),
            AddrLayout::new(12, 20),
        ];
        let mut a: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..1000 {
            a = a
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            for l in layouts {
                let addr = Addr::new(a);
                let d = l.decompose(addr);
                let back = l.compose(d.tag, d.set_index, l.block_offset(addr));
                assert_eq!(addr, back, "layout: {l:?}");
            }
        }
    }
    #[test]
    fn test_next_block() {
        let l = AddrLayout::new(2, 3);
        assert_eq!(Addr::new(0x4), l.next_block(Addr::new(0x0)));
        assert_eq!(Addr::new(0x8), l.next_block(Addr::new(0x7)));
        assert_eq!(Addr::new(0), AddrLayout::new(0, 0).next_block(Addr::new(u64::MAX)));
    }
}
