//! Population counts and port bitmasks.
//!
//! Modules have at most [`MAX_PORTS`](crate::MAX_PORTS) inputs, so the set of
//! connected (or summing) inputs of one module fits a single `u64`.

/// Unsigned machine words [`count_bits`] accepts.
pub trait BitWord: Copy {
    /// Number of set bits.
    fn ones(self) -> u32;
}

macro_rules! impl_bit_word {
    ($($t:ty),*) => {
        $(
            impl BitWord for $t {
                #[inline]
                fn ones(self) -> u32 {
                    self.count_ones()
                }
            }
        )*
    };
}

impl_bit_word!(u8, u16, u32, u64);

/// Counts the set bits in an 8, 16, 32 or 64-bit word.
///
/// # Example
///
/// ```rust
/// use rackwire_core::count_bits;
///
/// assert_eq!(count_bits(0b1011_u8), 3);
/// assert_eq!(count_bits(u64::MAX), 64);
/// ```
#[inline]
pub fn count_bits<W: BitWord>(word: W) -> u32 {
    word.ones()
}

/// Set of port indices on one module, one bit per port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PortMask(u64);

impl PortMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Adds `index` to the set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 64`.
    #[inline]
    pub fn insert(&mut self, index: usize) {
        assert!(index < 64, "port index {index} out of mask range");
        self.0 |= 1 << index;
    }

    /// Removes `index` from the set.
    #[inline]
    pub fn remove(&mut self, index: usize) {
        if index < 64 {
            self.0 &= !(1 << index);
        }
    }

    /// Returns true if `index` is in the set.
    #[inline]
    pub fn contains(self, index: usize) -> bool {
        index < 64 && self.0 & (1 << index) != 0
    }

    /// Number of ports in the set.
    #[inline]
    pub fn len(self) -> usize {
        count_bits(self.0) as usize
    }

    /// Returns true if no port is in the set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the port indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut rest = self.0;
        core::iter::from_fn(move || {
            if rest == 0 {
                return None;
            }
            let index = rest.trailing_zeros() as usize;
            rest &= rest - 1;
            Some(index)
        })
    }
}
