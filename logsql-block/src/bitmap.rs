//! Fixed-length packed bitset used as the evaluator's working set of
//! matching rows within a block.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

const WORD_BITS: usize = 64;

/// Packed bitset with a fixed logical length.
///
/// Filters clear bits for non-matching rows and never set previously cleared
/// bits, so sequential application composes as AND.
#[derive(Clone, Debug, Default)]
pub struct Bitmap {
    words: Vec<u64>,
    bits_len: usize,
}

impl Bitmap {
    pub fn new(bits_len: usize) -> Self {
        let mut bm = Bitmap::default();
        bm.reset_with_len(bits_len);
        bm
    }

    #[inline]
    pub fn bits_len(&self) -> usize {
        self.bits_len
    }

    /// Resize to `bits_len` logical bits, all cleared.
    pub fn reset_with_len(&mut self, bits_len: usize) {
        let words = bits_len.div_ceil(WORD_BITS);
        self.words.clear();
        self.words.resize(words, 0);
        self.bits_len = bits_len;
    }

    /// Set every bit in `[0, bits_len)`.
    pub fn set_bits(&mut self) {
        for w in &mut self.words {
            *w = !0;
        }
        self.clear_tail();
    }

    /// Clear every bit.
    pub fn reset_bits(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    pub fn copy_from(&mut self, src: &Bitmap) {
        self.bits_len = src.bits_len;
        self.words.clear();
        self.words.extend_from_slice(&src.words);
    }

    /// `self |= other`. Both bitmaps must have the same length.
    pub fn or(&mut self, other: &Bitmap) {
        debug_assert_eq!(self.bits_len, other.bits_len);
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// `self &= !other`. Both bitmaps must have the same length.
    pub fn and_not(&mut self, other: &Bitmap) {
        debug_assert_eq!(self.bits_len, other.bits_len);
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w &= !o;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn ones_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn is_set(&self, idx: usize) -> bool {
        debug_assert!(idx < self.bits_len);
        self.words[idx / WORD_BITS] & (1u64 << (idx % WORD_BITS)) != 0
    }

    /// Visit set bits in ascending order; `f` returns whether the bit stays
    /// set, so iteration and filtering happen in one pass.
    pub fn for_each_set_bit<F: FnMut(usize) -> bool>(&mut self, mut f: F) {
        for (wi, word) in self.words.iter_mut().enumerate() {
            let mut w = *word;
            while w != 0 {
                let bit = w.trailing_zeros() as usize;
                let idx = wi * WORD_BITS + bit;
                if !f(idx) {
                    *word &= !(1u64 << bit);
                }
                w &= w - 1;
            }
        }
    }

    /// Fallible variant of [`for_each_set_bit`](Self::for_each_set_bit);
    /// stops at the first error.
    pub fn try_for_each_set_bit<E, F: FnMut(usize) -> Result<bool, E>>(
        &mut self,
        mut f: F,
    ) -> Result<(), E> {
        for (wi, word) in self.words.iter_mut().enumerate() {
            let mut w = *word;
            while w != 0 {
                let bit = w.trailing_zeros() as usize;
                let idx = wi * WORD_BITS + bit;
                if !f(idx)? {
                    *word &= !(1u64 << bit);
                }
                w &= w - 1;
            }
        }
        Ok(())
    }

    /// Read-only visit of set bits in ascending order.
    pub fn each_set_bit<F: FnMut(usize)>(&self, mut f: F) {
        for (wi, word) in self.words.iter().enumerate() {
            let mut w = *word;
            while w != 0 {
                let bit = w.trailing_zeros() as usize;
                f(wi * WORD_BITS + bit);
                w &= w - 1;
            }
        }
    }

    fn clear_tail(&mut self) {
        let tail = self.bits_len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

thread_local! {
    static BITMAP_POOL: RefCell<Vec<Bitmap>> = const { RefCell::new(Vec::new()) };
}

/// Bitmap borrowed from the thread-local pool; returned on drop, so every
/// exit path releases it.
pub struct PooledBitmap {
    bm: Option<Bitmap>,
}

impl Deref for PooledBitmap {
    type Target = Bitmap;
    #[inline]
    fn deref(&self) -> &Bitmap {
        self.bm.as_ref().unwrap()
    }
}

impl DerefMut for PooledBitmap {
    #[inline]
    fn deref_mut(&mut self) -> &mut Bitmap {
        self.bm.as_mut().unwrap()
    }
}

impl Drop for PooledBitmap {
    fn drop(&mut self) {
        if let Some(bm) = self.bm.take() {
            BITMAP_POOL.with(|pool| pool.borrow_mut().push(bm));
        }
    }
}

/// Take a cleared bitmap of the given logical length from the pool.
pub fn get_bitmap(bits_len: usize) -> PooledBitmap {
    let mut bm = BITMAP_POOL
        .with(|pool| pool.borrow_mut().pop())
        .unwrap_or_default();
    bm.reset_with_len(bits_len);
    PooledBitmap { bm: Some(bm) }
}
