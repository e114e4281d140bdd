//! Thread-local scratch buffer pools for dict-match byte sets and
//! case-converted strings.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

thread_local! {
    static BUF_POOL: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
    static STRING_POOL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Byte buffer borrowed from the thread-local pool; returned on drop.
pub struct PooledBuf {
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;
    #[inline]
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().unwrap()
    }
}

impl DerefMut for PooledBuf {
    #[inline]
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            BUF_POOL.with(|pool| pool.borrow_mut().push(buf));
        }
    }
}

pub fn get_buf() -> PooledBuf {
    let mut buf = BUF_POOL
        .with(|pool| pool.borrow_mut().pop())
        .unwrap_or_default();
    buf.clear();
    PooledBuf { buf: Some(buf) }
}

/// String buffer borrowed from the thread-local pool; returned on drop.
pub struct PooledString {
    s: Option<String>,
}

impl Deref for PooledString {
    type Target = String;
    #[inline]
    fn deref(&self) -> &String {
        self.s.as_ref().unwrap()
    }
}

impl DerefMut for PooledString {
    #[inline]
    fn deref_mut(&mut self) -> &mut String {
        self.s.as_mut().unwrap()
    }
}

impl Drop for PooledString {
    fn drop(&mut self) {
        if let Some(s) = self.s.take() {
            STRING_POOL.with(|pool| pool.borrow_mut().push(s));
        }
    }
}

pub fn get_string() -> PooledString {
    let mut s = STRING_POOL
        .with(|pool| pool.borrow_mut().pop())
        .unwrap_or_default();
    s.clear();
    PooledString { s: Some(s) }
}
