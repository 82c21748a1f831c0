//! Magic Ring: double-mapped circular sample buffer
//!
//! A ring buffer whose backing pages are mapped twice, back to back, in
//! virtual memory. Any live span of up to the full capacity is therefore
//! visible as one contiguous slice, so consumers never write wrap-handling
//! code: a read that would cross the physical end of the buffer simply
//! spills into the second mapping, which aliases the same pages.
//!
//! ```text
//!  virtual:  [ mapping #1 (S bytes) ][ mapping #2 (S bytes) ]
//!                 |                       |
//!  physical: [ shared memfd pages (S bytes) ] <- both map here
//! ```
//!
//! Cursors are kept in bytes and converted to items at the API boundary.
//! All cursor mutation is serialized by an internal mutex, so a `MagicRing`
//! can be shared between a producer and a consumer thread behind an `Arc`.
//!
//! ## Example
//!
//! ```rust
//! use gsmcal_core::magic_ring::MagicRing;
//!
//! let ring: MagicRing<u32> = MagicRing::new(1024, false).unwrap();
//! ring.write(&[1, 2, 3]);
//! let seen = ring.peek();
//! assert_eq!(seen, &[1, 2, 3]);
//! ring.purge(2);
//! assert_eq!(ring.data_available(), 1);
//! ```

use std::marker::PhantomData;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::Mutex;

use crate::types::{KalError, KalResult};

/// Byte cursors protected by the ring's mutex.
///
/// Invariant: `w >= r` and `w - r <= usable_size`. Both cursors advance
/// monotonically and are renormalized together once both pass the mapping
/// size, so they never overflow in practice.
#[derive(Debug, Clone, Copy)]
struct Cursors {
    r: usize,
    w: usize,
}

/// Lock-protected double-mapped ring buffer of `Copy` items.
pub struct MagicRing<T> {
    /// Start of the first mapping. The second mapping begins at
    /// `base + map_size` and aliases the same physical pages.
    base: *mut u8,
    /// Size in bytes of one mapping (page-rounded).
    map_size: usize,
    /// `capacity * item_size`; all free-space math uses this so that the
    /// live region is always a whole number of items.
    usable_size: usize,
    capacity: usize,
    overwrite: bool,
    cursors: Mutex<Cursors>,
    _memfd: OwnedFd,
    _marker: PhantomData<T>,
}

// Safety: the raw mapping is plain memory owned by this struct; all cursor
// state is behind a mutex and the write/read paths only touch disjoint
// byte ranges (free region vs. live region).
unsafe impl<T: Send> Send for MagicRing<T> {}
unsafe impl<T: Send> Sync for MagicRing<T> {}

impl<T: Copy> MagicRing<T> {
    /// Create a ring holding at least `buf_len` items.
    ///
    /// `overwrite` selects the full-buffer policy: `false` caps writes at
    /// the available space, `true` accepts everything and drops the oldest
    /// items instead.
    ///
    /// The backing size is rounded up to the page size, so `capacity()` may
    /// exceed `buf_len`. Fails with [`KalError::ResourceExhausted`] if the
    /// shared memory file or either mapping cannot be created, or if
    /// `buf_len * item_size` does not fit a u32.
    pub fn new(buf_len: usize, overwrite: bool) -> KalResult<Self> {
        let item_size = std::mem::size_of::<T>();
        if buf_len == 0 {
            return Err(KalError::ResourceExhausted("ring length is 0".into()));
        }
        if item_size == 0 {
            return Err(KalError::ResourceExhausted("ring item size is 0".into()));
        }
        let raw_size = buf_len
            .checked_mul(item_size)
            .filter(|&n| n <= u32::MAX as usize)
            .ok_or_else(|| KalError::ResourceExhausted("ring size overflow".into()))?;

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = if page_size > 0 { page_size as usize } else { 4096 };
        let map_size = (raw_size + page_size - 1) & !(page_size - 1);
        let capacity = map_size / item_size;
        let usable_size = capacity * item_size;

        // Anonymous shared memory object backing both mappings.
        let memfd = unsafe {
            let fd = libc::memfd_create(c"gsmcal-ring".as_ptr(), libc::MFD_CLOEXEC);
            if fd < 0 {
                return Err(os_error("memfd_create failed"));
            }
            OwnedFd::from_raw_fd(fd)
        };
        if unsafe { libc::ftruncate(memfd.as_raw_fd(), map_size as libc::off_t) } < 0 {
            return Err(os_error("ftruncate failed"));
        }

        // Reserve a 2*S window, then pin both halves onto the memfd pages.
        let base = unsafe {
            let addr = libc::mmap(
                std::ptr::null_mut(),
                2 * map_size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            if addr == libc::MAP_FAILED {
                return Err(os_error("mmap reserve failed"));
            }
            addr as *mut u8
        };

        for half in 0..2 {
            let want = unsafe { base.add(half * map_size) };
            let got = unsafe {
                libc::mmap(
                    want as *mut libc::c_void,
                    map_size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED | libc::MAP_FIXED,
                    memfd.as_raw_fd(),
                    0,
                )
            };
            if got != want as *mut libc::c_void {
                unsafe { libc::munmap(base as *mut libc::c_void, 2 * map_size) };
                return Err(os_error("mmap fixed mapping failed"));
            }
        }

        Ok(Self {
            base,
            map_size,
            usable_size,
            capacity,
            overwrite,
            cursors: Mutex::new(Cursors { r: 0, w: 0 }),
            _memfd: memfd,
            _marker: PhantomData,
        })
    }

    /// Capacity in items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently buffered.
    pub fn data_available(&self) -> usize {
        let c = self.cursors.lock().unwrap();
        (c.w - c.r) / std::mem::size_of::<T>()
    }

    /// Number of items that can be written without dropping anything.
    pub fn space_available(&self) -> usize {
        let c = self.cursors.lock().unwrap();
        (self.usable_size - (c.w - c.r)) / std::mem::size_of::<T>()
    }

    /// Drop everything; both cursors return to zero.
    pub fn flush(&self) {
        let mut c = self.cursors.lock().unwrap();
        c.r = 0;
        c.w = 0;
    }

    /// Append items from `src`.
    ///
    /// Without overwrite the count is capped at the free space and the
    /// number actually written is returned. With overwrite all of `src` is
    /// accepted and the read cursor is advanced over the oldest items.
    pub fn write(&self, src: &[T]) -> usize {
        let item_size = std::mem::size_of::<T>();
        let mut c = self.cursors.lock().unwrap();

        let bytes_used = c.w - c.r;
        let items_free = (self.usable_size - bytes_used) / item_size;
        let to_write = if self.overwrite {
            src.len()
        } else {
            src.len().min(items_free)
        };

        if to_write > 0 {
            let offset = c.w % self.map_size;
            debug_assert!(offset % std::mem::align_of::<T>() == 0);
            unsafe {
                std::ptr::copy_nonoverlapping(
                    src.as_ptr() as *const u8,
                    self.base.add(offset),
                    to_write * item_size,
                );
            }
            c.w += to_write * item_size;
        }

        if self.overwrite && (c.w - c.r) > self.usable_size {
            c.r = c.w - self.usable_size;
        }
        self.normalize(&mut c);
        to_write
    }

    /// Copy out up to `dst.len()` items, consuming them.
    pub fn read(&self, dst: &mut [T]) -> usize {
        let item_size = std::mem::size_of::<T>();
        let mut c = self.cursors.lock().unwrap();

        let items_avail = (c.w - c.r) / item_size;
        let to_read = dst.len().min(items_avail);

        if to_read > 0 {
            let offset = c.r % self.map_size;
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.base.add(offset),
                    dst.as_mut_ptr() as *mut u8,
                    to_read * item_size,
                );
            }
            c.r += to_read * item_size;
        }

        self.normalize(&mut c);
        to_read
    }

    /// Borrow the live region as one contiguous slice, oldest item first.
    ///
    /// The double mapping guarantees contiguity even when the region spans
    /// the physical wrap point. The slice reflects the ring at the time of
    /// the call; a concurrent producer only ever writes into the free
    /// region, so the returned items are stable as long as the caller does
    /// not purge past them.
    pub fn peek(&self) -> &[T] {
        let item_size = std::mem::size_of::<T>();
        let c = self.cursors.lock().unwrap();
        let count = (c.w - c.r) / item_size;
        let offset = c.r % self.map_size;
        unsafe { std::slice::from_raw_parts(self.base.add(offset) as *const T, count) }
    }

    /// Drop up to `len` items from the front; returns the number dropped.
    pub fn purge(&self, len: usize) -> usize {
        let item_size = std::mem::size_of::<T>();
        let mut c = self.cursors.lock().unwrap();

        let items_avail = (c.w - c.r) / item_size;
        let to_purge = len.min(items_avail);
        c.r += to_purge * item_size;

        self.normalize(&mut c);
        to_purge
    }

    /// Pull both cursors back once they have both passed the mapping size,
    /// keeping them bounded without disturbing `w - r` or `cursor % S`.
    fn normalize(&self, c: &mut Cursors) {
        if c.r >= self.map_size && c.w >= self.map_size {
            c.r -= self.map_size;
            c.w -= self.map_size;
        }
    }
}

impl<T> Drop for MagicRing<T> {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, 2 * self.map_size);
        }
    }
}

fn os_error(what: &str) -> KalError {
    KalError::ResourceExhausted(format!("{what}: {}", std::io::Error::last_os_error()))
}
