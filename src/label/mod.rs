//! Zero-copy labels over shared byte buffers.
//!
//! A [`MemoryLabel`] is a view into a reference-counted [`Bytes`] buffer. Cloning a
//! label or slicing a sub-label never copies the labeled bytes, and the backing
//! buffer lives as long as the longest-lived label pointing into it.
//!
//! [`KeyLabel`] adds a comparison strategy on top of a label so it can be used as a
//! map key:
//!
//! - [`StringKeyLabel`]: exact byte comparison.
//! - [`StringKeyLabelCi`]: ASCII case-insensitive comparison.
//! - [`StringKeyLabelCiFast`]: case-insensitive comparison that folds every byte with
//!   `0x20`. Only meaningful for alphabetic tokens (plus `-`), see
//!   [`CaseInsensitiveFast`].
mod strategy;

use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Deref,
};

use bytes::Bytes;
use smol_str::SmolStr;
pub use strategy::{
    equals_ci, equals_ci_fast, fold_hash, CaseInsensitive, CaseInsensitiveFast, Exact,
    LabelStrategy,
};

use crate::{Result, TransportError};

/// A labeled region of a shared byte buffer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MemoryLabel {
    handle: Option<Bytes>,
}

impl MemoryLabel {
    /// The null label: no backing buffer, size 0.
    #[inline]
    pub const fn null() -> Self {
        Self { handle: None }
    }

    /// Label `size` bytes of `handle` starting at `offset`.
    ///
    /// The returned label shares `handle`'s allocation. Fails if the region does not
    /// fit in the buffer.
    pub fn new(handle: &Bytes, offset: usize, size: usize) -> Result<Self> {
        match offset.checked_add(size) {
            Some(end) if end <= handle.len() => Ok(Self {
                handle: Some(handle.slice(offset..end)),
            }),
            _ => Err(TransportError::InvalidLabel),
        }
    }

    /// Label a static string without allocating.
    #[inline]
    pub const fn from_static(text: &'static str) -> Self {
        Self {
            handle: Some(Bytes::from_static(text.as_bytes())),
        }
    }

    /// Label `size` bytes starting at `offset` of this label.
    pub fn sub_label(&self, offset: usize, size: usize) -> Result<Self> {
        match &self.handle {
            Some(handle) => Self::new(handle, offset, size),
            None if offset == 0 && size == 0 => Ok(Self::null()),
            None => Err(TransportError::InvalidLabel),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.handle.is_none()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.handle.as_ref().map_or(0, Bytes::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The labeled bytes. Empty for the null label.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.handle.as_deref().unwrap_or_default()
    }

    /// The shared buffer this label holds on to.
    #[inline]
    pub fn memory_handle(&self) -> Option<&Bytes> {
        self.handle.as_ref()
    }

    /// Exact comparison with `data`.
    #[inline]
    pub fn equals(&self, data: &[u8]) -> bool {
        self.size() == data.len() && self.as_bytes() == data
    }

    /// Copy the labeled bytes into an independently owned `String`.
    ///
    /// Invalid UTF-8 sequences are replaced.
    pub fn to_owned_string(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Copy the labeled bytes into a `SmolStr`, inline for short labels.
    pub fn to_smol_str(&self) -> SmolStr {
        SmolStr::new(String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for MemoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(data) => write!(f, "MemoryLabel({:?})", data),
            None => write!(f, "MemoryLabel(null)"),
        }
    }
}

impl fmt::Display for MemoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl AsRef<[u8]> for MemoryLabel {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Bytes> for MemoryLabel {
    #[inline]
    fn from(handle: Bytes) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl From<&'static str> for MemoryLabel {
    #[inline]
    fn from(text: &'static str) -> Self {
        Self::from_static(text)
    }
}

impl From<String> for MemoryLabel {
    #[inline]
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

/// A [`MemoryLabel`] compared and hashed with strategy `S`.
pub struct KeyLabel<S> {
    label: MemoryLabel,
    _strategy: PhantomData<fn() -> S>,
}

/// Exact-byte key.
pub type StringKeyLabel = KeyLabel<Exact>;
/// ASCII case-insensitive key.
pub type StringKeyLabelCi = KeyLabel<CaseInsensitive>;
/// Fast case-insensitive key for alphabetic tokens.
pub type StringKeyLabelCiFast = KeyLabel<CaseInsensitiveFast>;

impl<S> KeyLabel<S> {
    #[inline]
    pub const fn null() -> Self {
        Self::from_label(MemoryLabel::null())
    }

    #[inline]
    pub const fn from_label(label: MemoryLabel) -> Self {
        Self {
            label,
            _strategy: PhantomData,
        }
    }

    #[inline]
    pub const fn from_static(text: &'static str) -> Self {
        Self::from_label(MemoryLabel::from_static(text))
    }

    pub fn new(handle: &Bytes, offset: usize, size: usize) -> Result<Self> {
        MemoryLabel::new(handle, offset, size).map(Self::from_label)
    }

    #[inline]
    pub fn label(&self) -> &MemoryLabel {
        &self.label
    }

    #[inline]
    pub fn into_label(self) -> MemoryLabel {
        self.label
    }
}

impl<S: LabelStrategy> KeyLabel<S> {
    /// Compare with `data` using this key's strategy.
    #[inline]
    pub fn equals(&self, data: &[u8]) -> bool {
        self.label.size() == data.len() && S::equals(self.label.as_bytes(), data)
    }

    /// The 32-bit word-fold hash this key feeds into a [`Hasher`].
    #[inline]
    pub fn fold_hash(&self) -> u32 {
        S::hash(self.label.as_bytes())
    }
}

impl<S> Clone for KeyLabel<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_label(self.label.clone())
    }
}

impl<S> Default for KeyLabel<S> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<S> Deref for KeyLabel<S> {
    type Target = MemoryLabel;

    #[inline]
    fn deref(&self) -> &MemoryLabel {
        &self.label
    }
}

impl<S: LabelStrategy> PartialEq for KeyLabel<S> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.equals(other.label.as_bytes())
    }
}

impl<S: LabelStrategy> Eq for KeyLabel<S> {}

impl<S: LabelStrategy> Hash for KeyLabel<S> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.fold_hash());
    }
}

impl<S> fmt::Debug for KeyLabel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.label, f)
    }
}

impl<S> fmt::Display for KeyLabel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.label, f)
    }
}

impl<S> From<MemoryLabel> for KeyLabel<S> {
    #[inline]
    fn from(label: MemoryLabel) -> Self {
        Self::from_label(label)
    }
}

impl<S> From<Bytes> for KeyLabel<S> {
    #[inline]
    fn from(handle: Bytes) -> Self {
        Self::from_label(handle.into())
    }
}

impl<S> From<&'static str> for KeyLabel<S> {
    #[inline]
    fn from(text: &'static str) -> Self {
        Self::from_static(text)
    }
}

impl<S> From<String> for KeyLabel<S> {
    #[inline]
    fn from(text: String) -> Self {
        Self::from_label(text.into())
    }
}
