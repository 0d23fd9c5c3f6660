/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#![allow(unknown_lints)]
#![warn(rust_2018_idioms)]

use std::{borrow::Borrow, fmt, ops};

#[cfg(feature = "rusqlite_support")]
mod rusqlite_support;

#[cfg(feature = "serde_support")]
mod serde_support;

/// The length of every GUID we generate, and of the fixed root GUIDs.
pub const GUID_LENGTH: usize = 12;

/// A bookmark GUID. Identity for a node across the mirror, local and buffer
/// tables, and across devices.
///
/// Anything that arrives from the server is accepted as-is (legacy clients
/// wrote all sorts of things into this field), so construction never fails.
/// Use `is_valid_for_sync_server` to check a value is something we would
/// have produced ourselves.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Guid(String);

impl Guid {
    /// Create a guid from a `str`.
    #[inline]
    pub fn new(s: &str) -> Self {
        Guid(s.into())
    }

    /// Create an empty guid. Usable as a "not yet assigned" marker.
    #[inline]
    pub const fn empty() -> Self {
        Guid(String::new())
    }

    /// Create a random guid: 9 random bytes, base64url-encoded without
    /// padding, which is always 12 characters.
    #[cfg(feature = "random")]
    pub fn random() -> Self {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let bytes: [u8; 9] = rand::random();
        Guid(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns true for a 12 character string made only of base64url
    /// characters. The fixed root GUIDs (`menu________` etc) pass.
    pub fn is_valid_for_sync_server(&self) -> bool {
        self.len() == GUID_LENGTH && self.as_bytes().iter().copied().all(is_base64url_byte)
    }
}

#[inline]
fn is_base64url_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

impl From<String> for Guid {
    #[inline]
    fn from(s: String) -> Self {
        Guid(s)
    }
}

impl<'a> From<&'a str> for Guid {
    #[inline]
    fn from(s: &'a str) -> Self {
        Guid::new(s)
    }
}

impl<'a> From<&'a Guid> for Guid {
    #[inline]
    fn from(g: &'a Guid) -> Self {
        g.clone()
    }
}

impl From<Guid> for String {
    #[inline]
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

impl AsRef<str> for Guid {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<[u8]> for Guid {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Borrow<str> for Guid {
    #[inline]
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl ops::Deref for Guid {
    type Target = str;
    #[inline]
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Guid {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<'a> PartialEq<&'a str> for Guid {
    #[inline]
    fn eq(&self, other: &&'a str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<Guid> for str {
    #[inline]
    fn eq(&self, other: &Guid) -> bool {
        self == other.as_str()
    }
}

impl<'a> PartialEq<Guid> for &'a str {
    #[inline]
    fn eq(&self, other: &Guid) -> bool {
        *self == other.as_str()
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_for_sync_server() {
        assert!(Guid::new("menu________").is_valid_for_sync_server());
        assert!(Guid::new("aaaabbbb-_99").is_valid_for_sync_server());
        assert!(!Guid::new("aaaabbbbccc").is_valid_for_sync_server());
        assert!(!Guid::new("aaaabbbbcccc!").is_valid_for_sync_server());
        assert!(!Guid::new("aaaa bbbbccc").is_valid_for_sync_server());
        assert!(!Guid::empty().is_valid_for_sync_server());
    }

    #[test]
    fn test_comparison() {
        let g = Guid::from("toolbar_____");
        assert_eq!(g, "toolbar_____");
        assert_eq!("toolbar_____", g);
        assert_eq!(&*g, "toolbar_____");
        assert_eq!(g.to_string(), "toolbar_____");
        assert_eq!(format!("{:?}", g), "\"toolbar_____\"");
        assert_eq!(String::from(g), "toolbar_____".to_string());
    }

    #[cfg(feature = "random")]
    #[test]
    fn test_random() {
        let a = Guid::random();
        let b = Guid::random();
        assert!(a.is_valid_for_sync_server(), "{:?}", a);
        assert!(b.is_valid_for_sync_server(), "{:?}", b);
        assert_ne!(a, b);
    }
}
