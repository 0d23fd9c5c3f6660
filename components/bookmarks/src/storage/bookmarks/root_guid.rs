/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use lazy_static::lazy_static;
use sync_guid::Guid;

/// Special GUIDs associated with bookmark roots.
/// It's guaranteed that the roots will always have these guids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Hash)]
#[repr(u8)]
pub enum BookmarkRootGuid {
    Root,
    Menu,
    Toolbar,
    Unfiled,
    Mobile,
}

lazy_static! {
    static ref GUIDS: [(BookmarkRootGuid, Guid); 5] = [
        (BookmarkRootGuid::Root, Guid::new(BookmarkRootGuid::Root.as_str())),
        (BookmarkRootGuid::Menu, Guid::new(BookmarkRootGuid::Menu.as_str())),
        (
            BookmarkRootGuid::Toolbar,
            Guid::new(BookmarkRootGuid::Toolbar.as_str())
        ),
        (
            BookmarkRootGuid::Unfiled,
            Guid::new(BookmarkRootGuid::Unfiled.as_str())
        ),
        (
            BookmarkRootGuid::Mobile,
            Guid::new(BookmarkRootGuid::Mobile.as_str())
        ),
    ];
}

/// Every root, in the order they're created. The user roots follow `Root`
/// in the order they appear under it.
pub const ALL_ROOTS: [BookmarkRootGuid; 5] = [
    BookmarkRootGuid::Root,
    BookmarkRootGuid::Menu,
    BookmarkRootGuid::Toolbar,
    BookmarkRootGuid::Unfiled,
    BookmarkRootGuid::Mobile,
];

/// The roots that hold user content.
pub const USER_CONTENT_ROOTS: &[BookmarkRootGuid] = &[
    BookmarkRootGuid::Menu,
    BookmarkRootGuid::Toolbar,
    BookmarkRootGuid::Unfiled,
    BookmarkRootGuid::Mobile,
];

impl BookmarkRootGuid {
    pub fn as_str(self) -> &'static str {
        match self {
            BookmarkRootGuid::Root => "root________",
            BookmarkRootGuid::Menu => "menu________",
            BookmarkRootGuid::Toolbar => "toolbar_____",
            BookmarkRootGuid::Unfiled => "unfiled_____",
            BookmarkRootGuid::Mobile => "mobile______",
        }
    }

    pub fn guid(self) -> &'static Guid {
        &GUIDS[self as usize].1
    }

    pub fn as_guid(self) -> Guid {
        self.guid().clone()
    }

    pub fn well_known(guid: &str) -> Option<Self> {
        GUIDS
            .iter()
            .find(|(_, root_guid)| root_guid == guid)
            .map(|(root, _)| *root)
    }

    pub fn from_guid(guid: &Guid) -> Option<Self> {
        Self::well_known(guid.as_str())
    }

    /// The fixed title we show for a root, whatever the stored row says.
    pub fn title(self) -> &'static str {
        match self {
            BookmarkRootGuid::Root => "<Root>",
            BookmarkRootGuid::Menu => "Bookmarks Menu",
            BookmarkRootGuid::Toolbar => "Bookmarks Toolbar",
            BookmarkRootGuid::Unfiled => "Unsorted Bookmarks",
            BookmarkRootGuid::Mobile => "Mobile Bookmarks",
        }
    }

    /// The title the root row is created with. Not user visible.
    pub(crate) fn row_title(self) -> &'static str {
        match self {
            BookmarkRootGuid::Root => "",
            BookmarkRootGuid::Menu => "menu",
            BookmarkRootGuid::Toolbar => "toolbar",
            BookmarkRootGuid::Unfiled => "unfiled",
            BookmarkRootGuid::Mobile => "mobile",
        }
    }
}

/// Returns the fixed title for `guid` if it names a root.
pub fn title_for_special_guid(guid: &str) -> Option<&'static str> {
    BookmarkRootGuid::well_known(guid).map(BookmarkRootGuid::title)
}

impl From<BookmarkRootGuid> for Guid {
    fn from(item: BookmarkRootGuid) -> Guid {
        item.as_guid()
    }
}

// Allow comparisons between BookmarkRootGuid and Guids
impl PartialEq<BookmarkRootGuid> for Guid {
    fn eq(&self, other: &BookmarkRootGuid) -> bool {
        self.as_str() == other.as_str()
    }
}

impl PartialEq<Guid> for BookmarkRootGuid {
    fn eq(&self, other: &Guid) -> bool {
        other.as_str() == self.as_str()
    }
}

// And between BookmarkRootGuid and &str
impl<'a> PartialEq<BookmarkRootGuid> for &'a str {
    fn eq(&self, other: &BookmarkRootGuid) -> bool {
        *self == other.as_str()
    }
}

impl<'a> PartialEq<&'a str> for BookmarkRootGuid {
    fn eq(&self, other: &&'a str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots() {
        for root in ALL_ROOTS.iter().copied() {
            assert_eq!(BookmarkRootGuid::well_known(root.as_str()), Some(root));
            assert_eq!(BookmarkRootGuid::from_guid(root.guid()), Some(root));
            assert!(root.guid().is_valid_for_sync_server());
            assert_eq!(root.as_guid(), root);
        }
        assert_eq!(BookmarkRootGuid::well_known("aaaaaaaaaaaa"), None);
        assert_eq!(USER_CONTENT_ROOTS.len(), 4);
    }

    #[test]
    fn test_titles() {
        assert_eq!(title_for_special_guid("mobile______"), Some("Mobile Bookmarks"));
        assert_eq!(title_for_special_guid("root________"), Some("<Root>"));
        assert_eq!(title_for_special_guid("toolbar_____"), Some("Bookmarks Toolbar"));
        assert_eq!(title_for_special_guid("abcdefabcdef"), None);
    }
}
