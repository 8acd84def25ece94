//! Room metadata as stored in the `room_details` hash.

use std::collections::HashMap;

use watchparty_protocol::{ConnectionId, RoomDetails};

/// Hash field names. Browsers read these directly, hence camelCase.
pub mod fields {
    pub const IS_PUBLIC: &str = "isPublic";
    pub const CURRENTLY_WATCHING: &str = "currentlyWatching";
    pub const PREVIEW_THUMBNAIL: &str = "previewThumbnail";
    pub const LEADER: &str = "leader";

    pub const ALL: [&str; 4] =
        [IS_PUBLIC, CURRENTLY_WATCHING, PREVIEW_THUMBNAIL, LEADER];
}

/// Typed view of a room's metadata hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMetadata {
    pub is_public: bool,
    pub currently_watching: String,
    pub preview_thumbnail: String,
    /// The connection that created the room. Informational only.
    pub leader: Option<ConnectionId>,
}

impl RoomMetadata {
    /// Metadata for a room `leader` is creating right now.
    pub fn new(leader: ConnectionId, details: &RoomDetails) -> Self {
        Self {
            is_public: details.is_public,
            currently_watching: details.currently_watching.clone(),
            preview_thumbnail: details.preview_thumbnail.clone(),
            leader: Some(leader),
        }
    }

    /// Field/value pairs in the order they are written.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut out = vec![
            (fields::IS_PUBLIC.to_owned(), self.is_public.to_string()),
            (
                fields::CURRENTLY_WATCHING.to_owned(),
                self.currently_watching.clone(),
            ),
            (
                fields::PREVIEW_THUMBNAIL.to_owned(),
                self.preview_thumbnail.clone(),
            ),
        ];
        if let Some(leader) = self.leader {
            out.push((fields::LEADER.to_owned(), leader.into_inner().to_string()));
        }
        out
    }

    /// Rebuilds metadata from a (possibly partial) hash read. Missing
    /// fields fall back to private / empty.
    pub fn from_fields(map: &HashMap<String, String>) -> Self {
        Self {
            is_public: parse_flag(map.get(fields::IS_PUBLIC)),
            currently_watching: map
                .get(fields::CURRENTLY_WATCHING)
                .cloned()
                .unwrap_or_default(),
            preview_thumbnail: map
                .get(fields::PREVIEW_THUMBNAIL)
                .cloned()
                .unwrap_or_default(),
            leader: map
                .get(fields::LEADER)
                .and_then(|raw| raw.parse().ok())
                .map(ConnectionId::new),
        }
    }
}

/// `"true"` (any case) or `"1"` is public; anything else is private.
pub(crate) fn parse_flag(raw: Option<&String>) -> bool {
    raw.is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}
