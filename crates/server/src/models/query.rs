use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::models::message::Message;

/// Raw, user supplied filters of a message request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub author: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` means descending.
    pub fn from_param(param: Option<&str>) -> Self {
        param
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn is_ascending(self) -> bool {
        matches!(self, Self::Asc)
    }
}

/// How the store is expected to reach the matching rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessPath {
    /// Narrow lookup on the primary key.
    ByAuthor(String),
    /// Every record, walked through the date-ordered secondary index.
    AllByDate,
}

/// Translated message filters, handed to a [`MessageStore`](crate::store::MessageStore).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageQuery {
    pub path: AccessPath,
    pub direction: SortDirection,
    pub search: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MessageQuery {
    pub fn from_params(params: MessagesQuery) -> Self {
        let path = match non_empty(params.author) {
            Some(author) => AccessPath::ByAuthor(author),
            None => AccessPath::AllByDate,
        };
        Self {
            path,
            direction: SortDirection::from_param(params.sort.as_deref()),
            search: non_empty(params.search),
        }
    }

    pub fn all() -> Self {
        Self {
            path: AccessPath::AllByDate,
            direction: SortDirection::default(),
            search: None,
        }
    }

    pub fn author(&self) -> Option<&str> {
        match &self.path {
            AccessPath::ByAuthor(author) => Some(author),
            AccessPath::AllByDate => None,
        }
    }

    /// A search term can only be applied after rows are fetched, so every page
    /// has to be walked to get a complete result.
    pub fn requires_full_scan(&self) -> bool {
        self.search.is_some()
    }

    /// Evaluates the whole predicate locally, for stores without server-side filtering.
    pub fn matches(&self, message: &Message, case_sensitive: bool) -> bool {
        if let Some(author) = self.author() {
            if message.author != author {
                return false;
            }
        }
        match &self.search {
            None => true,
            Some(search) if case_sensitive => message.text.contains(search.as_str()),
            Some(search) => message
                .text
                .to_lowercase()
                .contains(&search.to_lowercase()),
        }
    }
}
