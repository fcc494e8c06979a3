//! Error types for the session layer.

use parlor_protocol::ListKind;

/// Errors from presence tracking.
///
/// All of these are validation errors: their `Display` text is meant to be
/// shown to the user who caused them.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The username already has a live lobby connection.
    /// Only one connection per user is allowed at a time.
    #[error("{0} is already logged in")]
    AlreadyConnected(String),

    /// No online user has this name.
    #[error("{0} is not online")]
    NotFound(String),

    /// The user has been muted and may not chat.
    #[error("you are muted")]
    Muted,
}

/// Errors from the user data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No account has this username.
    #[error("no such user: {0}")]
    NotFound(String),

    /// Adding a name that is already on the list.
    #[error("{username} is already on your {} list", list_name(.list))]
    DuplicateEntry { list: ListKind, username: String },

    /// Removing a name that isn't on the list.
    #[error("{username} is not on your {} list", list_name(.list))]
    MissingEntry { list: ListKind, username: String },

    /// Users can't befriend or block themselves.
    #[error("you can't add yourself to a list")]
    SelfReference,

    /// The backing store could not be reached.
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` if the error was caused by the request rather than
    /// by the store. Only these are shown to the user verbatim.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

fn list_name(list: &ListKind) -> &'static str {
    match list {
        ListKind::Friends => "friends",
        ListKind::Blocked => "blocked",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_entry_message_names_the_list() {
        let err = StoreError::DuplicateEntry {
            list: ListKind::Blocked,
            username: "bob".into(),
        };
        assert_eq!(err.to_string(), "bob is already on your blocked list");
        assert!(err.is_validation());
    }

    #[test]
    fn test_unavailable_is_not_validation() {
        assert!(!StoreError::Unavailable("down".into()).is_validation());
    }
}
