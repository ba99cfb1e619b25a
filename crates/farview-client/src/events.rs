//! Session events surfaced to the embedding application.

/// Emitted on the receiver handed out by [`crate::Session::events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The cluster-config exchange completed; reads may be issued.
    Connected,
    /// An index message materially changed a folder's contents.
    Updated { folder: String },
    /// A fatal connection error; the session is no longer usable.
    Error { message: String },
    /// The connection ended, optionally with a peer-supplied reason.
    Closed { reason: Option<String> },
}
