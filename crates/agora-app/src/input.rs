//! User input for the room view.

/// Input from the user, already decoded by the frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// The draft now reads this text.
    Edit(String),

    /// Send the current draft.
    Submit,

    /// Leave the room.
    Quit,
}
