//! Conversation id command.

use serde_json::json;
use submissions_hub_core::ConversationId;

use super::{CommandError, Output, emit};

/// Print a freshly generated conversation id.
///
/// # Errors
///
/// Returns an error if the id cannot be written.
pub fn generate(output: Output) -> Result<(), CommandError> {
    let id = ConversationId::generate();
    match output {
        Output::Text => emit([id.to_string()]),
        Output::Json => emit([json!({ "conversationId": id }).to_string()]),
    }
}
