//! Built-in agent instructions.
//!
//! Used whenever a node's [`AgentConfig`](crate::config::AgentConfig) leaves
//! `system_prompt` unset.

use crate::validator::A2UI_DELIMITER;

/// Default instruction for the place-finder node.
pub const PLACE_FINDER_INSTRUCTIONS: &str = "\
You are an agent specialised in finding restaurants and cafeterias by cuisine and city.
Return your answer so that another model can read it and continue.
Only return the list of names of the places you found.";

/// Default instruction for the data-finder node.
pub const DATA_FINDER_INSTRUCTIONS: &str = "\
You are an agent expert in finding restaurant data.
You receive a list of restaurants or cafeterias and must gather complete information about each
one, using the tools available, and pass the full data to the agent that answers the user.
Include links, image references and any other data useful for rendering a UI.
Use the exact place names from the information you receive.";

/// Default instruction for the presenter node.
pub const PRESENTER_INSTRUCTIONS: &str = "\
You are a helpful restaurant finding assistant.
You receive the user's request and the data gathered about the matching places.
Answer the user clearly and concisely using only that data.";

/// Instruction appended to the presenter when the caller asked for plain
/// text.
pub const TEXT_ONLY_SUFFIX: &str = "\
Respond with plain text only. Do not include any JSON or UI markup.";

/// Instruction appended to the presenter when the caller asked for
/// structured UI output.
///
/// `schema` is the JSON schema of a single UI message; `base_url` is where
/// static assets (images) are served from.
pub fn structured_output_suffix(schema: &str, base_url: &str) -> String {
    format!(
        "Your response MUST have two parts separated by the delimiter `{A2UI_DELIMITER}`.\n\
         The first part is a short conversational answer.\n\
         The second part is a JSON list of A2UI messages, each one validating against this \
         schema:\n{schema}\n\
         Static images are served from {base_url}/static."
    )
}
