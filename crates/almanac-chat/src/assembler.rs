//! Builds the payload sent to the model for a single user turn.

use crate::session::Session;
use almanac_ai::{Content, Context, Role, Turn};

/// Instruction injected ahead of the user's text when an image is attached.
pub const IMAGE_ANALYSIS_INSTRUCTION: &str = "Analyze this calendar image: extract the dates \
and times it shows, then check them against the rest of the conversation for overlaps or \
conflicts.";

/// Assemble the request payload from the session.
///
/// The session's newest turn is the user turn being processed. The payload
/// carries the system instruction, the full prior transcript in order, and
/// the newest turn last. When an attachment is present the newest turn's
/// parts become [analysis instruction, user text, image]; only the most
/// recent upload is ever sent, and history turns stay text-only.
pub fn build_payload(system_instruction: &str, session: &Session) -> Context {
    let mut context = Context::with_system(system_instruction);

    let Some((newest, history)) = session.turns().split_last() else {
        return context;
    };

    for turn in history {
        context.push(turn.clone());
    }

    context.push(expand_newest(newest, session));
    context
}

fn expand_newest(newest: &Turn, session: &Session) -> Turn {
    let attachment = match session.attachment() {
        Some(att) if newest.role == Role::User => att,
        _ => return newest.clone(),
    };

    let mut content = Vec::with_capacity(newest.content.len() + 2);
    content.push(Content::text(IMAGE_ANALYSIS_INSTRUCTION));
    content.extend(newest.content.iter().cloned());
    content.push(attachment.to_content());

    Turn {
        role: Role::User,
        content,
        timestamp: newest.timestamp,
    }
}
