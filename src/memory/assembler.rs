//! Builds the ordered prompt: persona system message, window, live turn.

use crate::llm::{ChatMessage, ContentPart, ImageUrl, MessageContent, Role};
use crate::memory::history::Window;
use crate::memory::types::Turn;

pub const LONG_TERM_HEADER: &str = "Relevant long-term context:";
pub const BEHAVIOR_DIRECTIVE: &str = "Follow persona rules strictly.";

pub struct ContextAssembler {
    directive: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(BEHAVIOR_DIRECTIVE)
    }
}

impl ContextAssembler {
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
        }
    }

    pub fn assemble(
        &self,
        persona: &str,
        semantic_hits: &[String],
        window: &Window,
        current: &Turn,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt(persona, semantic_hits)));
        messages.extend(window.to_messages());
        messages.push(user_message(current));
        messages
    }

    fn system_prompt(&self, persona: &str, semantic_hits: &[String]) -> String {
        let mut prompt = persona.to_string();
        if !semantic_hits.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(LONG_TERM_HEADER);
            for hit in semantic_hits {
                prompt.push_str("\n- ");
                prompt.push_str(hit);
            }
        }
        if !self.directive.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.directive);
        }
        prompt
    }
}

/// The live turn. With media attached the image part precedes the text part.
fn user_message(current: &Turn) -> ChatMessage {
    match &current.media_url {
        Some(url) => ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                },
                ContentPart::Text {
                    text: current.text.clone(),
                },
            ]),
        },
        None => ChatMessage::user(current.text.clone()),
    }
}
