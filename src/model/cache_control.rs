use crate::config::settings::CacheControlMode;
use crate::model::client::{CacheControl, ContentBlock, WireContent, WireMessage};

/// Annotate a message sequence with provider cache-control markers.
///
/// Pure transformation: the input is consumed and a new sequence returned.
/// `DefaultEnd` marks the content of the last non-tool message; string
/// content is promoted to block form so the marker has somewhere to live.
pub fn apply(mode: CacheControlMode, messages: Vec<WireMessage>) -> Vec<WireMessage> {
    match mode {
        CacheControlMode::DefaultEnd => mark_last(messages),
    }
}

fn mark_last(mut messages: Vec<WireMessage>) -> Vec<WireMessage> {
    if let Some(msg) = messages.iter_mut().rev().find(|m| m.role != "tool") {
        let content = std::mem::replace(&mut msg.content, WireContent::Text(String::new()));
        msg.content = annotate(content);
    }
    messages
}

fn annotate(content: WireContent) -> WireContent {
    match content {
        WireContent::Text(text) => {
            let mut block = ContentBlock::text(text);
            block.cache_control = Some(CacheControl::ephemeral());
            WireContent::Blocks(vec![block])
        }
        WireContent::Blocks(mut blocks) => {
            if let Some(last) = blocks.last_mut() {
                last.cache_control = Some(CacheControl::ephemeral());
            }
            WireContent::Blocks(blocks)
        }
    }
}
