//! `StandardCard` rendering.
//!
//! The card carries a header, an optional progress line, the prompt, an
//! image list and an elapsed-time footer.

use sdbot_core::platform::CardContent;
use serde_json::{json, Value};

/// Interactive card template used for every reply.
pub const CARD_TEMPLATE_ID: &str = "StandardCard";

pub const CARD_TITLE: &str = "Stable Diffusion Bot";
pub const CARD_LOGO_MEDIA_ID: &str = "@lALPDtXaA1csu9g4MA";

// Component ids are fixed so updates replace components in place.
const PROGRESS_ID: &str = "text_progress";
const PROMPT_ID: &str = "text_prompt";
const IMAGES_ID: &str = "imageList_result";
const FOOTER_ID: &str = "markdown_footer";

/// Render the `cardData` object for `card`.
pub fn render(card: &CardContent) -> Value {
    let mut contents = Vec::with_capacity(4);
    if let Some(progress) = &card.progress {
        contents.push(json!({
            "type": "text",
            "text": format!("处理中，进度 {progress} ..."),
            "id": PROGRESS_ID,
        }));
    }
    contents.push(json!({
        "type": "text",
        "text": format!("Prompt: {}", card.prompt),
        "id": PROMPT_ID,
    }));
    contents.push(json!({
        "type": "imageList",
        "images": card.images,
        "id": IMAGES_ID,
    }));
    contents.push(json!({
        "type": "markdown",
        "text": format!("> Elapse {:.3}s\n> Powered by Stable Diffusion", card.elapsed_secs),
        "id": FOOTER_ID,
    }));

    json!({
        "config": {
            "autoLayout": true,
            "enableForward": true,
        },
        "header": {
            "title": {
                "type": "text",
                "text": CARD_TITLE,
            },
            "logo": CARD_LOGO_MEDIA_ID,
        },
        "contents": contents,
    })
}
