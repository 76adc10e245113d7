//! Prompt construction for the two model calls.

/// Keywords appended to every style instruction to push image quality up.
const QUALITY_ENHANCERS: &str = "masterpiece, 8k, high detail, professional photography, sharp focus";

/// Artefacts the image model is steered away from.
const NEGATIVE_STYLE: &str =
    "blurry, low quality, lowres, distorted, deformed, disfigured, bad anatomy, watermark, text, signature";

/// Positive/negative instruction pair for the image-to-image call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylePrompt {
    pub positive: String,
    pub negative: String,
}

/// Build the style instruction pair from the user's style text.
///
/// The model already receives the photo, so the prompt carries only the
/// requested style plus quality keywords.
pub fn style_prompt(style: &str) -> StylePrompt {
    StylePrompt {
        positive: format!("{style}, {QUALITY_ENHANCERS}"),
        negative: NEGATIVE_STYLE.to_string(),
    }
}

/// Build the caption instruction sent alongside the stylized image.
pub fn caption_prompt(title: &str, categories: &[String]) -> String {
    let base = "You are an expert content creator. Analyze the provided image \
                and write an engaging, attention-grabbing caption.";
    let context = format!("The main context or title of this post is \"{title}\".");
    let tone = if categories.is_empty() {
        "Use a general, informative tone.".to_string()
    } else {
        format!(
            "Write the caption using the following tone/style: {}.",
            categories.join(", ")
        )
    };
    let rules = "Return ONLY the caption text, without any introduction. \
                 Format it ready to copy-paste to social media.";

    [base, context.as_str(), tone.as_str(), rules].join(" ")
}
