//! Prompt text sent to the image model.

use storyboard::StyleTag;

pub fn style_instruction(style: StyleTag) -> &'static str {
    match style {
        StyleTag::Sketch => "Style: Professional charcoal storyboard sketch, rough pencil strokes, hand-drawn texture, minimalist outlines, monochrome grey and black.",
        StyleTag::ColoredPencil => "Style: Professional colored pencil storyboard, soft wax texture, vibrant hand-drawn colors, fine pencil hatching, artistic sketch with a mix of colored pigments, white paper background.",
        StyleTag::Animation2d => "Style: Professional 2D animation, clean lines, flat colors, anime aesthetic, clear character expressions.",
        StyleTag::Render3d => "Style: High-quality 3D render, Octane render, Pixar-style lighting, soft shadows, detailed textures, cinematic depth.",
        StyleTag::Realistic => "Style: Photorealistic cinematic photography, 35mm lens, natural lighting, highly detailed, professional film production look.",
        StyleTag::Noir => "Style: Film Noir, high contrast black and white, dramatic lighting, moody shadows, classic 1940s cinema aesthetic.",
    }
}

const FRAME_RULES: &str = "CRITICAL INSTRUCTIONS:\n\
- NO TEXT, NO LETTERS, NO WORDS, NO CAPTIONS in the image.\n\
- NO BORDERS, NO SQUARE FRAMES INSIDE THE IMAGE, NO PANELS.\n\
- FULL FRAME COMPOSITION ONLY.";

pub fn compose_prompt(description: &str, style: StyleTag) -> String {
    format!(
        "Create a cinematic storyboard image for the following scene: {}.\n{}\n{}",
        description.trim().trim_end_matches('.'),
        style_instruction(style),
        FRAME_RULES
    )
}
