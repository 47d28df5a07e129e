//! Human-readable model labels

/// Label for a model id. `-thinking` variants share their base model's label;
/// unknown ids are returned unchanged.
pub fn display_name(model: &str) -> &str {
    match model {
        "gemini-2.5-pro" => "Gemini 2.5 Pro",
        "gemini-2.5-flash" => "Gemini 2.5 Flash",
        "gemini-2.0-flash" => "Gemini 2.0 Flash",
        "gemini-2.0-flash-lite" => "Gemini 2.0 Flash Lite",
        "gemini-2.0-flash-exp" => "Gemini 2.0 Flash Exp",
        "gemini-exp-1206" => "Gemini Exp",
        "gemini-claude-sonnet-4-5" | "gemini-claude-sonnet-4-5-thinking" => "Claude Sonnet 4.5",
        "gemini-claude-opus-4-5" | "gemini-claude-opus-4-5-thinking" => "Claude Opus 4.5",
        "imagen-3.0-generate-002" => "Imagen 3",
        other => other,
    }
}
