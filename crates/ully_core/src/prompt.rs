//! System prompt assembly and the camera-mode templates.

use crate::domain::{CameraMode, WeatherContext};

/// Reply budget for every chat request.
pub const MAX_REPLY_TOKENS: u32 = 1500;

pub const BASE_SYSTEM_PROMPT: &str = r#"You are Ully, a friendly and knowledgeable coffee companion.

You help people brew better coffee at home and discover great coffee around them:
- Recipes and brew methods (espresso, pour-over, AeroPress, French press, cold brew).
- Dialing in: grind size, dose, yield, ratio, water temperature and extraction time.
- Beans: origins, processing, roast levels and tasting notes.
- Equipment: grinders, espresso machines, kettles, scales and their upkeep.
- Cafes and baristas worth visiting.

When the user sends photos:
- A single photo is usually a coffee bag, a menu or a piece of equipment. Read labels carefully and explain what matters.
- A sequence of photos is a short recording, often an espresso shot pulling. Comment on flow, colour, channeling and timing across the frames.

Style:
- Warm, concise and practical. Prefer concrete numbers (e.g. "18g in, 36g out in 28 seconds").
- Use short paragraphs or brief lists. Avoid long essays.
- If something is outside coffee, answer briefly and steer back to coffee when it fits."#;

/// Builds the system prompt, appending a location and weather block when one is known.
pub fn build_system_prompt(weather: Option<&WeatherContext>) -> String {
    match weather {
        None => BASE_SYSTEM_PROMPT.to_string(),
        Some(w) => format!(
            "{BASE_SYSTEM_PROMPT}\n\nCURRENT CONTEXT:\n\
             - Location: {}, {}, {}\n\
             - Weather: {}, {}°C ({}°F), feels like {}°C ({}°F)\n\
             Use this when it is relevant, for example suggesting iced drinks on hot days \
             or something warming when it is cold and wet. Do not mention it otherwise.",
            w.city,
            w.region,
            w.country,
            w.condition,
            w.temp_c,
            w.temp_f,
            w.feels_like_c,
            w.feels_like_f,
        ),
    }
}

impl CameraMode {
    /// The hint shown over the camera view.
    pub fn instruction(self) -> &'static str {
        match self {
            CameraMode::Scan => "Point the camera at a coffee bag, menu or piece of equipment",
            CameraMode::Extraction => "Record your espresso shot from the side as it pulls",
        }
    }

    /// The outgoing user text that accompanies a capture in this mode.
    pub fn message_text(self) -> &'static str {
        match self {
            CameraMode::Scan => {
                "What can you tell me about this? Identify the coffee or equipment and give me tips."
            }
            CameraMode::Extraction => {
                "Here is my espresso extraction. How does it look and what should I adjust?"
            }
        }
    }
}

/// Outgoing text for a capture, falling back to a generic prompt without a mode.
pub fn capture_message_text(mode: Option<CameraMode>, is_video: bool) -> &'static str {
    match (mode, is_video) {
        (Some(mode), _) => mode.message_text(),
        (None, false) => "What do you see in this photo?",
        (None, true) => "What do you see in this video?",
    }
}
