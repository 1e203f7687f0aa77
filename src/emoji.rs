//! Shortcode → glyph table used by the composer and message conversion.
//!
//! Codes follow the picker's ids (`heart_eyes`, `+1`, ...). Lookups are
//! exact and case-sensitive.

use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref EMOJI: HashMap<&'static str, &'static str> = {
        let entries: &[(&str, &str)] = &[
            // Faces
            ("grinning", "😀"),
            ("smiley", "😃"),
            ("smile", "😄"),
            ("grin", "😁"),
            ("laughing", "😆"),
            ("sweat_smile", "😅"),
            ("rolling_on_the_floor_laughing", "🤣"),
            ("joy", "😂"),
            ("slightly_smiling_face", "🙂"),
            ("upside_down_face", "🙃"),
            ("wink", "😉"),
            ("blush", "😊"),
            ("innocent", "😇"),
            ("smiling_face_with_3_hearts", "🥰"),
            ("heart_eyes", "😍"),
            ("star-struck", "🤩"),
            ("kissing_heart", "😘"),
            ("yum", "😋"),
            ("stuck_out_tongue_winking_eye", "😜"),
            ("zany_face", "🤪"),
            ("hugging_face", "🤗"),
            ("thinking_face", "🤔"),
            ("neutral_face", "😐"),
            ("expressionless", "😑"),
            ("smirk", "😏"),
            ("unamused", "😒"),
            ("face_with_rolling_eyes", "🙄"),
            ("grimacing", "😬"),
            ("relieved", "😌"),
            ("pensive", "😔"),
            ("sleepy", "😪"),
            ("sleeping", "😴"),
            ("sunglasses", "😎"),
            ("nerd_face", "🤓"),
            ("partying_face", "🥳"),
            ("pleading_face", "🥺"),
            ("cry", "😢"),
            ("sob", "😭"),
            ("scream", "😱"),
            ("confounded", "😖"),
            ("weary", "😩"),
            ("angry", "😠"),
            ("rage", "😡"),
            ("exploding_head", "🤯"),
            ("flushed", "😳"),
            ("hot_face", "🥵"),
            ("cold_face", "🥶"),
            ("skull", "💀"),
            ("clown_face", "🤡"),
            ("ghost", "👻"),
            ("alien", "👽"),
            ("robot_face", "🤖"),
            ("see_no_evil", "🙈"),
            ("hear_no_evil", "🙉"),
            ("speak_no_evil", "🙊"),
            // Hearts
            ("heart", "❤️"),
            ("orange_heart", "🧡"),
            ("yellow_heart", "💛"),
            ("green_heart", "💚"),
            ("blue_heart", "💙"),
            ("purple_heart", "💜"),
            ("black_heart", "🖤"),
            ("white_heart", "🤍"),
            ("broken_heart", "💔"),
            ("two_hearts", "💕"),
            ("sparkling_heart", "💖"),
            ("heartpulse", "💗"),
            ("cupid", "💘"),
            ("gift_heart", "💝"),
            ("revolving_hearts", "💞"),
            // Hands
            ("+1", "👍"),
            ("-1", "👎"),
            ("clap", "👏"),
            ("raised_hands", "🙌"),
            ("open_hands", "👐"),
            ("pray", "🙏"),
            ("wave", "👋"),
            ("ok_hand", "👌"),
            ("v", "✌️"),
            ("crossed_fingers", "🤞"),
            ("love_you_gesture", "🤟"),
            ("the_horns", "🤘"),
            ("point_up", "☝️"),
            ("muscle", "💪"),
            ("hand_with_index_finger_and_thumb_crossed", "🫰"),
            ("heart_hands", "🫶"),
            // Things
            ("fire", "🔥"),
            ("sparkles", "✨"),
            ("star", "⭐"),
            ("star2", "🌟"),
            ("dizzy", "💫"),
            ("boom", "💥"),
            ("100", "💯"),
            ("tada", "🎉"),
            ("confetti_ball", "🎊"),
            ("balloon", "🎈"),
            ("gift", "🎁"),
            ("crown", "👑"),
            ("gem", "💎"),
            ("microphone", "🎤"),
            ("headphones", "🎧"),
            ("musical_note", "🎵"),
            ("notes", "🎶"),
            ("dancer", "💃"),
            ("man_dancing", "🕺"),
            ("camera", "📷"),
            ("movie_camera", "🎥"),
            ("tv", "📺"),
            ("iphone", "📱"),
            ("trophy", "🏆"),
            ("rocket", "🚀"),
            ("rainbow", "🌈"),
            ("sunny", "☀️"),
            ("crescent_moon", "🌙"),
            ("cherry_blossom", "🌸"),
            ("rose", "🌹"),
            ("bouquet", "💐"),
            ("tulip", "🌷"),
            ("eyes", "👀"),
            ("lollipop", "🍭"),
            ("bubble_tea", "🧋"),
            ("cake", "🍰"),
            ("birthday", "🎂"),
            ("rabbit", "🐰"),
            ("bear", "🐻"),
            ("cat", "🐱"),
            ("dog", "🐶"),
            ("penguin", "🐧"),
            ("koala", "🐨"),
            ("hamster", "🐹"),
            ("fox_face", "🦊"),
            ("unicorn_face", "🦄"),
            ("flag-kr", "🇰🇷"),
            ("white_check_mark", "✅"),
            ("x", "❌"),
            ("question", "❓"),
            ("exclamation", "❗"),
        ];
        entries.iter().copied().collect()
    };
}

/// Glyph for a shortcode, without surrounding colons.
pub fn lookup(code: &str) -> Option<&'static str> {
    EMOJI.get(code).copied()
}

/// Codes that start with `prefix`, sorted, for the picker's search box.
pub fn search(prefix: &str) -> Vec<(&'static str, &'static str)> {
    let mut hits: Vec<_> = EMOJI
        .iter()
        .filter(|(code, _)| code.starts_with(prefix))
        .map(|(code, glyph)| (*code, *glyph))
        .collect();
    hits.sort_unstable();
    hits
}
