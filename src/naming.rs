//! Filesystem-safe icon file names.

use clap::ValueEnum;
use serde::Deserialize;

pub const DESCRIPTION_SEGMENT_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNaming {
    /// `icon_{style}_{description}.png`, with `_2`, `_3`, ... appended on collision.
    Plain,
    /// Always append a unix-millisecond timestamp.
    Timestamp,
}

fn is_kept(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-' || ch.is_whitespace()
}

fn underscore_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out
}

pub fn sanitize_style(style: &str) -> String {
    let kept = style.chars().filter(|ch| is_kept(*ch)).collect::<String>();
    underscore_whitespace(kept.trim())
}

/// Strips punctuation, keeps at most the first 30 characters, then replaces
/// whitespace runs with underscores.
pub fn sanitize_description(description: &str) -> String {
    let kept = description
        .chars()
        .filter(|ch| is_kept(*ch))
        .take(DESCRIPTION_SEGMENT_MAX_CHARS)
        .collect::<String>();
    underscore_whitespace(kept.trim())
}

pub fn icon_stem(style: &str, description: &str) -> String {
    format!(
        "icon_{}_{}",
        sanitize_style(style),
        sanitize_description(description)
    )
}

/// Filename for the given stem. `discriminator` is `None` for the first
/// candidate of a plain name.
pub fn icon_filename(stem: &str, discriminator: Option<&str>) -> String {
    match discriminator {
        Some(suffix) => format!("{stem}_{suffix}.png"),
        None => format!("{stem}.png"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_scenario_name() {
        assert_eq!(
            icon_filename(&icon_stem("minimalist", "a hot cup of coffee"), None),
            "icon_minimalist_a_hot_cup_of_coffee.png"
        );
    }

    #[test]
    fn punctuation_is_removed() {
        let segment = sanitize_description("a retro rocket ship, launching!");
        assert_eq!(segment, "a_retro_rocket_ship_launching");
        assert!(
            segment
                .chars()
                .all(|ch| ch.is_alphanumeric() || ch == '_')
        );
    }

    #[test]
    fn description_is_capped_before_underscoring() {
        let segment = sanitize_description("a very long description of a lighthouse at dusk");
        assert_eq!(segment, "a_very_long_description_of_a_l");
        assert!(segment.chars().count() <= DESCRIPTION_SEGMENT_MAX_CHARS);
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let inputs = [
            "pixel art",
            "  slack   emoji!! ",
            "a retro rocket ship, launching!",
            "über-cool   café (v2)",
            "a_b  c",
        ];
        for input in inputs {
            let style = sanitize_style(input);
            assert_eq!(sanitize_style(&style), style, "style: {input}");
            let desc = sanitize_description(input);
            assert_eq!(sanitize_description(&desc), desc, "description: {input}");
        }
    }

    #[test]
    fn discriminator_is_appended() {
        assert_eq!(icon_filename("icon_a_b", Some("2")), "icon_a_b_2.png");
    }
}
