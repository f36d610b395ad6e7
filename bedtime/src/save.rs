//! Writing stories to disk.

use crate::display::{heavy_rule, light_rule};
use bedtime_core::{SessionSnapshot, Story};
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};

lazy_static::lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\s-]").expect("valid filename pattern");
}

const FALLBACK_STEM: &str = "story";

/// A file stem from a title: punctuation removed, spaces to underscores.
pub fn safe_stem(title: &str) -> String {
    let stem = UNSAFE_CHARS.replace_all(title, "").trim().replace(' ', "_");
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// The `.txt` file name for a story title.
pub fn safe_filename(title: &str) -> String {
    format!("{}.txt", safe_stem(title))
}

/// The framed plain-text layout.
pub fn render_text_file(story: &Story) -> String {
    format!(
        "{heavy}\n{}\n{heavy}\n\n{}\n\n{}\nMoral: {}\n{heavy}\n",
        story.title,
        story.content,
        light_rule(),
        story.moral,
        heavy = heavy_rule(),
    )
}

/// Save `story` into `dir`, named after its title.
pub fn save_story(dir: &Path, story: &Story) -> io::Result<PathBuf> {
    let path = dir.join(safe_filename(&story.title));
    std::fs::write(&path, render_text_file(story))?;
    tracing::info!(path = %path.display(), "story saved");
    Ok(path)
}

/// Write the session's story and judge history as pretty JSON.
pub fn export_json(path: &Path, snapshot: &SessionSnapshot) -> io::Result<()> {
    let json = serde_json::to_string_pretty(snapshot).map_err(io::Error::other)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "session exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename_strips_punctuation() {
        assert_eq!(safe_filename("Tom's Tall Hat!"), "Toms_Tall_Hat.txt");
        assert_eq!(safe_filename("  The Moon-Bear  "), "The_Moon-Bear.txt");
        assert_eq!(safe_filename("Luna & Sol: A Tale"), "Luna__Sol_A_Tale.txt");
    }

    #[test]
    fn test_safe_filename_fallback() {
        assert_eq!(safe_filename("?!?"), "story.txt");
        assert_eq!(safe_filename(""), "story.txt");
    }

    #[test]
    fn test_save_story_writes_framed_text() {
        let dir = tempfile::tempdir().unwrap();
        let story = Story::draft("Owl Night", "Owl woke.", "Rest well.");
        let path = save_story(dir.path(), &story).unwrap();

        assert_eq!(path.file_name().unwrap(), "Owl_Night.txt");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with(&format!("{}\nOwl Night\n", heavy_rule())));
        assert!(text.contains("\n\nOwl woke.\n\n"));
        assert!(text.ends_with(&format!("Moral: Rest well.\n{}\n", heavy_rule())));
    }
}
