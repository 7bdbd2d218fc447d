use once_cell::sync::Lazy;
use regex::Regex;

pub const PT_TO_MM: f32 = 25.4 / 72.0;

// Helvetica advance widths (1/1000 em) for ' '..='~'. The oblique face shares them.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn char_width(c: char) -> u16 {
    match c {
        ' '..='~' => HELVETICA_ASCII[(c as u32 - 32) as usize],
        '\u{2018}' | '\u{2019}' => 222,
        '\u{201C}' | '\u{201D}' => 333,
        '\u{2013}' => 556,
        '\u{2014}' | '\u{2026}' => 1000,
        _ => 556,
    }
}

/// Rendered width of `text` in millimetres at `size_pt`.
pub fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c) as u32).sum();
    units as f32 / 1000.0 * size_pt * PT_TO_MM
}

/// Greedy word wrap to `max_width_mm`. Existing line breaks are kept and
/// words wider than a whole line are broken by character.
pub fn wrap_text(text: &str, max_width_mm: f32, size_pt: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width_mm(&candidate, size_pt) <= max_width_mm {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width_mm(word, size_pt) <= max_width_mm {
                current = word.to_string();
            } else {
                for c in word.chars() {
                    current.push(c);
                    if text_width_mm(&current, size_pt) > max_width_mm && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(c);
                    }
                }
            }
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static PATH_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|]"#).expect("valid regex"));

/// "The Keeper's Light" -> "The_Keeper's_Light". Characters that cannot
/// appear in a file name are dropped.
pub fn underscore_title(title: &str) -> String {
    let safe = PATH_UNSAFE.replace_all(title.trim(), "");
    WHITESPACE.replace_all(&safe, "_").to_string()
}

/// Like [`underscore_title`] but strips all punctuation first.
pub fn underscore_words(title: &str) -> String {
    let words = NON_WORD.replace_all(title.trim(), "");
    WHITESPACE.replace_all(words.trim(), "_").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_scales_with_size() {
        let w11 = text_width_mm("Hello there", 11.0);
        let w22 = text_width_mm("Hello there", 22.0);
        assert!((w22 - 2.0 * w11).abs() < 1e-4);
        // "i" is narrower than "m" in Helvetica
        assert!(text_width_mm("iiii", 11.0) < text_width_mm("mmmm", 11.0));
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "The lighthouse keeper climbed the spiral stairs every night for forty years without fail.";
        let lines = wrap_text(text, 50.0, 11.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, 11.0) <= 50.0, "line too wide: {}", line);
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_breaks_overlong_words_and_keeps_newlines() {
        let lines = wrap_text(&"W".repeat(60), 20.0, 11.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "W".repeat(60));

        let lines = wrap_text("one\ntwo", 100.0, 11.0);
        assert_eq!(lines, ["one", "two"]);
        assert_eq!(wrap_text("", 100.0, 11.0), [""]);
    }

    #[test]
    fn test_title_sanitizing() {
        assert_eq!(underscore_title("The Keeper's  Light"), "The_Keeper's_Light");
        assert_eq!(underscore_title("Fire/Ice: Part 1"), "FireIce_Part_1");
        assert_eq!(underscore_words("The Lamp Room!"), "The_Lamp_Room");
        assert_eq!(underscore_words("What's   Below?"), "Whats_Below");
    }
}
