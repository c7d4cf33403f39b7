//! Help page rendering.
//!
//! Plugins describe themselves as ordered `(heading, body)` sections. Bodies
//! may carry `{bold}`, `{blue}`, `{red}` and `{reset}` markers which become
//! terminal styling (or nothing, for plain output).

use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::Command;

/// Ordered help sections.
pub type HelpSections = Vec<(&'static str, String)>;

const MARKERS: [&str; 4] = ["{bold}", "{blue}", "{red}", "{reset}"];
const INDENT: &str = "    ";
const FALLBACK_WIDTH: usize = 80;

/// Current terminal width, or 80 columns when unknown.
pub fn terminal_width() -> usize {
    crossterm::terminal::size().map_or(FALLBACK_WIDTH, |(columns, _)| usize::from(columns))
}

/// A renderable help page.
#[derive(Debug, Clone)]
pub struct HelpPage {
    sections: HelpSections,
    styled: bool,
}

impl HelpPage {
    /// Create a page from ordered sections.
    pub fn new(sections: HelpSections) -> Self {
        Self { sections, styled: false }
    }

    /// Emit terminal styling for the markers.
    pub fn styled(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    /// Render the page wrapped to `width` columns.
    pub fn render(&self, width: usize) -> String {
        let body_width = width.saturating_sub(INDENT.len()).max(20);
        let mut page = String::new();

        for (heading, body) in &self.sections {
            page.push_str(&self.substitute(&format!("{{bold}}{}{{reset}}", heading.to_uppercase())));
            page.push('\n');
            for paragraph in body.lines() {
                if paragraph.trim().is_empty() {
                    page.push('\n');
                    continue;
                }
                for line in wrap(paragraph, body_width) {
                    page.push_str(INDENT);
                    page.push_str(&self.substitute(&line));
                    page.push('\n');
                }
            }
            page.push('\n');
        }
        page
    }

    fn substitute(&self, text: &str) -> String {
        if !self.styled {
            return MARKERS.iter().fold(text.to_string(), |acc, marker| acc.replace(marker, ""));
        }
        text.replace("{bold}", &ansi(SetAttribute(Attribute::Bold)))
            .replace("{blue}", &ansi(SetForegroundColor(Color::Blue)))
            .replace("{red}", &ansi(SetForegroundColor(Color::Red)))
            .replace("{reset}", &ansi(SetAttribute(Attribute::Reset)))
    }
}

fn ansi(command: impl Command) -> String {
    let mut escape = String::new();
    let _ = command.write_ansi(&mut escape);
    escape
}

/// Length of a word as displayed, markers excluded.
fn visible_len(word: &str) -> usize {
    MARKERS.iter().fold(word.to_string(), |acc, marker| acc.replace(marker, "")).chars().count()
}

/// Greedy word wrap. Leading indentation of the paragraph is kept.
fn wrap(paragraph: &str, width: usize) -> Vec<String> {
    let indent: String = paragraph.chars().take_while(|c| c.is_whitespace()).collect();
    let mut lines = Vec::new();
    let mut line = indent.clone();
    let mut line_len = indent.chars().count();

    for word in paragraph.split_whitespace() {
        let word_len = visible_len(word);
        let has_words = line_len > indent.chars().count();
        if has_words && line_len + 1 + word_len > width {
            lines.push(std::mem::replace(&mut line, indent.clone()));
            line_len = indent.chars().count();
        }
        if line_len > indent.chars().count() {
            line.push(' ');
            line_len += 1;
        }
        line.push_str(word);
        line_len += word_len;
    }
    lines.push(line);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_render_strips_markers() {
        let page = HelpPage::new(vec![("Name", "{bold}Dummy{reset} -- a no-op".to_string())]);
        let text = page.render(80);
        assert!(text.starts_with("NAME\n"));
        assert!(text.contains("    Dummy -- a no-op"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn test_styled_render_emits_escapes() {
        let page = HelpPage::new(vec![("Name", "{blue}ape{reset}".to_string())]).styled(true);
        let text = page.render(80);
        assert!(text.contains('\u{1b}'));
        assert!(!text.contains("{blue}"));
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("one two three four five six seven", 10);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.chars().count() <= 10));
        assert_eq!(lines.join(" "), "one two three four five six seven");
    }

    #[test]
    fn test_wrap_ignores_markers_in_length() {
        let lines = wrap("{bold}abc{reset} def", 7);
        assert_eq!(lines, vec!["{bold}abc{reset} def"]);
    }

    #[test]
    fn test_wrap_keeps_indentation() {
        let lines = wrap("  <name> = <plugins>", 80);
        assert_eq!(lines, vec!["  <name> = <plugins>"]);
    }
}
