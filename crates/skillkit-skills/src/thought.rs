//! Sequential-thinking thought formatting.
//!
//! Renders numbered thoughts with visual markers for revisions and
//! branches, in three styles: a bordered box, a single line, and markdown.

/// One thought in a sequence.
#[derive(Debug, Clone, Default)]
pub struct Thought {
    pub text: String,
    pub number: u32,
    pub total: u32,
    /// Set when this thought revises an earlier one.
    pub revises: Option<u32>,
    /// Set when this thought branches from an earlier one.
    pub branch_from: Option<u32>,
    pub branch_id: Option<String>,
}

/// Output style for [`format_thought`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThoughtFormat {
    #[default]
    Box,
    Simple,
    Markdown,
}

impl std::str::FromStr for ThoughtFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "box" => Ok(ThoughtFormat::Box),
            "simple" => Ok(ThoughtFormat::Simple),
            "markdown" => Ok(ThoughtFormat::Markdown),
            other => Err(format!("unknown format `{other}` (box, simple, markdown)")),
        }
    }
}

pub fn format_thought(thought: &Thought, format: ThoughtFormat) -> String {
    match format {
        ThoughtFormat::Box => format_box(thought),
        ThoughtFormat::Simple => format_simple(thought),
        ThoughtFormat::Markdown => format_markdown(thought),
    }
}

fn header_parts(thought: &Thought) -> (&'static str, &'static str, String) {
    if let Some(revised) = thought.revises {
        ("\u{1F504}", "REVISION", format!(" (revising thought {revised})"))
    } else if let Some(from) = thought.branch_from {
        let context = match &thought.branch_id {
            Some(id) => format!(" (from thought {from}, ID: {id})"),
            None => format!(" (from thought {from})"),
        };
        ("\u{1F33F}", "BRANCH", context)
    } else {
        ("\u{1F4AD}", "Thought", String::new())
    }
}

fn format_box(thought: &Thought) -> String {
    let (emoji, prefix, context) = header_parts(thought);
    let header = format!(
        "{emoji} {prefix} {}/{}{context}",
        thought.number, thought.total
    );

    let width = header.chars().count().max(thought.text.chars().count());
    let border = "\u{2500}".repeat(width + 4);

    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("\u{250C}{border}\u{2500}\u{2510}\n"));
    out.push_str(&format!("\u{2502} {:<w$} \u{2502}\n", header, w = width + 2));
    out.push_str(&format!("\u{251C}{border}\u{2500}\u{2524}\n"));
    for line in wrap_text(&thought.text, width) {
        out.push_str(&format!("\u{2502} {:<w$} \u{2502}\n", line, w = width + 2));
    }
    out.push_str(&format!("\u{2514}{border}\u{2500}\u{2518}"));
    out
}

fn marker(thought: &Thought, bold: bool) -> String {
    let text = if let Some(revised) = thought.revises {
        format!("[REVISION of Thought {revised}]")
    } else if let Some(from) = thought.branch_from {
        match &thought.branch_id {
            Some(id) => format!("[BRANCH {} from Thought {from}]", id.to_uppercase()),
            None => format!("[BRANCH from Thought {from}]"),
        }
    } else {
        return String::new();
    };
    if bold {
        format!(" **{text}**")
    } else {
        format!(" {text}")
    }
}

fn format_simple(thought: &Thought) -> String {
    format!(
        "Thought {}/{}{}: {}",
        thought.number,
        thought.total,
        marker(thought, false),
        thought.text
    )
}

fn format_markdown(thought: &Thought) -> String {
    format!(
        "**Thought {}/{}**{}\n\n{}\n",
        thought.number,
        thought.total,
        marker(thought, true),
        thought.text
    )
}

/// Greedy word wrap at `max_width` characters.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.chars().count() <= max_width {
        return vec![text.to_owned()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if candidate_len <= max_width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_owned();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(text: &str) -> Thought {
        Thought {
            text: text.into(),
            number: 1,
            total: 5,
            ..Thought::default()
        }
    }

    #[test]
    fn simple_plain_thought() {
        let out = format_simple(&basic("Analyze the input"));
        assert_eq!(out, "Thought 1/5: Analyze the input");
    }

    #[test]
    fn simple_revision_marker() {
        let mut t = basic("Actually, reconsider");
        t.number = 3;
        t.revises = Some(2);
        let out = format_simple(&t);
        assert_eq!(out, "Thought 3/5 [REVISION of Thought 2]: Actually, reconsider");
    }

    #[test]
    fn simple_branch_marker_uppercases_id() {
        let mut t = basic("Alternative approach");
        t.branch_from = Some(2);
        t.branch_id = Some("a".into());
        let out = format_simple(&t);
        assert!(out.contains("[BRANCH A from Thought 2]"));
    }

    #[test]
    fn markdown_bolds_header_and_marker() {
        let mut t = basic("Branch body");
        t.branch_from = Some(1);
        let out = format_markdown(&t);
        assert!(out.starts_with("**Thought 1/5** **[BRANCH from Thought 1]**"));
        assert!(out.ends_with("Branch body\n"));
    }

    #[test]
    fn box_format_has_borders_and_header() {
        let out = format_box(&basic("Short"));
        assert!(out.contains('\u{250C}'));
        assert!(out.contains('\u{2514}'));
        assert!(out.contains("Thought 1/5"));
        assert!(out.contains("Short"));
    }

    #[test]
    fn wrap_text_respects_width() {
        let lines = wrap_text("one two three four five six", 9);
        assert!(lines.iter().all(|l| l.chars().count() <= 9));
        assert_eq!(lines.join(" "), "one two three four five six");
    }

    #[test]
    fn wrap_text_short_input_is_single_line() {
        assert_eq!(wrap_text("short", 40), vec!["short".to_string()]);
    }

    #[test]
    fn format_parses() {
        assert_eq!(
            "markdown".parse::<ThoughtFormat>().expect("parse"),
            ThoughtFormat::Markdown
        );
        assert!("fancy".parse::<ThoughtFormat>().is_err());
    }
}
