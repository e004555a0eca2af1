//! Rendering of included entries.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ContextEntry;
use crate::memory::text_match::truncate_chars;
use crate::memory::types::EntryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    NaturalLanguage,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "natural_language" | "natural" | "text" => Ok(Self::NaturalLanguage),
            _ => Err(format!("unknown output format: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub default_format: OutputFormat,
    /// Per-entry content cap applied regardless of compression.
    pub max_entry_chars: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Markdown,
            max_entry_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatConfig,
}

impl Formatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn default_format(&self) -> OutputFormat {
        self.config.default_format
    }

    pub fn render(&self, entries: &[ContextEntry], format: OutputFormat) -> String {
        match format {
            OutputFormat::Markdown => self.markdown(entries),
            OutputFormat::Json => self.json(entries),
            OutputFormat::NaturalLanguage => self.prose(entries),
        }
    }

    fn clip<'a>(&self, content: &'a str) -> std::borrow::Cow<'a, str> {
        let max = self.config.max_entry_chars;
        if content.chars().count() <= max {
            content.into()
        } else {
            format!("{}…", truncate_chars(content, max)).into()
        }
    }

    fn markdown(&self, entries: &[ContextEntry]) -> String {
        let mut out = String::new();
        for entry_type in EntryType::ALL {
            let group: Vec<&ContextEntry> =
                entries.iter().filter(|e| e.entry_type == entry_type).collect();
            if group.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("## {}\n\n", entry_type.heading()));
            for entry in group {
                match entry.title.as_deref() {
                    Some(title) => {
                        out.push_str(&format!("- **{}**: {}\n", title, self.clip(&entry.content)))
                    }
                    None => out.push_str(&format!("- {}\n", self.clip(&entry.content))),
                }
            }
        }
        out
    }

    fn json(&self, entries: &[ContextEntry]) -> String {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                let mut item = json!({
                    "id": e.id,
                    "type": e.entry_type,
                    "content": self.clip(&e.content),
                });
                if let Some(title) = &e.title {
                    item["title"] = json!(title);
                }
                if let Some(priority) = e.priority {
                    item["priority"] = json!(priority);
                }
                item
            })
            .collect();
        json!({ "memoryContext": items }).to_string()
    }

    fn prose(&self, entries: &[ContextEntry]) -> String {
        let mut sentences = Vec::with_capacity(entries.len());
        for entry in entries {
            let lead = match entry.entry_type {
                EntryType::Guideline => "Follow this guideline",
                EntryType::Knowledge => "Keep in mind",
                EntryType::Tool => "A useful tool",
                EntryType::Experience => "From past experience",
            };
            let body = strip_markup(&self.clip(&entry.content));
            let sentence = match entry.title.as_deref() {
                Some(title) => format!("{lead} ({}): {body}", strip_markup(title)),
                None => format!("{lead}: {body}"),
            };
            sentences.push(end_sentence(sentence));
        }
        sentences.join(" ")
    }
}

/// Flatten whitespace and drop characters that read as markdown structure.
fn strip_markup(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`' | '_' | '>' | '|'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn end_sentence(mut s: String) -> String {
    if !s.ends_with(['.', '!', '?', '…']) {
        s.push('.');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ContextEntry> {
        vec![
            ContextEntry {
                title: Some("use-tabs".into()),
                priority: Some(80),
                ..ContextEntry::new("g1", EntryType::Guideline, "Indent with **tabs**")
            },
            ContextEntry {
                title: Some("Deploy flow".into()),
                ..ContextEntry::new("k1", EntryType::Knowledge, "Deploys run from CI")
            },
            ContextEntry::new("e1", EntryType::Experience, "# Lesson\nRetry flaky tests once"),
        ]
    }

    #[test]
    fn markdown_groups_by_type() {
        let out = Formatter::default().render(&sample(), OutputFormat::Markdown);
        assert!(out.starts_with("## Guidelines\n"));
        assert!(out.contains("## Knowledge\n"));
        assert!(out.contains("## Experiences\n"));
        assert!(!out.contains("## Tools"));
        assert!(out.contains("- **use-tabs**: Indent with **tabs**"));
    }

    #[test]
    fn json_wraps_in_memory_context() {
        let out = Formatter::default().render(&sample(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let items = value["memoryContext"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["type"], "guideline");
        assert_eq!(items[0]["priority"], 80);
        assert!(items[2].get("title").is_none());
    }

    #[test]
    fn natural_language_has_no_markup() {
        let out = Formatter::default().render(&sample(), OutputFormat::NaturalLanguage);
        assert!(!out.contains('#'));
        assert!(!out.contains('*'));
        assert!(!out.contains('\n'));
        assert!(out.contains("From past experience: Lesson Retry flaky tests once."));
    }

    #[test]
    fn long_entries_are_clipped() {
        let formatter = Formatter::new(FormatConfig {
            max_entry_chars: 10,
            ..FormatConfig::default()
        });
        let entries = vec![ContextEntry::new("k", EntryType::Knowledge, "x".repeat(500))];
        let out = formatter.render(&entries, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["memoryContext"][0]["content"], format!("{}…", "x".repeat(10)));
    }

    #[test]
    fn empty_input_renders_empty_shapes() {
        let formatter = Formatter::default();
        assert_eq!(formatter.render(&[], OutputFormat::Markdown), "");
        assert_eq!(formatter.render(&[], OutputFormat::Json), r#"{"memoryContext":[]}"#);
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("natural_language".parse::<OutputFormat>().unwrap(), OutputFormat::NaturalLanguage);
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
