//! Attachment-field codec for bead descriptions.
//!
//! A bead's description may start with a block of `key: value` lines
//! carrying dispatch metadata (which formula is attached, who dispatched
//! it, merge hints). The block ends at the first blank line or the first
//! line that is not a `key: value` line; everything after is free prose
//! and is preserved byte-for-byte. Unrecognised `key: value` lines in the
//! leading block are preserved verbatim between the recognised block and
//! the prose.

use chrono::{DateTime, SecondsFormat, Utc};

/// The recognised attachment fields, in canonical emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentFields {
    /// Root id of the bonded workflow instance.
    pub attached_molecule: String,
    /// When the formula was attached (UTC, whole seconds).
    pub attached_at: Option<DateTime<Utc>>,
    /// Caller-supplied arguments recorded at attach time.
    pub attached_args: String,
    /// Identity of the dispatcher that handed the bead out.
    pub dispatched_by: String,
    /// Execution mode hint for the worker.
    pub mode: String,
    /// Merge strategy hint for the refinery.
    pub merge_strategy: String,
    /// Suppress merging entirely.
    pub no_merge: bool,
    /// The tracking convoy owns this bead's lifecycle.
    pub convoy_owned: bool,
    /// External job id when dispatch went through an oddjobs runner.
    pub oj_job_id: String,
}

impl AttachmentFields {
    /// Returns `true` if no field would be emitted.
    pub fn is_empty(&self) -> bool {
        self.attached_molecule.is_empty()
            && self.attached_at.is_none()
            && self.attached_args.is_empty()
            && self.dispatched_by.is_empty()
            && self.mode.is_empty()
            && self.merge_strategy.is_empty()
            && !self.no_merge
            && !self.convoy_owned
            && self.oj_job_id.is_empty()
    }
}

/// A description split into attachment fields, preserved unknown kv lines,
/// and prose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDescription {
    pub fields: AttachmentFields,
    /// Unknown `key: value` lines from the leading block, verbatim.
    pub preserved: Vec<String>,
    /// Everything after the leading block, byte-for-byte.
    pub prose: String,
}

/// Normalises a key for matching: lowercase, hyphens folded to underscores.
fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase().replace('-', "_")
}

/// Returns `true` if `key` has the `[A-Za-z][A-Za-z0-9_-]*` shape.
fn is_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Splits a `key: value` line.
///
/// The colon must be followed by a space (or end the line); this keeps
/// URL-ish lines like `https://host/` out of the kv block.
fn split_kv(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    if !is_key(key) {
        return None;
    }
    if rest.is_empty() {
        return Some((key, ""));
    }
    let value = rest.strip_prefix(' ')?;
    Some((key, value.trim()))
}

/// Parses a truthy/falsy bool; anything else is unrecognised.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parses a description into fields, preserved kv lines and prose.
pub fn parse(description: &str) -> ParsedDescription {
    let mut parsed = ParsedDescription::default();
    let mut consumed = 0usize;

    for raw in description.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            // Blank line terminates the block; prose starts after it.
            consumed += raw.len();
            break;
        }

        let Some((key, value)) = split_kv(line) else {
            // Non-kv line terminates the block; prose starts at it.
            break;
        };

        let recognised = match normalize_key(key).as_str() {
            "attached_molecule" => {
                parsed.fields.attached_molecule = value.to_string();
                true
            }
            "attached_at" => match DateTime::parse_from_rfc3339(value) {
                Ok(t) => {
                    parsed.fields.attached_at = Some(t.with_timezone(&Utc));
                    true
                }
                Err(_) => false,
            },
            "attached_args" => {
                parsed.fields.attached_args = value.to_string();
                true
            }
            "dispatched_by" => {
                parsed.fields.dispatched_by = value.to_string();
                true
            }
            "mode" => {
                parsed.fields.mode = value.to_string();
                true
            }
            "merge_strategy" => {
                parsed.fields.merge_strategy = value.to_string();
                true
            }
            "no_merge" => match parse_bool(value) {
                Some(b) => {
                    parsed.fields.no_merge = b;
                    true
                }
                None => false,
            },
            "convoy_owned" => match parse_bool(value) {
                Some(b) => {
                    parsed.fields.convoy_owned = b;
                    true
                }
                None => false,
            },
            "oj_job_id" => {
                parsed.fields.oj_job_id = value.to_string();
                true
            }
            _ => false,
        };

        if !recognised {
            parsed.preserved.push(line.to_string());
        }
        consumed += raw.len();
    }

    parsed.prose = description[consumed..].to_string();
    parsed
}

impl ParsedDescription {
    /// Renders back to a description string.
    ///
    /// Recognised fields come first in canonical order (empty strings and
    /// false booleans are omitted), then the preserved kv lines unchanged,
    /// then a single blank line, then the prose byte-for-byte.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let f = &self.fields;

        if !f.attached_molecule.is_empty() {
            lines.push(format!("attached_molecule: {}", f.attached_molecule));
        }
        if let Some(t) = f.attached_at {
            lines.push(format!(
                "attached_at: {}",
                t.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if !f.attached_args.is_empty() {
            lines.push(format!("attached_args: {}", f.attached_args));
        }
        if !f.dispatched_by.is_empty() {
            lines.push(format!("dispatched_by: {}", f.dispatched_by));
        }
        if !f.mode.is_empty() {
            lines.push(format!("mode: {}", f.mode));
        }
        if !f.merge_strategy.is_empty() {
            lines.push(format!("merge_strategy: {}", f.merge_strategy));
        }
        if f.no_merge {
            lines.push("no_merge: true".to_string());
        }
        if f.convoy_owned {
            lines.push("convoy_owned: true".to_string());
        }
        if !f.oj_job_id.is_empty() {
            lines.push(format!("oj_job_id: {}", f.oj_job_id));
        }

        lines.extend(self.preserved.iter().cloned());

        if lines.is_empty() {
            return self.prose.clone();
        }

        let mut out = String::new();
        for line in &lines {
            out.push_str(line);
            out.push('\n');
        }
        if !self.prose.is_empty() {
            out.push('\n');
            out.push_str(&self.prose);
        }
        out
    }

    /// Looks up a preserved kv line by normalised key.
    pub fn get_extra(&self, key: &str) -> Option<&str> {
        let want = normalize_key(key);
        self.preserved.iter().find_map(|line| {
            let (k, v) = split_kv(line)?;
            (normalize_key(k) == want).then_some(v)
        })
    }

    /// Inserts or replaces a preserved kv line, matched by normalised key.
    pub fn set_extra(&mut self, key: &str, value: &str) {
        let want = normalize_key(key);
        let rendered = format!("{key}: {value}");
        for line in &mut self.preserved {
            if let Some((k, _)) = split_kv(line) {
                if normalize_key(k) == want {
                    *line = rendered;
                    return;
                }
            }
        }
        self.preserved.push(rendered);
    }
}

/// Rewrites a description with the given fields, keeping preserved kv lines
/// and prose intact.
pub fn set_fields(description: &str, fields: &AttachmentFields) -> String {
    let mut parsed = parse(description);
    parsed.fields = fields.clone();
    parsed.render()
}

/// Applies an in-place edit to the attachment fields of a description.
pub fn update_fields<F>(description: &str, edit: F) -> String
where
    F: FnOnce(&mut AttachmentFields),
{
    let mut parsed = parse(description);
    edit(&mut parsed.fields);
    parsed.render()
}
