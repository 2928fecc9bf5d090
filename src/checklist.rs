//! Checklist model: label formatting, rendering, pagination, intake and the
//! toggle reconciler. Everything in here is pure; the message keyboard is the
//! only place checklist state lives.

use std::fmt;

use log::{debug, warn};

pub(crate) const MAX_LABEL_CHARS: usize = 80;
pub(crate) const MAX_ENTRIES: usize = 25;
pub(crate) const GROUP_WIDTH: usize = 5;
pub(crate) const ITEM_ID_PREFIX: &str = "item-";

const STACK_SIZE: u64 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChecklistError {
    EmptySubmission,
    TooManyEntries { count: usize },
}

impl fmt::Display for ChecklistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecklistError::EmptySubmission => write!(f, "You did not provide any entries!"),
            ChecklistError::TooManyEntries { count } => write!(
                f,
                "a checklist holds at most {} entries, got {}",
                MAX_ENTRIES, count
            ),
        }
    }
}

impl std::error::Error for ChecklistError {}

/// One checklist line as it appears on the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) complete: bool,
}

impl Entry {
    pub(crate) fn new(position: usize, label: String) -> Self {
        Entry {
            id: item_id(position),
            label,
            complete: false,
        }
    }
}

pub(crate) fn item_id(position: usize) -> String {
    format!("{}{}", ITEM_ID_PREFIX, position)
}

pub(crate) fn is_item_id(data: &str) -> bool {
    match data.strip_prefix(ITEM_ID_PREFIX) {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Rendering tree of a checklist message. Toggles are grouped into rows
/// because the chat surface limits how many controls fit side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LayoutElement {
    Toggle(Entry),
    Group(Vec<LayoutElement>),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Checklist {
    entries: Vec<Entry>,
}

impl Checklist {
    fn from_labels(labels: &[String]) -> Self {
        let entries = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| Entry::new(idx, format_label(label)))
            .collect();
        Checklist { entries }
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn layout(&self) -> Vec<LayoutElement> {
        group_entries(&self.entries)
    }
}

pub(crate) fn clamp_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub(crate) fn format_label(raw: &str) -> String {
    let clamped = clamp_chars(raw, MAX_LABEL_CHARS);
    let mut out = String::with_capacity(clamped.len());
    let mut rest = clamped;
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        out.push_str(&compact_quantity(&tail[..end]));
        rest = &tail[end..];
    }
    out.push_str(rest);
    clamp_chars(&out, MAX_LABEL_CHARS).to_string()
}

/// Rewrites a digit run as stacks of 64. Runs worth less than one stack are
/// returned as written.
pub(crate) fn compact_quantity(digits: &str) -> String {
    let (stacks, rest) = div_rem_stack(digits);
    if stacks == "0" {
        return digits.to_string();
    }
    let plural = if stacks == "1" { "" } else { "s" };
    if rest == 0 {
        format!("({} stack{})", stacks, plural)
    } else {
        format!("({} stack{} + {})", stacks, plural, rest)
    }
}

// Long division over the decimal string, so runs of any length are exact.
fn div_rem_stack(digits: &str) -> (String, u64) {
    let mut quotient = String::with_capacity(digits.len());
    let mut rem = 0u64;
    for digit in digits.bytes() {
        let current = rem * 10 + u64::from(digit - b'0');
        let q = current / STACK_SIZE;
        rem = current % STACK_SIZE;
        if !quotient.is_empty() || q > 0 {
            quotient.push(char::from(b'0' + q as u8));
        }
    }
    if quotient.is_empty() {
        quotient.push('0');
    }
    (quotient, rem)
}

pub(crate) fn render_checklist(labels: &[String]) -> Result<Checklist, ChecklistError> {
    if labels.len() > MAX_ENTRIES {
        return Err(ChecklistError::TooManyEntries {
            count: labels.len(),
        });
    }
    Ok(Checklist::from_labels(labels))
}

pub(crate) fn paginate(entries: &[String]) -> Result<Vec<Checklist>, ChecklistError> {
    entries.chunks(MAX_ENTRIES).map(render_checklist).collect()
}

pub(crate) fn group_entries(entries: &[Entry]) -> Vec<LayoutElement> {
    entries
        .chunks(GROUP_WIDTH)
        .map(|row| {
            LayoutElement::Group(row.iter().cloned().map(LayoutElement::Toggle).collect())
        })
        .collect()
}

pub(crate) fn flatten_toggles(layout: &[LayoutElement]) -> Vec<Entry> {
    let mut entries = Vec::new();
    collect_toggles(layout, &mut entries);
    entries
}

fn collect_toggles(layout: &[LayoutElement], out: &mut Vec<Entry>) {
    for element in layout {
        match element {
            LayoutElement::Toggle(entry) => out.push(entry.clone()),
            LayoutElement::Group(children) => collect_toggles(children, out),
            LayoutElement::Other(desc) => warn!("skipping non-toggle layout element: {}", desc),
        }
    }
}

pub(crate) fn reconcile(current: &[Entry], activated: &str) -> Vec<Entry> {
    let mut matched = false;
    let next: Vec<Entry> = current
        .iter()
        .map(|entry| {
            if entry.id == activated {
                matched = true;
                Entry {
                    complete: !entry.complete,
                    ..entry.clone()
                }
            } else {
                entry.clone()
            }
        })
        .collect();
    if !matched {
        debug!("no checklist entry matches {}", activated);
    }
    next
}

pub(crate) fn reconcile_layout(layout: &[LayoutElement], activated: &str) -> Vec<Entry> {
    reconcile(&flatten_toggles(layout), activated)
}

pub(crate) fn intake_entries(
    raw: &str,
    keep_blank_lines: bool,
) -> Result<Vec<String>, ChecklistError> {
    let entries: Vec<String> = split_lines(raw)
        .into_iter()
        .map(|line| clamp_chars(line.trim(), MAX_LABEL_CHARS).to_string())
        .filter(|line| keep_blank_lines || !line.is_empty())
        .collect();
    if entries.iter().all(|entry| entry.is_empty()) {
        return Err(ChecklistError::EmptySubmission);
    }
    Ok(entries)
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}'
            | '\u{2028}' | '\u{2029}'
    )
}

/// Splits on every Unicode line boundary, `\r\n` counting as one. A trailing
/// terminator does not open an extra empty line.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..idx]);
        start = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(next_idx, '\n')) = chars.peek() {
                chars.next();
                start = next_idx + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}
