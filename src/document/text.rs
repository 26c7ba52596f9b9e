//! Line based model of a hand written collector configuration.
//!
//! The document is parsed once into sections (top-level keys) holding ordered entries: named
//! blocks, or raw lines such as blank separators and comments. Mutations edit that tree and
//! [Display] writes it back, so every line the engine does not own is reproduced byte for byte.
//!
//! A block spans its header line plus every following line that is blank or more indented than
//! the header. Trailing blank lines are not part of the block: they stay in the section as raw
//! entries, so removing a block keeps the separators around it.
use super::{DocumentError, DocumentStore, PIPELINES_ANCHOR, Section};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::ops::Range;

const DEFAULT_INDENT: usize = 2;
const SERVICE_SECTION: &str = "service";
const PIPELINES_KEY: &str = "pipelines";
const RECEIVERS_KEY: &str = "receivers";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextDocument {
    preamble: Vec<String>,
    sections: Vec<TextSection>,
    trailing_newline: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct TextSection {
    name: String,
    header: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Block(Block),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    name: String,
    lines: Vec<String>,
}

impl TextDocument {
    pub fn parse(text: &str) -> Self {
        let trailing_newline = text.ends_with('\n');
        let lines: Vec<String> = if text.is_empty() {
            Vec::new()
        } else {
            text.strip_suffix('\n')
                .unwrap_or(text)
                .split('\n')
                .map(str::to_string)
                .collect()
        };

        let mut lines = lines.into_iter().peekable();
        let mut preamble = Vec::new();
        while let Some(line) = lines.next_if(|line| !is_section_header(line)) {
            preamble.push(line);
        }

        let mut sections = Vec::new();
        while let Some(header) = lines.next() {
            let mut body = Vec::new();
            while let Some(line) = lines.next_if(|line| !is_section_header(line)) {
                body.push(line);
            }
            sections.push(TextSection::parse(header, body));
        }

        Self {
            preamble,
            sections,
            trailing_newline,
        }
    }

    fn section(&self, name: &str) -> Option<&TextSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn section_mut(&mut self, name: &str) -> Option<&mut TextSection> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    fn pipelines_block(&self) -> Option<&Block> {
        self.section(SERVICE_SECTION)?.block(PIPELINES_KEY)
    }

    fn pipelines_block_mut(&mut self) -> Option<&mut Block> {
        self.section_mut(SERVICE_SECTION)?.block_mut(PIPELINES_KEY)
    }
}

impl Display for TextDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut lines: Vec<&str> = self.preamble.iter().map(String::as_str).collect();
        for section in &self.sections {
            lines.push(&section.header);
            for entry in &section.entries {
                match entry {
                    Entry::Block(block) => lines.extend(block.lines.iter().map(String::as_str)),
                    Entry::Raw(line) => lines.push(line),
                }
            }
        }
        write!(f, "{}", lines.join("\n"))?;
        if self.trailing_newline {
            writeln!(f)?;
        }
        Ok(())
    }
}

impl From<&str> for TextDocument {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl TextSection {
    fn parse(header: String, body: Vec<String>) -> Self {
        let name = key_of(&header)
            .map(|(key, _)| key.to_string())
            .unwrap_or_else(|| header.trim().to_string());
        let child_indent = body.iter().find(|l| is_content(l)).map(|l| indent_of(l));

        let mut entries = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let line = &body[i];
            if child_indent.is_some_and(|indent| indent > 0 && indent_of(line) == indent)
                && is_content(line)
            {
                if let Some((key, _)) = key_of(line) {
                    let end = block_end(&body, i, indent_of(line));
                    entries.push(Entry::Block(Block {
                        name: key.to_string(),
                        lines: body[i..end].to_vec(),
                    }));
                    i = end;
                    continue;
                }
            }
            entries.push(Entry::Raw(line.clone()));
            i += 1;
        }

        Self {
            name,
            header,
            entries,
        }
    }

    fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Block(block) => Some(block),
            Entry::Raw(_) => None,
        })
    }

    fn block(&self, name: &str) -> Option<&Block> {
        self.blocks().find(|b| b.name == name)
    }

    fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        self.entries.iter_mut().find_map(|e| match e {
            Entry::Block(block) if block.name == name => Some(block),
            _ => None,
        })
    }

    fn child_indent(&self) -> usize {
        self.blocks()
            .next()
            .and_then(|b| b.lines.first())
            .map(|l| indent_of(l))
            .unwrap_or(DEFAULT_INDENT)
    }

    /// Inserts `block` after the last block, ahead of any trailing blank lines.
    fn push_block(&mut self, block: Block) {
        if key_of(&self.header).is_some_and(|(_, value)| value == "{}") {
            self.header = format!("{}:", self.name);
        }

        let position = match self
            .entries
            .iter()
            .rposition(|e| matches!(e, Entry::Block(_)))
        {
            Some(last_block) => last_block + 1,
            None => {
                let trailing_blanks = self
                    .entries
                    .iter()
                    .rev()
                    .take_while(|e| matches!(e, Entry::Raw(line) if is_blank(line)))
                    .count();
                self.entries.len() - trailing_blanks
            }
        };
        self.entries.insert(position, Entry::Block(block));
    }

    fn remove_block(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e, Entry::Block(block) if block.name == name));
        before != self.entries.len()
    }
}

impl DocumentStore for TextDocument {
    fn check_anchors(&self, sections: &[Section]) -> Result<(), DocumentError> {
        if let Some(missing) = sections.iter().find(|s| self.section(s.key()).is_none()) {
            return Err(DocumentError::MissingAnchor(format!("{}:", missing.key())));
        }
        if self.pipelines_block().is_none() {
            return Err(DocumentError::MissingAnchor(PIPELINES_ANCHOR.to_string()));
        }
        Ok(())
    }

    fn list_blocks(&self, section: Section) -> Vec<String> {
        self.section(section.key())
            .map(|s| s.blocks().map(|b| b.name.clone()).collect())
            .unwrap_or_default()
    }

    fn insert_block(
        &mut self,
        section: Section,
        name: &str,
        spec: &Value,
    ) -> Result<(), DocumentError> {
        let text_section = self
            .section_mut(section.key())
            .ok_or_else(|| DocumentError::MissingAnchor(format!("{}:", section.key())))?;
        let block = render_block(name, spec, text_section.child_indent())?;
        text_section.push_block(block);
        Ok(())
    }

    fn remove_block(&mut self, section: Section, name: &str) -> bool {
        self.section_mut(section.key())
            .is_some_and(|s| s.remove_block(name))
    }

    fn pipeline_names(&self) -> Vec<String> {
        let Some(block) = self.pipelines_block() else {
            return Vec::new();
        };
        pipeline_ranges(&block.lines)
            .into_iter()
            .filter(|p| receivers_of(&block.lines, p).is_some())
            .map(|p| p.name)
            .collect()
    }

    fn pipeline_refs(&self, pipeline: &str) -> Option<Vec<String>> {
        let lines = &self.pipelines_block()?.lines;
        let range = pipeline_ranges(lines)
            .into_iter()
            .find(|p| p.name == pipeline)?;
        receivers_of(lines, &range).map(|receivers| receivers.list.values())
    }

    fn set_pipeline_refs(&mut self, pipeline: &str, refs: &[String]) {
        let Some(block) = self.pipelines_block_mut() else {
            return;
        };
        let Some(receivers) = pipeline_ranges(&block.lines)
            .into_iter()
            .find(|p| p.name == pipeline)
            .and_then(|range| receivers_of(&block.lines, &range))
        else {
            return;
        };
        block.lines.splice(receivers.lines, receivers.list.render(refs));
    }

    fn unreadable_references(&self, reference: &str) -> Vec<String> {
        let Some(block) = self.pipelines_block() else {
            return Vec::new();
        };
        let lines = &block.lines;
        let pipelines = pipeline_ranges(lines);
        let editable: Vec<Range<usize>> = pipelines
            .iter()
            .filter_map(|p| receivers_of(lines, p))
            .map(|receivers| receivers.lines)
            .collect();

        let mut anchors: Vec<String> = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if !mentions(line, reference) || editable.iter().any(|r| r.contains(&i)) {
                continue;
            }
            let anchor = pipelines
                .iter()
                .find(|p| (p.start..p.end).contains(&i))
                .map_or(PIPELINES_ANCHOR.to_string(), |p| {
                    format!("{PIPELINES_ANCHOR}.{}", p.name)
                });
            if !anchors.contains(&anchor) {
                anchors.push(anchor);
            }
        }
        anchors
    }
}

/// A key among the children of a mapping line and the lines it spans.
#[derive(Debug)]
struct KeyRange {
    name: String,
    inline: bool,
    start: usize,
    end: usize,
}

fn pipeline_ranges(lines: &[String]) -> Vec<KeyRange> {
    if lines.is_empty() {
        return Vec::new();
    }
    child_keys(lines, 0, lines.len())
}

/// A pipeline's receivers list and the lines rewriting it replaces.
#[derive(Debug)]
struct Receivers {
    lines: Range<usize>,
    list: ReceiverList,
}

/// Locates the receivers of a pipeline written as a nested mapping or as a single line flow
/// mapping (`logs: {receivers: [otlp], exporters: [loki]}`). `None` when they cannot be edited.
fn receivers_of(lines: &[String], pipeline: &KeyRange) -> Option<Receivers> {
    if pipeline.inline {
        if pipeline.end != pipeline.start + 1 {
            return None;
        }
        return ReceiverList::in_flow_mapping(&lines[pipeline.start]).map(|list| Receivers {
            lines: pipeline.start..pipeline.end,
            list,
        });
    }

    let receivers = match receivers_range(lines, pipeline) {
        Some(receivers) => Receivers {
            lines: receivers.start..receivers.end,
            list: ReceiverList::parse(lines, &receivers),
        },
        None => {
            let indent = lines[pipeline.start + 1..pipeline.end]
                .iter()
                .find(|l| is_content(l))
                .map(|l| indent_of(l))
                .unwrap_or(indent_of(&lines[pipeline.start]) + DEFAULT_INDENT);
            Receivers {
                lines: pipeline.start + 1..pipeline.start + 1,
                list: ReceiverList::empty_flow(
                    format!("{}{RECEIVERS_KEY}: ", " ".repeat(indent)),
                    String::new(),
                ),
            }
        }
    };
    Some(receivers)
}

fn receivers_range(lines: &[String], pipeline: &KeyRange) -> Option<KeyRange> {
    child_keys(lines, pipeline.start, pipeline.end)
        .into_iter()
        .find(|k| k.name == RECEIVERS_KEY)
}

fn child_keys(lines: &[String], parent: usize, end: usize) -> Vec<KeyRange> {
    let parent_indent = indent_of(&lines[parent]);
    let Some(child_indent) = lines[parent + 1..end]
        .iter()
        .find(|l| is_content(l))
        .map(|l| indent_of(l))
        .filter(|indent| *indent > parent_indent)
    else {
        return Vec::new();
    };

    let mut keys = Vec::new();
    let mut i = parent + 1;
    while i < end {
        let line = &lines[i];
        if is_content(line) && indent_of(line) == child_indent {
            if let Some((key, value)) = key_of(line) {
                let key_end = block_end(&lines[..end], i, child_indent);
                keys.push(KeyRange {
                    name: key.to_string(),
                    inline: !value.is_empty(),
                    start: i,
                    end: key_end,
                });
                i = key_end;
                continue;
            }
        }
        i += 1;
    }
    keys
}

/// End (exclusive) of the block whose header is `lines[start]`, indented by `indent`.
///
/// Blank lines only belong to the block when more indented content follows them. Sequence items
/// at the header's own indentation (`key:` followed by `- item`) are part of the block.
fn block_end(lines: &[String], start: usize, indent: usize) -> usize {
    let mut last = start;
    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if is_blank(line) {
            continue;
        }
        let line_indent = indent_of(line);
        if line_indent > indent || (line_indent == indent && line.trim_start().starts_with('-')) {
            last = start + 1 + offset;
        } else {
            break;
        }
    }
    last + 1
}

fn render_block(name: &str, spec: &Value, indent: usize) -> Result<Block, DocumentError> {
    let pad = " ".repeat(indent);
    let lines = match spec {
        Value::Null => vec![format!("{pad}{name}:")],
        Value::Object(map) if map.is_empty() => vec![format!("{pad}{name}: {{}}")],
        _ => {
            let yaml = serde_yaml::to_string(spec).map_err(|err| DocumentError::Render {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
            let body_pad = " ".repeat(indent + DEFAULT_INDENT);
            std::iter::once(format!("{pad}{name}:"))
                .chain(yaml.lines().map(|line| {
                    if line.is_empty() {
                        String::new()
                    } else {
                        format!("{body_pad}{line}")
                    }
                }))
                .collect()
        }
    };

    Ok(Block {
        name: name.to_string(),
        lines,
    })
}

#[derive(Debug)]
enum ListStyle {
    Flow { prefix: String, suffix: String },
    Block { key_line: String, item_indent: usize },
}

#[derive(Debug)]
struct Token {
    raw: String,
    value: String,
}

impl Token {
    fn new(raw: &str) -> Self {
        let value = raw.split(" #").next().unwrap_or_default().trim();
        Self {
            raw: raw.trim().to_string(),
            value: unquote(value).to_string(),
        }
    }
}

/// A pipeline's `receivers` entry, either `receivers: [a, b]` or a block sequence.
#[derive(Debug)]
struct ReceiverList {
    style: ListStyle,
    tokens: Vec<Token>,
}

impl ReceiverList {
    fn parse(lines: &[String], range: &KeyRange) -> Self {
        let line = &lines[range.start];
        let value = key_of(line).map(|(_, value)| value).unwrap_or_default();

        if value.is_empty() {
            let items: Vec<&String> = lines[range.start + 1..range.end]
                .iter()
                .filter(|l| l.trim_start().starts_with('-'))
                .collect();
            let item_indent = items
                .first()
                .map(|l| indent_of(l))
                .unwrap_or(indent_of(line) + DEFAULT_INDENT);
            let tokens = items
                .iter()
                .map(|l| Token::new(&l.trim_start()[1..]))
                .filter(|t| !t.value.is_empty())
                .collect();
            return Self {
                style: ListStyle::Block {
                    key_line: line.clone(),
                    item_indent,
                },
                tokens,
            };
        }

        let open = line.find('[');
        let close = open.and_then(|open| line[open..].find(']').map(|close| open + close));
        match (open, close) {
            (Some(open), Some(close)) => Self::flow(line, open, close),
            // A single scalar reference, rewritten as a flow sequence.
            _ => {
                let (scalar, comment) = value.find(" #").map_or((value, ""), |i| value.split_at(i));
                Self {
                    style: ListStyle::Flow {
                        prefix: format!("{}{RECEIVERS_KEY}: ", " ".repeat(indent_of(line))),
                        suffix: comment.to_string(),
                    },
                    tokens: vec![Token::new(scalar)],
                }
            }
        }
    }

    /// The list between the brackets at `open` and `close` of `line`.
    fn flow(line: &str, open: usize, close: usize) -> Self {
        Self {
            style: ListStyle::Flow {
                prefix: line[..open].to_string(),
                suffix: line[close + 1..].to_string(),
            },
            tokens: line[open + 1..close]
                .split(',')
                .map(Token::new)
                .filter(|t| !t.value.is_empty())
                .collect(),
        }
    }

    fn empty_flow(prefix: String, suffix: String) -> Self {
        Self {
            style: ListStyle::Flow { prefix, suffix },
            tokens: Vec::new(),
        }
    }

    /// The `receivers` entry of a pipeline written as `name: {..}` on a single line. A missing
    /// entry is rendered first in the mapping. Lists that are not flow sequences are not editable.
    fn in_flow_mapping(line: &str) -> Option<Self> {
        let (_, value) = key_of(line)?;
        if !value.starts_with('{') {
            return None;
        }
        let brace = line.find('{')?;
        match flow_key_end(line, brace, RECEIVERS_KEY)? {
            FlowKey::Absent => {
                let rest = &line[brace + 1..];
                let suffix = if rest.trim_start().starts_with('}') {
                    rest.to_string()
                } else {
                    format!(", {}", rest.trim_start())
                };
                Some(Self::empty_flow(
                    format!("{}{RECEIVERS_KEY}: ", &line[..=brace]),
                    suffix,
                ))
            }
            FlowKey::At(after_colon) => {
                let value = &line[after_colon..];
                let open = after_colon + (value.len() - value.trim_start().len());
                if !line[open..].starts_with('[') {
                    return None;
                }
                let close = open + line[open..].find(']')?;
                Some(Self::flow(line, open, close))
            }
        }
    }

    fn values(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.value.clone()).collect()
    }

    /// Renders `refs` in the list's own style, reusing the original spelling of kept references.
    fn render(&self, refs: &[String]) -> Vec<String> {
        let tokens: Vec<&str> = refs
            .iter()
            .map(|r| {
                self.tokens
                    .iter()
                    .find(|t| &t.value == r)
                    .map_or(r.as_str(), |t| t.raw.as_str())
            })
            .collect();

        match &self.style {
            ListStyle::Flow { prefix, suffix } => {
                vec![format!("{prefix}[{}]{suffix}", tokens.join(", "))]
            }
            ListStyle::Block { key_line, .. } if tokens.is_empty() => {
                vec![format!("{}{RECEIVERS_KEY}: []", " ".repeat(indent_of(key_line)))]
            }
            ListStyle::Block {
                key_line,
                item_indent,
            } => std::iter::once(key_line.clone())
                .chain(
                    tokens
                        .iter()
                        .map(|t| format!("{}- {t}", " ".repeat(*item_indent))),
                )
                .collect(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum FlowKey {
    Absent,
    /// Byte offset right after the key's colon.
    At(usize),
}

/// Looks `key` up among the top level entries of the flow mapping opened at `brace`. `None`
/// when the mapping is not closed on this line.
fn flow_key_end(line: &str, brace: usize, key: &str) -> Option<FlowKey> {
    let mut depth = 0usize;
    let mut entry_start = brace + 1;
    let mut key_seen = false;
    for (i, c) in line.char_indices().skip_while(|(i, _)| *i <= brace) {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' if depth == 0 => return Some(FlowKey::Absent),
            ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                entry_start = i + 1;
                key_seen = false;
            }
            ':' if depth == 0 && !key_seen => {
                if unquote(line[entry_start..i].trim()) == key {
                    return Some(FlowKey::At(i + 1));
                }
                key_seen = true;
            }
            _ => {}
        }
    }
    None
}

/// Whether `reference` appears as a whole word outside of comments.
fn mentions(line: &str, reference: &str) -> bool {
    if is_comment(line) {
        return false;
    }
    line.split(" #")
        .next()
        .unwrap_or_default()
        .split(|c: char| c.is_whitespace() || ",[]{}:\"'".contains(c))
        .any(|word| word == reference)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_content(line: &str) -> bool {
    !is_blank(line) && !is_comment(line)
}

fn is_section_header(line: &str) -> bool {
    indent_of(line) == 0 && is_content(line)
}

/// Splits a `key:` or `key: value` line. Sequence items are not keys.
fn key_of(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.starts_with('-') {
        return None;
    }
    let (key, value) = match trimmed.split_once(": ") {
        Some((key, value)) => (key, value.trim()),
        None => (trimmed.strip_suffix(':')?, ""),
    };
    let value = if value.starts_with('#') { "" } else { value };
    Some((unquote(key.trim()), value))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const BASE: &str = r#"# shared collector configuration
receivers:
  otlp:
    protocols:
      grpc:
        endpoint: 0.0.0.0:4317

processors:
  batch: {}
  memory_limiter:
    limit_mib: 512

exporters:
  loki:
    endpoint: http://loki:3100

service:
  pipelines:
    logs:
      receivers: [otlp]
      processors: [memory_limiter, batch]
      exporters: [loki]
"#;

    fn refs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_and_render_is_identity() {
        for text in [BASE, "", "\n", "receivers:", "a: 1\n\n\nb:\n  c: 2\n  # note\n"] {
            assert_eq!(TextDocument::parse(text).to_string(), text);
        }
    }

    #[test]
    fn test_list_blocks() {
        let doc = TextDocument::parse(BASE);
        assert_eq!(doc.list_blocks(Section::Receivers), vec!["otlp"]);
        assert_eq!(doc.list_blocks(Section::Processors), vec!["batch", "memory_limiter"]);
        assert_eq!(doc.list_blocks(Section::Exporters), vec!["loki"]);
        assert!(doc.has_block(Section::Exporters, "loki"));
        assert!(!doc.has_block(Section::Exporters, "otlp"));
    }

    #[test]
    fn test_check_anchors() {
        let doc = TextDocument::parse(BASE);
        assert!(doc.check_anchors(&[Section::Receivers, Section::Processors]).is_ok());

        let doc = TextDocument::parse("receivers:\n  otlp: {}\nservice:\n  pipelines:\n    logs: {}\n");
        assert_eq!(
            doc.check_anchors(&[Section::Receivers, Section::Processors]),
            Err(DocumentError::MissingAnchor("processors:".to_string()))
        );

        let doc = TextDocument::parse("receivers:\nprocessors:\nservice:\n  telemetry: {}\n");
        assert_eq!(
            doc.check_anchors(&[Section::Receivers]),
            Err(DocumentError::MissingAnchor("service.pipelines".to_string()))
        );
    }

    #[test]
    fn test_insert_block_goes_after_last_block() {
        let mut doc = TextDocument::parse(BASE);
        doc.insert_block(
            Section::Receivers,
            "filelog/a",
            &json!({"include": ["/var/log/a.log"], "start_at": "end"}),
        )
        .unwrap();
        doc.insert_block(Section::Receivers, "filelog/b", &json!({"start_at": "end"}))
            .unwrap();

        assert_eq!(doc.list_blocks(Section::Receivers), vec!["otlp", "filelog/a", "filelog/b"]);
        let rendered = doc.to_string();
        assert!(rendered.contains(
            "        endpoint: 0.0.0.0:4317\n  filelog/a:\n    include:\n    - /var/log/a.log\n    start_at: end\n  filelog/b:\n    start_at: end\n\nprocessors:"
        ));
    }

    #[test]
    fn test_insert_block_into_empty_sections() {
        let mut doc = TextDocument::parse("receivers: {}\n\nprocessors:\n\nservice:\n");
        doc.insert_block(Section::Receivers, "filelog/a", &json!({"start_at": "end"}))
            .unwrap();
        doc.insert_block(Section::Processors, "batch", &json!({})).unwrap();

        assert_eq!(
            doc.to_string(),
            "receivers:\n  filelog/a:\n    start_at: end\n\nprocessors:\n  batch: {}\n\nservice:\n"
        );
    }

    #[test]
    fn test_insert_block_in_missing_section() {
        let mut doc = TextDocument::parse("receivers:\n  otlp: {}\n");
        assert_eq!(
            doc.insert_block(Section::Processors, "batch", &json!({})),
            Err(DocumentError::MissingAnchor("processors:".to_string()))
        );
    }

    #[test]
    fn test_remove_block_with_nested_keys_and_interior_blank_line() {
        let text = r#"receivers:
  otlp:
    protocols: {}
  filelog/checkout:
    include:
      - /var/log/pods/prod_checkout_*/*/*.log

    operators:
      - type: move
        from: a

        to: b
  filelog/cart:
    include:
      - /var/log/pods/prod_cart_*/*/*.log
processors:
  batch: {}
"#;
        let mut doc = TextDocument::parse(text);
        assert!(doc.remove_block(Section::Receivers, "filelog/checkout"));

        assert_eq!(
            doc.to_string(),
            r#"receivers:
  otlp:
    protocols: {}
  filelog/cart:
    include:
      - /var/log/pods/prod_cart_*/*/*.log
processors:
  batch: {}
"#
        );
    }

    #[test]
    fn test_remove_block_keeps_separators_and_comments() {
        let text = "receivers:\n  otlp: {}\n  # per service receivers\n  filelog/a:\n    start_at: end\n\n\nprocessors:\n  batch: {}\n";
        let mut doc = TextDocument::parse(text);

        assert!(doc.remove_block(Section::Receivers, "filelog/a"));
        assert_eq!(
            doc.to_string(),
            "receivers:\n  otlp: {}\n  # per service receivers\n\n\nprocessors:\n  batch: {}\n"
        );
        assert!(!doc.remove_block(Section::Receivers, "filelog/a"));
        assert!(!doc.remove_block(Section::Exporters, "filelog/a"));
    }

    #[test]
    fn test_remove_block_matches_exact_names_only() {
        let text = "receivers:\n  filelog/check:\n    a: 1\n  filelog/checkout:\n    a: 2\n";
        let mut doc = TextDocument::parse(text);

        assert!(doc.remove_block(Section::Receivers, "filelog/check"));
        assert_eq!(doc.to_string(), "receivers:\n  filelog/checkout:\n    a: 2\n");
    }

    #[test]
    fn test_pipeline_names_and_refs() {
        let text = r#"service:
  extensions: [health_check]
  pipelines:
    logs:
      receivers: [otlp, "filelog/a"]
    logs/block:
      receivers:
        - otlp
        - filelog/b # added by hand
    logs/inline: {receivers: [otlp]}
    metrics:
      exporters: [prometheus]
"#;
        let doc = TextDocument::parse(text);

        assert_eq!(
            doc.pipeline_names(),
            vec!["logs", "logs/block", "logs/inline", "metrics"]
        );
        assert_eq!(doc.pipeline_refs("logs"), Some(refs(&["otlp", "filelog/a"])));
        assert_eq!(doc.pipeline_refs("logs/block"), Some(refs(&["otlp", "filelog/b"])));
        assert_eq!(doc.pipeline_refs("logs/inline"), Some(refs(&["otlp"])));
        assert_eq!(doc.pipeline_refs("metrics"), Some(vec![]));
        assert_eq!(doc.pipeline_refs("traces"), None);
    }

    #[rstest]
    #[case::remove_last(
        "    logs/audit: {receivers: [otlp, filelog/a], exporters: [loki]}",
        &["otlp"],
        "    logs/audit: {receivers: [otlp], exporters: [loki]}"
    )]
    #[case::remove_sole(
        "    logs/audit: {exporters: [loki], receivers: [filelog/a]} # audit",
        &[],
        "    logs/audit: {exporters: [loki], receivers: []} # audit"
    )]
    #[case::add_to_existing(
        "    logs/audit: { receivers: [otlp], exporters: [loki] }",
        &["otlp", "filelog/a"],
        "    logs/audit: { receivers: [otlp, filelog/a], exporters: [loki] }"
    )]
    #[case::add_missing_key(
        "    logs/audit: {exporters: [loki]}",
        &["filelog/a"],
        "    logs/audit: {receivers: [filelog/a], exporters: [loki]}"
    )]
    #[case::add_to_empty_mapping(
        "    logs/audit: {}",
        &["filelog/a"],
        "    logs/audit: {receivers: [filelog/a]}"
    )]
    fn test_set_pipeline_refs_flow_mapping(
        #[case] pipeline: &str,
        #[case] new_refs: &[&str],
        #[case] expected: &str,
    ) {
        let text = format!("service:\n  pipelines:\n{pipeline}\n    logs:\n      receivers: [otlp]\n");
        let mut doc = TextDocument::parse(&text);

        doc.set_pipeline_refs("logs/audit", &refs(new_refs));
        assert_eq!(
            doc.to_string(),
            format!("service:\n  pipelines:\n{expected}\n    logs:\n      receivers: [otlp]\n")
        );
        assert_eq!(doc.pipeline_refs("logs/audit"), Some(refs(new_refs)));
    }

    #[test]
    fn test_unreadable_references() {
        let text = r#"service:
  pipelines:
    logs/multiline: {receivers: [otlp,
        filelog/a], exporters: [loki]}
    logs/scalar: {receivers: filelog/a}
    logs/editable: {receivers: [filelog/a]}
    logs:
      # filelog/a was here
      receivers: [filelog/a, filelog/ab]
"#;
        let doc = TextDocument::parse(text);

        assert_eq!(doc.pipeline_names(), vec!["logs/editable", "logs"]);
        assert_eq!(
            doc.unreadable_references("filelog/a"),
            vec![
                "service.pipelines.logs/multiline",
                "service.pipelines.logs/scalar"
            ]
        );
        assert!(doc.unreadable_references("filelog/ab").is_empty());
        assert!(TextDocument::parse(BASE).unreadable_references("otlp").is_empty());
    }

    #[test]
    fn test_set_pipeline_refs_scalar_with_comment() {
        let text = "service:\n  pipelines:\n    logs:\n      receivers: otlp # shared\n";
        let mut doc = TextDocument::parse(text);
        assert_eq!(doc.pipeline_refs("logs"), Some(refs(&["otlp"])));

        doc.set_pipeline_refs("logs", &refs(&["otlp", "filelog/a"]));
        assert_eq!(
            doc.to_string(),
            "service:\n  pipelines:\n    logs:\n      receivers: [otlp, filelog/a] # shared\n"
        );
        assert_eq!(
            TextDocument::parse(&doc.to_string()).pipeline_refs("logs"),
            Some(refs(&["otlp", "filelog/a"]))
        );
    }

    #[rstest]
    #[case::last_element("      receivers: [otlp, filelog/a]", "      receivers: [otlp]")]
    #[case::first_element("      receivers: [filelog/a, otlp]", "      receivers: [otlp]")]
    #[case::middle_element("      receivers: [otlp, filelog/a, x]", "      receivers: [otlp, x]")]
    #[case::sole_element("      receivers: [filelog/a]", "      receivers: []")]
    #[case::keeps_comment("      receivers: [filelog/a, otlp] # shared", "      receivers: [otlp] # shared")]
    fn test_set_pipeline_refs_flow_style(#[case] receivers: &str, #[case] expected: &str) {
        let text = format!("service:\n  pipelines:\n    logs:\n{receivers}\n      exporters: [loki]\n");
        let mut doc = TextDocument::parse(&text);

        let remaining: Vec<String> = doc
            .pipeline_refs("logs")
            .unwrap()
            .into_iter()
            .filter(|r| r != "filelog/a")
            .collect();
        doc.set_pipeline_refs("logs", &remaining);

        assert_eq!(
            doc.to_string(),
            format!("service:\n  pipelines:\n    logs:\n{expected}\n      exporters: [loki]\n")
        );
    }

    #[test]
    fn test_set_pipeline_refs_block_style() {
        let text = "service:\n  pipelines:\n    logs:\n      receivers:\n      - otlp\n      - 'filelog/a'\n      exporters: [loki]\n";
        let mut doc = TextDocument::parse(text);

        doc.set_pipeline_refs("logs", &refs(&["otlp", "filelog/a", "filelog/b"]));
        assert_eq!(
            doc.to_string(),
            "service:\n  pipelines:\n    logs:\n      receivers:\n      - otlp\n      - 'filelog/a'\n      - filelog/b\n      exporters: [loki]\n"
        );

        doc.set_pipeline_refs("logs", &[]);
        assert_eq!(
            doc.to_string(),
            "service:\n  pipelines:\n    logs:\n      receivers: []\n      exporters: [loki]\n"
        );
    }

    #[test]
    fn test_set_pipeline_refs_adds_missing_receivers_key() {
        let text = "service:\n  pipelines:\n    logs:\n      exporters: [loki]\n";
        let mut doc = TextDocument::parse(text);

        doc.set_pipeline_refs("logs", &refs(&["filelog/a"]));
        assert_eq!(
            doc.to_string(),
            "service:\n  pipelines:\n    logs:\n      receivers: [filelog/a]\n      exporters: [loki]\n"
        );
    }

    #[test]
    fn test_set_pipeline_refs_unknown_pipeline_is_ignored() {
        let mut doc = TextDocument::parse(BASE);
        doc.set_pipeline_refs("traces", &refs(&["otlp"]));
        assert_eq!(doc.to_string(), BASE);
    }
}
