//! Apply an ordered rule set to one file's text.
//!
//! All edits are located against the original content, then applied from the
//! end of the file backwards:
//! 1. the namespace declaration of a file whose namespace moves (claimed first),
//! 2. each rule in `RuleSet` order: explicit imports, wildcard imports and every
//!    other boundary-safe reference.
//!
//! A byte range claimed by an earlier edit is never matched again, so a shorter
//! rule cannot rewrite part of a longer name and replacement text is never
//! rescanned.

use serde::Serialize;

use crate::mapping::PackageMismatch;
use crate::plan::{RenameRule, RuleKind, RuleSet};

pub const DEFAULT_DECLARATION_KEYWORD: &str = "package";

const IMPORT_PREFIX: &str = "import ";
const WILDCARD_SUFFIX: &str = ".*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Declaration,
    Import,
    WildcardImport,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
    kind: EditKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub declaration: bool,
    pub imports: usize,
    pub wildcard_imports: usize,
    pub references: usize,
}

impl RewriteStats {
    pub fn replacements(&self) -> usize {
        usize::from(self.declaration) + self.imports + self.wildcard_imports + self.references
    }

    fn record(&mut self, kind: EditKind) {
        match kind {
            EditKind::Declaration => self.declaration = true,
            EditKind::Import => self.imports += 1,
            EditKind::WildcardImport => self.wildcard_imports += 1,
            EditKind::Reference => self.references += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    pub changed: bool,
    pub stats: RewriteStats,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Locate `<keyword> <namespace>` at the start of a line, namespace token exact.
/// Returns the byte range of the namespace token in the first matching line.
pub fn find_namespace_declaration(
    content: &str,
    keyword: &str,
    namespace: &str,
) -> Option<(usize, usize)> {
    if keyword.is_empty() || namespace.is_empty() {
        return None;
    }

    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if let Some(after_keyword) = line.strip_prefix(keyword) {
            let token = after_keyword.trim_start_matches([' ', '\t']);
            let gap = after_keyword.len() - token.len();
            if gap > 0 && token.starts_with(namespace) {
                let exact = token[namespace.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !is_ident_char(c) && c != '.');
                if exact {
                    let start = offset + keyword.len() + gap;
                    return Some((start, start + namespace.len()));
                }
            }
        }
        offset += line.len();
    }

    None
}

fn overlaps(claimed: &[Edit], start: usize, end: usize) -> bool {
    claimed.iter().any(|e| start < e.end && end > e.start)
}

/// Classify an occurrence of `rule.old` at `start`, or `None` when it sits
/// inside a larger identifier or dotted path.
fn classify(content: &str, start: usize, rule: &RenameRule) -> Option<EditKind> {
    let end = start + rule.old.len();
    let before = &content[..start];
    let after = &content[end..];

    let left_ok = before
        .chars()
        .next_back()
        .map_or(true, |c| !is_ident_char(c) && c != '.');
    if !left_ok {
        return None;
    }

    let imported = before.ends_with(IMPORT_PREFIX);

    if imported && after.starts_with(WILDCARD_SUFFIX) {
        return Some(EditKind::WildcardImport);
    }

    let right_ok = after.chars().next().map_or(true, |c| {
        !is_ident_char(c) && (rule.kind == RuleKind::Symbol || c != '.')
    });
    if !right_ok {
        return None;
    }

    if imported {
        Some(EditKind::Import)
    } else {
        Some(EditKind::Reference)
    }
}

/// Every match start of `term` in `text`, overlapping occurrences included.
fn occurrences(text: &str, term: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    if term.is_empty() || term.len() > text.len() {
        return positions;
    }

    let mut from = 0;
    while let Some(pos) = text[from..].find(term) {
        let abs = from + pos;
        positions.push(abs);
        from = abs + text[abs..].chars().next().map_or(1, char::len_utf8);
    }

    positions
}

/// Rewrite one file.
///
/// `mismatch` is the namespace move declared for this file, if any. Returns the
/// new content and whether it differs from the input.
pub fn rewrite(
    content: &str,
    mismatch: Option<&PackageMismatch>,
    rules: &RuleSet,
    declaration_keyword: &str,
) -> Rewrite {
    let mut edits: Vec<Edit> = Vec::new();

    if let Some(mismatch) = mismatch {
        if let Some((start, end)) =
            find_namespace_declaration(content, declaration_keyword, &mismatch.old_namespace)
        {
            edits.push(Edit {
                start,
                end,
                replacement: mismatch.new_namespace.clone(),
                kind: EditKind::Declaration,
            });
        }
    }

    for rule in rules.iter() {
        for start in occurrences(content, &rule.old) {
            let end = start + rule.old.len();
            if overlaps(&edits, start, end) {
                continue;
            }
            if let Some(kind) = classify(content, start, rule) {
                edits.push(Edit {
                    start,
                    end,
                    replacement: rule.new.clone(),
                    kind,
                });
            }
        }
    }

    let mut stats = RewriteStats::default();
    if edits.is_empty() {
        return Rewrite {
            content: content.to_string(),
            changed: false,
            stats,
        };
    }

    edits.sort_by(|a, b| b.start.cmp(&a.start));

    let mut new_content = content.to_string();
    for edit in &edits {
        new_content.replace_range(edit.start..edit.end, &edit.replacement);
        stats.record(edit.kind);
    }

    let changed = new_content != content;

    Rewrite {
        content: new_content,
        changed,
        stats,
    }
}
