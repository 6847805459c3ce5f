//! Find what a renamed file declares at top level.
//!
//! Every top-level type, function, property binding and type alias in a file
//! whose namespace moves gets its own fully-qualified rename, so operators only
//! declare the namespace move and never have to enumerate symbols by hand.
//!
//! Scanning is line-based and regex-driven. It sits behind
//! [`DeclarationScanner`] so a parser-backed implementation can replace it
//! without touching the planner or rewriter.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::FileWarning;
use crate::mapping::PackageMismatch;
use crate::plan::{RenameRule, RuleKind};
use crate::utils::io;

/// A name declared at the top level of a file, with that file's old namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DeclaredSymbol {
    pub name: String,
    pub file_namespace: String,
}

pub trait DeclarationScanner {
    fn extract_top_level_declarations(
        &self,
        content: &str,
        namespace: &str,
    ) -> BTreeSet<DeclaredSymbol>;
}

/// Keywords and throwaway names that would over-match if turned into rules.
const EXCLUDED_NAMES: &[&str] = &[
    // hard and soft keywords
    "as", "break", "class", "continue", "do", "else", "false", "for", "fun", "if", "in",
    "interface", "is", "null", "object", "package", "return", "super", "this", "throw",
    "true", "try", "typealias", "typeof", "val", "var", "when", "while", "by", "catch",
    "constructor", "delegate", "dynamic", "field", "file", "finally", "get", "import",
    "init", "param", "property", "receiver", "set", "setparam", "value", "where",
    "companion", "data", "enum", "sealed", "inner", "open", "const",
    // loop variables and placeholders
    "_", "i", "j", "k", "n", "x", "y", "z", "it", "e", "t",
];

// Annotations, then modifier keywords, then the declaration keyword. `fun` is
// also a modifier (`fun interface`).
static DECLARATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:@[\w.]+(?:\([^)]*\))?\s+)*",
        r"(?:(?:public|private|internal|protected|open|abstract|final|sealed|data|enum|",
        r"annotation|inline|value|inner|const|lateinit|suspend|tailrec|operator|infix|",
        r"external|actual|expect|override|fun)\s+)*",
        r"(class|interface|object|fun|val|var|typealias)\s+(.*)$",
    ))
    .expect("declaration pattern is valid")
});

/// Regex scanner over unindented lines.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    excluded: HashSet<String>,
}

impl PatternScanner {
    pub fn new(extra_exclusions: &[String]) -> Self {
        let excluded = EXCLUDED_NAMES
            .iter()
            .map(|s| s.to_string())
            .chain(extra_exclusions.iter().cloned())
            .collect();
        PatternScanner { excluded }
    }
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl DeclarationScanner for PatternScanner {
    fn extract_top_level_declarations(
        &self,
        content: &str,
        namespace: &str,
    ) -> BTreeSet<DeclaredSymbol> {
        let mut symbols = BTreeSet::new();

        for line in content.lines() {
            if line.starts_with(char::is_whitespace) || is_comment(line) {
                continue;
            }

            let Some(caps) = DECLARATION_LINE.captures(line) else {
                continue;
            };

            let rest = caps.get(2).map_or("", |m| m.as_str());
            let name = match &caps[1] {
                "fun" | "val" | "var" => declared_name(rest),
                _ => take_ident(rest.trim_start()).map(|(ident, _)| ident),
            };

            if let Some(name) = name {
                if !self.excluded.contains(name) {
                    symbols.insert(DeclaredSymbol {
                        name: name.to_string(),
                        file_namespace: namespace.to_string(),
                    });
                }
            }
        }

        symbols
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with("//") || line.starts_with("/*") || line.starts_with('*')
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Split a leading identifier off `s`.
fn take_ident(s: &str) -> Option<(&str, &str)> {
    let mut end = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            is_ident_start(c)
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        None
    } else {
        Some((&s[..end], &s[end..]))
    }
}

/// Skip a balanced `<...>` group at the start of `s`.
fn skip_type_params(s: &str) -> &str {
    if !s.starts_with('<') {
        return s;
    }
    let mut depth = 0usize;
    let mut prev = None;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            // `->` in a function-type bound
            '>' if prev == Some('-') => {}
            '>' => {
                depth -= 1;
                if depth == 0 {
                    return &s[i + 1..];
                }
            }
            _ => {}
        }
        prev = Some(c);
    }
    s
}

/// Name declared by a function or property, skipping type parameters and an
/// extension receiver: `<T> List<T>.first(` declares `first`.
fn declared_name(rest: &str) -> Option<&str> {
    let mut s = skip_type_params(rest.trim_start()).trim_start();
    loop {
        let (ident, after) = take_ident(s)?;
        let after = skip_type_params(after);
        let after = after.strip_prefix('?').unwrap_or(after);
        match after.strip_prefix('.') {
            Some(next) if next.starts_with(is_ident_start) => s = next,
            _ => return Some(ident),
        }
    }
}

/// Symbols declared by one renamed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileDeclarations {
    pub file: String,
    pub old_namespace: String,
    pub new_namespace: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Derivation {
    pub rules: Vec<RenameRule>,
    pub files: Vec<FileDeclarations>,
    pub warnings: Vec<FileWarning>,
}

impl Derivation {
    pub fn symbol_count(&self) -> usize {
        self.files.iter().map(|f| f.symbols.len()).sum()
    }
}

/// Scan every mismatch file under `root` and synthesize one `Symbol` rule per
/// declared name. Unreadable files are reported and skipped.
pub fn derive_symbol_rules(
    mismatches: &[PackageMismatch],
    root: &Path,
    scanner: &dyn DeclarationScanner,
) -> Derivation {
    let mut derivation = Derivation::default();

    for mismatch in mismatches {
        let path = root.join(&mismatch.file_path);
        let content = match io::read_source(&path, &mismatch.file_path) {
            Ok(content) => content,
            Err(err) => {
                derivation
                    .warnings
                    .push(FileWarning::from_error(mismatch.file_path.clone(), &err));
                continue;
            }
        };

        let declared = scanner.extract_top_level_declarations(&content, &mismatch.old_namespace);

        for symbol in &declared {
            let old = format!("{}.{}", mismatch.old_namespace, symbol.name);
            let new = format!("{}.{}", mismatch.new_namespace, symbol.name);
            if let Some(rule) = RenameRule::new(&old, &new, RuleKind::Symbol) {
                derivation.rules.push(rule);
            }
        }

        derivation.files.push(FileDeclarations {
            file: mismatch.file_path.clone(),
            old_namespace: mismatch.old_namespace.clone(),
            new_namespace: mismatch.new_namespace.clone(),
            symbols: declared.into_iter().map(|s| s.name).collect(),
        });
    }

    crate::log_status!(
        "derive",
        "{} symbol(s) across {} file(s), {} unreadable",
        derivation.symbol_count(),
        derivation.files.len(),
        derivation.warnings.len()
    );

    derivation
}
