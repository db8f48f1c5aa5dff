//! Denylist sanitizer for user-authored LaTeX.
//!
//! Best effort only. The render step never grants shell escape, so a
//! directive slipping past here still cannot reach the host shell.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Upper bound on strip passes. Each pass that changes the text shortens
/// it, so this only guards against pathological inputs.
const MAX_PASSES: usize = 8;

const BLOCKED_MARKER: &str = "(blocked)";

/// Control words removed from user markup, lowercase, without backslash.
const LATEX_DIRECTIVES: &[&str] = &[
    // host processes
    "write",
    "immediate",
    "directlua",
    "luaexec",
    "luadirect",
    "shellescape",
    // file handles
    "openout",
    "openin",
    "closeout",
    "closein",
    "newwrite",
    "newread",
    "read",
    "readline",
    // reading arbitrary paths
    "input",
    "include",
    "includeonly",
    "inputiffileexists",
    "verbatiminput",
    "lstinputlisting",
    "endinput",
    "includegraphics",
    "includepdf",
    "pdfximage",
    // redefining the document's vocabulary
    "def",
    "gdef",
    "edef",
    "xdef",
    "let",
    "futurelet",
    "newcommand",
    "renewcommand",
    "providecommand",
    "declarerobustcommand",
    "newenvironment",
    "renewenvironment",
    "catcode",
    "csname",
    "makeatletter",
    "makeatother",
    "documentclass",
    "usepackage",
    "special",
];

/// `\write18` hands its argument to the shell.
const LATEX_HIGHEST_RISK: &str = "write";

/// The process-wide LaTeX denylist.
pub static LATEX_DENYLIST: LazyLock<Denylist> =
    LazyLock::new(|| Denylist::new(LATEX_DIRECTIVES.iter().copied(), LATEX_HIGHEST_RISK));

/// Immutable set of directive names to strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denylist {
    directives: Vec<String>,
    highest_risk: String,
}

impl Denylist {
    /// Names are matched case-insensitively. `highest_risk` is always part
    /// of the list, whether or not `directives` names it.
    pub fn new<I, S>(directives: I, highest_risk: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let highest_risk = highest_risk.trim_start_matches('\\').to_ascii_lowercase();
        let mut names: Vec<String> = Vec::new();
        for directive in directives {
            let name = directive
                .as_ref()
                .trim_start_matches('\\')
                .to_ascii_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        if !names.contains(&highest_risk) {
            names.push(highest_risk.clone());
        }

        Self {
            directives: names,
            highest_risk,
        }
    }

    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    pub fn highest_risk(&self) -> &str {
        &self.highest_risk
    }
}

/// Result of sanitizing one markup string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    /// Directive names removed, in order of first removal.
    pub removed: Vec<String>,
    /// A residual occurrence of the highest-risk directive was neutralised.
    pub residual_blocked: bool,
    /// `^^` character escapes were decoded before matching.
    pub decoded_escapes: bool,
}

impl Sanitized {
    pub fn intervened(&self) -> bool {
        !self.removed.is_empty() || self.residual_blocked || self.decoded_escapes
    }
}

struct DirectivePattern {
    name: String,
    regex: Regex,
}

/// Strips denylisted directives and their argument groups from markup.
pub struct Sanitizer {
    patterns: Vec<DirectivePattern>,
    residual: Regex,
    highest_risk: String,
}

impl Sanitizer {
    pub fn new(denylist: &Denylist) -> Result<Self, regex::Error> {
        let patterns = denylist
            .directives()
            .iter()
            .map(|name| {
                // `rest` catches longer control words sharing the prefix
                // (\inputenc vs \input); those are left alone.
                // The optional integer covers stream numbers as in \write18.
                // Argument groups are consumed by `skip_argument_groups`.
                let pattern = format!(
                    r"(?i)\\{}(?P<rest>[a-z@]*)(?:\s*=?\s*-?\d+)?",
                    regex::escape(name)
                );
                Ok(DirectivePattern {
                    name: name.clone(),
                    regex: Regex::new(&pattern)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let residual = Regex::new(&format!(r"(?i)\\{}", regex::escape(denylist.highest_risk())))?;

        Ok(Self {
            patterns,
            residual,
            highest_risk: denylist.highest_risk().to_string(),
        })
    }

    /// Sanitizer over [`LATEX_DENYLIST`].
    pub fn latex() -> Result<Self, regex::Error> {
        Self::new(&LATEX_DENYLIST)
    }

    /// Sanitized text only. Absent or empty input gives an empty string.
    pub fn sanitize(&self, markup: Option<&str>) -> String {
        self.sanitize_with_report(markup.unwrap_or_default()).text
    }

    pub fn sanitize_with_report(&self, markup: &str) -> Sanitized {
        if markup.is_empty() {
            return Sanitized::default();
        }

        let mut text = markup.to_string();
        let mut removed: Vec<String> = Vec::new();
        let mut decoded_escapes = false;

        // Removing one directive can splice two fragments into a new one,
        // so repeat until a pass changes nothing.
        for _ in 0..MAX_PASSES {
            let mut changed = false;
            while let Some(next) = decode_caret_escapes(&text) {
                text = next;
                decoded_escapes = true;
                changed = true;
            }
            for pattern in &self.patterns {
                if let Some(next) = strip_directive(&pattern.regex, &text) {
                    text = next;
                    changed = true;
                    if !removed.contains(&pattern.name) {
                        removed.push(pattern.name.clone());
                    }
                }
            }
            if !changed {
                break;
            }
        }

        if decoded_escapes {
            warn!("decoded ^^ character escapes in markup");
        }
        for name in &removed {
            warn!(directive = %name, "removed denylisted directive from markup");
        }

        let mut residual_blocked = false;
        if self.residual.is_match(&text) {
            warn!(
                directive = %self.highest_risk,
                "residual high-risk directive neutralised"
            );
            text = self.residual.replace_all(&text, BLOCKED_MARKER).into_owned();
            residual_blocked = true;
        }
        if text.contains("^^") {
            warn!("residual ^^ escape neutralised");
            text = text.replace("^^", BLOCKED_MARKER);
            residual_blocked = true;
        }

        Sanitized {
            text,
            removed,
            residual_blocked,
            decoded_escapes,
        }
    }
}

/// Remove every standalone match of `regex` together with the argument
/// groups that follow it. `None` when nothing was removed.
fn strip_directive(regex: &Regex, text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut at = 0;
    let mut hit = false;

    while let Some(caps) = regex.captures_at(text, at) {
        let Some(whole) = caps.get(0) else { break };
        if caps.name("rest").is_some_and(|m| !m.as_str().is_empty()) {
            at = whole.end();
            continue;
        }
        out.push_str(&text[copied..whole.start()]);
        copied = skip_argument_groups(text, whole.end());
        at = copied;
        hit = true;
    }

    if !hit {
        return None;
    }
    out.push_str(&text[copied..]);
    Some(out)
}

/// Byte offset just past any `{...}` / `[...]` groups starting at `pos`,
/// whitespace between them included. An unclosed group runs to the end.
fn skip_argument_groups(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    loop {
        let mut next = pos;
        while bytes.get(next).is_some_and(u8::is_ascii_whitespace) {
            next += 1;
        }
        pos = match bytes.get(next) {
            Some(b'{') => close_group(bytes, next, b'}'),
            Some(b'[') => close_group(bytes, next, b']'),
            _ => return pos,
        };
    }
}

/// Index after the `close` byte that ends the group opened at `open`.
/// Braces nest; a backslash escapes the following byte.
fn close_group(bytes: &[u8], open: usize, close: u8) -> usize {
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' if depth > 0 => depth -= 1,
            b if b == close && depth == 0 => return i + 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// One round of TeX `^^` decoding: `^^` plus two lowercase hex digits is
/// that byte, `^^` plus any other ASCII character flips its 0x40 bit.
/// Decoded control characters other than tab and newline are dropped, as is
/// a `^^` with nothing decodable after it. `None` when there was no `^^`.
fn decode_caret_escapes(text: &str) -> Option<String> {
    if !text.contains("^^") {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("^^") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 2..];
        let bytes = after.as_bytes();

        let hex = |b: u8| matches!(b, b'0'..=b'9' | b'a'..=b'f');
        let (decoded, used) = match bytes {
            [a, b, ..] if hex(*a) && hex(*b) => {
                let value = u8::from_str_radix(&after[..2], 16).unwrap_or_default();
                (Some(value), 2)
            }
            [c, ..] if c.is_ascii() => (Some(c ^ 0x40), 1),
            _ => (None, 0),
        };

        if let Some(byte) = decoded {
            let ch = char::from(byte);
            if !ch.is_control() || ch == '\n' || ch == '\t' {
                out.push(ch);
            }
        }
        rest = &after[used..];
    }
    out.push_str(rest);
    Some(out)
}
