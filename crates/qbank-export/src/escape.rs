//! Escaping of LaTeX special characters in user text.
//!
//! Authors write a mix of prose and markup: `50% of the class` next to
//! `$\frac{1}{2}$`. Math spans, environments and control sequences are
//! copied as written; `&`, `%` and `#` in the remaining text are escaped,
//! as is a `$` that reads as a currency sign.

const GREEK_LETTERS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "pi", "varpi", "rho", "varrho",
    "sigma", "varsigma", "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega", "Gamma",
    "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi", "Omega",
];

/// Escape `text` for use in LaTeX text mode.
///
/// - `$$...$$`, `$...$`, `\[...\]`, `\(...\)` and `\begin{env}...\end{env}`
///   are copied unchanged.
/// - A `$` followed by a number is a currency sign and becomes `\$`, as
///   does a `$` that never closes.
/// - Control sequences are kept; an already escaped `\%` stays as it is.
/// - A bare Greek letter command such as `\alpha` is wrapped in `$...$`.
/// - `&`, `%` and `#` anywhere else are prefixed with a backslash.
///
/// Escaping only ever inserts a backslash before a non-letter, so it cannot
/// produce a control word that was not already present.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let consumed = match c {
            '$' => dollar(rest, &mut out),
            '\\' => backslash(rest, &mut out),
            '&' | '%' | '#' => {
                out.push('\\');
                out.push(c);
                1
            }
            _ => {
                out.push(c);
                c.len_utf8()
            }
        };
        rest = &rest[consumed..];
    }
    out
}

/// Handle a `$` at the start of `rest`. Returns the bytes consumed.
fn dollar(rest: &str, out: &mut String) -> usize {
    if let Some(inner) = rest.strip_prefix("$$") {
        if let Some(end) = inner.find("$$") {
            let len = 2 + end + 2;
            out.push_str(&rest[..len]);
            return len;
        }
        out.push_str(r"\$\$");
        return 2;
    }

    let after = &rest[1..];
    let currency = after.trim_start().starts_with(|c: char| c.is_ascii_digit());
    if !currency && let Some(end) = after.find('$') {
        let len = 1 + end + 1;
        out.push_str(&rest[..len]);
        return len;
    }

    out.push_str(r"\$");
    1
}

/// Handle a `\` at the start of `rest`. Returns the bytes consumed.
fn backslash(rest: &str, out: &mut String) -> usize {
    for (open, close) in [(r"\[", r"\]"), (r"\(", r"\)")] {
        if let Some(inner) = rest.strip_prefix(open)
            && let Some(end) = inner.find(close)
        {
            let len = open.len() + end + close.len();
            out.push_str(&rest[..len]);
            return len;
        }
    }

    let name_len = rest[1..]
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len() - 1);

    if name_len == 0 {
        // Control symbol such as `\%` or `\\`: copy the pair.
        return match rest[1..].chars().next() {
            Some(c) => {
                out.push('\\');
                out.push(c);
                1 + c.len_utf8()
            }
            None => {
                out.push('\\');
                1
            }
        };
    }

    let name = &rest[1..1 + name_len];
    if name == "begin"
        && let Some(len) = environment_len(rest)
    {
        out.push_str(&rest[..len]);
        return len;
    }

    if GREEK_LETTERS.contains(&name) {
        out.push('$');
        out.push_str(&rest[..1 + name_len]);
        out.push('$');
    } else {
        out.push_str(&rest[..1 + name_len]);
    }
    1 + name_len
}

/// Length of `\begin{env}...\end{env}` at the start of `rest`, if it closes.
fn environment_len(rest: &str) -> Option<usize> {
    let after_begin = rest.strip_prefix(r"\begin{")?;
    let env_end = after_begin.find('}')?;
    let env = &after_begin[..env_end];
    if env.is_empty() {
        return None;
    }

    let closing = format!(r"\end{{{env}}}");
    let body_start = r"\begin{".len() + env_end + 1;
    let end = rest[body_start..].find(&closing)?;
    Some(body_start + end + closing.len())
}
