//! Script downleveling and minification passes.
//!
//! Both passes walk the source with a small string/comment-aware scanner so
//! string literals, template literals, and comments are never rewritten as
//! code. They are conservative by construction: `downlevel` rewrites only
//! block-scoped declarations, `minify` strips comments and collapses
//! whitespace. Regex literals are not tracked by the scanner.

/// Scanner state while walking a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Single,
    Double,
    Template,
}

/// Rewrite `const` and `let` declarations to `var`.
///
/// Exempt items (pre-compiled polyfills and the downleveling runtime itself)
/// must never reach this pass — transforming them would be circular.
pub fn downlevel(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut word = String::new();
    let mut state = State::Code;
    let mut chars = src.chars().peekable();
    let mut escaped = false;

    let flush = |word: &mut String, out: &mut String| {
        match word.as_str() {
            "const" | "let" => out.push_str("var"),
            _ => out.push_str(word),
        }
        word.clear();
    };

    while let Some(c) = chars.next() {
        match state {
            State::Code => {
                if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                    word.push(c);
                    continue;
                }
                flush(&mut word, &mut out);
                match c {
                    '/' if chars.peek() == Some(&'/') => state = State::LineComment,
                    '/' if chars.peek() == Some(&'*') => state = State::BlockComment,
                    '\'' => state = State::Single,
                    '"' => state = State::Double,
                    '`' => state = State::Template,
                    _ => {}
                }
                out.push(c);
            }
            State::LineComment => {
                out.push(c);
                if c == '\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                out.push(c);
                if c == '*' && chars.peek() == Some(&'/') {
                    out.push(chars.next().expect("peeked"));
                    state = State::Code;
                }
            }
            State::Single | State::Double | State::Template => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if (state == State::Single && c == '\'')
                    || (state == State::Double && c == '"')
                    || (state == State::Template && c == '`')
                {
                    state = State::Code;
                }
            }
        }
    }
    flush(&mut word, &mut out);

    out
}

/// Strip comments and collapse whitespace outside of string and template
/// literals. Whitespace runs containing a newline collapse to a single
/// newline (semicolon insertion stays intact); other runs collapse to a
/// single space.
pub fn minify(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut state = State::Code;
    let mut chars = src.chars().peekable();
    let mut escaped = false;
    // Pending whitespace run: (seen_any, seen_newline)
    let mut ws = (false, false);

    while let Some(c) = chars.next() {
        match state {
            State::Code => {
                if c.is_whitespace() {
                    ws.0 = true;
                    ws.1 |= c == '\n';
                    continue;
                }
                if c == '/' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::LineComment;
                    continue;
                }
                if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    state = State::BlockComment;
                    continue;
                }
                if ws.0 && !out.is_empty() {
                    out.push(if ws.1 { '\n' } else { ' ' });
                }
                ws = (false, false);
                match c {
                    '\'' => state = State::Single,
                    '"' => state = State::Double,
                    '`' => state = State::Template,
                    _ => {}
                }
                out.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    // The newline survives as pending whitespace.
                    ws = (true, true);
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    ws.0 = true;
                    state = State::Code;
                }
            }
            State::Single | State::Double | State::Template => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if (state == State::Single && c == '\'')
                    || (state == State::Double && c == '"')
                    || (state == State::Template && c == '`')
                {
                    state = State::Code;
                }
            }
        }
    }

    out
}
