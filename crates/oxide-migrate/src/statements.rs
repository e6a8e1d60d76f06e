//! Splitting migration files into statements.
//!
//! Migration files are executed one statement at a time. Semicolons inside
//! string literals, quoted identifiers, dollar-quoted bodies and comments
//! don't end a statement. Comments are dropped.

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuote,
    DoubleQuote,
    DollarQuote(String),
    LineComment,
    BlockComment(usize),
}

/// Splits SQL text into trimmed, non-empty statements without their
/// terminating semicolons.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match &state {
            State::Normal => match c {
                '-' if next == Some('-') => {
                    state = State::LineComment;
                    i += 2;
                    continue;
                }
                '/' if next == Some('*') => {
                    state = State::BlockComment(1);
                    i += 2;
                    continue;
                }
                '\'' => {
                    state = State::SingleQuote;
                    current.push(c);
                }
                '"' => {
                    state = State::DoubleQuote;
                    current.push(c);
                }
                '$' => {
                    if let Some(tag) = dollar_tag(&chars, i) {
                        current.push_str(&tag);
                        i += tag.chars().count();
                        state = State::DollarQuote(tag);
                        continue;
                    }
                    current.push(c);
                }
                ';' => push_statement(&mut statements, &mut current),
                _ => current.push(c),
            },
            State::SingleQuote | State::DoubleQuote => {
                let quote = if state == State::SingleQuote { '\'' } else { '"' };
                current.push(c);
                if c == quote {
                    if next == Some(quote) {
                        current.push(quote);
                        i += 2;
                        continue;
                    }
                    state = State::Normal;
                }
            }
            State::DollarQuote(tag) => {
                if c == '$' && starts_with_at(&chars, i, tag) {
                    current.push_str(tag);
                    i += tag.chars().count();
                    state = State::Normal;
                    continue;
                }
                current.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    current.push(c);
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                let depth = *depth;
                if c == '/' && next == Some('*') {
                    state = State::BlockComment(depth + 1);
                    i += 2;
                    continue;
                }
                if c == '*' && next == Some('/') {
                    state = if depth == 1 {
                        current.push(' ');
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    i += 2;
                    continue;
                }
            }
        }

        i += 1;
    }

    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Reads a dollar-quote opening tag (`$$` or `$name$`) starting at `start`.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    let mut tag = String::from('$');
    let mut i = start + 1;
    while let Some(&c) = chars.get(i) {
        if c == '$' {
            tag.push('$');
            return Some(tag);
        }
        let valid = if i == start + 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        tag.push(c);
        i += 1;
    }
    None
}

fn starts_with_at(chars: &[char], start: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(offset, c)| chars.get(start + offset) == Some(&c))
}
