use skein_core::{FunctionName, Result, SkeinError};

use super::{Block, CallArgument};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

fn syntax(offset: usize, reason: impl Into<String>) -> SkeinError {
    SkeinError::TemplateSyntax {
        offset,
        reason: reason.into(),
    }
}

/// One whitespace-separated piece of a `{{ … }}` reference.
#[derive(Debug, PartialEq)]
enum Token {
    Bare(String),
    Quoted(String),
}

/// Split template text into blocks. Offsets in errors are byte offsets into
/// `source`.
pub(crate) fn parse(source: &str) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = source[cursor..].find(OPEN) {
        let start = cursor + rel;
        if start > cursor {
            blocks.push(Block::Text(source[cursor..start].to_string()));
        }
        let body_start = start + OPEN.len();
        let body_end = find_close(source, start, body_start)?;
        blocks.push(parse_reference(
            &source[body_start..body_end],
            body_start,
        )?);
        cursor = body_end + CLOSE.len();
    }

    if cursor < source.len() {
        blocks.push(Block::Text(source[cursor..].to_string()));
    }
    Ok(blocks)
}

/// Byte index of the `}}` closing the reference opened at `open`, skipping
/// over quoted values.
fn find_close(source: &str, open: usize, from: usize) -> Result<usize> {
    let mut quote: Option<(char, usize)> = None;
    let mut chars = source[from..].char_indices();

    while let Some((i, c)) = chars.next() {
        let at = from + i;
        match quote {
            Some((q, _)) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some((c, at));
                } else if source[at..].starts_with(CLOSE) {
                    return Ok(at);
                }
            }
        }
    }

    match quote {
        Some((_, at)) => Err(syntax(at, "unterminated quoted value")),
        None => Err(syntax(open, "unterminated reference, missing '}}'")),
    }
}

fn tokenize(body: &str, base: usize) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                if ch == '\\' {
                    match chars.next() {
                        Some((_, esc)) if esc == c || esc == '\\' => value.push(esc),
                        Some((_, other)) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => value.push('\\'),
                    }
                } else if ch == c {
                    closed = true;
                    break;
                } else {
                    value.push(ch);
                }
            }
            if !closed {
                return Err(syntax(base + i, "unterminated quoted value"));
            }
            if let Some(&(j, next)) = chars.peek() {
                if !next.is_whitespace() {
                    return Err(syntax(base + j, "expected whitespace after quoted value"));
                }
            }
            tokens.push((Token::Quoted(value), base + i));
            continue;
        }

        let mut word = String::new();
        while let Some(&(j, ch)) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            if ch == '\'' || ch == '"' {
                return Err(syntax(base + j, "unexpected quote inside a name"));
            }
            word.push(ch);
            chars.next();
        }
        tokens.push((Token::Bare(word), base + i));
    }

    Ok(tokens)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn variable_name(token: &str, offset: usize) -> Result<String> {
    let name = &token[1..];
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(syntax(offset, format!("invalid variable name '{token}'")))
    }
}

fn function_name(token: &str, offset: usize) -> Result<FunctionName> {
    let valid = match token.split_once('.') {
        Some((skill, name)) => is_identifier(skill) && is_identifier(name),
        None => is_identifier(token),
    };
    if valid {
        Ok(FunctionName::parse(token))
    } else {
        Err(syntax(offset, format!("invalid function name '{token}'")))
    }
}

fn parse_reference(body: &str, base: usize) -> Result<Block> {
    let mut tokens = tokenize(body, base)?.into_iter();
    let Some((head, head_at)) = tokens.next() else {
        return Err(syntax(base, "empty reference"));
    };
    let rest: Vec<(Token, usize)> = tokens.collect();

    match head {
        Token::Quoted(value) => {
            if let Some((_, at)) = rest.first() {
                return Err(syntax(*at, "a quoted value takes no argument"));
            }
            Ok(Block::Value(value))
        }
        Token::Bare(word) if word.starts_with('$') => {
            if let Some((_, at)) = rest.first() {
                return Err(syntax(*at, "a variable takes no argument"));
            }
            Ok(Block::Variable(variable_name(&word, head_at)?))
        }
        Token::Bare(word) => {
            let first = word.chars().next().unwrap_or(' ');
            if !(first.is_ascii_alphanumeric() || first == '_') {
                return Err(syntax(head_at, format!("unknown reference kind '{word}'")));
            }
            let function = function_name(&word, head_at)?;
            if rest.len() > 1 {
                return Err(syntax(rest[1].1, "a function call takes at most one argument"));
            }
            let argument = match rest.into_iter().next() {
                None => None,
                Some((Token::Quoted(value), _)) => Some(CallArgument::Value(value)),
                Some((Token::Bare(arg), at)) if arg.starts_with('$') => {
                    Some(CallArgument::Variable(variable_name(&arg, at)?))
                }
                Some((Token::Bare(arg), at)) => {
                    return Err(syntax(
                        at,
                        format!("argument '{arg}' must be a $variable or a quoted value"),
                    ));
                }
            };
            Ok(Block::Call { function, argument })
        }
    }
}
