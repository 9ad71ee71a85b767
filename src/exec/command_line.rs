//! Command line tokenizer.
//!
//! Request instructions arrive as single strings such as `javac Main.java`.
//! In direct mode they are split here into a program and its arguments using
//! a small subset of POSIX shell word rules:
//!
//! - Unquoted whitespace separates tokens.
//! - `'...'` keeps every character literally. There is no escape inside.
//! - `"..."` keeps every character, except that a backslash followed by one of
//!   `"`, `\`, `$` or `` ` `` yields just that character.
//! - Outside quotes, `\x` yields `x` and a backslash-newline pair is removed.
//! - Quoted and unquoted pieces that touch form one token, so `-o'a b'` is
//!   the single token `-oa b`, and `''` is an empty token.
//!
//! Nothing else is interpreted: no globbing, variables, redirection, pipes or
//! `&&`. Callers that need those run in shell mode instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("command line is empty")]
    Empty,

    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    #[error("command line ends with an unfinished backslash escape")]
    TrailingEscape,

    #[error("command line contains a NUL byte")]
    NulByte,
}

/// Split a command line into argv.
pub fn split(line: &str) -> Result<Vec<String>, TokenizeError> {
    if line.contains('\0') {
        return Err(TokenizeError::NulByte);
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(TokenizeError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(TokenizeError::UnterminatedQuote('"')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(TokenizeError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(ch) => {
                    in_token = true;
                    current.push(ch);
                }
                None => return Err(TokenizeError::TrailingEscape),
            },
            ch if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            ch => {
                in_token = true;
                current.push(ch);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    if tokens.is_empty() {
        return Err(TokenizeError::Empty);
    }

    Ok(tokens)
}

/// Quote a single argument so that both [`split`] and `sh` read it back unchanged.
pub fn quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | '+' | ','));

    if is_plain {
        return arg.to_string();
    }

    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        split(line).unwrap()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(words("python main.py"), vec!["python", "main.py"]);
        assert_eq!(words("  gcc\t-o  a.out\nmain.c  "), vec!["gcc", "-o", "a.out", "main.c"]);
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(words(r#"echo 'a  b' '$HOME' 'x\y'"#), vec!["echo", "a  b", "$HOME", r"x\y"]);
    }

    #[test]
    fn double_quotes_allow_limited_escapes() {
        assert_eq!(
            words(r#"printf "say \"hi\"" "a\nb" "c\\d""#),
            vec!["printf", r#"say "hi""#, r"a\nb", r"c\d"]
        );
    }

    #[test]
    fn adjacent_pieces_join() {
        assert_eq!(words(r#"-o'a b'"c"d"#), vec!["-oa bcd"]);
    }

    #[test]
    fn empty_quotes_make_empty_token() {
        assert_eq!(words("prog '' \"\""), vec!["prog", "", ""]);
    }

    #[test]
    fn backslash_outside_quotes() {
        assert_eq!(words(r"cat my\ file.txt"), vec!["cat", "my file.txt"]);
        assert_eq!(words("ls \\\n-la"), vec!["ls", "-la"]);
    }

    #[test]
    fn operators_are_plain_words() {
        assert_eq!(words("make && ./a.out | tee log"), vec!["make", "&&", "./a.out", "|", "tee", "log"]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(split(""), Err(TokenizeError::Empty));
        assert_eq!(split("   \t "), Err(TokenizeError::Empty));
        assert_eq!(split("echo 'oops"), Err(TokenizeError::UnterminatedQuote('\'')));
        assert_eq!(split("echo \"oops"), Err(TokenizeError::UnterminatedQuote('"')));
        assert_eq!(split("echo oops\\"), Err(TokenizeError::TrailingEscape));
        assert_eq!(split("echo a\0b"), Err(TokenizeError::NulByte));
    }

    #[test]
    fn quote_round_trips_through_split() {
        for arg in ["plain", "/bootstrap.tar.gz", "with space", "it's", "", "$x; rm -rf /"] {
            let line = format!("tar {}", quote(arg));
            assert_eq!(split(&line).unwrap(), vec!["tar".to_string(), arg.to_string()]);
        }
    }
}
