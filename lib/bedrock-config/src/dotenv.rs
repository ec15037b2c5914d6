use snafu::{OptionExt as _, Snafu};

/// An error while parsing an environment file.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum DotenvError {
    /// A line was not in `KEY=value` form.
    #[snafu(display("Malformed line {} in environment file: expected 'KEY=value'.", line))]
    MissingSeparator {
        /// Line number, starting at 1.
        line: usize,
    },

    /// A line had an empty key.
    #[snafu(display("Malformed line {} in environment file: key must not be empty.", line))]
    EmptyKey {
        /// Line number, starting at 1.
        line: usize,
    },

    /// A quoted value was never closed.
    #[snafu(display("Malformed line {} in environment file: unterminated quoted value.", line))]
    UnterminatedQuote {
        /// Line number, starting at 1.
        line: usize,
    },
}

/// Parses the contents of an environment file into key/value pairs, in file order.
///
/// Supported syntax:
///
/// - blank lines, and lines starting with `#`, are ignored
/// - an optional leading `export ` is ignored
/// - `KEY=value`, with surrounding whitespace trimmed from both sides, and an unquoted value ending at ` #`
/// - `KEY='value'`, taken literally
/// - `KEY="value"`, with `\n`, `\t`, `\"` and `\\` escapes
pub fn parse(contents: &str) -> Result<Vec<(String, String)>, DotenvError> {
    let mut entries = Vec::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        let (key, value) = line.split_once('=').context(MissingSeparator { line: line_number })?;

        let key = key.trim();
        if key.is_empty() {
            return EmptyKey { line: line_number }.fail();
        }

        let value = parse_value(value.trim(), line_number)?;
        entries.push((key.to_string(), value));
    }

    Ok(entries)
}

fn parse_value(value: &str, line: usize) -> Result<String, DotenvError> {
    if let Some(rest) = value.strip_prefix('\'') {
        return rest
            .find('\'')
            .map(|end| rest[..end].to_string())
            .context(UnterminatedQuote { line });
    }

    if let Some(rest) = value.strip_prefix('"') {
        let mut unescaped = String::with_capacity(rest.len());
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return Ok(unescaped),
                '\\' => match chars.next() {
                    Some('n') => unescaped.push('\n'),
                    Some('t') => unescaped.push('\t'),
                    Some(other) => unescaped.push(other),
                    None => break,
                },
                c => unescaped.push(c),
            }
        }
        return UnterminatedQuote { line }.fail();
    }

    let value = match value.find(" #") {
        Some(comment_start) => value[..comment_start].trim_end(),
        None => value,
    };
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_values() {
        let contents = r##"
# database settings
DB_HOST=localhost
export DB_PORT = 5432
DB_NAME='app #1'
DB_GREETING="hello\n\"world\""
DB_USER=admin # inline comment
EMPTY=
"##;

        let entries = parse(contents).unwrap();
        assert_eq!(
            entries,
            vec![
                ("DB_HOST".to_string(), "localhost".to_string()),
                ("DB_PORT".to_string(), "5432".to_string()),
                ("DB_NAME".to_string(), "app #1".to_string()),
                ("DB_GREETING".to_string(), "hello\n\"world\"".to_string()),
                ("DB_USER".to_string(), "admin".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn keeps_equals_signs_in_values() {
        let entries = parse("DSN=postgres://u:p@h/db?sslmode=disable").unwrap();
        assert_eq!(entries[0].1, "postgres://u:p@h/db?sslmode=disable");
    }

    #[test]
    fn reports_malformed_lines() {
        assert!(matches!(
            parse("OK=1\nNOT_A_PAIR"),
            Err(DotenvError::MissingSeparator { line: 2 })
        ));
        assert!(matches!(parse("=value"), Err(DotenvError::EmptyKey { line: 1 })));
        assert!(matches!(
            parse("KEY=\"open"),
            Err(DotenvError::UnterminatedQuote { line: 1 })
        ));
    }
}
