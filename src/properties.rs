// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reader for `.properties` files using the same rules as `java.util.Properties`,
//! which is what Gradle uses to read `gradle-wrapper.properties`.

use anyhow::{Context, Result, anyhow, bail};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read from file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Cannot parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for (line_no, line) in logical_lines(text) {
            let (key, value) = split_key_value(&line);
            let key = unescape(key).map_err(|e| anyhow!("line {line_no}: {e}"))?;
            let value = unescape(value).map_err(|e| anyhow!("line {line_no}: {e}"))?;
            // Later definitions win, as in Java.
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Joins continuation lines and drops blanks and comments. Yields the
/// 1-based physical line number each logical line starts on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim_start_matches(is_blank);
        let (start, mut buf) = match current.take() {
            Some(pending) => pending,
            None => {
                if trimmed.is_empty() || trimmed.starts_with(['#', '!']) {
                    continue;
                }
                (idx + 1, String::new())
            }
        };

        let trailing = trimmed.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            buf.push_str(&trimmed[..trimmed.len() - 1]);
            current = Some((start, buf));
        } else {
            buf.push_str(trimmed);
            lines.push((start, buf));
        }
    }

    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut escaped = false;
    let mut separator = None;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                separator = Some(c);
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                separator = Some(c);
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = match separator {
        Some(sep) => &line[key_end + sep.len_utf8()..],
        None => "",
    };
    rest = rest.trim_start_matches(is_blank);
    if separator.is_some_and(is_blank) {
        if let Some(stripped) = rest.strip_prefix(['=', ':']) {
            rest = stripped.trim_start_matches(is_blank);
        }
    }
    (key, rest)
}

fn unescape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                let value = u32::from_str_radix(&code, 16)
                    .ok()
                    .filter(|_| code.len() == 4)
                    .and_then(char::from_u32);
                match value {
                    Some(ch) => out.push(ch),
                    None => bail!("Malformed \\uxxxx encoding: \\u{code}"),
                }
            }
            Some(other) => out.push(other),
            // A lone trailing backslash is dropped.
            None => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gradle_wrapper_file() {
        let props = Properties::parse(
            "#Thu Jan 01 00:00:00 UTC 2024\n\
             distributionBase=GRADLE_USER_HOME\n\
             distributionPath=wrapper/dists\n\
             distributionUrl=https\\://services.gradle.org/distributions/gradle-7.4-bin.zip\n\
             zipStoreBase=GRADLE_USER_HOME\n\
             zipStorePath=wrapper/dists\n",
        )
        .unwrap();

        assert_eq!(props.get("zipStorePath"), Some("wrapper/dists"));
        assert_eq!(props.get("distributionBase"), Some("GRADLE_USER_HOME"));
        assert_eq!(props.get("distributionPath"), Some("wrapper/dists"));
        assert_eq!(
            props.get("distributionUrl"),
            Some("https://services.gradle.org/distributions/gradle-7.4-bin.zip")
        );
    }

    #[test]
    fn supports_all_separators() {
        let props = Properties::parse("a=1\nb:2\nc 3\nd = 4\ne   :  5\nf\n").unwrap();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
        assert_eq!(props.get("c"), Some("3"));
        assert_eq!(props.get("d"), Some("4"));
        assert_eq!(props.get("e"), Some("5"));
        assert_eq!(props.get("f"), Some(""));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let props = Properties::parse("# comment\n! also comment\n\n   \nkey=value\r\n").unwrap();
        assert_eq!(props.get("#"), None);
        assert_eq!(props.get("!"), None);
        assert_eq!(props.get("key"), Some("value"));
    }

    #[test]
    fn joins_continuation_lines() {
        let props = Properties::parse("url=https://example.com/\\\n    gradle-8.5-all.zip\n").unwrap();
        assert_eq!(
            props.get("url"),
            Some("https://example.com/gradle-8.5-all.zip")
        );
    }

    #[test]
    fn even_backslashes_do_not_continue() {
        let props = Properties::parse("path=C\\:\\\\\nnext=1\n").unwrap();
        assert_eq!(props.get("path"), Some("C:\\"));
        assert_eq!(props.get("next"), Some("1"));
    }

    #[test]
    fn decodes_escapes() {
        let props = Properties::parse("key\\ with\\ spaces=tab\\there\\u0041\n").unwrap();
        assert_eq!(props.get("key with spaces"), Some("tab\thereA"));
    }

    #[test]
    fn rejects_malformed_unicode_escape() {
        assert!(Properties::parse("bad=\\u12\n").is_err());
        assert!(Properties::parse("bad=\\uzzzz\n").is_err());
    }

    #[test]
    fn later_definitions_win() {
        let props = Properties::parse("k=1\nk=2\n").unwrap();
        assert_eq!(props.get("k"), Some("2"));
    }
}
