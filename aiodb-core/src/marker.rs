//! Parameter-placeholder rewriting: `%s` -> `?` or `$N`.
//!
//! Ported 1:1 from `aio-databases`'s `RE_PARAM = re(r'([^%])(%s)')` plus the
//! `PGReplacer`/`Replacer` counters in `backends/common.py` / `backends/_asyncpg.py`.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([^%])(%s)").unwrap())
}

/// The native placeholder syntax a driver expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// SQLite, ODBC, MySQL-like drivers: `?`.
    Question,
    /// PostgreSQL-like drivers: `$1, $2, ...` ascending per call.
    Dollar,
}

/// Rewrite every `%s` not preceded by another `%` into the driver's native
/// placeholder, left to right. A literal `%%s` is left untouched.
pub fn rewrite(sql: &str, style: PlaceholderStyle) -> String {
    match style {
        PlaceholderStyle::Question => placeholder_pattern()
            .replace_all(sql, "${1}?")
            .into_owned(),
        PlaceholderStyle::Dollar => {
            let mut n = 0usize;
            placeholder_pattern()
                .replace_all(sql, |caps: &Captures| {
                    n += 1;
                    format!("{}${}", &caps[1], n)
                })
                .into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_to_question_marks() {
        assert_eq!(
            rewrite("select \"%s\", %s", PlaceholderStyle::Question),
            "select \"?\", ?"
        );
    }

    #[test]
    fn rewrites_to_ascending_dollar_markers() {
        assert_eq!(
            rewrite("select \"%s\", %s", PlaceholderStyle::Dollar),
            "select \"$1\", $2"
        );
    }

    #[test]
    fn leaves_escaped_percent_s_untouched() {
        assert_eq!(
            rewrite("select \"%%s\"", PlaceholderStyle::Question),
            "select \"%%s\""
        );
        assert_eq!(
            rewrite("select \"%%s\"", PlaceholderStyle::Dollar),
            "select \"%%s\""
        );
    }
}
