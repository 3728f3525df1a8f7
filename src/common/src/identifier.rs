//! Quoting of ClickHouse identifiers (database, table and column names).

const QUOTE: char = '`';

/// Wraps `name` in backticks, doubling any backtick inside it.
///
/// ```
/// use common::identifier::escape_identifier;
///
/// assert_eq!(escape_identifier("my_table"), "`my_table`");
/// assert_eq!(escape_identifier("a`b"), "`a``b`");
/// ```
pub fn escape_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(QUOTE);
    for c in name.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    quoted
}
