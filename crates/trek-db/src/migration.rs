use std::sync::LazyLock;

use regex::Regex;
use trek_common::{Error, ParseErrorKind, Result, Version};

/// Number of digits in a migration version (`YYYYMMDDHHMMSS`).
pub const VERSION_WIDTH: usize = 14;

static FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"^(\d{{{VERSION_WIDTH}}})[_-]([A-Za-z0-9_-]+)\.([A-Za-z0-9]+(?:\.[A-Za-z0-9]+)*)$"
    );
    Regex::new(&pattern).expect("valid filename regex")
});

static EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:\.[A-Za-z0-9]+)*$").expect("valid extension regex")
});

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^--\s*(up|down)$").expect("valid marker regex"));

/// One versioned schema change, as read from a migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    version: Version,
    name: String,
    up: Vec<String>,
    down: Vec<String>,
}

impl Migration {
    pub fn new(
        version: Version,
        name: impl Into<String>,
        up: Vec<String>,
        down: Vec<String>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            up,
            down,
        }
    }

    /// Parse a migration from its filename and file contents.
    ///
    /// The filename must be `<version>_<name>.<ext>` (a `-` separator is also
    /// accepted). The contents may be split by `-- up` / `-- down` marker
    /// lines, matched case-insensitively; without markers everything is the
    /// up section and the down section is empty.
    pub fn parse(filename: &str, content: &str) -> Result<Self> {
        let parse_err = |kind| Error::Parse {
            filename: filename.to_string(),
            kind,
        };

        let (version, name) = split_filename(filename)
            .ok_or_else(|| parse_err(ParseErrorKind::InvalidFilename))?;
        let (up, down) = split_sections(content).map_err(parse_err)?;

        Ok(Self {
            version,
            name,
            up: split_statements(&up),
            down: split_statements(&down),
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn up(&self) -> &[String] {
        &self.up
    }

    pub fn down(&self) -> &[String] {
        &self.down
    }
}

/// Extract version and name from a migration filename.
pub fn split_filename(filename: &str) -> Option<(Version, String)> {
    let caps = FILENAME.captures(filename)?;
    Some((Version::from_string(&caps[1]), caps[2].to_string()))
}

/// Accept `sql`, `.sql` or a compound extension such as `up.sql`, returning it
/// without the leading dot.
pub fn normalize_extension(extension: &str) -> Result<&str> {
    let trimmed = extension.strip_prefix('.').unwrap_or(extension);
    if !EXTENSION.is_match(trimmed) {
        return Err(Error::Config(format!(
            "invalid migration file extension {extension:?}"
        )));
    }
    Ok(trimmed)
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

fn split_sections(content: &str) -> std::result::Result<(String, String), ParseErrorKind> {
    let mut preamble = String::new();
    let mut up = String::new();
    let mut down = String::new();
    let mut seen_up = false;
    let mut seen_down = false;
    let mut section = Section::Preamble;

    for line in content.lines() {
        if let Some(caps) = MARKER.captures(line.trim()) {
            if caps[1].eq_ignore_ascii_case("up") {
                if seen_up {
                    return Err(ParseErrorKind::DuplicateMarker("up"));
                }
                if seen_down {
                    return Err(ParseErrorKind::DownBeforeUp);
                }
                if !split_statements(&preamble).is_empty() {
                    return Err(ParseErrorKind::StatementsBeforeUp);
                }
                seen_up = true;
                section = Section::Up;
            } else {
                if seen_down {
                    return Err(ParseErrorKind::DuplicateMarker("down"));
                }
                seen_down = true;
                section = Section::Down;
            }
            continue;
        }

        let target = match section {
            Section::Preamble => &mut preamble,
            Section::Up => &mut up,
            Section::Down => &mut down,
        };
        target.push_str(line);
        target.push('\n');
    }

    // Without an up marker, whatever precedes `-- down` (or the whole file)
    // is the up section.
    if !seen_up {
        up = preamble;
    }
    Ok((up, down))
}

/// Split SQL text into `;`-terminated statements, in source order.
///
/// Semicolons inside quoted literals, quoted identifiers, `--` and `/* */`
/// comments do not terminate a statement, nor do those inside the
/// `BEGIN ... END` body of a `CREATE TRIGGER`. Fragments holding only
/// whitespace or comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut splitter = Splitter::default();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match splitter.lex {
            Lex::LineComment => {
                splitter.current.push(c);
                if c == '\n' {
                    splitter.lex = Lex::Code;
                }
            }
            Lex::BlockComment => {
                splitter.current.push(c);
                if c == '*' && chars.next_if_eq(&'/').is_some() {
                    splitter.current.push('/');
                    splitter.lex = Lex::Code;
                }
            }
            Lex::Quoted(q) => {
                splitter.current.push(c);
                if c == q {
                    splitter.lex = Lex::Code;
                }
            }
            Lex::Code if c.is_alphanumeric() || c == '_' => {
                splitter.word.push(c);
                splitter.push_code(c);
            }
            Lex::Code => {
                splitter.end_word();
                match c {
                    '\'' | '"' | '`' => {
                        splitter.lex = Lex::Quoted(c);
                        splitter.push_code(c);
                    }
                    '-' if chars.next_if_eq(&'-').is_some() => {
                        splitter.lex = Lex::LineComment;
                        splitter.current.push_str("--");
                    }
                    '/' if chars.next_if_eq(&'*').is_some() => {
                        splitter.lex = Lex::BlockComment;
                        splitter.current.push_str("/*");
                    }
                    ';' if splitter.depth == 0 => splitter.finish_statement(),
                    c if c.is_whitespace() => splitter.current.push(c),
                    c => splitter.push_code(c),
                }
            }
        }
    }

    splitter.end_word();
    splitter.finish_statement();
    splitter.statements
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum Lex {
    #[default]
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

#[derive(Default)]
struct Splitter {
    statements: Vec<String>,
    current: String,
    lex: Lex,
    // Identifier or keyword being read, outside quotes and comments.
    word: String,
    has_code: bool,
    in_trigger: bool,
    // Open BEGIN/CASE blocks of a trigger.
    depth: usize,
}

impl Splitter {
    fn push_code(&mut self, c: char) {
        self.current.push(c);
        self.has_code = true;
    }

    fn end_word(&mut self) {
        let word = std::mem::take(&mut self.word);
        if word.eq_ignore_ascii_case("trigger") {
            self.in_trigger = true;
        } else if self.in_trigger
            && (word.eq_ignore_ascii_case("begin") || word.eq_ignore_ascii_case("case"))
        {
            self.depth += 1;
        } else if self.in_trigger && word.eq_ignore_ascii_case("end") {
            self.depth = self.depth.saturating_sub(1);
        }
    }

    fn finish_statement(&mut self) {
        let statement = std::mem::take(&mut self.current);
        if std::mem::take(&mut self.has_code) {
            self.statements.push(statement.trim().to_string());
        }
        self.in_trigger = false;
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Migration {
        Migration::parse("20240101120000_create_users.sql", content).unwrap()
    }

    fn kind_of(err: Error) -> ParseErrorKind {
        match err {
            Error::Parse { kind, .. } => kind,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn filename_yields_version_and_name() {
        let m = parse("CREATE TABLE users (username TEXT);");
        assert_eq!(m.version().as_str(), "20240101120000");
        assert_eq!(m.name(), "create_users");

        let m = Migration::parse("20240101120000-add-index.sql", "").unwrap();
        assert_eq!(m.name(), "add-index");
    }

    #[test]
    fn bad_filenames_are_rejected() {
        for filename in [
            "create_users.sql",
            "2024010112_create_users.sql",
            "20240101120000_.sql",
            "20240101120000_create_users",
            "20240101120000create_users.sql",
        ] {
            let err = Migration::parse(filename, "SELECT 1;").unwrap_err();
            assert_eq!(kind_of(err), ParseErrorKind::InvalidFilename, "{filename}");
        }
    }

    #[test]
    fn content_without_markers_is_all_up() {
        let m = parse("CREATE TABLE users (username TEXT);\nINSERT INTO users VALUES ('a');\n");
        assert_eq!(
            m.up(),
            ["CREATE TABLE users (username TEXT)", "INSERT INTO users VALUES ('a')"]
        );
        assert!(m.down().is_empty());
    }

    #[test]
    fn markers_split_up_and_down() {
        let m = parse("-- up\nUPDATE users SET username='0';\n-- down\nUPDATE users SET username='4';\n");
        assert_eq!(m.up(), ["UPDATE users SET username='0'"]);
        assert_eq!(m.down(), ["UPDATE users SET username='4'"]);
    }

    #[test]
    fn markers_are_case_insensitive() {
        let m = parse("--UP\nCREATE TABLE a (x TEXT);\n  -- Down  \nDROP TABLE a;\n");
        assert_eq!(m.up(), ["CREATE TABLE a (x TEXT)"]);
        assert_eq!(m.down(), ["DROP TABLE a"]);
    }

    #[test]
    fn down_marker_alone_splits_after_the_up_statements() {
        let m = parse("CREATE TABLE a (x TEXT);\n-- down\nDROP TABLE a;\n");
        assert_eq!(m.up(), ["CREATE TABLE a (x TEXT)"]);
        assert_eq!(m.down(), ["DROP TABLE a"]);
    }

    #[test]
    fn comments_before_up_marker_are_allowed() {
        let m = parse("-- Migration: create users\n\n-- up\nCREATE TABLE users (id INTEGER);\n");
        assert_eq!(m.up(), ["CREATE TABLE users (id INTEGER)"]);
    }

    #[test]
    fn malformed_markers_are_rejected() {
        let cases = [
            ("-- up\nSELECT 1;\n-- up\nSELECT 2;", ParseErrorKind::DuplicateMarker("up")),
            ("-- up\n-- down\nSELECT 1;\n-- down\n", ParseErrorKind::DuplicateMarker("down")),
            ("-- down\nSELECT 1;\n-- up\nSELECT 2;", ParseErrorKind::DownBeforeUp),
            ("SELECT 1;\n-- up\nSELECT 2;", ParseErrorKind::StatementsBeforeUp),
        ];
        for (content, expected) in cases {
            let err = Migration::parse("20240101120000_x.sql", content).unwrap_err();
            assert_eq!(kind_of(err), expected, "{content}");
        }
    }

    #[test]
    fn marker_words_inside_statements_do_not_split() {
        let m = parse("UPDATE t SET c = 'x' -- up\n;");
        assert_eq!(m.up(), ["UPDATE t SET c = 'x' -- up"]);
        assert!(m.down().is_empty());
    }

    #[test]
    fn semicolons_in_literals_and_comments_do_not_split() {
        let stmts = split_statements(
            "INSERT INTO t VALUES ('a;b');\n-- note; still a comment\nUPDATE \"odd;name\" SET x = 1;",
        );
        assert_eq!(
            stmts,
            vec![
                "INSERT INTO t VALUES ('a;b')",
                "-- note; still a comment\nUPDATE \"odd;name\" SET x = 1",
            ]
        );
    }

    #[test]
    fn escaped_quotes_stay_inside_literal() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 1");
        assert_eq!(stmts, vec!["INSERT INTO t VALUES ('it''s; fine')", "SELECT 1"]);
    }

    #[test]
    fn trigger_bodies_are_kept_whole() {
        let stmts = split_statements(
            "CREATE TABLE a (x INTEGER);\n\
             CREATE TRIGGER tr AFTER INSERT ON a BEGIN\n  UPDATE a SET x = 1;\n  \
             UPDATE a SET x = CASE WHEN x > 1 THEN 2 ELSE 3 END;\nEND;\n\
             INSERT INTO a VALUES (1);",
        );
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0], "CREATE TABLE a (x INTEGER)");
        assert!(stmts[1].starts_with("CREATE TRIGGER tr"));
        assert!(stmts[1].ends_with("END"));
        assert_eq!(stmts[2], "INSERT INTO a VALUES (1)");
    }

    #[test]
    fn begin_outside_a_trigger_does_not_nest() {
        let stmts = split_statements("BEGIN; SELECT 1; END;");
        assert_eq!(stmts, vec!["BEGIN", "SELECT 1", "END"]);
    }

    #[test]
    fn block_comments_hide_semicolons() {
        let stmts = split_statements("/* a; b */ SELECT 1; /* only a comment; */");
        assert_eq!(stmts, vec!["/* a; b */ SELECT 1"]);
    }

    #[test]
    fn compound_extensions_are_part_of_the_filename() {
        let m = Migration::parse("20240101120000_create_users.up.sql", "SELECT 1;").unwrap();
        assert_eq!(m.name(), "create_users");
    }

    #[test]
    fn extensions_are_normalized() {
        assert_eq!(normalize_extension("sql").unwrap(), "sql");
        assert_eq!(normalize_extension(".sql").unwrap(), "sql");
        assert_eq!(normalize_extension("up.sql").unwrap(), "up.sql");
        for bad in ["", ".", "..sql", "sql.", "s ql"] {
            assert!(
                matches!(normalize_extension(bad), Err(Error::Config(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn blank_and_comment_only_fragments_are_dropped() {
        let stmts = split_statements("  ;\n;\n-- trailing comment\n");
        assert!(stmts.is_empty());

        let stmts = split_statements("SELECT 1;;  SELECT 2; -- done");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }
}
