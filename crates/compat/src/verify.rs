//! Equivalence verification between two logical data dumps.

use std::fs;
use std::path::{Path, PathBuf};

use dissimilar::Chunk;
use tracing::info;

use crate::error::{Error, Result};

/// Outcome of comparing two dump files. Produced once per comparison, never
/// mutated; a `differs` result is a normal value, not an error — the caller
/// decides whether a mismatch is fatal.
#[derive(Debug, Clone)]
pub struct EquivalenceReport {
    /// Whether any non-ignored line differs.
    pub differs: bool,
    /// Where the rendered diff was written.
    pub diff_path: PathBuf,
}

/// Compares two logical data dumps line by line, ignoring comment lines
/// (leading `--`) and blank lines — formatting noise, not data.
///
/// The rendered diff is written to `output` regardless of outcome, so a
/// false negative in the ignore rules can still be spotted post-mortem.
///
/// # Errors
///
/// IO failures reading the dumps or writing the diff.
pub fn dump_differs(first: &Path, second: &Path, output: &Path) -> Result<EquivalenceReport> {
    let left = significant_lines(first)?;
    let right = significant_lines(second)?;
    let differs = left != right;

    let rendered = render_diff(&left, &right);
    fs::write(output, rendered).map_err(|e| Error::Io("writing dump diff", e))?;

    info!(
        differs,
        "compared {} against {}, diff at {}",
        first.display(),
        second.display(),
        output.display()
    );
    Ok(EquivalenceReport {
        differs,
        diff_path: output.to_path_buf(),
    })
}

fn significant_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| Error::Io("reading dump", e))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("--"))
        .map(ToString::to_string)
        .collect())
}

/// Renders a line-oriented `-`/`+` diff. `dissimilar` chunks at character
/// granularity, so each changed span is widened to the whole lines it
/// touches before rendering; the artifact never contains a partial line.
fn render_diff(left: &[String], right: &[String]) -> String {
    let left_text = left.join("\n");
    let right_text = right.join("\n");

    let mut out = String::new();
    let (mut left_pos, mut right_pos) = (0usize, 0usize);
    let (mut last_deleted, mut last_inserted) = (None, None);
    for chunk in dissimilar::diff(&left_text, &right_text) {
        match chunk {
            Chunk::Equal(text) => {
                left_pos += text.len();
                right_pos += text.len();
            }
            Chunk::Delete(text) => {
                emit_lines(&mut out, '-', left, &left_text, left_pos, text.len(), &mut last_deleted);
                left_pos += text.len();
            }
            Chunk::Insert(text) => {
                emit_lines(&mut out, '+', right, &right_text, right_pos, text.len(), &mut last_inserted);
                right_pos += text.len();
            }
        }
    }
    out
}

/// Emits every line of `lines` that the byte span `[start, start + len)` of
/// `text` touches, skipping lines already emitted for this side.
fn emit_lines(
    out: &mut String,
    prefix: char,
    lines: &[String],
    text: &str,
    start: usize,
    len: usize,
    last_emitted: &mut Option<usize>,
) {
    if len == 0 || text.is_empty() {
        return;
    }
    let line_of = |pos: usize| text[..pos.min(text.len())].matches('\n').count();
    let first = line_of(start);
    let last = line_of(start + len - 1);
    for index in first..=last.min(lines.len().saturating_sub(1)) {
        if last_emitted.is_some_and(|emitted| emitted >= index) {
            continue;
        }
        out.push(prefix);
        out.push_str(&lines[index]);
        out.push('\n');
        *last_emitted = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn identical_dumps_never_differ() {
        let dir = tempfile::tempdir().unwrap();
        let content = "CREATE TABLE t (id int);\nINSERT INTO t VALUES (1);\n";
        let a = write(dir.path(), "a.sql", content);
        let b = write(dir.path(), "b.sql", content);
        let out = dir.path().join("diff");

        let report = dump_differs(&a, &b, &out).unwrap();
        assert!(!report.differs);
        assert!(out.exists());
    }

    #[test]
    fn comment_and_blank_changes_are_noise() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.sql",
            "-- dumped by version 1\nCREATE TABLE t (id int);\n\n",
        );
        let b = write(
            dir.path(),
            "b.sql",
            "-- dumped by version 2\n\n\nCREATE TABLE t (id int);\n",
        );
        let out = dir.path().join("diff");

        let report = dump_differs(&a, &b, &out).unwrap();
        assert!(!report.differs);
    }

    #[test]
    fn diff_artifact_contains_whole_lines_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.sql",
            "CREATE TABLE t (id int);\nINSERT INTO t VALUES (1);\nINSERT INTO t VALUES (9);\n",
        );
        let b = write(
            dir.path(),
            "b.sql",
            "CREATE TABLE t (id int);\nINSERT INTO t VALUES (2);\n",
        );
        let out = dir.path().join("diff");

        let report = dump_differs(&a, &b, &out).unwrap();
        assert!(report.differs);

        // A one-character change must still render as full source lines.
        let rendered = fs::read_to_string(&out).unwrap();
        for line in rendered.lines() {
            let (prefix, body) = line.split_at(1);
            assert!(prefix == "-" || prefix == "+");
            assert!(
                body.starts_with("CREATE TABLE") || body.starts_with("INSERT INTO"),
                "partial line in diff: {line:?}"
            );
            assert!(body.ends_with(';'));
        }
        assert!(rendered.contains("-INSERT INTO t VALUES (1);"));
        assert!(rendered.contains("+INSERT INTO t VALUES (2);"));
        assert!(rendered.contains("-INSERT INTO t VALUES (9);"));
    }

    #[test]
    fn data_changes_differ_and_write_a_diff() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.sql", "INSERT INTO t VALUES (1);\n");
        let b = write(dir.path(), "b.sql", "INSERT INTO t VALUES (2);\n");
        let out = dir.path().join("diff");

        let report = dump_differs(&a, &b, &out).unwrap();
        assert!(report.differs);
        assert!(!fs::read_to_string(&out).unwrap().is_empty());
        assert_eq!(report.diff_path, out);
    }
}
