//! Readers for OR-Library assignment instances and their reference answers.
//!
//! A problem file starts with the dimension `n` and continues in one of two
//! encodings: dense rows of `n` costs each, or sparse `row col cost` triples
//! with 1-based indices where every omitted cell is taken as unusably
//! expensive. A file whose first data line holds exactly three numbers is
//! read as triples; anything else is read densely, ignoring line breaks.
//!
//! Answer files pair an instance name with its optimal cost, one per line
//! below a header line. An instance matches when the problem file's stem
//! ends with the recorded name, so `assignp800.txt` finds `p800`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use nalgebra::DMatrix;
use thiserror::Error;

/// Absolute difference below which a computed cost matches the reference.
pub const ANSWER_TOLERANCE: f64 = 1e-8;

/// Dimension cap for problem files; bounds the dense allocation a bad size
/// token could trigger.
const MAX_DIM: usize = 32_767;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("no answer recorded for `{0}`")]
    UnknownInstance(String),
}

/// Reads a problem file into a dense cost matrix.
pub fn read_problem(path: &Path) -> Result<DMatrix<f64>, ReadError> {
    let file = File::open(path)?;
    parse_problem(BufReader::new(file))
}

/// Looks up the reference cost recorded for `problem` in an answer file.
pub fn lookup_answer(answers: &Path, problem: &Path) -> Result<f64, ReadError> {
    let file = File::open(answers)?;
    find_answer(BufReader::new(file), problem)
}

pub fn parse_problem<R: BufRead>(reader: R) -> Result<DMatrix<f64>, ReadError> {
    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
        if !tokens.is_empty() {
            lines.push((index + 1, tokens));
        }
    }

    let Some((size_line, size_tokens)) = lines.first() else {
        return Err(ReadError::Malformed {
            line: 1,
            reason: "missing problem size".to_owned(),
        });
    };
    let size_line = *size_line;
    let n: usize = parse_token(&size_tokens[0], size_line, "problem size")?;
    if n > MAX_DIM {
        return Err(ReadError::Malformed {
            line: size_line,
            reason: format!("problem size {n} exceeds {MAX_DIM}"),
        });
    }

    // tokens after the size on the same line can only be dense data
    let leftover = &size_tokens[1..];
    let body = &lines[1..];
    let sparse = leftover.is_empty() && body.first().is_some_and(|(_, tokens)| tokens.len() == 3);

    if sparse {
        parse_triples(n, body)
    } else {
        parse_dense(n, size_line, leftover, body)
    }
}

fn parse_dense(
    n: usize,
    size_line: usize,
    leftover: &[String],
    body: &[(usize, Vec<String>)],
) -> Result<DMatrix<f64>, ReadError> {
    let needed = n * n;
    let mut entries = Vec::with_capacity(needed);
    let tokens = leftover
        .iter()
        .map(|token| (size_line, token.as_str()))
        .chain(body.iter().flat_map(|(line, tokens)| {
            tokens.iter().map(move |token| (*line, token.as_str()))
        }));
    for (line, token) in tokens {
        if entries.len() == needed {
            break;
        }
        entries.push(parse_token::<f64>(token, line, "matrix entry")?);
    }
    if entries.len() < needed {
        return Err(ReadError::Malformed {
            line: body.last().map_or(size_line, |(line, _)| *line),
            reason: format!("expected {} matrix entries, found {}", needed, entries.len()),
        });
    }
    Ok(DMatrix::from_row_iterator(n, n, entries))
}

fn parse_triples(n: usize, body: &[(usize, Vec<String>)]) -> Result<DMatrix<f64>, ReadError> {
    let mut costs = DMatrix::from_element(n, n, f64::MAX);
    for (line, tokens) in body {
        if tokens.len() != 3 {
            return Err(ReadError::Malformed {
                line: *line,
                reason: format!(
                    "expected a `row col cost` triple, found {} tokens",
                    tokens.len()
                ),
            });
        }
        let row: usize = parse_token(&tokens[0], *line, "row index")?;
        let col: usize = parse_token(&tokens[1], *line, "column index")?;
        let cost: f64 = parse_token(&tokens[2], *line, "cost")?;
        if row == 0 || row > n || col == 0 || col > n {
            return Err(ReadError::Malformed {
                line: *line,
                reason: format!("cell ({row}, {col}) outside a {n} x {n} instance"),
            });
        }
        costs[(row - 1, col - 1)] = cost;
    }
    Ok(costs)
}

pub fn find_answer<R: BufRead>(reader: R, problem: &Path) -> Result<f64, ReadError> {
    let stem = problem
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if index == 0 {
            // header line
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if stem.ends_with(name) {
            return parse_token(value, index + 1, "reference cost");
        }
    }
    Err(ReadError::UnknownInstance(stem))
}

fn parse_token<T: FromStr>(token: &str, line: usize, what: &str) -> Result<T, ReadError> {
    token.parse().map_err(|_| ReadError::Malformed {
        line,
        reason: format!("expected {what}, found `{token}`"),
    })
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn dense_matrix_reads_row_major() {
        let costs = parse_problem(Cursor::new("2\n1 2\n3 4\n")).unwrap();
        assert_eq!(costs, DMatrix::from_row_slice(2, 2, &[1., 2., 3., 4.]));
    }

    #[test]
    fn dense_entries_may_straddle_lines() {
        let costs = parse_problem(Cursor::new("2 1 2\n3\n4\n")).unwrap();
        assert_eq!(costs, DMatrix::from_row_slice(2, 2, &[1., 2., 3., 4.]));
    }

    #[test]
    fn dense_trailing_tokens_are_ignored() {
        let costs = parse_problem(Cursor::new("2\n1 2 3 4 9 9\n")).unwrap();
        assert_eq!(costs, DMatrix::from_row_slice(2, 2, &[1., 2., 3., 4.]));
    }

    #[test]
    fn triples_leave_omitted_cells_unusable() {
        let costs = parse_problem(Cursor::new("3\n1 1 5\n2 2 6\n3 3 7\n")).unwrap();
        assert_eq!(costs[(0, 0)], 5.);
        assert_eq!(costs[(1, 1)], 6.);
        assert_eq!(costs[(2, 2)], 7.);
        assert_eq!(costs[(0, 1)], f64::MAX);
        assert_eq!(costs[(2, 0)], f64::MAX);
    }

    #[test]
    fn triples_keep_an_explicit_zero() {
        let costs = parse_problem(Cursor::new("2\n1 2 0\n2 1 3\n")).unwrap();
        assert_eq!(costs[(0, 1)], 0.);
        assert_eq!(costs[(1, 0)], 3.);
        assert_eq!(costs[(0, 0)], f64::MAX);
    }

    #[test]
    fn three_token_rows_select_the_triple_format() {
        // a 3 x 3 dense file is indistinguishable from triples and reads as
        // triples, each line filling one cell
        let costs = parse_problem(Cursor::new("3\n1 2 3\n2 3 1\n3 1 2\n")).unwrap();
        assert_eq!(costs[(0, 1)], 3.);
        assert_eq!(costs[(0, 0)], f64::MAX);
    }

    #[test]
    fn rejects_out_of_range_triples() {
        let err = parse_problem(Cursor::new("2\n3 1 5\n")).unwrap_err();
        assert!(matches!(err, ReadError::Malformed { line: 2, .. }));
    }

    #[test]
    fn rejects_short_dense_data() {
        let err = parse_problem(Cursor::new("2\n1 2\n")).unwrap_err();
        assert!(matches!(err, ReadError::Malformed { line: 2, .. }));
    }

    #[test]
    fn rejects_non_numeric_entries() {
        let err = parse_problem(Cursor::new("2\n1 x\n3 4\n")).unwrap_err();
        assert!(matches!(err, ReadError::Malformed { line: 2, .. }));
    }

    #[test]
    fn rejects_missing_size() {
        let err = parse_problem(Cursor::new("")).unwrap_err();
        assert!(matches!(err, ReadError::Malformed { line: 1, .. }));
    }

    #[test]
    fn rejects_oversized_dimension() {
        let err = parse_problem(Cursor::new("40000\n")).unwrap_err();
        assert!(matches!(err, ReadError::Malformed { line: 1, .. }));
    }

    #[test]
    fn answers_skip_the_header_line() {
        let answers = "assign800 111\nassign800 999.25\n";
        let value = find_answer(Cursor::new(answers), Path::new("assign800.txt")).unwrap();
        assert_eq!(value, 999.25);
    }

    #[test]
    fn answers_match_on_the_stem_suffix() {
        let answers = "instance optimum\nassign100 123.5\nassign800 999.25\n";
        let value = find_answer(Cursor::new(answers), Path::new("data/assign800.txt")).unwrap();
        assert_eq!(value, 999.25);
    }

    #[test]
    fn answers_report_unknown_instances() {
        let answers = "instance optimum\nassign100 123.5\n";
        let err = find_answer(Cursor::new(answers), Path::new("nowhere.txt")).unwrap_err();
        assert!(matches!(err, ReadError::UnknownInstance(stem) if stem == "nowhere"));
    }

    #[test]
    fn parsed_instance_solves_to_its_reference_cost() {
        let costs =
            parse_problem(Cursor::new("3\n1 2 2\n1 1 4\n2 3 3\n2 1 9\n3 1 1\n3 2 8\n")).unwrap();
        let reference = find_answer(Cursor::new("header\ntoy 6\n"), Path::new("cases/toy.txt"))
            .unwrap();

        let mut pairs = Vec::new();
        let total = crate::solve(&costs, &mut pairs).unwrap();
        assert_eq!(pairs, [(0, 1), (1, 2), (2, 0)]);
        assert!((total - reference).abs() < ANSWER_TOLERANCE);
    }
}
