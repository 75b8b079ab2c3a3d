/*************************************************************************************[dimacs.rs]
Copyright (c) 2021-2024, Ilona Prater

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

//! DIMACS input and output.
//!
//! The reader is a plain byte-level scanner feeding `add` calls. Strictness
//! levels: `0` ignores the header counts (`p cnf 0 0` is always legal), `1`
//! tolerates flexible whitespace but checks the clause count, `2` requires
//! canonical single-space header formatting. The `p inccnf` variant has no
//! clause count and accepts `a <lit>* 0` cube lines, collected into the
//! caller's cube buffer.

use std::io::{self, BufRead};

/// What the parser found besides the clauses it fed to the sink.
#[derive(Debug, Default)]
pub struct DimacsSummary {
    /// Maximum variable declared in the header (or seen, whichever larger).
    pub vars: i32,
    /// Whether the input was a `p inccnf` file.
    pub incremental: bool,
    /// Cubes from `a` lines, each terminated by zero.
    pub cubes: Vec<i32>,
}

/// Parse DIMACS from `input`, feeding every literal (zero included) of every
/// clause to `sink` in order.
pub fn parse<R: BufRead>(
    input: &mut R,
    strict: i32,
    accept_inccnf: bool,
    sink: &mut dyn FnMut(i32),
) -> io::Result<DimacsSummary> {
    let mut summary = DimacsSummary::default();
    let mut saw_header = false;
    let mut declared_clauses: i64 = -1;
    let mut read_clauses: i64 = 0;
    let mut max_seen: i32 = 0;

    loop {
        skip_whitespace(input)?;
        let ch = next_byte(input)?;
        match ch {
            None => break,
            Some(b'c') => skip_line(input)?,
            Some(b'p') => {
                if saw_header {
                    return parse_error("duplicate 'p' header");
                }
                saw_header = true;
                input.consume(1);
                if strict >= 2 {
                    expect(input, b" cnf ")
                        .or_else(|_| parse_error("expected single space separated 'p cnf' header"))?;
                    summary.vars = parse_int_strict(input)?;
                    expect(input, b" ")?;
                    declared_clauses = parse_int_strict(input)? as i64;
                    match next_byte(input)? {
                        Some(b'\n') => input.consume(1),
                        Some(b'\r') => skip_line(input)?,
                        _ => return parse_error("trailing characters after strict header"),
                    }
                } else {
                    skip_inline_whitespace(input)?;
                    if accept_inccnf && peek_word(input, b"inccnf")? {
                        consume_word(input, b"inccnf")?;
                        summary.incremental = true;
                        continue;
                    }
                    expect(input, b"cnf")
                        .or_else(|_| parse_error("expected 'cnf' after 'p'"))?;
                    summary.vars = parse_int(input)?;
                    declared_clauses = parse_int(input)? as i64;
                }
            }
            Some(b'a') if summary.incremental => {
                input.consume(1);
                loop {
                    let lit = parse_int(input)?;
                    summary.cubes.push(lit);
                    if lit == 0 {
                        break;
                    }
                    max_seen = max_seen.max(lit.abs());
                }
            }
            Some(_) => {
                // a clause
                loop {
                    let lit = parse_int(input)?;
                    if lit == i32::MIN {
                        return parse_error("literal out of range");
                    }
                    sink(lit);
                    if lit == 0 {
                        break;
                    }
                    max_seen = max_seen.max(lit.abs());
                }
                read_clauses += 1;
            }
        }
    }

    if strict >= 1 && !summary.incremental {
        if !saw_header {
            return parse_error("missing 'p cnf' header");
        }
        if declared_clauses >= 0 && declared_clauses != read_clauses {
            return parse_error("clause count does not match 'p cnf' header");
        }
        if max_seen > summary.vars {
            return parse_error("variable index exceeds 'p cnf' header");
        }
    }
    summary.vars = summary.vars.max(max_seen);
    Ok(summary)
}

/// Parse a solution in competition output format (`s` and `v` lines).
/// Returns the literals claimed true, one per variable mentioned.
pub fn parse_solution<R: BufRead>(input: &mut R) -> io::Result<Vec<i32>> {
    let mut lits = vec![];
    let mut claimed_sat = false;
    loop {
        skip_whitespace(input)?;
        match next_byte(input)? {
            None => break,
            Some(b'c') => skip_line(input)?,
            Some(b's') => {
                input.consume(1);
                skip_inline_whitespace(input)?;
                if peek_word(input, b"SATISFIABLE")? {
                    claimed_sat = true;
                }
                skip_line(input)?;
            }
            Some(b'v') => {
                input.consume(1);
                loop {
                    skip_inline_whitespace(input)?;
                    match next_byte(input)? {
                        Some(b'\n') | None => break,
                        _ => {}
                    }
                    let lit = parse_int(input)?;
                    if lit == 0 {
                        break;
                    }
                    lits.push(lit);
                }
            }
            Some(_) => skip_line(input)?,
        }
    }
    if !claimed_sat {
        return parse_error("solution file claims no satisfiable result");
    }
    Ok(lits)
}

/// Render clauses in DIMACS, one per line, `p cnf` header first.
pub fn write<W: io::Write>(
    out: &mut W,
    max_var: i32,
    clauses: &[Vec<i32>],
) -> io::Result<()> {
    writeln!(out, "p cnf {} {}", max_var, clauses.len())?;
    for clause in clauses {
        for lit in clause {
            write!(out, "{} ", lit)?;
        }
        writeln!(out, "0")?;
    }
    Ok(())
}

/*--------------------------------------------------------------- scanning */

fn next_byte<R: BufRead>(input: &mut R) -> io::Result<Option<u8>> {
    Ok(input.fill_buf()?.first().copied())
}

#[inline(always)]
fn is_space(ch: u8) -> bool {
    (b'\x09'..=b'\x0d').contains(&ch) || ch == b' '
}

fn skip_whitespace<R: BufRead>(input: &mut R) -> io::Result<()> {
    while let Some(ch) = next_byte(input)? {
        if !is_space(ch) {
            break;
        }
        input.consume(1);
    }
    Ok(())
}

fn skip_inline_whitespace<R: BufRead>(input: &mut R) -> io::Result<()> {
    while let Some(ch) = next_byte(input)? {
        if ch != b' ' && ch != b'\t' {
            break;
        }
        input.consume(1);
    }
    Ok(())
}

fn skip_line<R: BufRead>(input: &mut R) -> io::Result<()> {
    while let Some(ch) = next_byte(input)? {
        input.consume(1);
        if ch == b'\n' {
            break;
        }
    }
    Ok(())
}

fn expect<R: BufRead>(input: &mut R, word: &[u8]) -> io::Result<()> {
    for &expected in word {
        match next_byte(input)? {
            Some(ch) if ch == expected => input.consume(1),
            _ => return parse_error("unexpected character"),
        }
    }
    Ok(())
}

fn peek_word<R: BufRead>(input: &mut R, word: &[u8]) -> io::Result<bool> {
    let buf = input.fill_buf()?;
    Ok(buf.starts_with(word))
}

fn consume_word<R: BufRead>(input: &mut R, word: &[u8]) -> io::Result<()> {
    expect(input, word)
}

fn parse_int<R: BufRead>(input: &mut R) -> io::Result<i32> {
    skip_whitespace(input)?;
    parse_int_strict(input)
}

fn parse_int_strict<R: BufRead>(input: &mut R) -> io::Result<i32> {
    let ch = next_byte(input)?;
    let neg = if ch == Some(b'+') || ch == Some(b'-') {
        input.consume(1);
        ch == Some(b'-')
    } else {
        false
    };
    match next_byte(input)? {
        Some(ch) if ch.is_ascii_digit() => {}
        Some(ch) => {
            return parse_error(&format!("unexpected character '{}'", ch as char));
        }
        None => return parse_error("unexpected end of file"),
    }
    let mut val: i64 = 0;
    while let Some(ch) = next_byte(input)? {
        if !ch.is_ascii_digit() {
            break;
        }
        input.consume(1);
        val = val * 10 + (ch - b'0') as i64;
        if val > i32::MAX as i64 {
            return parse_error("number too large");
        }
    }
    Ok(if neg { -(val as i32) } else { val as i32 })
}

fn parse_error<T>(message: &str) -> io::Result<T> {
    Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("PARSE ERROR! {}", message),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn collect(input: &str, strict: i32) -> io::Result<(DimacsSummary, Vec<i32>)> {
        let mut lits = vec![];
        let mut cur = Cursor::new(input.as_bytes());
        let summary = parse(&mut cur, strict, true, &mut |l| lits.push(l))?;
        Ok((summary, lits))
    }

    #[test]
    fn test_parse_simple_cnf() {
        let (summary, lits) = collect("c comment\np cnf 2 2\n1 -2 0\n2 0\n", 1).unwrap();
        assert_eq!(summary.vars, 2);
        assert!(!summary.incremental);
        assert_eq!(lits, vec![1, -2, 0, 2, 0]);
    }

    #[test]
    fn test_nonstrict_accepts_empty_header() {
        let (summary, lits) = collect("p cnf 0 0\n1 2 0\n", 0).unwrap();
        assert_eq!(summary.vars, 2);
        assert_eq!(lits, vec![1, 2, 0]);
    }

    #[test]
    fn test_strict_checks_clause_count() {
        assert!(collect("p cnf 2 3\n1 0\n", 1).is_err());
        assert!(collect("p cnf 1 1\n2 0\n", 1).is_err());
    }

    #[test]
    fn test_very_strict_header_format() {
        assert!(collect("p cnf 2 1\n1 2 0\n", 2).is_ok());
        assert!(collect("p  cnf 2 1\n1 2 0\n", 2).is_err());
    }

    #[test]
    fn test_inccnf_cubes() {
        let (summary, lits) = collect("p inccnf\n1 2 0\na 1 0\na -1 2 0\n", 0).unwrap();
        assert!(summary.incremental);
        assert_eq!(lits, vec![1, 2, 0]);
        assert_eq!(summary.cubes, vec![1, 0, -1, 2, 0]);
    }

    #[test]
    fn test_parse_solution() {
        let mut cur = Cursor::new(&b"c ok\ns SATISFIABLE\nv 1 -2\nv 3 0\n"[..]);
        let lits = parse_solution(&mut cur).unwrap();
        assert_eq!(lits, vec![1, -2, 3]);
    }

    #[test]
    fn test_write_roundtrip() {
        let clauses = vec![vec![1, -2], vec![2]];
        let mut out = vec![];
        write(&mut out, 2, &clauses).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "p cnf 2 2\n1 -2 0\n2 0\n");
        let (_, lits) = {
            let mut l = vec![];
            let mut cur = Cursor::new(text.as_bytes());
            let s = parse(&mut cur, 1, false, &mut |x| l.push(x)).unwrap();
            (s, l)
        };
        assert_eq!(lits, vec![1, -2, 0, 2, 0]);
    }
}
