//! The constant-memory 2-way streaming merge that both the reduce
//! coordinator and library callers use to combine two sorted run files.

use std::io::{BufRead, Write};

/// Merges two sorted line streams into `out`, writing `s1` on ties.
/// Uses O(1) memory beyond the two held lines.
pub fn merge_sorted<R1: BufRead, R2: BufRead, W: Write>(
    mut f1: R1,
    mut f2: R2,
    out: &mut W,
) -> std::io::Result<()> {
    let mut line1 = String::new();
    let mut line2 = String::new();

    let mut has1 = read_line_trim(&mut f1, &mut line1)?;
    let mut has2 = read_line_trim(&mut f2, &mut line2)?;

    while has1 && has2 {
        if line1.as_bytes() < line2.as_bytes() {
            writeln!(out, "{line1}")?;
            has1 = read_line_trim(&mut f1, &mut line1)?;
        } else {
            writeln!(out, "{line2}")?;
            has2 = read_line_trim(&mut f2, &mut line2)?;
        }
    }

    if has1 {
        writeln!(out, "{line1}")?;
        copy_remaining(&mut f1, out)?;
    } else if has2 {
        writeln!(out, "{line2}")?;
        copy_remaining(&mut f2, out)?;
    }
    Ok(())
}

fn read_line_trim(reader: &mut impl BufRead, buf: &mut String) -> std::io::Result<bool> {
    buf.clear();
    let n = reader.read_line(buf)?;
    if n == 0 {
        return Ok(false);
    }
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(true)
}

fn copy_remaining<W: Write>(reader: &mut impl BufRead, out: &mut W) -> std::io::Result<()> {
    let mut line = String::new();
    while read_line_trim(reader, &mut line)? {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
