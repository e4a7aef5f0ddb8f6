//! The main-thread producer: reads the input line by line and packs it
//! into slabs for the sort workers.

use std::io::BufRead;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::pool::BufferPool;

/// Reads one line at a time, truncating to `max_line_len - 1` bytes and
/// dropping the trailing newline. Checks EOF *before* trusting whatever
/// was read into the buffer, which is the one thing the bug in the
/// original C++ implementation got wrong (it used stream extraction that
/// could leave a stale buffer after EOF and silently duplicate the last
/// line).
fn read_line(reader: &mut impl BufRead, max_line_len: usize) -> std::io::Result<Option<String>> {
    let mut raw = Vec::new();
    let bytes_read = reader.read_until(b'\n', &mut raw)?;
    if bytes_read == 0 {
        return Ok(None);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    if raw.len() > max_line_len - 1 {
        debug!(original_len = raw.len(), max_line_len, "truncating oversized line");
        raw.truncate(max_line_len - 1);
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Drains `reader` into slabs borrowed from `pool`, pushing each full (or
/// final partial) slab onto `pool.filled` and bumping `remaining_files`
/// once per slab pushed. Calls `finish()` on both queues once input is
/// exhausted.
pub fn run(
    mut reader: impl BufRead,
    max_line_len: usize,
    pool: &BufferPool,
    remaining_files: &AtomicUsize,
) -> std::io::Result<()> {
    let mut slab = pool.acquire();
    loop {
        match read_line(&mut reader, max_line_len)? {
            Some(line) => {
                slab.push(line);
                if slab.is_full() {
                    remaining_files.fetch_add(1, Ordering::Relaxed);
                    pool.filled.push(slab);
                    slab = pool.acquire();
                }
            }
            None => {
                if !slab.is_empty() {
                    remaining_files.fetch_add(1, Ordering::Relaxed);
                    pool.filled.push(slab);
                } else {
                    pool.release(slab);
                }
                break;
            }
        }
    }
    pool.filled.finish();
    pool.empty.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn truncates_oversized_lines() {
        let mut reader = Cursor::new(b"abcdef\n".to_vec());
        let line = read_line(&mut reader, 4).unwrap().unwrap();
        assert_eq!(line, "abc");
    }

    #[test]
    fn no_trailing_newline_does_not_duplicate_last_line() {
        let mut reader = Cursor::new(b"a\nb".to_vec());
        assert_eq!(read_line(&mut reader, 1000).unwrap().unwrap(), "a");
        assert_eq!(read_line(&mut reader, 1000).unwrap().unwrap(), "b");
        assert_eq!(read_line(&mut reader, 1000).unwrap(), None);
    }

    #[test]
    fn empty_input_pushes_nothing() {
        let pool = BufferPool::new(1, 4);
        let remaining = AtomicUsize::new(0);
        run(Cursor::new(Vec::new()), 1000, &pool, &remaining).unwrap();
        assert_eq!(remaining.load(Ordering::Relaxed), 0);
        assert!(pool.filled.try_pop().is_none());
    }
}
