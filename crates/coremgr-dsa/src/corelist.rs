use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::CoreId;

/// One token recognised by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Single(CoreId),
    Range {
        first: CoreId,
        last: CoreId,
        stride: usize,
    },
}

/// Left-to-right scanner over a core-list specification.
///
/// Tokens are `N`, `A-B[:S]` and `A..B[:S]`. Anything between tokens is filler and
/// is skipped. Ranges are tried before a bare integer, so `3-5` is one token while
/// `3-x` yields `3` and resumes after it.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(spec: &'a str) -> Self {
        Self {
            bytes: spec.as_bytes(),
            pos: 0,
        }
    }

    fn digit_at(&self, pos: usize) -> bool {
        self.bytes.get(pos).is_some_and(u8::is_ascii_digit)
    }

    /// Reads the digit run at the cursor. `None` on overflow, which ends the scan.
    fn number(&mut self) -> Option<CoreId> {
        let start = self.pos;
        let mut value: CoreId = 0;
        while let Some(&b) = self.bytes.get(self.pos).filter(|b| b.is_ascii_digit()) {
            let digit = CoreId::from(b - b'0');
            match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(v) => value = v,
                None => {
                    tracing::warn!(
                        "core list: number at offset {} overflows, ignoring the rest",
                        start
                    );
                    self.pos = self.bytes.len();
                    return None;
                }
            }
            self.pos += 1;
        }
        Some(value)
    }

    /// Consumes `sep` if it sits at the cursor and is followed by a digit.
    fn separator(&mut self, sep: &[u8]) -> bool {
        if self.bytes[self.pos..].starts_with(sep) && self.digit_at(self.pos + sep.len()) {
            self.pos += sep.len();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let skip = self.bytes[self.pos..].iter().position(u8::is_ascii_digit)?;
        self.pos += skip;

        let first = self.number()?;
        if !(self.separator(b"-") || self.separator(b"..")) {
            return Some(Token::Single(first));
        }
        let last = self.number()?;
        let stride = if self.separator(b":") {
            self.number()?
        } else {
            1
        };

        Some(Token::Range {
            first,
            last,
            stride: stride.max(1),
        })
    }
}

/// Expands a core-list specification into an explicit sequence of core IDs.
///
/// ```
/// use coremgr_dsa::parse_core_list;
///
/// assert_eq!(parse_core_list("0,1..3"), vec![0, 1, 2, 3]);
/// assert_eq!(parse_core_list("0-6:2"), vec![0, 2, 4, 6]);
/// ```
///
/// Order is preserved and duplicates are kept; overlapping ranges are a caller error.
/// Ranges are expanded without limit, so untrusted input should go through
/// [`parse_core_list_bounded`].
pub fn parse_core_list(spec: &str) -> Vec<CoreId> {
    let mut cores = Vec::new();
    for token in Scanner::new(spec) {
        expand(token, &mut cores);
    }
    cores
}

/// Like [`parse_core_list`], but fails with the offending core as soon as a token
/// names a core above `max`. Nothing beyond `max` is ever expanded.
///
/// ```
/// use coremgr_dsa::corelist::parse_core_list_bounded;
///
/// assert_eq!(parse_core_list_bounded("0-3", 1023), Ok(vec![0, 1, 2, 3]));
/// assert_eq!(parse_core_list_bounded("0-4000000000", 1023), Err(4000000000));
/// ```
pub fn parse_core_list_bounded(spec: &str, max: CoreId) -> Result<Vec<CoreId>, CoreId> {
    let mut cores = Vec::new();
    for token in Scanner::new(spec) {
        match token {
            Token::Single(core) if core > max => return Err(core),
            Token::Range { first, last, .. } if first <= last && last > max => return Err(last),
            _ => expand(token, &mut cores),
        }
    }
    Ok(cores)
}

fn expand(token: Token, cores: &mut Vec<CoreId>) {
    match token {
        Token::Single(core) => cores.push(core),
        Token::Range {
            first,
            last,
            stride,
        } => cores.extend((first..=last).step_by(stride)),
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Renders cores in kernel cpulist form, e.g. `0-3,8,10-11`.
///
/// The input does not need to be sorted; duplicates collapse.
pub fn format_core_list<I>(cores: I) -> String
where
    I: IntoIterator<Item = CoreId>,
{
    let mut sorted: Vec<CoreId> = cores.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = String::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if !out.is_empty() {
            out.push(',');
        }
        // Writing into a String cannot fail.
        let _ = if start == end {
            write!(out, "{start}")
        } else {
            write!(out, "{start}-{end}")
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_and_singles() {
        assert_eq!(parse_core_list("0-3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_core_list("0,1..3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_core_list("0,1,3"), vec![0, 1, 3]);
        assert_eq!(parse_core_list("7"), vec![7]);
    }

    #[test]
    fn test_stride() {
        assert_eq!(parse_core_list("0-3:2"), vec![0, 2]);
        assert_eq!(parse_core_list("1..9:4"), vec![1, 5, 9]);
        // Zero stride behaves as one.
        assert_eq!(parse_core_list("2-4:0"), vec![2, 3, 4]);
    }

    #[test]
    fn test_filler_is_skipped() {
        assert_eq!(parse_core_list("  0 , 2-3;cpu5"), vec![0, 2, 3, 5]);
        assert_eq!(parse_core_list("cores: 4..5"), vec![4, 5]);
    }

    #[test]
    fn test_dangling_separators() {
        // "3-" has no upper bound: bare 3, then nothing.
        assert_eq!(parse_core_list("3-"), vec![3]);
        assert_eq!(parse_core_list("3..x"), vec![3]);
        // A colon that is not followed by a digit is filler.
        assert_eq!(parse_core_list("0-1:,4"), vec![0, 1, 4]);
        // A stride is only honoured on ranges.
        assert_eq!(parse_core_list("6:2"), vec![6, 2]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert_eq!(parse_core_list("5-2"), Vec::<CoreId>::new());
        assert_eq!(parse_core_list("5-2,8"), vec![8]);
    }

    #[test]
    fn test_duplicates_kept() {
        assert_eq!(parse_core_list("0-2,1"), vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_no_tokens() {
        assert!(parse_core_list("").is_empty());
        assert!(parse_core_list("none").is_empty());
    }

    #[test]
    fn test_overflow_stops_scan() {
        assert_eq!(parse_core_list("1,99999999999999999999999,2"), vec![1]);
    }

    #[test]
    fn test_bounded_rejects_before_expanding() {
        assert_eq!(parse_core_list_bounded("0-3,8", 8), Ok(vec![0, 1, 2, 3, 8]));
        assert_eq!(parse_core_list_bounded("0-4000000000", 1023), Err(4000000000));
        assert_eq!(parse_core_list_bounded("1,2000", 1023), Err(2000));
        // Reversed ranges emit nothing, whatever their bounds.
        assert_eq!(parse_core_list_bounded("5000-2,1", 1023), Ok(vec![1]));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_core_list([0, 1, 2, 3]), "0-3");
        assert_eq!(format_core_list([11, 8, 10, 0]), "0,8,10-11");
        assert_eq!(format_core_list([2, 2, 3]), "2-3");
        assert_eq!(format_core_list([]), "");
    }
}
