//! Range-retrieval planning.
//!
//! Pure translation of a `Range` header value against a known artifact
//! length into a concrete byte window. No I/O happens here, which keeps the
//! boundary cases exhaustively unit-testable.

use thiserror::Error;

const UNIT_PREFIX: &str = "bytes=";

/// Outcome of planning a retrieval against an artifact of known length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangePlan {
    /// No range requested; serve the whole artifact.
    Full,
    /// Serve the inclusive byte window `[start, end]`.
    Window { start: u64, end: u64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeRejection {
    #[error("invalid range format")]
    BadSyntax,
    #[error("multiple ranges are not supported")]
    Unsupported,
    #[error("requested range not satisfiable")]
    Unsatisfiable,
}

/// Resolve an optional `Range` header against `length` bytes of content.
///
/// Accepted forms after the `bytes=` prefix: `start-end`, `start-` (open
/// end) and `-N` (last N bytes). Comma-separated multi-range specs are
/// recognized but rejected as unsupported, distinct from malformed input.
pub fn plan(header: Option<&str>, length: u64) -> Result<RangePlan, RangeRejection> {
    let Some(header) = header else {
        return Ok(RangePlan::Full);
    };

    let spec = header
        .strip_prefix(UNIT_PREFIX)
        .ok_or(RangeRejection::BadSyntax)?;

    if spec.contains(',') {
        return Err(RangeRejection::Unsupported);
    }
    let spec = spec.trim();

    // -N: the last N bytes.
    if let Some(suffix) = spec.strip_prefix('-') {
        let n: u64 = suffix.parse().map_err(|_| RangeRejection::BadSyntax)?;
        if n == 0 || n > length {
            return Err(RangeRejection::Unsatisfiable);
        }
        return Ok(RangePlan::Window {
            start: length - n,
            end: length - 1,
        });
    }

    // start-: from start to the end of the artifact.
    if let Some(start) = spec.strip_suffix('-') {
        let start: u64 = start.parse().map_err(|_| RangeRejection::BadSyntax)?;
        if start >= length {
            return Err(RangeRejection::Unsatisfiable);
        }
        return Ok(RangePlan::Window {
            start,
            end: length - 1,
        });
    }

    // start-end, both inclusive.
    let (start, end) = spec.split_once('-').ok_or(RangeRejection::BadSyntax)?;
    let start: u64 = start.parse().map_err(|_| RangeRejection::BadSyntax)?;
    let end: u64 = end.parse().map_err(|_| RangeRejection::BadSyntax)?;
    if start > end || end >= length {
        return Err(RangeRejection::Unsatisfiable);
    }
    Ok(RangePlan::Window { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEN: u64 = 1000;

    #[test]
    fn no_header_serves_full_artifact() {
        assert_eq!(plan(None, LEN), Ok(RangePlan::Full));
    }

    #[test]
    fn bounded_window() {
        assert_eq!(
            plan(Some("bytes=0-499"), LEN),
            Ok(RangePlan::Window { start: 0, end: 499 })
        );
        assert_eq!(
            plan(Some("bytes=999-999"), LEN),
            Ok(RangePlan::Window {
                start: 999,
                end: 999
            })
        );
    }

    #[test]
    fn open_ended_window_runs_to_last_byte() {
        assert_eq!(
            plan(Some("bytes=500-"), LEN),
            Ok(RangePlan::Window {
                start: 500,
                end: 999
            })
        );
        assert_eq!(
            plan(Some("bytes=0-"), LEN),
            Ok(RangePlan::Window { start: 0, end: 999 })
        );
    }

    #[test]
    fn suffix_window_takes_last_n_bytes() {
        assert_eq!(
            plan(Some("bytes=-100"), LEN),
            Ok(RangePlan::Window {
                start: 900,
                end: 999
            })
        );
        // A suffix covering the whole artifact is valid.
        assert_eq!(
            plan(Some("bytes=-1000"), LEN),
            Ok(RangePlan::Window { start: 0, end: 999 })
        );
    }

    #[test]
    fn out_of_bounds_windows_are_unsatisfiable() {
        assert_eq!(
            plan(Some("bytes=1000-1005"), LEN),
            Err(RangeRejection::Unsatisfiable)
        );
        assert_eq!(
            plan(Some("bytes=0-1000"), LEN),
            Err(RangeRejection::Unsatisfiable)
        );
        assert_eq!(
            plan(Some("bytes=1000-"), LEN),
            Err(RangeRejection::Unsatisfiable)
        );
        assert_eq!(
            plan(Some("bytes=500-400"), LEN),
            Err(RangeRejection::Unsatisfiable)
        );
        assert_eq!(
            plan(Some("bytes=-0"), LEN),
            Err(RangeRejection::Unsatisfiable)
        );
        assert_eq!(
            plan(Some("bytes=-1001"), LEN),
            Err(RangeRejection::Unsatisfiable)
        );
    }

    #[test]
    fn empty_artifact_satisfies_no_window() {
        assert_eq!(plan(None, 0), Ok(RangePlan::Full));
        assert_eq!(plan(Some("bytes=0-"), 0), Err(RangeRejection::Unsatisfiable));
        assert_eq!(plan(Some("bytes=-1"), 0), Err(RangeRejection::Unsatisfiable));
        assert_eq!(plan(Some("bytes=0-0"), 0), Err(RangeRejection::Unsatisfiable));
    }

    #[test]
    fn multi_range_is_unsupported_not_malformed() {
        assert_eq!(
            plan(Some("bytes=0-499,600-699"), LEN),
            Err(RangeRejection::Unsupported)
        );
    }

    #[test]
    fn malformed_specs_are_bad_syntax() {
        assert_eq!(plan(Some("bytes=abc"), LEN), Err(RangeRejection::BadSyntax));
        assert_eq!(plan(Some("bytes=a-b"), LEN), Err(RangeRejection::BadSyntax));
        assert_eq!(plan(Some("bytes="), LEN), Err(RangeRejection::BadSyntax));
        assert_eq!(plan(Some("bits=0-499"), LEN), Err(RangeRejection::BadSyntax));
        assert_eq!(plan(Some("0-499"), LEN), Err(RangeRejection::BadSyntax));
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(
            plan(Some("bytes= 0-499 "), LEN),
            Ok(RangePlan::Window { start: 0, end: 499 })
        );
    }
}
