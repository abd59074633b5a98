use std::str::FromStr;

/// Parsed form of an index-range string such as `"3"`, `"1:4"` or `"1:2,0:3"`.
///
/// Only the syntax is of interest to the subscription layer: a malformed
/// range fails monitored-item creation with `BadIndexRangeInvalid`, the
/// actual slicing happens wherever values are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericRange {
    /// Single element, e.g. `"3"`.
    Index(u32),
    /// Inclusive range with `min < max`, e.g. `"1:4"`.
    Range(u32, u32),
    /// One sub-range per dimension, e.g. `"1:2,0:3"`.
    MultipleRanges(Vec<NumericRange>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericRangeError;

impl FromStr for NumericRange {
    type Err = NumericRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NumericRangeError);
        }
        if s.contains(',') {
            let ranges = s
                .split(',')
                .map(parse_dimension)
                .collect::<Result<Vec<_>, _>>()?;
            if ranges.len() < 2 {
                return Err(NumericRangeError);
            }
            Ok(NumericRange::MultipleRanges(ranges))
        } else {
            parse_dimension(s)
        }
    }
}

fn parse_dimension(s: &str) -> Result<NumericRange, NumericRangeError> {
    match s.split_once(':') {
        None => Ok(NumericRange::Index(parse_bound(s)?)),
        Some((min, max)) => {
            let min = parse_bound(min)?;
            let max = parse_bound(max)?;
            // Part 4: the lower bound must be strictly less than the upper.
            if min >= max {
                return Err(NumericRangeError);
            }
            Ok(NumericRange::Range(min, max))
        }
    }
}

fn parse_bound(s: &str) -> Result<u32, NumericRangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumericRangeError);
    }
    s.parse::<u32>().map_err(|_| NumericRangeError)
}

#[cfg(test)]
mod tests {
    use super::NumericRange;

    #[test]
    fn accepts_index_range_and_multi_dimension_forms() {
        assert_eq!("3".parse::<NumericRange>(), Ok(NumericRange::Index(3)));
        assert_eq!("1:4".parse::<NumericRange>(), Ok(NumericRange::Range(1, 4)));
        assert_eq!(
            "1:2,0:3".parse::<NumericRange>(),
            Ok(NumericRange::MultipleRanges(vec![
                NumericRange::Range(1, 2),
                NumericRange::Range(0, 3),
            ]))
        );
    }

    #[test]
    fn rejects_malformed_ranges() {
        for bad in ["", ":", "4:1", "2:2", "1:", ":4", "a", "1:b", "1,", "-1", "1 :2"] {
            assert!(bad.parse::<NumericRange>().is_err(), "accepted {bad:?}");
        }
    }
}
