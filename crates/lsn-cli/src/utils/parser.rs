use lsn::core::physics::ising::linspace;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid override '{0}'. Expected KEY=VALUE (e.g., 'ising.n-spins=50').")]
    InvalidKeyValue(String),

    #[error("Invalid {kind} value '{value}'.")]
    InvalidNumber { kind: &'static str, value: String },

    #[error("Invalid range '{0}'. Expected 'start:stop:count' with count >= 1.")]
    InvalidRange(String),

    #[error("Component '{component}' cannot be empty in '{input}'.")]
    EmptyComponent {
        component: &'static str,
        input: String,
    },
}

/// Splits a `-S` override at the first `=`.
pub fn parse_key_value(pair: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidKeyValue(pair.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "key",
            input: pair.to_string(),
        });
    }
    Ok((key, value.trim()))
}

pub fn parse_f64(value: &str) -> Result<f64, ParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            kind: "float",
            value: value.to_string(),
        })
}

pub fn parse_usize(value: &str) -> Result<usize, ParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            kind: "integer",
            value: value.to_string(),
        })
}

pub fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value.trim() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(ParseError::InvalidNumber {
            kind: "boolean",
            value: other.to_string(),
        }),
    }
}

/// Comma-separated list, each item parsed with `item`.
pub fn parse_list<T>(
    input: &str,
    item: impl Fn(&str) -> Result<T, ParseError>,
) -> Result<Vec<T>, ParseError> {
    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return Err(ParseError::EmptyComponent {
                    component: "list item",
                    input: input.to_string(),
                });
            }
            item(part)
        })
        .collect()
}

/// Parses a pair written `a,b`.
pub fn parse_pair(input: &str) -> Result<(f64, f64), ParseError> {
    match parse_list(input, parse_f64)?.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(ParseError::InvalidNumber {
            kind: "pair",
            value: input.to_string(),
        }),
    }
}

/// A temperature grid: either `start:stop:count` (evenly spaced, both ends included) or an
/// explicit comma-separated list.
pub fn parse_grid(input: &str) -> Result<Vec<f64>, ParseError> {
    if !input.contains(':') {
        return parse_list(input, parse_f64);
    }
    let parts: Vec<&str> = input.split(':').collect();
    let [start, stop, count] = parts.as_slice() else {
        return Err(ParseError::InvalidRange(input.to_string()));
    };
    let start = parse_f64(start)?;
    let stop = parse_f64(stop)?;
    let count = parse_usize(count)?;
    if count == 0 {
        return Err(ParseError::InvalidRange(input.to_string()));
    }
    Ok(linspace(start, stop, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_at_first_equals() {
        assert_eq!(
            parse_key_value("ising.temperatures=0.5:2.0:4"),
            Ok(("ising.temperatures", "0.5:2.0:4"))
        );
        assert_eq!(parse_key_value("tsp.p-lines=a=b"), Ok(("tsp.p-lines", "a=b")));
    }

    #[test]
    fn key_value_rejects_malformed_pairs() {
        assert_eq!(
            parse_key_value("ising.n-spins"),
            Err(ParseError::InvalidKeyValue("ising.n-spins".to_string()))
        );
        assert!(matches!(
            parse_key_value("=5"),
            Err(ParseError::EmptyComponent { component: "key", .. })
        ));
    }

    #[test]
    fn grid_accepts_ranges_and_lists() {
        assert_eq!(parse_grid("0.5:2.0:4").unwrap(), vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(parse_grid("0.5, 1.25").unwrap(), vec![0.5, 1.25]);
        assert_eq!(parse_grid("1.0").unwrap(), vec![1.0]);
    }

    #[test]
    fn grid_rejects_bad_ranges() {
        assert!(matches!(parse_grid("0.5:2.0"), Err(ParseError::InvalidRange(_))));
        assert!(matches!(parse_grid("0.5:2.0:0"), Err(ParseError::InvalidRange(_))));
        assert!(matches!(
            parse_grid("0.5:x:3"),
            Err(ParseError::InvalidNumber { kind: "float", .. })
        ));
    }

    #[test]
    fn lists_reject_empty_items() {
        assert!(matches!(
            parse_list("1,,2", parse_usize),
            Err(ParseError::EmptyComponent { .. })
        ));
        assert_eq!(parse_list("0, 1,2", parse_usize).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn pairs_need_exactly_two_values() {
        assert_eq!(parse_pair("1.0,0.5").unwrap(), (1.0, 0.5));
        assert!(parse_pair("1.0").is_err());
        assert!(parse_pair("1,2,3").is_err());
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
