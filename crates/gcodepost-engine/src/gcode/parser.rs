//! Linear move parser

use gcodepost_core::LinearMove;
use regex::Regex;
use std::sync::OnceLock;

/// Parser for the single-instruction `G1` grammar
///
/// A line is a move only when it consists of `G1` followed by space separated
/// `X`/`Y`/`Z`/`E` fields with a decimal value and/or an `F` field with an
/// integer value, each letter at most once, and nothing else. Anything that
/// does not match (comments, trailing comments, other codes) is not a move.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoveParser;

impl MoveParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    fn line_regex() -> &'static Regex {
        static LINE_REGEX: OnceLock<Regex> = OnceLock::new();
        LINE_REGEX.get_or_init(|| {
            Regex::new(r"^G1(?: +(?:[XYZE][-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)|F[0-9]+))+ *$")
                .expect("invalid regex pattern")
        })
    }

    /// Parse a line into a linear move
    ///
    /// Returns `None` for anything that is not a well-formed move. Never fails.
    pub fn parse(&self, line: &str) -> Option<LinearMove> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !Self::line_regex().is_match(line) {
            return None;
        }

        let mut mv = LinearMove::new();
        for token in line[2..].split_whitespace() {
            let (letter, value) = token.split_at(1);
            let value: f64 = value.parse().ok()?;
            let field = match letter {
                "X" => &mut mv.x,
                "Y" => &mut mv.y,
                "Z" => &mut mv.z,
                "E" => &mut mv.e,
                "F" => &mut mv.f,
                _ => return None,
            };
            // Each field at most once
            if field.replace(value).is_some() {
                return None;
            }
        }
        Some(mv)
    }
}

/// Parse a line with the default parser
pub fn parse_move(line: &str) -> Option<LinearMove> {
    MoveParser.parse(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_move() {
        let mv = parse_move("G1 X10.5 Y-3 Z.2 E0.12345 F1800").unwrap();
        assert_eq!(mv.x, Some(10.5));
        assert_eq!(mv.y, Some(-3.0));
        assert_eq!(mv.z, Some(0.2));
        assert_eq!(mv.e, Some(0.12345));
        assert_eq!(mv.f, Some(1800.0));
    }

    #[test]
    fn test_parse_any_order() {
        let mv = parse_move("G1 F2100 E-.8").unwrap();
        assert_eq!(mv.e, Some(-0.8));
        assert_eq!(mv.f, Some(2100.0));
        assert!(mv.x.is_none() && mv.y.is_none() && mv.z.is_none());
    }

    #[test]
    fn test_trailing_spaces_and_carriage_return() {
        assert!(parse_move("G1 X1 Y2 ").is_some());
        assert!(parse_move("G1 X1 Y2\r").is_some());
        assert!(parse_move("G1 X10.").is_some());
    }

    #[test]
    fn test_rejects_non_moves() {
        assert_eq!(parse_move(""), None);
        assert_eq!(parse_move("G1"), None);
        assert_eq!(parse_move("G1 X1 ; comment"), None);
        assert_eq!(parse_move("G0 X1"), None);
        assert_eq!(parse_move("G10 X1"), None);
        assert_eq!(parse_move("G1 X1 X2"), None);
        assert_eq!(parse_move("G1 F100.5"), None);
        assert_eq!(parse_move("G1 X"), None);
        assert_eq!(parse_move("G1 X1Y2"), None);
        assert_eq!(parse_move(";LAYER_CHANGE"), None);
        assert_eq!(parse_move("M107"), None);
    }
}
