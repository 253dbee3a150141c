//! Markup-structure analysis: exact element-kind tallies over the full
//! document tree plus path point density, and the derived complexity score.

use roxmltree::Document;
use tracing::debug;

use crate::MarkupParseError;

/// Element tallies over the full markup tree, nested groups included.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StructuralCounts {
    pub paths: usize,
    pub groups: usize,
    pub basic_shapes: usize,
    /// Subset of `basic_shapes`: circle, ellipse.
    pub round_shapes: usize,
    /// Subset of `basic_shapes`: rect.
    pub rect_shapes: usize,
    /// Subset of `basic_shapes`: polygon, polyline, line.
    pub poly_shapes: usize,
    pub text: usize,
    /// Sum over all paths of the drawing-segment count decoded from `d`.
    /// Paths whose `d` fails to decode contribute 0.
    pub path_point_total: usize,
}

impl StructuralCounts {
    /// Counted elements only; containers like the document root are not
    /// structural signal.
    pub fn total_elements(&self) -> usize {
        self.paths + self.groups + self.basic_shapes + self.text
    }

    /// Scalar complexity feeding the complexity-band weight of Strategy A.
    pub fn complexity_score(&self) -> f64 {
        5.0 * self.paths as f64 + 3.0 * self.basic_shapes as f64 + 0.1 * self.path_point_total as f64
    }
}

/// Tally element kinds and path point density for one document.
pub fn structural_counts(markup: &str) -> Result<StructuralCounts, MarkupParseError> {
    let doc = Document::parse(markup)?;
    let mut counts = StructuralCounts::default();

    for node in doc.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "path" => {
                counts.paths += 1;
                if let Some(d) = node.attribute("d") {
                    match count_path_segments(d) {
                        Ok(n) => counts.path_point_total += n,
                        // Arcs with bad flags, truncated commands and the
                        // like must not abort the whole analysis.
                        Err(err) => debug!(%err, "unparseable path data, counting 0 points"),
                    }
                }
            }
            "g" => counts.groups += 1,
            "circle" | "ellipse" => {
                counts.basic_shapes += 1;
                counts.round_shapes += 1;
            }
            "rect" => {
                counts.basic_shapes += 1;
                counts.rect_shapes += 1;
            }
            "polygon" | "polyline" | "line" => {
                counts.basic_shapes += 1;
                counts.poly_shapes += 1;
            }
            "text" => counts.text += 1,
            _ => {}
        }
    }

    Ok(counts)
}

#[derive(Debug, thiserror::Error)]
pub enum PathDataError {
    #[error("unexpected character {0:?} in path data")]
    UnexpectedChar(char),
    #[error("invalid number {0:?} in path data")]
    BadNumber(String),
    #[error("coordinates before any command")]
    MissingCommand,
    #[error("truncated parameters for command {0:?}")]
    TruncatedParameters(char),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Command(char),
    Number(f64),
}

fn tokenize_path(d: &str) -> Result<Vec<Token>, PathDataError> {
    let mut tokens = Vec::new();
    let bytes = d.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() || c == ',' {
            i += 1;
        } else if c.is_ascii_alphabetic() {
            if !"MmLlHhVvCcSsQqTtAaZz".contains(c) {
                return Err(PathDataError::UnexpectedChar(c));
            }
            tokens.push(Token::Command(c));
            i += 1;
        } else if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' {
            let start = i;
            let mut seen_dot = c == '.';
            let mut seen_exp = false;
            i += 1;
            while i < bytes.len() {
                let n = bytes[i] as char;
                let prev = bytes[i - 1] as char;
                let continues = n.is_ascii_digit()
                    // A second dot starts the next number ("-3.5.5").
                    || (n == '.' && !seen_dot)
                    || ((n == 'e' || n == 'E') && !seen_exp)
                    || ((n == '-' || n == '+') && (prev == 'e' || prev == 'E'));
                if continues {
                    if n == '.' {
                        seen_dot = true;
                    }
                    if n == 'e' || n == 'E' {
                        seen_exp = true;
                    }
                    i += 1;
                } else {
                    break;
                }
            }
            let text = &d[start..i];
            let value = text
                .parse::<f64>()
                .map_err(|_| PathDataError::BadNumber(text.to_string()))?;
            tokens.push(Token::Number(value));
        } else {
            return Err(PathDataError::UnexpectedChar(c));
        }
    }

    Ok(tokens)
}

fn parameter_count(cmd: char) -> usize {
    match cmd.to_ascii_uppercase() {
        'M' | 'L' | 'T' => 2,
        'H' | 'V' => 1,
        'C' => 6,
        'S' | 'Q' => 4,
        'A' => 7,
        _ => 0, // Z
    }
}

/// Decode a path `d` string into its drawing-segment count: one per line,
/// curve, arc or close command, including implicit command repeats. The
/// initial move of each `M` does not count; its implicit linetos do.
pub fn count_path_segments(d: &str) -> Result<usize, PathDataError> {
    let tokens = tokenize_path(d)?;
    let mut segments = 0usize;
    let mut current: Option<char> = None;
    let mut first_group = false;
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Command(cmd) => {
                current = Some(cmd);
                first_group = cmd == 'M' || cmd == 'm';
                if cmd == 'Z' || cmd == 'z' {
                    segments += 1;
                }
                i += 1;
            }
            Token::Number(_) => {
                let cmd = current.ok_or(PathDataError::MissingCommand)?;
                let params = parameter_count(cmd);
                if params == 0 {
                    // Numbers after Z are malformed.
                    return Err(PathDataError::UnexpectedChar(cmd));
                }
                if i + params > tokens.len()
                    || tokens[i..i + params]
                        .iter()
                        .any(|t| matches!(t, Token::Command(_)))
                {
                    return Err(PathDataError::TruncatedParameters(cmd));
                }
                if first_group {
                    first_group = false;
                } else {
                    segments += 1;
                }
                i += params;
            }
        }
    }

    Ok(segments)
}
