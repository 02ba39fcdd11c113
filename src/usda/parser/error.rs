use std::fmt;
use std::ops::Range;

/// Line context for the most recent token consumed by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHighlight {
    pub line: usize,
    pub column: usize,
    pub line_text: String,
    pub pointer_line: String,
}

impl ErrorHighlight {
    /// Locate `span` in `source`. Returns `None` for empty sources.
    pub fn from_span(source: &str, span: Range<usize>) -> Option<Self> {
        if source.is_empty() {
            return None;
        }

        let mut offset = span.start.min(source.len());
        if offset == source.len() && offset > 0 {
            offset -= 1;
        }
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }

        let line_start = source[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        let line = source[..line_start].matches('\n').count() + 1;

        let line_end = source[line_start..]
            .find('\n')
            .map(|pos| line_start + pos)
            .unwrap_or(source.len());
        let line_text = source[line_start..line_end].trim_end_matches('\r').to_owned();

        let prefix = &source[line_start..offset];
        let column = prefix.chars().count() + 1;
        // Keep tabs so the caret lines up under tab-indented text.
        let mut pointer_line: String = prefix.chars().map(|ch| if ch == '\t' { '\t' } else { ' ' }).collect();
        pointer_line.push('^');

        Some(ErrorHighlight {
            line,
            column,
            line_text,
            pointer_line,
        })
    }
}

impl fmt::Display for ErrorHighlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} column {}\n{}\n{}",
            self.line, self.column, self.line_text, self.pointer_line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_second_line() {
        let source = "first\n\tsecond token\nthird";
        let start = source.find("token").unwrap();
        let highlight = ErrorHighlight::from_span(source, start..start + 5).unwrap();

        assert_eq!(highlight.line, 2);
        assert_eq!(highlight.column, 9);
        assert_eq!(highlight.line_text, "\tsecond token");
        assert_eq!(highlight.pointer_line, "\t       ^");
        assert_eq!(highlight.to_string(), "line 2 column 9\n\tsecond token\n\t       ^");
    }

    #[test]
    fn highlight_past_end() {
        let highlight = ErrorHighlight::from_span("abc", 10..12).unwrap();
        assert_eq!(highlight.line, 1);
        assert_eq!(highlight.column, 3);
        assert!(ErrorHighlight::from_span("", 0..1).is_none());
    }
}
