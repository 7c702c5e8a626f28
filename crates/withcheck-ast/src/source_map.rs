use crate::node::Pos;

/// Line start table used to turn byte offsets into line/column pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    line_starts: Vec<usize>,
}

/// A resolved position, both 1-based. The column counts chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for LineCol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl SourceMap {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0usize];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    #[must_use]
    pub fn resolve(&self, source: &str, pos: Pos) -> LineCol {
        let offset = pos.offset().min(source.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_idx).copied().unwrap_or(0);
        let column = source
            .get(line_start..offset)
            .map_or(offset - line_start, |prefix| prefix.chars().count());
        LineCol {
            line: line_idx + 1,
            column: column + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LineCol, SourceMap};
    use crate::Pos;

    #[test]
    fn resolves_offsets_across_lines() {
        let src = "ab\ncd\n\nef";
        let map = SourceMap::new(src);
        assert_eq!(map.resolve(src, Pos(0)), LineCol { line: 1, column: 1 });
        assert_eq!(map.resolve(src, Pos(1)), LineCol { line: 1, column: 2 });
        assert_eq!(map.resolve(src, Pos(3)), LineCol { line: 2, column: 1 });
        assert_eq!(map.resolve(src, Pos(7)), LineCol { line: 4, column: 1 });
        assert_eq!(map.resolve(src, Pos(100)), LineCol { line: 4, column: 3 });
    }

    #[test]
    fn columns_count_chars() {
        let src = "héllo {{ . }}";
        let map = SourceMap::new(src);
        let offset = src.find("{{").unwrap();
        assert_eq!(map.resolve(src, Pos(offset)), LineCol { line: 1, column: 7 });
    }
}
