use std::collections::HashMap;

/// Column positions of one table header, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut header = Self::default();
        for column in columns {
            header.push(column.into());
        }
        header
    }

    pub fn from_line(line: &str) -> Self {
        Self::new(line.trim_end_matches(&['\n', '\r'][..]).split('\t'))
    }

    /// Header from a raw line; bytes that are not UTF-8 are decoded lossily.
    pub fn from_bytes(line: &[u8]) -> Self {
        Self::from_line(&String::from_utf8_lossy(line))
    }

    fn push(&mut self, column: String) {
        // repeated names resolve to their first position
        self.positions
            .entry(column.to_ascii_lowercase())
            .or_insert(self.columns.len());
        self.columns.push(column);
    }

    /// Returns a copy extended by every name not already present, in order.
    pub fn with_appended<S: AsRef<str>>(&self, extra: &[S]) -> Self {
        let mut header = self.clone();
        for name in extra {
            let name = name.as_ref();
            if !header.contains(name) {
                header.push(name.to_string());
            }
        }
        header
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn to_line(&self) -> String {
        self.columns.join("\t")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line_is_case_insensitive() {
        let header = HeaderIndex::from_line("Hugo_Symbol\tChromosome\tCenter\r\n");
        assert_eq!(header.len(), 3);
        assert_eq!(header.position("chromosome"), Some(1));
        assert_eq!(header.position("CENTER"), Some(2));
        assert_eq!(header.position("Score"), None);
        assert_eq!(header.to_line(), "Hugo_Symbol\tChromosome\tCenter");
    }

    #[test]
    fn test_with_appended_keeps_order_and_skips_present() {
        let header = HeaderIndex::from_line("Hugo_Symbol\tCenter");
        let unified = header.with_appended(&["center", "Score", "Sequencer"]);
        assert_eq!(
            unified.columns(),
            &["Hugo_Symbol", "Center", "Score", "Sequencer"]
        );
        assert_eq!(unified.position("sequencer"), Some(3));
        assert_eq!(header.len(), 2);
    }

    #[test]
    fn test_repeated_column_keeps_first_position() {
        let header = HeaderIndex::from_line("A\tB\ta");
        assert_eq!(header.len(), 3);
        assert_eq!(header.position("A"), Some(0));
    }
}
