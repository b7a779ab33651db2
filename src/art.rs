use std::sync::Arc;

/// Non-breaking space used when a row is prepared for display.
pub const NBSP: char = '\u{00A0}';

/// Block of fixed-pitch text art split into rows.
///
/// The rows are shared behind an `Arc` so the engine and the host can hold the
/// same art without copying it. Art is never patched in place: a reload builds
/// a new value and replaces the old one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextArt {
    rows: Arc<[String]>,
}

impl TextArt {
    /// Creates art from already split rows.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a raw payload on `\n`.
    ///
    /// An empty payload produces art with zero rows. A trailing `\r` on each
    /// row is dropped so payloads served with CRLF endings measure the same.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        Self::from_rows(raw.split('\n').map(|row| row.strip_suffix('\r').unwrap_or(row)))
    }

    /// Rows as parsed, without line endings.
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Number of rows, including a trailing empty one.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// `true` for art with zero rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Character count of the longest row, whitespace included.
    pub fn max_row_len(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.chars().count())
            .max()
            .unwrap_or(0)
    }

    /// Returns row `index` with every whitespace character replaced by a
    /// non-breaking space, so hosts that collapse whitespace keep the shape.
    ///
    /// The character count is unchanged.
    pub fn display_row(&self, index: usize) -> Option<String> {
        let row = self.rows.get(index)?;
        Some(
            row.chars()
                .map(|ch| if ch.is_whitespace() { NBSP } else { ch })
                .collect(),
        )
    }

    /// Iterates over all rows prepared for display.
    pub fn display_rows(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.rows.len()).filter_map(|i| self.display_row(i))
    }
}
