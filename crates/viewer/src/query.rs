//! Page query parameters.

use url::Url;

/// `?row=R&col=C` selection. With a row the page shows only the cells
/// whose box starts on that row; with a column too, only the one starting
/// at that row and column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub row: Option<u32>,
    pub col: Option<u32>,
}

impl PageQuery {
    /// Parse a query string, with or without the leading `?`. Values that
    /// are not grid coordinates are ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "row" => &mut parsed.row,
                "col" => &mut parsed.col,
                _ => continue,
            };
            // First occurrence wins.
            if slot.is_some() {
                continue;
            }
            match value.trim().parse::<u32>() {
                Ok(n) => *slot = Some(n),
                Err(_) => log::warn!("ignoring {key}={value:?} in page query"),
            }
        }
        parsed
    }

    /// Query of a full page URL.
    pub fn from_url(page_url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(page_url)?;
        Ok(Self::parse(url.query().unwrap_or("")))
    }

    /// Partial-row mode is on. A column without a row selects nothing.
    pub fn is_partial(&self) -> bool {
        self.row.is_some()
    }

    pub fn is_single_cell(&self) -> bool {
        self.row.is_some() && self.col.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_and_col() {
        let q = PageQuery::parse("?row=2&col=1");
        assert_eq!(q, PageQuery { row: Some(2), col: Some(1) });
        assert!(q.is_single_cell());
    }

    #[test]
    fn test_row_only() {
        let q = PageQuery::parse("row=3&theme=dark");
        assert_eq!(q, PageQuery { row: Some(3), col: None });
        assert!(q.is_partial());
        assert!(!q.is_single_cell());
    }

    #[test]
    fn test_col_without_row_is_full_page() {
        assert!(!PageQuery::parse("col=4").is_partial());
    }

    #[test]
    fn test_bad_values_ignored() {
        assert_eq!(PageQuery::parse("row=abc&col=-1"), PageQuery::default());
        assert_eq!(PageQuery::parse(""), PageQuery::default());
    }

    #[test]
    fn test_from_url() {
        let q = PageQuery::from_url("http://host/dashboards/sales?row=0&col=%36").unwrap();
        assert_eq!(q, PageQuery { row: Some(0), col: Some(6) });
        assert_eq!(PageQuery::from_url("http://host/d").unwrap(), PageQuery::default());
    }
}
