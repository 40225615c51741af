//! Input file reading. Everything is decoded as strict UTF-8; a bad byte
//! sequence fails the run rather than being silently repaired.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

use crate::constants::PAGE_SEPARATOR;
use crate::domain::PageText;
use crate::error::{MetricsError, Result};

/// Read a required input file as UTF-8
pub fn read_utf8(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => MetricsError::MissingInput(path.to_path_buf()),
        _ => MetricsError::Io(e),
    })?;
    String::from_utf8(bytes).map_err(|_| MetricsError::Encoding {
        path: path.to_path_buf(),
    })
}

/// Split extracted document text into pages on form feeds. Pages are numbered
/// from 1; blank pages keep their number but are dropped.
pub fn split_pages(text: &str) -> Vec<PageText> {
    text.split(PAGE_SEPARATOR)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| PageText {
            page: i as u32 + 1,
            text: page.to_string(),
        })
        .collect()
}

/// Read the text dump of a PDF, one page per form-feed separated chunk
pub fn read_pages(path: &Path) -> Result<Vec<PageText>> {
    let text = read_utf8(path)?;
    let pages = split_pages(&text);
    info!(path = %path.display(), pages = pages.len(), "loaded page text");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_pages_keeps_numbering() {
        let pages = split_pages("first page\x0c\x0cthird page\x0c");
        assert_eq!(
            pages,
            vec![
                PageText { page: 1, text: "first page".to_string() },
                PageText { page: 3, text: "third page".to_string() },
            ]
        );
    }

    #[test]
    fn test_missing_file_is_missing_input() {
        let err = read_utf8(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, MetricsError::MissingInput(_)));
    }

    #[test]
    fn test_invalid_utf8_fails_loudly() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"caf\xe9 35%").unwrap();
        let err = read_utf8(file.path()).unwrap_err();
        assert!(matches!(err, MetricsError::Encoding { .. }));
    }
}
