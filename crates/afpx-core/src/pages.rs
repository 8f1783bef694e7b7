//! Page-range parsing.
//!
//! Selections are written as comma-separated terms, where each term is a
//! single page (`5`) or an inclusive range (`2:4`). Range bounds may be
//! omitted: `:3` starts at page 1, `7:` runs to the last page, and `:`
//! selects every page. Empty terms are skipped. Page numbers are 1-based;
//! the parsed result is a 0-based set.
//!
//! ```
//! use afpx_core::pages::parse_page_range;
//!
//! let pages = parse_page_range("1:3, 5", 8).unwrap();
//! assert_eq!(pages.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 4]);
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Parses a page-range expression against a document of `total_pages`
/// pages, returning the selected pages as a sorted 0-based set.
///
/// Empty terms are skipped, so stray commas are harmless. Fails with
/// [`Error::InvalidPageRange`] on expressions that select no pages,
/// unparseable numbers, pages outside `1..=total_pages`, and ranges
/// whose start exceeds their end.
pub fn parse_page_range(spec: &str, total_pages: usize) -> Result<BTreeSet<usize>> {
    let mut pages = BTreeSet::new();
    for term in spec.split(',') {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        match term.split_once(':') {
            Some((start, end)) => {
                let start = parse_bound(start, 1)?;
                let end = parse_bound(end, total_pages)?;
                check_page(start, total_pages)?;
                check_page(end, total_pages)?;
                if start > end {
                    return Err(Error::invalid_page_range(format!(
                        "range start {} exceeds end {}",
                        start, end
                    )));
                }
                pages.extend(start - 1..end);
            }
            None => {
                let page = parse_number(term)?;
                check_page(page, total_pages)?;
                pages.insert(page - 1);
            }
        }
    }

    if pages.is_empty() {
        return Err(Error::invalid_page_range("no pages requested"));
    }
    Ok(pages)
}

fn parse_bound(text: &str, default: usize) -> Result<usize> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(default);
    }
    parse_number(text)
}

fn parse_number(text: &str) -> Result<usize> {
    text.parse()
        .map_err(|_| Error::invalid_page_range(format!("invalid page number '{}'", text)))
}

fn check_page(page: usize, total_pages: usize) -> Result<()> {
    if page < 1 {
        return Err(Error::invalid_page_range("page numbers start at 1"));
    }
    if page > total_pages {
        return Err(Error::invalid_page_range(format!(
            "page {} is out of range (document has {} pages)",
            page, total_pages
        )));
    }
    Ok(())
}
