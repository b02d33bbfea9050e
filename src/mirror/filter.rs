use crate::mirror::item::Item;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageVerdict {
    pub fresh: Vec<Item>,
    pub stop: bool,
}

/// Split one newest-first page against the watermark.
///
/// Items published strictly after `watermark` are fresh. The first item at
/// or before it ends the scan and asks the caller to stop paginating, since
/// everything after it on this and later pages is older still. Without a
/// watermark every item is fresh and pagination never stops early.
pub fn filter_page(page: Vec<Item>, watermark: Option<DateTime<Utc>>) -> PageVerdict {
    let Some(mark) = watermark else {
        return PageVerdict {
            fresh: page,
            stop: false,
        };
    };

    let mut fresh = Vec::with_capacity(page.len());
    for item in page {
        if item.published_at <= mark {
            return PageVerdict { fresh, stop: true };
        }
        fresh.push(item);
    }
    PageVerdict { fresh, stop: false }
}
