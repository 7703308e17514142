//! Enumerate-filter-delete flows for images, volumes and log groups.

mod ami;
mod ebs;
mod loggroup;

pub use ami::{AmiCleaner, IMAGE_CREATION_DATE_FORMAT, ImageInventory, parse_image_creation_date};
pub use ebs::{EbsCleaner, VolumeInventory};
pub use loggroup::{LogGroupCleaner, LogGroupInventory};

use tracing::error;

use crate::api::{ApiError, Page};

/// Drain a paginated listing; a failing page is logged and ends pagination.
fn drain_best_effort<T>(
    operation: &'static str,
    mut fetch: impl FnMut(Option<&str>) -> Result<Page<T>, ApiError>,
) -> Vec<T> {
    let mut items = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let page = match fetch(next_token.as_deref()) {
            Ok(page) => page,
            Err(err) => {
                error!(operation, error = %err, "listing failed, using partial results");
                return items;
            }
        };
        items.extend(page.items);
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_effort_keeps_pages_before_failure() {
        let items = drain_best_effort("DescribeVolumes", |token| match token {
            None => Ok(Page::more(vec!["vol-1"], "t1")),
            Some(_) => Err(ApiError::new("DescribeVolumes", "throttled")),
        });
        assert_eq!(items, vec!["vol-1"]);
    }
}
