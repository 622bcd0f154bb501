//! Download planning
//!
//! Chooses what a download covers and builds the request body. Precedence:
//! summary-only, then the cart, then the active filters, then everything.

use gdsr_common::api::{DownloadPayload, DownloadType, FilterQuery};
use gdsr_common::Stage;

/// User choices for one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub file_types: Vec<String>,
    pub summary_only: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            file_types: vec!["gds".to_string()],
            summary_only: false,
        }
    }
}

pub fn download_type(summary_only: bool, cart_is_empty: bool, filter_active: bool) -> DownloadType {
    if summary_only {
        DownloadType::SummaryOnly
    } else if !cart_is_empty {
        DownloadType::Cart
    } else if filter_active {
        DownloadType::Filtered
    } else {
        DownloadType::All
    }
}

/// Build the download body for a stage
///
/// `file_list` is only sent for cart downloads.
pub fn plan_download(
    project_id: &str,
    stage: Stage,
    options: &DownloadOptions,
    cart: Vec<String>,
    query: &FilterQuery,
    filter_active: bool,
) -> DownloadPayload {
    let download_type = download_type(options.summary_only, cart.is_empty(), filter_active);

    DownloadPayload {
        project_id: project_id.to_string(),
        stage,
        file_types: options.file_types.clone(),
        filter: query.filter().cloned(),
        filter_by_layout: query.filter_by_layout().map(<[String]>::to_vec),
        download_type,
        file_list: (download_type == DownloadType::Cart).then_some(cart),
    }
}
