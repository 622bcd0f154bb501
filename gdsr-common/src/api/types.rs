//! Stage-results, image and download wire types
//!
//! The results service speaks a mixed-case JSON dialect (`Items`,
//! `PEX_Consolidated`, `filterByLayout`); every rename lives here so the
//! rest of the workspace only sees Rust names.

use crate::filter::RangeFilter;
use crate::stage::Stage;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ========================================
// Items
// ========================================

/// One generated layout candidate ("GDS cell")
///
/// Every key other than `File` and `LayoutData` is a metric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique per stage and project, e.g. `INV_x1_0007`
    #[serde(rename = "File")]
    pub file_id: String,

    /// Opaque reference resolved by the image service
    #[serde(rename = "LayoutData", default)]
    pub layout_data_ref: String,

    /// Metric name → numeric or string value
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Value>,
}

impl Item {
    pub fn new(file_id: impl Into<String>, layout_data_ref: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            layout_data_ref: layout_data_ref.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Builder-style metric insertion
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    /// Cell name: the part of the file id before the first `_`
    pub fn cell_name(&self) -> &str {
        match self.file_id.split_once('_') {
            Some((cell, _)) => cell,
            None => &self.file_id,
        }
    }

    /// Numeric value of a metric; numeric strings are accepted
    pub fn metric_f64(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

// ========================================
// Filter query
// ========================================

/// Server-recognized technology-variation parameter selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level1Param {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    /// True when every value of the parameter is selected (no constraint)
    pub select_all_value: bool,
}

/// Level-1 and level-2 filter lists as sent to the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParametersName {
    pub filter_level1: Option<Vec<Level1Param>>,
    pub filter_level2: Option<Vec<RangeFilter>>,
}

/// Criteria-driven query: cell subset plus level-1/level-2 filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// When true the server ignores `cells`
    pub cell_select_all: bool,
    pub cells: Vec<String>,
    pub filter_parameters_name: FilterParametersName,
}

impl FilterCriteria {
    /// Criteria that select everything
    pub fn unfiltered() -> Self {
        Self {
            cell_select_all: true,
            cells: Vec::new(),
            filter_parameters_name: FilterParametersName::default(),
        }
    }

    /// True when the criteria constrain nothing
    pub fn is_unfiltered(&self) -> bool {
        self.cell_select_all
            && self.filter_parameters_name.filter_level1.is_none()
            && self.filter_parameters_name.filter_level2.is_none()
    }
}

/// Canonical query for one stage
///
/// A graph selection overrides every other filter; the two shapes are
/// mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterQuery {
    /// These exact items only
    ByLayout(Vec<String>),
    /// Level-1 / level-2 driven query
    ByCriteria(FilterCriteria),
}

impl FilterQuery {
    pub fn unfiltered() -> Self {
        FilterQuery::ByCriteria(FilterCriteria::unfiltered())
    }

    pub fn is_unfiltered(&self) -> bool {
        match self {
            FilterQuery::ByLayout(_) => false,
            FilterQuery::ByCriteria(criteria) => criteria.is_unfiltered(),
        }
    }

    /// Criteria part to send as `filter` (null when unconstrained or overridden)
    pub fn filter(&self) -> Option<&FilterCriteria> {
        match self {
            FilterQuery::ByCriteria(criteria) if !criteria.is_unfiltered() => Some(criteria),
            _ => None,
        }
    }

    /// Layout override to send as `filterByLayout`
    pub fn filter_by_layout(&self) -> Option<&[String]> {
        match self {
            FilterQuery::ByLayout(ids) => Some(ids),
            FilterQuery::ByCriteria(_) => None,
        }
    }

    /// Flattened wire form `{cellSelectAll, cells, filterParametersName, filterByLayout}`
    pub fn to_request(&self) -> FilterRequest {
        match self {
            FilterQuery::ByLayout(ids) => FilterRequest {
                cell_select_all: true,
                cells: Vec::new(),
                filter_parameters_name: None,
                filter_by_layout: Some(ids.clone()),
            },
            FilterQuery::ByCriteria(criteria) => FilterRequest {
                cell_select_all: criteria.cell_select_all,
                cells: criteria.cells.clone(),
                filter_parameters_name: Some(criteria.filter_parameters_name.clone()),
                filter_by_layout: None,
            },
        }
    }
}

/// Flattened filter request object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    pub cell_select_all: bool,
    pub cells: Vec<String>,
    pub filter_parameters_name: Option<FilterParametersName>,
    pub filter_by_layout: Option<Vec<String>>,
}

// ========================================
// Stage results
// ========================================

/// Body of a stage-results query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResultsRequest {
    pub project_id: String,
    pub stage: Stage,
    pub page_number: u32,
    pub filter: Option<FilterCriteria>,
    pub filter_by_layout: Option<Vec<String>>,
}

impl StageResultsRequest {
    pub fn new(project_id: &str, stage: Stage, page_number: u32, query: &FilterQuery) -> Self {
        Self {
            project_id: project_id.to_string(),
            stage,
            page_number,
            filter: query.filter().cloned(),
            filter_by_layout: query.filter_by_layout().map(<[String]>::to_vec),
        }
    }
}

/// Stage-results response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResultsResponse {
    #[serde(default)]
    pub status: String,
    pub data: StageResultsData,
}

/// One page of stage results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageResultsData {
    #[serde(rename = "Items", default)]
    pub items: Vec<Item>,

    #[serde(rename = "PEX_Consolidated", default)]
    pub pex_consolidated: Vec<Value>,

    #[serde(rename = "PageNumber", default)]
    pub page_number: u32,

    #[serde(rename = "PageSize", default)]
    pub page_size: u32,

    #[serde(rename = "TotalItems", default)]
    pub total_items: u64,

    #[serde(rename = "RemainingItems", default)]
    pub remaining_items: u64,

    #[serde(rename = "TotalGdsCount", default)]
    pub total_gds_count: u64,

    #[serde(rename = "selectedLayouts", default)]
    pub selected_layouts: Vec<String>,
}

// ========================================
// Images
// ========================================

/// Image response; `images` must line up with the requested refs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub file: String,
    pub encoded_image: String,
}

// ========================================
// Download
// ========================================

/// What a download covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DownloadType {
    /// Items pinned in the cart (1)
    Cart,
    /// Items matching the active filters or graph selection (2)
    Filtered,
    /// Every item of the stage (3)
    All,
    /// Summary report only (4)
    SummaryOnly,
}

impl TryFrom<u8> for DownloadType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(DownloadType::Cart),
            2 => Ok(DownloadType::Filtered),
            3 => Ok(DownloadType::All),
            4 => Ok(DownloadType::SummaryOnly),
            other => Err(Error::InvalidInput(format!("Unknown download type: {}", other))),
        }
    }
}

impl From<DownloadType> for u8 {
    fn from(kind: DownloadType) -> u8 {
        match kind {
            DownloadType::Cart => 1,
            DownloadType::Filtered => 2,
            DownloadType::All => 3,
            DownloadType::SummaryOnly => 4,
        }
    }
}

/// Body of a download request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPayload {
    pub project_id: String,
    pub stage: Stage,
    pub file_types: Vec<String>,
    pub filter: Option<FilterCriteria>,
    pub filter_by_layout: Option<Vec<String>>,
    pub download_type: DownloadType,
    pub file_list: Option<Vec<String>>,
}
