use aws_sdk_dynamodb::types::AttributeValue;
use std::{collections::HashMap, sync::Arc};

use crate::Error;
use crate::write::Item;

/// Parameters of a parallel full-table scan
///
/// Everything except the segment index and the continuation token, which are
/// carried by each [`ScanUnit`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRequest {
    table_name: String,
    total_segments: Option<i32>,
    index_name: Option<String>,
    filter_expression: Option<String>,
    projection_expression: Option<String>,
    expression_attribute_names: Option<HashMap<String, String>>,
    expression_attribute_values: Option<Item>,
    limit: Option<i32>,
    consistent_read: Option<bool>,
}

impl ScanRequest {
    /// Scan of `table_name`; set the segment count with [`Self::with_total_segments`]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Number of segments the scan is split into
    pub fn with_total_segments(mut self, total_segments: i32) -> Self {
        self.total_segments = Some(total_segments);
        self
    }

    /// Scan a secondary index instead of the base table
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Filter applied by the store after reading each page
    pub fn with_filter_expression(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    /// Attributes to return
    pub fn with_projection_expression(mut self, expression: impl Into<String>) -> Self {
        self.projection_expression = Some(expression.into());
        self
    }

    /// Substitution for an attribute name placeholder such as `#n`
    pub fn with_expression_attribute_name(
        mut self,
        placeholder: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let _ = self
            .expression_attribute_names
            .get_or_insert_with(HashMap::new)
            .insert(placeholder.into(), name.into());
        self
    }

    /// Substitution for a value placeholder such as `:v`
    pub fn with_expression_attribute_value(
        mut self,
        placeholder: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        let _ = self
            .expression_attribute_values
            .get_or_insert_with(HashMap::new)
            .insert(placeholder.into(), value);
        self
    }

    /// Maximum number of items evaluated per page
    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Request strongly consistent reads
    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = Some(consistent_read);
        self
    }

    /// Table to scan
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Number of segments, if set
    pub fn total_segments(&self) -> Option<i32> {
        self.total_segments
    }

    /// Secondary index name
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// Filter expression
    pub fn filter_expression(&self) -> Option<&str> {
        self.filter_expression.as_deref()
    }

    /// Projection expression
    pub fn projection_expression(&self) -> Option<&str> {
        self.projection_expression.as_deref()
    }

    /// Attribute name placeholders
    pub fn expression_attribute_names(&self) -> Option<&HashMap<String, String>> {
        self.expression_attribute_names.as_ref()
    }

    /// Value placeholders
    pub fn expression_attribute_values(&self) -> Option<&Item> {
        self.expression_attribute_values.as_ref()
    }

    /// Page size limit
    pub fn limit(&self) -> Option<i32> {
        self.limit
    }

    /// Consistent read flag
    pub fn consistent_read(&self) -> Option<bool> {
        self.consistent_read
    }
}

/// One segment of a scan, positioned at a continuation token
#[derive(Clone, Debug, PartialEq)]
pub struct ScanUnit {
    request: Arc<ScanRequest>,
    segment: i32,
    exclusive_start_key: Option<Item>,
}

impl ScanUnit {
    /// First page of `segment`
    pub fn new(request: Arc<ScanRequest>, segment: i32) -> Self {
        Self {
            request,
            segment,
            exclusive_start_key: None,
        }
    }

    /// Shared scan parameters
    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    /// Segment index in `0..total_segments`
    pub fn segment(&self) -> i32 {
        self.segment
    }

    /// Continuation token; `None` for the first page
    pub fn exclusive_start_key(&self) -> Option<&Item> {
        self.exclusive_start_key.as_ref()
    }

    /// The unit positioned after `page`, or `None` when the segment is done
    pub fn next_page(&self, page: &super::ScanPage) -> Option<ScanUnit> {
        if !page.has_more() {
            return None;
        }

        Some(Self {
            request: Arc::clone(&self.request),
            segment: self.segment,
            exclusive_start_key: page.last_evaluated_key.clone(),
        })
    }
}

/// Reject scans without a positive segment count
pub fn validate(request: &ScanRequest) -> Result<i32, Error> {
    match request.total_segments {
        Some(total) if total > 0 => Ok(total),
        _ => Err(Error::config(
            "TotalSegments is required with the scan request and must be greater than zero",
        )),
    }
}

/// Fan a scan out into one unit per segment
pub fn split(request: ScanRequest) -> Result<Vec<ScanUnit>, Error> {
    let total = validate(&request)?;
    let request = Arc::new(request);

    Ok((0..total)
        .map(|segment| ScanUnit::new(Arc::clone(&request), segment))
        .collect())
}
