//! Degraded lists
//!
//! Forbidden list-only operations answer with an empty collection.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{AfterSuccessHook, HookContext};
use crate::platform::operations::TOKEN_LIST;
use crate::platform::{ApiError, ApiResponse};

/// A list-only operation and the JSON field holding its collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedList {
    pub operation_id: &'static str,
    pub collection_field: &'static str,
}

/// Answers 401/403 on list-only operations with an empty collection.
///
/// Some resources have no per-id read, only a list, and the list may be
/// forbidden for roles that can still create the resource. An empty list
/// keeps dependent create flows moving.
///
/// Known precision loss: callers reading from these lists can only pick
/// "first/any" matching item, never a specific one of several.
#[derive(Debug, Clone)]
pub struct DegradedListHook {
    lists: Vec<DegradedList>,
}

impl DegradedListHook {
    pub fn new(lists: Vec<DegradedList>) -> Self {
        Self { lists }
    }

    fn collection_for(&self, operation_id: &str) -> Option<&'static str> {
        self.lists
            .iter()
            .find(|l| l.operation_id == operation_id)
            .map(|l| l.collection_field)
    }
}

impl Default for DegradedListHook {
    fn default() -> Self {
        Self::new(vec![DegradedList {
            operation_id: TOKEN_LIST.operation_id,
            collection_field: "tokens",
        }])
    }
}

#[async_trait]
impl AfterSuccessHook for DegradedListHook {
    fn name(&self) -> &'static str {
        "degraded-list"
    }

    async fn after_success(
        &self,
        ctx: &HookContext<'_>,
        mut response: ApiResponse,
    ) -> Result<ApiResponse, ApiError> {
        let Some(field) = self.collection_for(ctx.operation.operation_id) else {
            return Ok(response);
        };

        if !matches!(response.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(response);
        }

        tracing::warn!(
            operation = ctx.operation.operation_id,
            status = response.status.as_u16(),
            "List not permitted, substituting an empty collection"
        );
        let mut collection = serde_json::Map::new();
        collection.insert(field.to_string(), serde_json::Value::Array(Vec::new()));
        let body = serde_json::Value::Object(collection).to_string();
        response.replace_json_body(StatusCode::OK, &body);
        Ok(response)
    }
}
