//! 投放查询处理器
//!
//! 查询参数以原始键值对接收，必填项与分页参数在这里解析，
//! 其余键作为附加投放维度交给服务层校验。

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json,
    extract::{Query, State},
    http::{Method, Uri},
};
use tracing::instrument;

use crate::{
    error::{DeliveryError, Result},
    models::{CampaignSummary, DimensionQuery, PageRequest},
    state::AppState,
};

/// 必填的基础维度
const BASE_DIMENSIONS: [&str; 3] = ["app", "country", "os"];

/// 取必填参数，空字符串视为缺失
fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DeliveryError::MissingParameter(name.to_string()))
}

fn required_number(params: &HashMap<String, String>, name: &str) -> Result<u64> {
    required(params, name)?
        .parse::<u64>()
        .map_err(|e| DeliveryError::InvalidParameter {
            field: name.to_string(),
            message: e.to_string(),
        })
}

/// 把查询参数拆成维度与分页
fn parse_dimension_query(params: HashMap<String, String>) -> Result<DimensionQuery> {
    for name in BASE_DIMENSIONS {
        required(&params, name)?;
    }
    let limit = required_number(&params, "limit")?;
    let page = required_number(&params, "page")?;

    let dimensions: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(name, _)| name != "limit" && name != "page")
        .collect();

    Ok(DimensionQuery::new(dimensions, PageRequest::new(limit, page)))
}

/// 多维度分页查询
///
/// GET /v1/delivery?app=&country=&os=&limit=&page=[&<dimension>=...]
#[instrument(skip(state))]
pub async fn get_delivery(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<CampaignSummary>>> {
    let query = parse_dimension_query(params)?;
    let campaigns = state.service.get_campaigns_by_dimensions(&query).await?;
    Ok(Json(campaigns))
}

/// 基础查询
///
/// GET /v1/campaigns?app=&country=&os=
#[instrument(skip(state))]
pub async fn get_campaigns(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<CampaignSummary>>> {
    let app = required(&params, "app")?;
    let country = required(&params, "country")?;
    let os = required(&params, "os")?;

    let campaigns = state.service.get_campaigns(app, country, os).await?;
    Ok(Json(campaigns))
}

/// 已注册路径上的其它请求方法
pub async fn method_not_allowed(method: Method, uri: Uri) -> DeliveryError {
    DeliveryError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_splits_dimensions_and_page() {
        let query = parse_dimension_query(params(&[
            ("app", "com.abc.xyz"),
            ("country", "us"),
            ("os", "ios"),
            ("state", "ca"),
            ("limit", "10"),
            ("page", "2"),
        ]))
        .unwrap();

        assert_eq!(query.dimensions.len(), 4);
        assert_eq!(query.get("state"), Some("ca"));
        assert_eq!(query.page.limit, 10);
        assert_eq!(query.page.page, 2);
        assert!(!query.is_cacheable());
    }

    #[test]
    fn test_missing_page_rejected() {
        let err = parse_dimension_query(params(&[
            ("app", "a"),
            ("country", "us"),
            ("os", "ios"),
            ("limit", "10"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DeliveryError::MissingParameter(ref name) if name == "page"));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let err = required(&params(&[("app", "")]), "app").unwrap_err();
        assert!(matches!(err, DeliveryError::MissingParameter(_)));
    }

    #[test]
    fn test_non_numeric_limit_rejected() {
        let err = parse_dimension_query(params(&[
            ("app", "a"),
            ("country", "us"),
            ("os", "ios"),
            ("limit", "ten"),
            ("page", "0"),
        ]))
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }
}
