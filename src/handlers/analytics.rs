use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::common::{query_params, validate_input};
use crate::{
    errors::ServiceError,
    proto::analytics::{Overview, PeriodRequest},
    AppState,
};

/// Reporting month; both fields default to the current UTC month
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    #[validate(range(min = 1, max = 12))]
    pub month: Option<i32>,
    #[validate(range(min = 1, max = 9999))]
    pub year: Option<i32>,
}

impl PeriodQuery {
    fn resolve(self) -> Result<PeriodRequest, ServiceError> {
        validate_input(&self)?;
        let now = Utc::now();
        Ok(PeriodRequest {
            month: self.month.unwrap_or(now.month() as i32),
            year: self.year.unwrap_or(now.year()),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardMetricsResponse {
    pub top_product: String,
    pub top_cafe: String,
    pub total_sales: f64,
    /// Month-over-month change of total sales, in percent
    pub growth_percent: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeSalesView {
    pub cafe: String,
    pub total_sales: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailySalesView {
    pub cafe: String,
    pub date: String,
    pub daily_total: f64,
}

/// One cafe's daily totals aligned on the shared date axis
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CafeDailySeries {
    pub cafe: String,
    pub dates: Vec<String>,
    pub totals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ProductQuantityView {
    pub product: String,
    pub qty: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeProductsView {
    pub cafe: String,
    pub top_3: Vec<ProductQuantityView>,
    pub bottom_3: Vec<ProductQuantityView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CafeProductView {
    pub cafe: String,
    pub product: String,
    pub qty: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryTotalView {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OverviewResponse {
    pub cafe_comparison: Vec<CafeSalesView>,
    pub sales_overtime: Vec<DailySalesView>,
    pub sales_per_cafe_daily: Vec<CafeDailySeries>,
    pub products_overview: Vec<CafeProductsView>,
    pub top_products_per_cafe: Vec<CafeProductView>,
    pub least_products_per_cafe: Vec<CafeProductView>,
    pub category_distribution: Vec<CategoryTotalView>,
}

fn round_cents(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Pivots the flat (cafe, date, total) rows into one series per cafe over
/// every date that appears, with zeros where a cafe sold nothing.
fn daily_series(rows: &[DailySalesView]) -> Vec<CafeDailySeries> {
    let dates: Vec<String> = rows
        .iter()
        .map(|r| r.date.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cafes: Vec<&str> = Vec::new();
    let mut totals: HashMap<(&str, &str), f64> = HashMap::new();
    for row in rows {
        if !cafes.contains(&row.cafe.as_str()) {
            cafes.push(row.cafe.as_str());
        }
        *totals
            .entry((row.cafe.as_str(), row.date.as_str()))
            .or_default() += row.daily_total;
    }

    cafes
        .into_iter()
        .map(|cafe| CafeDailySeries {
            cafe: cafe.to_string(),
            totals: dates
                .iter()
                .map(|date| round_cents(totals.get(&(cafe, date.as_str())).copied().unwrap_or(0.0)))
                .collect(),
            dates: dates.clone(),
        })
        .collect()
}

fn overview_response(overview: Overview) -> OverviewResponse {
    let sales_overtime: Vec<DailySalesView> = overview
        .sales_overtime
        .into_iter()
        .map(|d| DailySalesView {
            cafe: d.cafe,
            date: d.date,
            daily_total: d.daily_total,
        })
        .collect();
    let sales_per_cafe_daily = daily_series(&sales_overtime);

    let products_overview: Vec<CafeProductsView> = overview
        .products_overview
        .into_iter()
        .map(|c| CafeProductsView {
            cafe: c.cafe,
            top_3: c
                .top_3
                .into_iter()
                .map(|p| ProductQuantityView {
                    product: p.product,
                    qty: p.qty,
                })
                .collect(),
            bottom_3: c
                .bottom_3
                .into_iter()
                .map(|p| ProductQuantityView {
                    product: p.product,
                    qty: p.qty,
                })
                .collect(),
        })
        .collect();

    let pick = |cafe: &str, product: Option<&ProductQuantityView>| {
        product.map(|p| CafeProductView {
            cafe: cafe.to_string(),
            product: p.product.clone(),
            qty: p.qty,
        })
    };
    // bottom_3 is ordered best-selling first, so the least sold item is its tail
    let top_products_per_cafe = products_overview
        .iter()
        .filter_map(|c| pick(&c.cafe, c.top_3.first()))
        .collect();
    let least_products_per_cafe = products_overview
        .iter()
        .filter_map(|c| pick(&c.cafe, c.bottom_3.last()))
        .collect();

    OverviewResponse {
        cafe_comparison: overview
            .cafe_comparison
            .into_iter()
            .map(|c| CafeSalesView {
                cafe: c.cafe,
                total_sales: c.total_sales,
            })
            .collect(),
        sales_overtime,
        sales_per_cafe_daily,
        products_overview,
        top_products_per_cafe,
        least_products_per_cafe,
        category_distribution: overview
            .category_distribution
            .into_iter()
            .map(|c| CategoryTotalView {
                category: c.category,
                total: c.total,
            })
            .collect(),
    }
}

/// Dashboard cards for one month
#[utoipa::path(
    get,
    path = "/analytics",
    summary = "Card metrics",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Top product, top cafe, total sales and growth", body = CardMetricsResponse),
        (status = 400, description = "Invalid month or year", body = crate::errors::ErrorResponse),
    ),
    tag = "Analytics"
)]
pub async fn get_card_metrics(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<CardMetricsResponse>, ServiceError> {
    let period = query_params(query)?.resolve()?;

    let mut client = state.clients.analytics.clone();
    let metrics = client
        .get_card_metrics(period)
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(CardMetricsResponse {
        top_product: metrics.top_product,
        top_cafe: metrics.top_cafe,
        total_sales: metrics.total_sales,
        growth_percent: metrics.growth_percent,
    }))
}

#[utoipa::path(
    get,
    path = "/analytics/overview",
    summary = "Sales overview",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Per-cafe, per-day, per-product and per-category breakdowns", body = OverviewResponse),
        (status = 400, description = "Invalid month or year", body = crate::errors::ErrorResponse),
    ),
    tag = "Analytics"
)]
pub async fn get_overview(
    State(state): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<OverviewResponse>, ServiceError> {
    let period = query_params(query)?.resolve()?;

    let mut client = state.clients.analytics.clone();
    let overview = client
        .get_overview(period)
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(overview_response(overview)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::analytics::{CafeProducts, DailySales, ProductQuantity};

    fn day(cafe: &str, date: &str, total: f64) -> DailySales {
        DailySales {
            cafe: cafe.into(),
            date: date.into(),
            daily_total: total,
        }
    }

    fn qty(product: &str, qty: i64) -> ProductQuantity {
        ProductQuantity {
            product: product.into(),
            qty,
        }
    }

    #[test]
    fn daily_series_fill_missing_days_with_zero() {
        let overview = Overview {
            sales_overtime: vec![
                day("Dock", "2025-10-02", 12.5),
                day("Harbour", "2025-10-01", 3.0),
                day("Dock", "2025-10-03", 1.25),
            ],
            ..Default::default()
        };

        let response = overview_response(overview);
        assert_eq!(
            response.sales_per_cafe_daily,
            vec![
                CafeDailySeries {
                    cafe: "Dock".into(),
                    dates: vec!["2025-10-01".into(), "2025-10-02".into(), "2025-10-03".into()],
                    totals: vec![0.0, 12.5, 1.25],
                },
                CafeDailySeries {
                    cafe: "Harbour".into(),
                    dates: vec!["2025-10-01".into(), "2025-10-02".into(), "2025-10-03".into()],
                    totals: vec![3.0, 0.0, 0.0],
                },
            ]
        );
    }

    #[test]
    fn least_product_is_the_tail_of_bottom_three() {
        let overview = Overview {
            products_overview: vec![
                CafeProducts {
                    cafe: "Dock".into(),
                    top_3: vec![qty("Latte", 9), qty("Mocha", 4), qty("Tea", 2)],
                    bottom_3: vec![qty("Mocha", 4), qty("Tea", 2), qty("Scone", 1)],
                },
                CafeProducts {
                    cafe: "Empty".into(),
                    top_3: vec![],
                    bottom_3: vec![],
                },
            ],
            ..Default::default()
        };

        let response = overview_response(overview);
        assert_eq!(
            response.top_products_per_cafe,
            vec![CafeProductView {
                cafe: "Dock".into(),
                product: "Latte".into(),
                qty: 9
            }]
        );
        assert_eq!(
            response.least_products_per_cafe,
            vec![CafeProductView {
                cafe: "Dock".into(),
                product: "Scone".into(),
                qty: 1
            }]
        );
    }

    #[test]
    fn period_defaults_to_the_current_month() {
        let now = Utc::now();
        let period = PeriodQuery::default().resolve().unwrap();
        assert_eq!(period.month, now.month() as i32);
        assert_eq!(period.year, now.year());

        let invalid = PeriodQuery {
            month: Some(13),
            year: None,
        };
        assert!(invalid.resolve().is_err());
    }
}
