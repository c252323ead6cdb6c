use crate::{
    db::DbPool,
    entities::{cafe, menu_item, order, order_item},
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, JoinType, QueryFilter, QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A calendar month, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self, ServiceError> {
        if !(1..=12).contains(&month) {
            return Err(ServiceError::ValidationError(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(ServiceError::ValidationError(format!(
                "Year {} is out of range",
                year
            )));
        }
        Ok(Self { month, year })
    }

    /// The month before this one; January rolls back to December.
    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                month: 12,
                year: self.year - 1,
            }
        } else {
            Self {
                month: self.month - 1,
                year: self.year,
            }
        }
    }

    fn next(self) -> Self {
        if self.month == 12 {
            Self {
                month: 1,
                year: self.year + 1,
            }
        } else {
            Self {
                month: self.month + 1,
                year: self.year,
            }
        }
    }

    fn first_instant(self) -> Result<DateTime<Utc>, ServiceError> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Invalid period {}-{:02}",
                    self.year, self.month
                ))
            })
    }

    /// `[first day of month, first day of next month)`
    pub fn bounds(self) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        Ok((self.first_instant()?, self.next().first_instant()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardMetrics {
    pub top_product: String,
    pub top_cafe: String,
    pub total_sales: Decimal,
    pub growth_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CafeSales {
    pub cafe: String,
    pub total_sales: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub cafe: String,
    pub date: NaiveDate,
    pub daily_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductQuantity {
    pub product: String,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CafeProducts {
    pub cafe: String,
    pub top_3: Vec<ProductQuantity>,
    pub bottom_3: Vec<ProductQuantity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub cafe_comparison: Vec<CafeSales>,
    pub sales_overtime: Vec<DailySales>,
    pub products_overview: Vec<CafeProducts>,
    pub category_distribution: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, FromQueryResult)]
struct OrderRow {
    cafe_name: Option<String>,
    total_price: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromQueryResult)]
struct LineRow {
    cafe_name: Option<String>,
    product: String,
    category: String,
    quantity: i32,
    price: Decimal,
}

/// Highest value wins; ties go to the alphabetically first key. Empty yields "".
fn leader<V: PartialOrd + Copy>(totals: &BTreeMap<String, V>) -> String {
    let mut best: Option<(&String, V)> = None;
    for (name, value) in totals {
        match best {
            Some((_, current)) if *value <= current => {}
            _ => best = Some((name, *value)),
        }
    }
    best.map(|(name, _)| name.clone()).unwrap_or_default()
}

/// `round((current - previous) / previous * 100, 2)`, zero without a baseline.
pub fn growth_percent(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(2)
}

fn card_metrics(current: &[OrderRow], previous: &[OrderRow], lines: &[LineRow]) -> CardMetrics {
    let total_sales: Decimal = current.iter().map(|o| o.total_price).sum();
    let previous_sales: Decimal = previous.iter().map(|o| o.total_price).sum();

    let mut per_product: BTreeMap<String, i64> = BTreeMap::new();
    for line in lines {
        *per_product.entry(line.product.clone()).or_default() += i64::from(line.quantity);
    }

    CardMetrics {
        top_product: leader(&per_product),
        top_cafe: leader(&sales_per_cafe(current)),
        total_sales,
        growth_percent: growth_percent(total_sales, previous_sales),
    }
}

fn sales_per_cafe(orders: &[OrderRow]) -> BTreeMap<String, Decimal> {
    let mut per_cafe: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in orders {
        if let Some(cafe) = &row.cafe_name {
            *per_cafe.entry(cafe.clone()).or_default() += row.total_price;
        }
    }
    per_cafe
}

fn overview(orders: &[OrderRow], lines: &[LineRow]) -> Overview {
    let mut cafe_comparison: Vec<CafeSales> = sales_per_cafe(orders)
        .into_iter()
        .map(|(cafe, total_sales)| CafeSales { cafe, total_sales })
        .collect();
    cafe_comparison.sort_by(|a, b| b.total_sales.cmp(&a.total_sales).then(a.cafe.cmp(&b.cafe)));

    let mut per_day: BTreeMap<(NaiveDate, String), Decimal> = BTreeMap::new();
    for row in orders {
        if let Some(cafe) = &row.cafe_name {
            *per_day
                .entry((row.created_at.date_naive(), cafe.clone()))
                .or_default() += row.total_price;
        }
    }
    let sales_overtime = per_day
        .into_iter()
        .map(|((date, cafe), daily_total)| DailySales {
            cafe,
            date,
            daily_total,
        })
        .collect();

    let mut per_cafe_product: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    let mut per_category: BTreeMap<String, Decimal> = BTreeMap::new();
    for line in lines {
        if let Some(cafe) = &line.cafe_name {
            *per_cafe_product
                .entry(cafe.clone())
                .or_default()
                .entry(line.product.clone())
                .or_default() += i64::from(line.quantity);
        }
        *per_category.entry(line.category.clone()).or_default() +=
            line.price * Decimal::from(line.quantity);
    }

    let products_overview = per_cafe_product
        .into_iter()
        .map(|(cafe, products)| {
            let mut ranked: Vec<ProductQuantity> = products
                .into_iter()
                .map(|(product, qty)| ProductQuantity { product, qty })
                .collect();
            ranked.sort_by(|a, b| b.qty.cmp(&a.qty).then(a.product.cmp(&b.product)));

            let top_3 = ranked.iter().take(3).cloned().collect();
            let bottom_3 = ranked[ranked.len().saturating_sub(3)..].to_vec();
            CafeProducts {
                cafe,
                top_3,
                bottom_3,
            }
        })
        .collect();

    let mut category_distribution: Vec<CategoryTotal> = per_category
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();
    category_distribution.sort_by(|a, b| b.total.cmp(&a.total).then(a.category.cmp(&b.category)));

    Overview {
        cafe_comparison,
        sales_overtime,
        products_overview,
        category_distribution,
    }
}

/// Monthly sales reporting over orders, their lines and the menu.
#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: Arc<DbPool>,
}

impl AnalyticsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn load_orders(&self, period: Period) -> Result<Vec<OrderRow>, ServiceError> {
        let (start, end) = period.bounds()?;
        let rows = order::Entity::find()
            .select_only()
            .column_as(cafe::Column::Name, "cafe_name")
            .column(order::Column::TotalPrice)
            .column(order::Column::CreatedAt)
            .join(JoinType::LeftJoin, order::Relation::Cafe.def())
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end))
            .into_model::<OrderRow>()
            .all(&*self.db_pool)
            .await?;
        Ok(rows)
    }

    async fn load_lines(&self, period: Period) -> Result<Vec<LineRow>, ServiceError> {
        let (start, end) = period.bounds()?;
        let rows = order_item::Entity::find()
            .select_only()
            .column_as(cafe::Column::Name, "cafe_name")
            .column_as(menu_item::Column::Name, "product")
            .column_as(menu_item::Column::Category, "category")
            .column(order_item::Column::Quantity)
            .column(order_item::Column::Price)
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .join(JoinType::InnerJoin, order_item::Relation::MenuItem.def())
            .join(JoinType::LeftJoin, order::Relation::Cafe.def())
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end))
            .into_model::<LineRow>()
            .all(&*self.db_pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn get_card_metrics(&self, period: Period) -> Result<CardMetrics, ServiceError> {
        let current = self.load_orders(period).await?;
        let previous = self.load_orders(period.previous()).await?;
        let lines = self.load_lines(period).await?;
        debug!(
            orders = current.len(),
            previous_orders = previous.len(),
            lines = lines.len(),
            "Loaded rows for card metrics"
        );
        Ok(card_metrics(&current, &previous, &lines))
    }

    #[instrument(skip(self))]
    pub async fn get_overview(&self, period: Period) -> Result<Overview, ServiceError> {
        let orders = self.load_orders(period).await?;
        let lines = self.load_lines(period).await?;
        Ok(overview(&orders, &lines))
    }
}
