// Catalog entities
// Row types map 1:1 onto the relational schema and double as the JSON
// bodies the API returns.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Brand {
    pub brand_id: Uuid,
    pub brand_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Country {
    pub country_id: Uuid,
    pub country_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub product_id: Uuid,
    pub product_name: String,
    pub description: Option<String>,
    pub brand_id: Uuid,
}

/// One sellable offering under a product.
///
/// Free-text columns feed the catalog front-end; the search endpoint
/// matches across offering_name, offering_summary, tag_line,
/// elevator_pitch and offering_tags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Offering {
    pub offering_id: Uuid,
    pub product_id: Uuid,
    pub offering_name: String,
    pub offering_summary: Option<String>,
    pub tag_line: Option<String>,
    pub elevator_pitch: Option<String>,
    /// Comma-separated tags, searched as plain text.
    pub offering_tags: Option<String>,
    pub saas_type: Option<String>,
    pub industry: Option<String>,
    pub client_type: Option<String>,
    pub framework_category: Option<String>,
    pub duration: Option<String>,
    pub scope_summary: Option<String>,
    pub key_deliverables: Option<String>,
    pub offering_outcomes: Option<String>,
    pub prerequisites: Option<String>,
    pub part_numbers: Option<String>,
    /// Link into the sales-asset library.
    pub seismic_link: Option<String>,
    pub offering_product_manager: Option<String>,
    pub offering_sales_contact: Option<String>,
}

/// Delivery activity attached to offerings through a join table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Activity {
    pub activity_id: Uuid,
    pub activity_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub effort_hours: Option<i32>,
    pub sequence: Option<i32>,
    pub assumptions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StaffingDetail {
    pub staffing_id: Uuid,
    pub activity_id: Uuid,
    pub country: Option<String>,
    pub role: Option<String>,
    pub band: Option<i32>,
    pub hours: Option<i32>,
}

/// Hourly rates keyed by (country, role, band).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PricingDetail {
    pub country: String,
    pub role: String,
    pub band: i32,
    pub cost: Option<f64>,
    pub sale_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Wbs {
    pub wbs_id: Uuid,
    pub wbs_code: String,
    pub wbs_name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WbsCreate {
    pub wbs_code: String,
    pub wbs_name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct WbsUpdate {
    pub wbs_code: Option<String>,
    pub wbs_name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
}

/// Offering search filters. `query` matches five text columns with OR
/// semantics; the rest are conjunctive equality filters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct OfferingSearch {
    pub query: Option<String>,
    pub saas_type: Option<String>,
    pub industry: Option<String>,
    pub client_type: Option<String>,
    pub framework_category: Option<String>,
}

impl OfferingSearch {
    /// Blank parameters mean "no filter", matching how the catalog
    /// front-end submits untouched search fields.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|s| !s.is_empty())
        }

        Self {
            query: keep(self.query),
            saas_type: keep(self.saas_type),
            industry: keep(self.industry),
            client_type: keep(self.client_type),
            framework_category: keep(self.framework_category),
        }
    }
}

/// One staffing line of the aggregated price calculation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricingBreakdownLine {
    pub staffing_id: Uuid,
    pub country: Option<String>,
    pub role: Option<String>,
    pub band: Option<i32>,
    pub hours: i32,
    pub cost_per_hour: f64,
    pub sale_price_per_hour: f64,
    pub total_cost: f64,
    pub total_sale_price: f64,
}

/// Aggregated hours and prices for one offering.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TotalHoursAndPrices {
    pub offering_id: Uuid,
    pub total_hours: i64,
    pub total_cost: f64,
    pub total_sale_price: f64,
    pub breakdown: Vec<PricingBreakdownLine>,
}

impl TotalHoursAndPrices {
    /// Sum staffing hours and multiply them against per-hour rates.
    ///
    /// Staffing rows without a matching pricing row contribute hours but
    /// no money and produce no breakdown entry. Missing rate columns
    /// count as zero.
    pub fn compute(offering_id: Uuid, lines: Vec<(StaffingDetail, Option<PricingDetail>)>) -> Self {
        let mut total_hours: i64 = 0;
        let mut total_cost = 0.0;
        let mut total_sale_price = 0.0;
        let mut breakdown = Vec::new();

        for (staffing, pricing) in lines {
            let hours = staffing.hours.unwrap_or(0);
            total_hours += i64::from(hours);

            let Some(pricing) = pricing else {
                continue;
            };

            let cost_per_hour = pricing.cost.unwrap_or(0.0);
            let sale_price_per_hour = pricing.sale_price.unwrap_or(0.0);
            let line_cost = cost_per_hour * f64::from(hours);
            let line_sale_price = sale_price_per_hour * f64::from(hours);
            total_cost += line_cost;
            total_sale_price += line_sale_price;

            breakdown.push(PricingBreakdownLine {
                staffing_id: staffing.staffing_id,
                country: staffing.country,
                role: staffing.role,
                band: staffing.band,
                hours,
                cost_per_hour,
                sale_price_per_hour,
                total_cost: line_cost,
                total_sale_price: line_sale_price,
            });
        }

        Self {
            offering_id,
            total_hours,
            total_cost,
            total_sale_price,
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staffing(country: &str, role: &str, band: i32, hours: i32) -> StaffingDetail {
        StaffingDetail {
            staffing_id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            country: Some(country.to_string()),
            role: Some(role.to_string()),
            band: Some(band),
            hours: Some(hours),
        }
    }

    fn pricing(country: &str, role: &str, band: i32, cost: f64, sale_price: f64) -> PricingDetail {
        PricingDetail {
            country: country.to_string(),
            role: role.to_string(),
            band,
            cost: Some(cost),
            sale_price: Some(sale_price),
        }
    }

    #[test]
    fn test_totals_single_line() {
        let offering_id = Uuid::new_v4();
        let lines = vec![(
            staffing("US", "Dev", 7, 10),
            Some(pricing("US", "Dev", 7, 50.0, 80.0)),
        )];

        let totals = TotalHoursAndPrices::compute(offering_id, lines);

        assert_eq!(totals.offering_id, offering_id);
        assert_eq!(totals.total_hours, 10);
        assert_eq!(totals.total_cost, 500.0);
        assert_eq!(totals.total_sale_price, 800.0);
        assert_eq!(totals.breakdown.len(), 1);

        let line = &totals.breakdown[0];
        assert_eq!(line.hours, 10);
        assert_eq!(line.cost_per_hour, 50.0);
        assert_eq!(line.sale_price_per_hour, 80.0);
        assert_eq!(line.total_cost, 500.0);
        assert_eq!(line.total_sale_price, 800.0);
    }

    #[test]
    fn test_totals_unpriced_rows_contribute_hours_only() {
        let lines = vec![
            (
                staffing("US", "Dev", 7, 10),
                Some(pricing("US", "Dev", 7, 50.0, 80.0)),
            ),
            (staffing("DE", "Architect", 9, 25), None),
        ];

        let totals = TotalHoursAndPrices::compute(Uuid::new_v4(), lines);

        assert_eq!(totals.total_hours, 35);
        assert_eq!(totals.total_cost, 500.0);
        assert_eq!(totals.total_sale_price, 800.0);
        assert_eq!(totals.breakdown.len(), 1);
    }

    #[test]
    fn test_totals_empty_staffing_yields_zeros() {
        let totals = TotalHoursAndPrices::compute(Uuid::new_v4(), Vec::new());

        assert_eq!(totals.total_hours, 0);
        assert_eq!(totals.total_cost, 0.0);
        assert_eq!(totals.total_sale_price, 0.0);
        assert!(totals.breakdown.is_empty());
    }

    #[test]
    fn test_totals_missing_rates_count_as_zero() {
        let mut rate = pricing("US", "Dev", 7, 0.0, 0.0);
        rate.cost = None;
        rate.sale_price = None;

        let mut row = staffing("US", "Dev", 7, 12);
        row.hours = None;

        let totals =
            TotalHoursAndPrices::compute(Uuid::new_v4(), vec![(row, Some(rate))]);

        assert_eq!(totals.total_hours, 0);
        assert_eq!(totals.total_cost, 0.0);
        assert_eq!(totals.breakdown.len(), 1);
        assert_eq!(totals.breakdown[0].hours, 0);
        assert_eq!(totals.breakdown[0].cost_per_hour, 0.0);
    }

    #[test]
    fn test_search_normalization_drops_blank_filters() {
        let search = OfferingSearch {
            query: Some(String::new()),
            saas_type: Some("Multi-tenant".to_string()),
            industry: Some(String::new()),
            client_type: None,
            framework_category: Some("Migration".to_string()),
        };

        let search = search.normalized();
        assert!(search.query.is_none());
        assert_eq!(search.saas_type.as_deref(), Some("Multi-tenant"));
        assert!(search.industry.is_none());
        assert!(search.client_type.is_none());
        assert_eq!(search.framework_category.as_deref(), Some("Migration"));
    }
}
