// Catalog data access
// Plain filtered queries over the relational schema. Anything smarter
// (aggregation, pricing lookups per staffing row) lives in the handlers.

use sqlx::PgPool;
use uuid::Uuid;

use super::model::{
    Activity, Brand, Country, Offering, OfferingSearch, PricingDetail, Product, StaffingDetail,
    Wbs, WbsCreate, WbsUpdate,
};

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_brands(&self) -> Result<Vec<Brand>, sqlx::Error> {
        sqlx::query_as(
            "SELECT brand_id, brand_name, description FROM brands ORDER BY brand_name",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_countries(&self) -> Result<Vec<Country>, sqlx::Error> {
        sqlx::query_as("SELECT country_id, country_name FROM countries ORDER BY country_name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_products_by_brand(&self, brand_id: Uuid) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT product_id, product_name, description, brand_id
            FROM products
            WHERE brand_id = $1
            ORDER BY product_name
            "#,
        )
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_offerings_by_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<Offering>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT offering_id, product_id, offering_name, offering_summary, tag_line,
                   elevator_pitch, offering_tags, saas_type, industry, client_type,
                   framework_category, duration, scope_summary, key_deliverables,
                   offering_outcomes, prerequisites, part_numbers, seismic_link,
                   offering_product_manager, offering_sales_contact
            FROM offerings
            WHERE product_id = $1
            ORDER BY offering_name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_offering(&self, offering_id: Uuid) -> Result<Option<Offering>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT offering_id, product_id, offering_name, offering_summary, tag_line,
                   elevator_pitch, offering_tags, saas_type, industry, client_type,
                   framework_category, duration, scope_summary, key_deliverables,
                   offering_outcomes, prerequisites, part_numbers, seismic_link,
                   offering_product_manager, offering_sales_contact
            FROM offerings
            WHERE offering_id = $1
            "#,
        )
        .bind(offering_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Free-text search across five columns, OR'd, with conjunctive
    /// equality filters on the taxonomy columns. Absent filters bind as
    /// NULL and fall out of the predicate.
    pub async fn search_offerings(
        &self,
        search: &OfferingSearch,
    ) -> Result<Vec<Offering>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT offering_id, product_id, offering_name, offering_summary, tag_line,
                   elevator_pitch, offering_tags, saas_type, industry, client_type,
                   framework_category, duration, scope_summary, key_deliverables,
                   offering_outcomes, prerequisites, part_numbers, seismic_link,
                   offering_product_manager, offering_sales_contact
            FROM offerings
            WHERE ($1::text IS NULL
                   OR offering_name ILIKE '%' || $1 || '%'
                   OR offering_summary ILIKE '%' || $1 || '%'
                   OR tag_line ILIKE '%' || $1 || '%'
                   OR elevator_pitch ILIKE '%' || $1 || '%'
                   OR offering_tags ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR saas_type = $2)
              AND ($3::text IS NULL OR industry = $3)
              AND ($4::text IS NULL OR client_type = $4)
              AND ($5::text IS NULL OR framework_category = $5)
            ORDER BY offering_name
            "#,
        )
        .bind(search.query.as_deref())
        .bind(search.saas_type.as_deref())
        .bind(search.industry.as_deref())
        .bind(search.client_type.as_deref())
        .bind(search.framework_category.as_deref())
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_activities_by_offering(
        &self,
        offering_id: Uuid,
    ) -> Result<Vec<Activity>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT a.activity_id, a.activity_name, a.category, a.description, a.outcome,
                   a.effort_hours, a.sequence, a.assumptions
            FROM activities a
            JOIN offering_activities oa ON oa.activity_id = a.activity_id
            WHERE oa.offering_id = $1
            ORDER BY a.sequence NULLS LAST, a.activity_name
            "#,
        )
        .bind(offering_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT activity_id, activity_name, category, description, outcome,
                   effort_hours, sequence, assumptions
            FROM activities
            WHERE activity_id = $1
            "#,
        )
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Staffing rows reached through the offering's activity associations.
    pub async fn list_staffing_by_offering(
        &self,
        offering_id: Uuid,
    ) -> Result<Vec<StaffingDetail>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT s.staffing_id, s.activity_id, s.country, s.role, s.band, s.hours
            FROM staffing_details s
            JOIN activities a ON s.activity_id = a.activity_id
            JOIN offering_activities oa ON oa.activity_id = a.activity_id
            WHERE oa.offering_id = $1
            ORDER BY s.staffing_id
            "#,
        )
        .bind(offering_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_staffing(
        &self,
        staffing_id: Uuid,
    ) -> Result<Option<StaffingDetail>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT staffing_id, activity_id, country, role, band, hours
            FROM staffing_details
            WHERE staffing_id = $1
            "#,
        )
        .bind(staffing_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_pricing(
        &self,
        country: &str,
        role: &str,
        band: i32,
    ) -> Result<Option<PricingDetail>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT country, role, band, cost, sale_price
            FROM pricing_details
            WHERE country = $1 AND role = $2 AND band = $3
            "#,
        )
        .bind(country)
        .bind(role)
        .bind(band)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create_wbs(&self, wbs: &WbsCreate) -> Result<Wbs, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO wbs (wbs_code, wbs_name, description, country)
            VALUES ($1, $2, $3, $4)
            RETURNING wbs_id, wbs_code, wbs_name, description, country
            "#,
        )
        .bind(&wbs.wbs_code)
        .bind(wbs.wbs_name.as_deref())
        .bind(wbs.description.as_deref())
        .bind(wbs.country.as_deref())
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_wbs(&self, skip: i64, limit: i64) -> Result<Vec<Wbs>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT wbs_id, wbs_code, wbs_name, description, country
            FROM wbs
            ORDER BY wbs_code
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_wbs(&self, wbs_id: Uuid) -> Result<Option<Wbs>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT wbs_id, wbs_code, wbs_name, description, country
            FROM wbs
            WHERE wbs_id = $1
            "#,
        )
        .bind(wbs_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Partial update; NULL binds keep the stored column value.
    pub async fn update_wbs(
        &self,
        wbs_id: Uuid,
        patch: &WbsUpdate,
    ) -> Result<Option<Wbs>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE wbs
            SET wbs_code = COALESCE($2, wbs_code),
                wbs_name = COALESCE($3, wbs_name),
                description = COALESCE($4, description),
                country = COALESCE($5, country)
            WHERE wbs_id = $1
            RETURNING wbs_id, wbs_code, wbs_name, description, country
            "#,
        )
        .bind(wbs_id)
        .bind(patch.wbs_code.as_deref())
        .bind(patch.wbs_name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.country.as_deref())
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete_wbs(&self, wbs_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM wbs WHERE wbs_id = $1")
            .bind(wbs_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Associate a WBS with an activity. Referential or uniqueness
    /// violations surface as database errors for the handler to map.
    pub async fn link_wbs_to_activity(
        &self,
        activity_id: Uuid,
        wbs_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO activity_wbs (activity_id, wbs_id) VALUES ($1, $2)")
            .bind(activity_id)
            .bind(wbs_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unlink_wbs_from_activity(
        &self,
        activity_id: Uuid,
        wbs_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM activity_wbs WHERE activity_id = $1 AND wbs_id = $2")
                .bind(activity_id)
                .bind(wbs_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_wbs_for_activity(&self, activity_id: Uuid) -> Result<Vec<Wbs>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT w.wbs_id, w.wbs_code, w.wbs_name, w.description, w.country
            FROM wbs w
            JOIN activity_wbs aw ON aw.wbs_id = w.wbs_id
            WHERE aw.activity_id = $1
            ORDER BY w.wbs_code
            "#,
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await
    }
}
