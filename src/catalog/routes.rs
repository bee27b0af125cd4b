// Catalog resource handlers
// Stateless query/filter/aggregate endpoints over the relational store.
// Every route is gated on an authenticated session; none of them talk to
// the identity provider.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::IntoParams;
use uuid::Uuid;

use super::model::{
    Activity, Brand, Country, Offering, OfferingSearch, PricingDetail, Product, StaffingDetail,
    TotalHoursAndPrices, Wbs, WbsCreate, WbsUpdate,
};
use crate::AppState;
use crate::auth::extract::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize, IntoParams)]
pub struct BrandFilter {
    brand_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductFilter {
    product_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OfferingFilter {
    offering_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PricingQuery {
    staffing_id: Uuid,
    country: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct WbsListQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_wbs_limit")]
    limit: i64,
}

fn default_wbs_limit() -> i64 {
    100
}

#[utoipa::path(
    get,
    path = "/brands",
    tags = ["catalog"],
    responses(
        (status = 200, description = "All brands", body = [Brand]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_brands(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<Brand>>, ApiError> {
    Ok(Json(app.catalog.list_brands().await?))
}

#[utoipa::path(
    get,
    path = "/countries",
    tags = ["catalog"],
    responses(
        (status = 200, description = "All countries", body = [Country]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_countries(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<Country>>, ApiError> {
    Ok(Json(app.catalog.list_countries().await?))
}

#[utoipa::path(
    get,
    path = "/products",
    tags = ["catalog"],
    params(BrandFilter),
    responses(
        (status = 200, description = "Products under the brand", body = [Product]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_products(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(filter): Query<BrandFilter>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(app.catalog.list_products_by_brand(filter.brand_id).await?))
}

#[utoipa::path(
    get,
    path = "/offerings",
    tags = ["catalog"],
    params(ProductFilter),
    responses(
        (status = 200, description = "Offerings under the product", body = [Offering]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_offerings(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Offering>>, ApiError> {
    Ok(Json(
        app.catalog.list_offerings_by_product(filter.product_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/offerings/search/",
    tags = ["catalog"],
    params(OfferingSearch),
    responses(
        (status = 200, description = "Matching offerings", body = [Offering]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn search_offerings(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(search): Query<OfferingSearch>,
) -> Result<Json<Vec<Offering>>, ApiError> {
    let search = search.normalized();
    Ok(Json(app.catalog.search_offerings(&search).await?))
}

#[utoipa::path(
    get,
    path = "/offerings/{offering_id}",
    tags = ["catalog"],
    params(("offering_id" = Uuid, Path, description = "Offering ID")),
    responses(
        (status = 200, description = "The offering", body = Offering),
        (status = 404, description = "Offering not found"),
    )
)]
pub async fn get_offering(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(offering_id): Path<Uuid>,
) -> Result<Json<Offering>, ApiError> {
    let offering = app
        .catalog
        .find_offering(offering_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Offering"))?;
    Ok(Json(offering))
}

#[utoipa::path(
    get,
    path = "/activities",
    tags = ["catalog"],
    params(OfferingFilter),
    responses(
        (status = 200, description = "Activities for the offering", body = [Activity]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_activities(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(filter): Query<OfferingFilter>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    Ok(Json(
        app.catalog
            .list_activities_by_offering(filter.offering_id)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/activities/{activity_id}",
    tags = ["catalog"],
    params(("activity_id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "The activity", body = Activity),
        (status = 404, description = "Activity not found"),
    )
)]
pub async fn get_activity(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Activity>, ApiError> {
    let activity = app
        .catalog
        .find_activity(activity_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Activity"))?;
    Ok(Json(activity))
}

#[utoipa::path(
    get,
    path = "/staffingDetails/{offering_id}",
    tags = ["catalog"],
    params(("offering_id" = Uuid, Path, description = "Offering ID")),
    responses(
        (status = 200, description = "Staffing rows for the offering", body = [StaffingDetail]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn get_staffing_details(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(offering_id): Path<Uuid>,
) -> Result<Json<Vec<StaffingDetail>>, ApiError> {
    Ok(Json(app.catalog.list_staffing_by_offering(offering_id).await?))
}

#[utoipa::path(
    get,
    path = "/pricingDetails",
    tags = ["catalog"],
    params(PricingQuery),
    responses(
        (status = 200, description = "Rate matching the staffing row and country", body = PricingDetail),
        (status = 404, description = "Staffing or pricing row not found"),
    )
)]
pub async fn get_pricing_details(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(params): Query<PricingQuery>,
) -> Result<Json<PricingDetail>, ApiError> {
    let staffing = app
        .catalog
        .find_staffing(params.staffing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Staffing detail"))?;

    // A staffing row without role or band can never match a rate
    let (Some(role), Some(band)) = (staffing.role.as_deref(), staffing.band) else {
        return Err(ApiError::not_found("Pricing details"));
    };

    let pricing = app
        .catalog
        .find_pricing(&params.country, role, band)
        .await?
        .ok_or_else(|| ApiError::not_found("Pricing details"))?;

    Ok(Json(pricing))
}

#[utoipa::path(
    get,
    path = "/totalHoursAndPrices/{offering_id}",
    tags = ["catalog"],
    params(("offering_id" = Uuid, Path, description = "Offering ID")),
    responses(
        (status = 200, description = "Aggregated hours and prices", body = TotalHoursAndPrices),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn get_total_hours_and_prices(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(offering_id): Path<Uuid>,
) -> Result<Json<TotalHoursAndPrices>, ApiError> {
    let staffing = app.catalog.list_staffing_by_offering(offering_id).await?;

    // Rate lookup per staffing row against the row's own country
    let mut lines = Vec::with_capacity(staffing.len());
    for row in staffing {
        let pricing = match (&row.country, &row.role, row.band) {
            (Some(country), Some(role), Some(band)) => {
                app.catalog.find_pricing(country, role, band).await?
            }
            _ => None,
        };
        lines.push((row, pricing));
    }

    Ok(Json(TotalHoursAndPrices::compute(offering_id, lines)))
}

#[utoipa::path(
    post,
    path = "/wbs",
    tags = ["wbs"],
    request_body = WbsCreate,
    responses(
        (status = 200, description = "Stored WBS entry", body = Wbs),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn create_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Json(payload): Json<WbsCreate>,
) -> Result<Json<Wbs>, ApiError> {
    Ok(Json(app.catalog.create_wbs(&payload).await?))
}

#[utoipa::path(
    get,
    path = "/wbs",
    tags = ["wbs"],
    params(WbsListQuery),
    responses(
        (status = 200, description = "WBS entries", body = [Wbs]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Query(page): Query<WbsListQuery>,
) -> Result<Json<Vec<Wbs>>, ApiError> {
    Ok(Json(app.catalog.list_wbs(page.skip, page.limit).await?))
}

#[utoipa::path(
    get,
    path = "/wbs/{wbs_id}",
    tags = ["wbs"],
    params(("wbs_id" = Uuid, Path, description = "WBS ID")),
    responses(
        (status = 200, description = "The WBS entry", body = Wbs),
        (status = 404, description = "WBS not found"),
    )
)]
pub async fn get_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(wbs_id): Path<Uuid>,
) -> Result<Json<Wbs>, ApiError> {
    let wbs = app
        .catalog
        .find_wbs(wbs_id)
        .await?
        .ok_or_else(|| ApiError::not_found("WBS"))?;
    Ok(Json(wbs))
}

#[utoipa::path(
    put,
    path = "/wbs/{wbs_id}",
    tags = ["wbs"],
    params(("wbs_id" = Uuid, Path, description = "WBS ID")),
    request_body = WbsUpdate,
    responses(
        (status = 200, description = "Updated WBS entry", body = Wbs),
        (status = 404, description = "WBS not found"),
    )
)]
pub async fn update_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(wbs_id): Path<Uuid>,
    Json(patch): Json<WbsUpdate>,
) -> Result<Json<Wbs>, ApiError> {
    let wbs = app
        .catalog
        .update_wbs(wbs_id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("WBS"))?;
    Ok(Json(wbs))
}

#[utoipa::path(
    delete,
    path = "/wbs/{wbs_id}",
    tags = ["wbs"],
    params(("wbs_id" = Uuid, Path, description = "WBS ID")),
    responses(
        (status = 200, description = "Deletion confirmation"),
        (status = 404, description = "WBS not found"),
    )
)]
pub async fn delete_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(wbs_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if !app.catalog.delete_wbs(wbs_id).await? {
        return Err(ApiError::not_found("WBS"));
    }
    Ok(Json(json!({ "message": "WBS deleted successfully" })))
}

#[utoipa::path(
    post,
    path = "/wbs/activity/{activity_id}/wbs/{wbs_id}",
    tags = ["wbs"],
    params(
        ("activity_id" = Uuid, Path, description = "Activity ID"),
        ("wbs_id" = Uuid, Path, description = "WBS ID"),
    ),
    responses(
        (status = 200, description = "Association created"),
        (status = 400, description = "Association violates a constraint"),
    )
)]
pub async fn link_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path((activity_id, wbs_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    match app.catalog.link_wbs_to_activity(activity_id, wbs_id).await {
        Ok(()) => Ok(Json(
            json!({ "message": "WBS added to activity successfully" }),
        )),
        // Constraint violations are caller errors, everything else is not
        Err(sqlx::Error::Database(err)) => Err(ApiError::bad_request(err.to_string())),
        Err(err) => Err(err.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/wbs/activity/{activity_id}/wbs/{wbs_id}",
    tags = ["wbs"],
    params(
        ("activity_id" = Uuid, Path, description = "Activity ID"),
        ("wbs_id" = Uuid, Path, description = "WBS ID"),
    ),
    responses(
        (status = 200, description = "Association removed"),
        (status = 404, description = "Association not found"),
    )
)]
pub async fn unlink_wbs(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path((activity_id, wbs_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    if !app
        .catalog
        .unlink_wbs_from_activity(activity_id, wbs_id)
        .await?
    {
        return Err(ApiError::not_found("Association"));
    }
    Ok(Json(
        json!({ "message": "WBS removed from activity successfully" }),
    ))
}

#[utoipa::path(
    get,
    path = "/wbs/activity/{activity_id}/wbs",
    tags = ["wbs"],
    params(("activity_id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "WBS entries linked to the activity", body = [Wbs]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_wbs_for_activity(
    State(app): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Vec<Wbs>>, ApiError> {
    Ok(Json(app.catalog.list_wbs_for_activity(activity_id).await?))
}

/// Catalog routes, mounted at the application root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/brands", get(list_brands))
        .route("/countries", get(list_countries))
        .route("/products", get(list_products))
        .route("/offerings", get(list_offerings))
        .route("/offerings/search/", get(search_offerings))
        .route("/offerings/{offering_id}", get(get_offering))
        .route("/activities", get(list_activities))
        .route("/activities/{activity_id}", get(get_activity))
        .route("/staffingDetails/{offering_id}", get(get_staffing_details))
        .route("/pricingDetails", get(get_pricing_details))
        .route(
            "/totalHoursAndPrices/{offering_id}",
            get(get_total_hours_and_prices),
        )
        .route("/wbs", post(create_wbs).get(list_wbs))
        .route(
            "/wbs/{wbs_id}",
            get(get_wbs).put(update_wbs).delete(delete_wbs),
        )
        .route("/wbs/activity/{activity_id}/wbs", get(list_wbs_for_activity))
        .route(
            "/wbs/activity/{activity_id}/wbs/{wbs_id}",
            post(link_wbs).delete(unlink_wbs),
        )
}
