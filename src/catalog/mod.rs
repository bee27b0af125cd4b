//! Solution offering catalog: brands, products, offerings, delivery
//! activities, staffing, pricing and WBS bookkeeping.

pub mod model;
pub mod repository;
pub mod routes;

pub use model::{
    Activity, Brand, Country, Offering, OfferingSearch, PricingBreakdownLine, PricingDetail,
    Product, StaffingDetail, TotalHoursAndPrices, Wbs, WbsCreate, WbsUpdate,
};
pub use repository::CatalogRepository;
