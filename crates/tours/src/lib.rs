//! Tour inventory for chat replies: the remote search gateway, the synthetic catalog
//! used when the gateway is unavailable, and the text blocks handed to the model.

pub mod adapter;
pub mod catalog;
pub mod gateway;
pub mod hot_deals;
pub mod model;
pub mod presentation;

pub use adapter::{TourSearch, TourSearchAdapter};
pub use gateway::{GatewayError, SearchGateway};
pub use hot_deals::{HotDeal, HotDealFilter, HotDealSelection, HotDeals};
pub use model::{GatewayCredentials, RecordOrigin, SearchCriteria, TourRecord};
pub use presentation::format_for_presentation;
