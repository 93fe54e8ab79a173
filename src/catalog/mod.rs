// Catalog access: the HTTP API seam and the records it returns.

pub mod http_catalog;
pub mod model;
pub mod traits;
