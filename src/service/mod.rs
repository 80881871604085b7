//! CrudService: the generic resource engine over a [`crate::store::RowStore`].

mod crud;
mod key;
mod validation;
pub use crud::CrudService;
pub use key::RowKey;
pub use validation::{format_timestamp, normalise, RequestValidator};
