//! Image service v2

pub mod images;
mod urls;

pub use urls::{create_url, delete_url, get_url, list_url, next_page_url, update_url};
