mod middleware;
mod public;
mod views;

pub use public::{HttpState, build_router};
pub use views::{CategoryView, DocumentPage, HomeView, PostView, SiteView, format_size};
