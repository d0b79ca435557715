pub mod collector;
pub mod fetcher;
pub mod traits;

pub use collector::collect_all;
pub use fetcher::PlayStoreScraper;
pub use traits::ReviewSource;
