//! Historical fund records and the loaders that read them from disk

mod record;
pub mod loader;

pub use record::{FundRecord, FundHistory};
pub use loader::{load_records, load_records_csv, load_records_json, load_records_from_reader};
