//! Pure, deterministic parsers for the three SWPC product grammars.

pub mod alert;
pub mod forecast;
pub mod header;
pub mod outlook;
pub mod text;

pub use alert::parse_alert;
pub use forecast::parse_forecast;
pub use header::{read_header, ProductHeader};
pub use outlook::parse_outlook;
pub use text::{clean_key, LineCursor};
