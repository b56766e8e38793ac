pub mod errors;
pub mod outcome;
pub mod params;
pub mod schema;
pub mod tags;

pub use errors::*;
pub use outcome::*;
pub use params::*;
pub use schema::SchemaReport;
pub use tags::*;
