// Import/export of business data
mod export;
mod invoice;

pub use export::*;
pub use invoice::*;
