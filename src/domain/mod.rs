mod customer;
mod expense;
mod inventory;
mod invoice;
mod ledger;
mod money;
mod owner;
mod sale;
mod transaction;

pub use customer::*;
pub use expense::*;
pub use inventory::*;
pub use invoice::*;
pub use ledger::*;
pub use money::*;
pub use owner::*;
pub use sale::*;
pub use transaction::*;
