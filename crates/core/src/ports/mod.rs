mod ledger;
mod reader;

pub use ledger::*;
pub use reader::*;
