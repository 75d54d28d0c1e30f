mod ledger;
mod money;
mod transaction;
mod trend;

pub use ledger::*;
pub use money::*;
pub use transaction::*;
pub use trend::*;
