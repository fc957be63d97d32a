//! Engine services: rule storage, candidate querying, ranking,
//! write-off building, batch orchestration and collaborator seams.

pub mod commit;
pub mod engine;
pub mod ledger;
pub mod query;
pub mod ranking;
pub mod rules;
pub mod taxes;
pub mod writeoff;

pub use commit::ReconcileGateway;
pub use engine::MatchingEngine;
pub use ledger::{InMemoryLedger, LedgerStore};
pub use rules::RuleBook;
pub use taxes::{TaxComputation, TaxComputer, TaxLineResult};
