mod core;
mod create_endpoint;
mod ledger;
mod list_endpoint;
mod query;

pub use core::{BaseTransaction, TransactionDetail, TransactionRecord, create_transaction_tables};
pub use create_endpoint::{
    create_expense_endpoint, create_income_endpoint, create_transfer_endpoint,
};
pub use ledger::{LedgerEntry, NewTransaction, NewTransfer, record_expense, record_income, record_transfer};
pub use list_endpoint::list_transactions_endpoint;
pub use query::{accounts_for_user, transactions_for_user};
