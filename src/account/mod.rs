mod core;
mod create_endpoint;
mod edit_endpoint;
mod list_endpoint;

pub use core::{
    Account, AccountChanges, NewAccount, adjust_balance, create_account, create_account_table,
    get_account, get_account_for_user, get_accounts_for_user, map_row_to_account_with_offset,
};
pub use create_endpoint::create_account_endpoint;
pub use edit_endpoint::edit_account_endpoint;
pub use list_endpoint::list_accounts_endpoint;
