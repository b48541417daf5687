//! Panels of the single SaveGas window.
//!
//! Each submodule adds `render_*` methods to `SaveGasApp`; `App::update` in
//! `app.rs` lays them out.
//!
//! - `account` - top bar, account panel, network banner, notifications
//! - `transfer` - recipient rows, token type, approve/transfer
//! - `diagnostics` - contract existence check, operation log

pub mod account;
pub mod diagnostics;
pub mod transfer;
