//! Repository implementations, one per persisted entity family from the
//! persisted-layout design: `cache_cart`, `log_tran` + `status_tran`,
//! `info_terminal_counter`, `status_tran_delivery`.

pub mod cart;
pub mod counter;
pub mod delivery;
pub mod transaction;
