//! OrderLifecycle - 订单生命周期
//!
//! Items move draft → kitchen ticket → bill, always keyed by table:
//!
//! ```text
//! add_item / change_quantity / set_note / remove_item   (draft, editable)
//!        │ send_order
//!        ▼
//! KitchenTicket (immutable items; status Pending → Ready → Served)
//!        │ request_bill
//!        ▼
//! Bill (lines + partial payments) ── close_table clears everything
//! ```

mod bill;
mod draft;
mod kitchen;
pub mod money;
