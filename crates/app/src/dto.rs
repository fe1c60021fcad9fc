use serde::Deserialize;

use minimart_core::{CustomerId, OrderId};
use minimart_sales::OrderLine;

// -------------------------
// Request DTOs
// -------------------------

/// One line of batch input, selected by its `op` field.
///
/// ```json
/// {"op":"create","customer_id":"...","lines":[{"product_id":"...","quantity":2}]}
/// {"op":"edit","order_id":"...","customer_id":"...","lines":[...]}
/// {"op":"delete","order_id":"..."}
/// {"op":"get","order_id":"..."}
/// {"op":"list","page":1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchCommand {
    Create {
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
    },
    Edit {
        order_id: OrderId,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
    },
    Delete {
        order_id: OrderId,
    },
    Get {
        order_id: OrderId,
    },
    List {
        #[serde(default = "first_page")]
        page: u32,
    },
}

fn first_page() -> u32 {
    1
}
