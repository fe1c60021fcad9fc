use serde_json::{Value, json};

use minimart_infra::OrderError;

pub fn order_error_to_json(err: &OrderError) -> Value {
    json_error(err.code(), err.to_string())
}

pub fn json_error(code: &'static str, message: impl Into<String>) -> Value {
    json!({
        "ok": false,
        "error": code,
        "message": message.into(),
    })
}

pub fn json_ok(result: Value) -> Value {
    json!({
        "ok": true,
        "result": result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minimart_core::OrderId;

    #[test]
    fn order_errors_carry_their_code() {
        let id = OrderId::new();
        let body = order_error_to_json(&OrderError::OrderNotFound(id));
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "order_not_found");
        assert_eq!(body["message"], format!("order {id} not found"));
    }
}
