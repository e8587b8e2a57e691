//! 订单工具族（domain = order_management）
//!
//! 查询类工具为 safe；cancel_order 为 sensitive，执行前需要人工确认。
//! 订单数据由内存中的 OrderBook 提供，真实订单系统不在本 crate 范围内。

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::registry::{parse_args, Sensitivity, Tool};

pub const DOMAIN: &str = "order_management";

/// 订单号：模型可能给字符串也可能给数字
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderId {
    Text(String),
    Number(u64),
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderId::Text(s) => f.write_str(s.trim()),
            OrderId::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderArgs {
    order_id: OrderId,
}

fn order_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "order_id": {"type": "string", "description": "The order identifier"}
        },
        "required": ["order_id"]
    })
}

/// 内存订单簿：记录已取消的订单；其余订单号为偶数视为已发货，奇数视为处理中
#[derive(Debug, Default)]
pub struct OrderBook {
    cancelled: RwLock<HashSet<String>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, order_id: &str) -> Result<&'static str, String> {
        if self.is_cancelled(order_id) {
            return Ok("cancelled");
        }
        let n: u64 = order_id
            .parse()
            .map_err(|_| format!("Order id '{order_id}' is not numeric"))?;
        Ok(if n % 2 == 0 { "shipped" } else { "processing" })
    }

    pub fn cancel(&self, order_id: &str) -> Result<(), String> {
        self.cancelled
            .write()
            .map_err(|_| "order book lock poisoned".to_string())?
            .insert(order_id.to_string());
        Ok(())
    }

    pub fn is_cancelled(&self, order_id: &str) -> bool {
        self.cancelled
            .read()
            .map(|set| set.contains(order_id))
            .unwrap_or(false)
    }
}

pub struct GetOrderStatusTool {
    book: Arc<OrderBook>,
}

impl GetOrderStatusTool {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for GetOrderStatusTool {
    fn name(&self) -> &str {
        "get_order_status"
    }

    fn description(&self) -> &str {
        "Look up the status of a user order by ID."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn parameters_schema(&self) -> Value {
        order_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: OrderArgs = parse_args(self.name(), args)?;
        let status = self.book.status(&args.order_id.to_string())?;
        Ok(format!("status: {status}"))
    }
}

pub struct GetOrderEtaTool;

#[async_trait]
impl Tool for GetOrderEtaTool {
    fn name(&self) -> &str {
        "get_order_eta"
    }

    fn description(&self) -> &str {
        "Look up the estimated time of arrival of a user order by ID."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn parameters_schema(&self) -> Value {
        order_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: OrderArgs = parse_args(self.name(), args)?;
        Ok(format!(
            "The order {} will arrive tomorrow between 9am and 1pm.",
            args.order_id
        ))
    }
}

pub struct GetRefundStatusTool;

#[async_trait]
impl Tool for GetRefundStatusTool {
    fn name(&self) -> &str {
        "get_refund_status"
    }

    fn description(&self) -> &str {
        "Look up the status of an order refund by order ID."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn parameters_schema(&self) -> Value {
        order_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: OrderArgs = parse_args(self.name(), args)?;
        Ok(format!(
            "Order {} has a refund status of 'processing'.",
            args.order_id
        ))
    }
}

pub struct CancelOrderTool {
    book: Arc<OrderBook>,
}

impl CancelOrderTool {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for CancelOrderTool {
    fn name(&self) -> &str {
        "cancel_order"
    }

    fn description(&self) -> &str {
        "Cancels a user order by ID. Only use this tool after verifying with get_order_status \
         that the order has not shipped yet."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn sensitivity(&self) -> Sensitivity {
        Sensitivity::Sensitive
    }

    fn parameters_schema(&self) -> Value {
        order_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: OrderArgs = parse_args(self.name(), args)?;
        let order_id = args.order_id.to_string();
        self.book.cancel(&order_id)?;
        Ok(format!("Order {order_id} has been cancelled successfully."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_status_parity_and_cancel() {
        let book = Arc::new(OrderBook::new());
        let status = GetOrderStatusTool::new(book.clone());
        assert_eq!(status.execute(json!({"order_id": "42"})).await.unwrap(), "status: shipped");
        assert_eq!(status.execute(json!({"order_id": 7})).await.unwrap(), "status: processing");

        let cancel = CancelOrderTool::new(book.clone());
        let reply = cancel.execute(json!({"order_id": 42})).await.unwrap();
        assert_eq!(reply, "Order 42 has been cancelled successfully.");
        assert!(book.is_cancelled("42"));
        assert_eq!(status.execute(json!({"order_id": "42"})).await.unwrap(), "status: cancelled");
    }

    #[tokio::test]
    async fn test_bad_arguments_fail() {
        let book = Arc::new(OrderBook::new());
        let status = GetOrderStatusTool::new(book);
        assert!(status.execute(json!({})).await.is_err());
        assert!(status.execute(json!({"order_id": "abc"})).await.is_err());
    }

    #[test]
    fn test_cancel_is_sensitive() {
        let tool = CancelOrderTool::new(Arc::new(OrderBook::new()));
        assert_eq!(tool.sensitivity(), Sensitivity::Sensitive);
        assert_eq!(GetOrderEtaTool.sensitivity(), Sensitivity::Safe);
    }
}
