use rust_decimal::Decimal;

use super::{
    error::PaymentError,
    types::{CreateOrderReply, Customer, OrderNotes, OrderRequest, OrderResponse},
};
use crate::backend::BackendClient;

impl OrderRequest {
    pub fn new(
        amount: Decimal,
        currency: &str,
        customer: Customer,
        notes: OrderNotes,
    ) -> Result<Self, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        Ok(Self {
            amount,
            currency: currency.to_string(),
            customer,
            notes,
        })
    }

    /// A repayment order never asks for more than is currently due.
    pub fn loan_repayment(
        amount: Decimal,
        due: Decimal,
        currency: &str,
        customer: Customer,
    ) -> Result<Self, PaymentError> {
        let request = Self::new(amount, currency, customer, OrderNotes::loan_repayment())?;
        if amount > due {
            return Err(PaymentError::ExceedsDue { due });
        }
        Ok(request)
    }
}

/// Judges a create-order reply: rejection, contract violation, or a usable session.
pub fn accept_reply(reply: CreateOrderReply) -> Result<OrderResponse, PaymentError> {
    if reply.success == Some(false) {
        return Err(PaymentError::OrderRejected(
            reply
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Payment order creation failed".to_string()),
        ));
    }

    let payment_session_id = match reply.payment_session_id {
        Some(session) if !session.trim().is_empty() => session,
        _ => return Err(PaymentError::MalformedOrderResponse),
    };

    Ok(OrderResponse {
        order_id: reply.order_id,
        payment_session_id,
        order_amount: reply.order_amount,
        order_currency: reply.order_currency,
        is_loan_repayment: reply.is_loan_repayment.unwrap_or(false),
        member_id: reply.member_id,
        member_name: reply.member_name,
        loan_details: reply.loan_details,
    })
}

/// Submits the order and returns it only if checkout can proceed with it.
pub async fn request_order(
    backend: &BackendClient,
    order: &OrderRequest,
    supported_currency: &str,
) -> Result<OrderResponse, PaymentError> {
    if order.amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount);
    }
    if !order.currency.eq_ignore_ascii_case(supported_currency) {
        return Err(PaymentError::UnsupportedCurrency {
            expected: supported_currency.to_string(),
        });
    }

    let result = backend.create_order(order).await.and_then(accept_reply);
    match &result {
        Ok(created) => tracing::info!(
            order_id = created.order_id.as_deref().unwrap_or_default(),
            member_id = %order.customer.id,
            amount = %order.amount,
            loan_repayment = order.notes.is_loan_repayment(),
            "payment order created"
        ),
        Err(err) if err.is_contract_violation() => tracing::error!(
            member_id = %order.customer.id,
            error = %err,
            "backend broke the create-order contract"
        ),
        Err(err) => tracing::warn!(member_id = %order.customer.id, error = %err, "payment order not created"),
    }
    result
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::backend::tests::client_for;

    fn repayment(amount: i64) -> OrderRequest {
        OrderRequest::loan_repayment(
            Decimal::from(amount),
            Decimal::from(1000),
            "INR",
            Customer::new("M001"),
        )
        .unwrap()
    }

    async fn backend_replying(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/payments/create-order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn amounts_are_validated_before_any_request() {
        assert!(matches!(
            OrderRequest::new(Decimal::ZERO, "INR", Customer::new("M001"), OrderNotes::default()),
            Err(PaymentError::InvalidAmount)
        ));
        assert!(matches!(
            OrderRequest::loan_repayment(
                Decimal::from(-5),
                Decimal::from(100),
                "INR",
                Customer::new("M001")
            ),
            Err(PaymentError::InvalidAmount)
        ));
        assert!(matches!(
            OrderRequest::loan_repayment(
                Decimal::from(101),
                Decimal::from(100),
                "INR",
                Customer::new("M001")
            ),
            Err(PaymentError::ExceedsDue { .. })
        ));
        let full = OrderRequest::loan_repayment(
            Decimal::from(100),
            Decimal::from(100),
            "INR",
            Customer::new("M001"),
        )
        .unwrap();
        assert!(full.notes.is_loan_repayment());
    }

    #[tokio::test]
    async fn successful_order_hands_back_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/payments/create-order"))
            .and(body_partial_json(json!({
                "amount": 500.0,
                "currency": "INR",
                "customer": {"customer_id": "M001"},
                "notes": {"isLoanRepayment": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "order_id": "O1",
                "payment_session_id": "sandbox_abc123",
                "order_amount": 500,
                "order_currency": "INR",
                "is_loan_repayment": true,
                "loan_details": {
                    "current_due_amount": 1000,
                    "repayment_amount": 500,
                    "new_due_amount": 500,
                    "original_loan_id": "L7"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = request_order(&client_for(&server).await, &repayment(500), "INR")
            .await
            .unwrap();
        assert_eq!(created.payment_session_id, "sandbox_abc123");
        assert_eq!(created.order_id.as_deref(), Some("O1"));
        assert!(created.is_loan_repayment);
        assert_eq!(
            created.loan_details.map(|d| d.new_due_amount),
            Some(Decimal::from(500))
        );
    }

    #[tokio::test]
    async fn missing_session_is_malformed_not_rejected() {
        let server = backend_replying(json!({"success": true})).await;
        let err = request_order(&client_for(&server).await, &repayment(500), "INR")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::MalformedOrderResponse));

        let server = backend_replying(json!({"success": true, "payment_session_id": "  "})).await;
        let err = request_order(&client_for(&server).await, &repayment(500), "INR")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::MalformedOrderResponse));
    }

    #[tokio::test]
    async fn declared_failure_is_rejected_verbatim() {
        let server = backend_replying(json!({
            "success": false,
            "message": "Repayment only allowed on Saturdays"
        }))
        .await;
        let err = request_order(&client_for(&server).await, &repayment(500), "INR")
            .await
            .unwrap_err();
        assert!(
            matches!(err, PaymentError::OrderRejected(ref m) if m == "Repayment only allowed on Saturdays")
        );

        let server = backend_replying(json!({"success": false})).await;
        let err = request_order(&client_for(&server).await, &repayment(500), "INR")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Payment order creation failed");
    }

    #[tokio::test]
    async fn null_body_is_no_response() {
        let server = backend_replying(serde_json::Value::Null).await;
        let err = request_order(&client_for(&server).await, &repayment(500), "INR")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NoResponse));
    }

    #[tokio::test]
    async fn other_currencies_never_reach_the_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut order = repayment(500);
        order.currency = "USD".to_string();
        let err = request_order(&client_for(&server).await, &order, "INR")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedCurrency { .. }));
    }
}
