//! In-memory gateway and mailer doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{GatewayError, MailError};
use crate::gateway::{Checkout, CheckoutRequest, PaymentGateway};
use crate::mail::{FulfillmentRecord, Mailer};

#[derive(Default)]
pub struct MockGateway {
    customers: HashMap<String, Value>,
    checkouts: HashMap<String, Value>,
    checkout_url: Option<String>,
    customer_lookups: Mutex<Vec<String>>,
    checkout_requests: Mutex<Vec<CheckoutRequest>>,
}

impl MockGateway {
    pub fn with_customer(mut self, id: &str, customer: Value) -> Self {
        self.customers.insert(id.to_string(), customer);
        self
    }

    pub fn with_checkout(mut self, id: &str, checkout: Value) -> Self {
        self.checkouts.insert(id.to_string(), checkout);
        self
    }

    /// Make `create_checkout` succeed with this URL. Without it, creation fails.
    pub fn creating(mut self, checkout_url: &str) -> Self {
        self.checkout_url = Some(checkout_url.to_string());
        self
    }

    pub fn customer_lookups(&self) -> Vec<String> {
        self.customer_lookups.lock().unwrap().clone()
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.checkout_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<Checkout, GatewayError> {
        self.checkout_requests.lock().unwrap().push(request.clone());
        match &self.checkout_url {
            Some(url) => Ok(Checkout {
                id: Some("chk_test".to_string()),
                checkout_url: url.clone(),
            }),
            None => Err(GatewayError::Status {
                status: 422,
                body: "{\"message\":\"rejected\"}".to_string(),
            }),
        }
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<Value, GatewayError> {
        self.customer_lookups
            .lock()
            .unwrap()
            .push(customer_id.to_string());
        self.customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                body: "not found".to_string(),
            })
    }

    async fn fetch_checkout(&self, checkout_id: &str) -> Result<Value, GatewayError> {
        self.checkouts
            .get(checkout_id)
            .cloned()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                body: "not found".to_string(),
            })
    }
}

#[derive(Default)]
pub struct MockMailer {
    fail: bool,
    attempts: Mutex<Vec<FulfillmentRecord>>,
}

impl MockMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Records successfully "sent".
    pub fn sent(&self) -> Vec<FulfillmentRecord> {
        if self.fail {
            return Vec::new();
        }
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_fulfillment(&self, record: &FulfillmentRecord) -> Result<String, MailError> {
        self.attempts.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(MailError::Status {
                status: 500,
                body: "provider down".to_string(),
            });
        }
        Ok(format!("msg_{}", self.attempts()))
    }
}
