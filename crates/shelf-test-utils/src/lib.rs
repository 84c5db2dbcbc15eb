//! Testing utilities for the shelf workspace
//!
//! Document builders shaped like the production collections, a seeded
//! in-memory store and a scripted text provider.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use shelf_advisor::{AdvisorError, AdvisorResult, CompletionRequest, TextProvider};
use shelf_store::{Collection, Document, DocumentStore, MemoryStore, ObjectId, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Reference instant used by fixtures: 2025-06-15 12:00:00 UTC
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    fixed_now() - Duration::days(days)
}

pub fn oid(hex: &str) -> ObjectId {
    ObjectId::parse_str(hex).unwrap()
}

#[derive(Debug, Clone)]
pub struct ProductBuilder {
    doc: Document,
}

impl ProductBuilder {
    pub fn new(seller: ObjectId, name: &str) -> Self {
        let doc = Document::new()
            .with("_id", ObjectId::generate())
            .with("seller", seller)
            .with("ProductName", name)
            .with("status", "APPROVED")
            .with("stage", "ACTIVATE")
            .with("mrpPrice", 100.0)
            .with("offerPrice", 90.0)
            .with("posPrice", 95.0)
            .with("stockQuantity", 10i64)
            .with("availabilityStatus", true)
            .with("createdAt", days_ago(5))
            .with("updatedAt", days_ago(1));
        Self { doc }
    }

    pub fn id(&self) -> ObjectId {
        self.doc.get_object_id("_id").unwrap()
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.doc.insert("_id", id);
        self
    }

    pub fn price(mut self, mrp: f64, offer: f64) -> Self {
        self.doc.insert("mrpPrice", mrp);
        self.doc.insert("offerPrice", offer);
        self
    }

    pub fn stock(mut self, quantity: i64) -> Self {
        self.doc.insert("stockQuantity", quantity);
        self
    }

    pub fn category(mut self, category: ObjectId) -> Self {
        self.doc.insert("category", category);
        self
    }

    pub fn sub_category(mut self, sub_category: ObjectId) -> Self {
        self.doc.insert("subCategory", sub_category);
        self
    }

    pub fn unit(mut self, unit: ObjectId) -> Self {
        self.doc.insert("unit", unit);
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.doc.insert("status", status);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.doc.insert("availabilityStatus", false);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.doc.insert("createdAt", at);
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.doc.insert("updatedAt", at);
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

#[derive(Debug, Clone)]
pub struct OrderBuilder {
    doc: Document,
    items: Vec<Value>,
}

impl OrderBuilder {
    pub fn new(seller: ObjectId) -> Self {
        let doc = Document::new()
            .with("_id", ObjectId::generate())
            .with("seller", seller)
            .with("status", "COMPLETED")
            .with("orderType", "ONLINE")
            .with("createdAt", days_ago(1));
        Self {
            doc,
            items: Vec::new(),
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.doc.insert("status", status);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.doc.insert("createdAt", at);
        self
    }

    pub fn order_no(mut self, order_no: &str) -> Self {
        self.doc.insert("orderNo", order_no);
        self
    }

    pub fn order_type(mut self, order_type: &str) -> Self {
        self.doc.insert("orderType", order_type);
        self
    }

    pub fn customer(mut self, id: &str, name: &str, phone: &str) -> Self {
        self.doc.insert(
            "customer",
            Document::new()
                .with("id", id)
                .with("customerName", name)
                .with("phoneNumber", phone),
        );
        self
    }

    /// Line at `price` per unit; MRP defaults to the same price
    pub fn item(self, product: ObjectId, name: &str, quantity: f64, price: f64) -> Self {
        self.item_with_mrp(product, name, quantity, price, price)
    }

    pub fn item_with_mrp(mut self, product: ObjectId, name: &str, quantity: f64, price: f64, mrp: f64) -> Self {
        self.items.push(Value::Document(
            Document::new()
                .with("_id", product)
                .with("productName", name)
                .with("quantity", quantity)
                .with("offerPrice", price)
                .with("mrpPrice", mrp)
                .with("subTotal", quantity * price),
        ));
        self
    }

    /// Explicit total; otherwise the sum of line subtotals
    pub fn total(mut self, total: f64) -> Self {
        self.doc.insert("total", total);
        self
    }

    pub fn build(mut self) -> Document {
        let subtotal: f64 = self
            .items
            .iter()
            .filter_map(Value::as_document)
            .filter_map(|line| line.get_f64("subTotal"))
            .sum();
        if !self.doc.contains_key("total") {
            self.doc.insert("total", subtotal);
        }
        let total = self.doc.get_f64("total").unwrap_or(subtotal);
        self.doc.insert("subTotal", subtotal);
        self.doc.insert("amountReceived", total);
        self.doc.insert("items", Value::Array(self.items));
        self.doc
    }
}

pub fn seller_doc(id: ObjectId, name: &str) -> Document {
    Document::new()
        .with("_id", id)
        .with("storeName", name)
        .with("storeContactName", "Asha")
        .with("phoneNumber", "9876543210")
        .with("address", "12 Market Road")
        .with("payoutBalance", 1250.5)
        .with("status", "APPROVED")
        .with("isActive", true)
}

pub fn named_doc(id: ObjectId, name: &str) -> Document {
    Document::new().with("_id", id).with("name", name)
}

pub fn payout_doc(seller: ObjectId, amount: f64, at: DateTime<Utc>) -> Document {
    Document::new()
        .with("_id", ObjectId::generate())
        .with("seller", seller.to_hex())
        .with("amount", amount)
        .with("createdAt", at)
}

/// Seeded in-memory store around one seller
pub struct StoreFixture {
    pub store: Arc<MemoryStore>,
    pub store_id: ObjectId,
}

impl StoreFixture {
    pub fn new() -> Self {
        let store_id = ObjectId::generate();
        let store = Arc::new(MemoryStore::new());
        store.insert(Collection::Sellers, seller_doc(store_id, "Fresh Mart"));
        Self { store, store_id }
    }

    pub fn shared(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn add_product(&self, product: ProductBuilder) -> ObjectId {
        let id = product.id();
        self.store.insert(Collection::Products, product.build());
        id
    }

    pub fn add_order(&self, order: OrderBuilder) {
        self.store.insert(Collection::Orders, order.build());
    }

    pub fn add_category(&self, name: &str) -> ObjectId {
        let id = ObjectId::generate();
        self.store.insert(Collection::Categories, named_doc(id, name));
        id
    }

    pub fn add_unit(&self, name: &str) -> ObjectId {
        let id = ObjectId::generate();
        self.store.insert(Collection::Units, named_doc(id, name));
        id
    }

    pub fn product(&self, name: &str) -> ProductBuilder {
        ProductBuilder::new(self.store_id, name)
    }

    pub fn order(&self) -> OrderBuilder {
        OrderBuilder::new(self.store_id)
    }
}

impl Default for StoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Text provider answering from a queue; an exhausted queue is `Unavailable`
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<AdvisorResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, error: AdvisorError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> AdvisorResult<String> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or(Err(AdvisorError::Unavailable))
    }
}
