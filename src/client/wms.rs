use super::{ApiClient, ApiError};
use crate::models::{
    ApiEnvelope, MeData, ProductLookupParams, UserInfo, VariantLike, WarehouseDto,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Lookup result. Products with variants list them under `variants`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantLike>,
}

/// Typed surface of the mobile WMS endpoints.
///
/// Inbound and outbound documents are passed through as JSON since their
/// shape is owned by the backend.
#[derive(Clone)]
pub struct WmsApi {
    client: Arc<ApiClient>,
}

impl WmsApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub async fn me(&self) -> Result<UserInfo, ApiError> {
        let envelope: ApiEnvelope<MeData> = self.client.get("mobile/me", &()).await?;
        Ok(envelope.data.into())
    }

    pub async fn list_warehouses(&self) -> Result<Vec<WarehouseDto>, ApiError> {
        let envelope: ApiEnvelope<Vec<WarehouseDto>> =
            self.client.get("mobile/wms/warehouses", &()).await?;
        Ok(envelope.data)
    }

    pub async fn product_lookup(
        &self,
        params: &ProductLookupParams,
    ) -> Result<Vec<ProductMatch>, ApiError> {
        let envelope: ApiEnvelope<Vec<ProductMatch>> =
            self.client.get("mobile/wms/products/lookup", params).await?;
        Ok(envelope.data)
    }

    pub async fn inbound_list<Q: Serialize + ?Sized>(&self, query: &Q) -> Result<Value, ApiError> {
        self.client.get("mobile/wms/inbound", query).await
    }

    pub async fn inbound_create<B: Serialize + ?Sized>(&self, payload: &B) -> Result<Value, ApiError> {
        self.client.post("mobile/wms/inbound", Some(payload)).await
    }

    pub async fn inbound_get(&self, id: u64) -> Result<Value, ApiError> {
        self.client.get(&format!("mobile/wms/inbound/{id}"), &()).await
    }

    pub async fn inbound_verify(&self, id: u64) -> Result<Value, ApiError> {
        self.document_action("inbound", id, "verify").await
    }

    pub async fn inbound_cancel(&self, id: u64) -> Result<Value, ApiError> {
        self.document_action("inbound", id, "cancel").await
    }

    pub async fn outbound_list<Q: Serialize + ?Sized>(&self, query: &Q) -> Result<Value, ApiError> {
        self.client.get("mobile/wms/outbound", query).await
    }

    pub async fn outbound_create<B: Serialize + ?Sized>(&self, payload: &B) -> Result<Value, ApiError> {
        self.client.post("mobile/wms/outbound", Some(payload)).await
    }

    pub async fn outbound_get(&self, id: u64) -> Result<Value, ApiError> {
        self.client.get(&format!("mobile/wms/outbound/{id}"), &()).await
    }

    pub async fn outbound_prepare(&self, id: u64) -> Result<Value, ApiError> {
        self.document_action("outbound", id, "prepare").await
    }

    pub async fn outbound_ship(&self, id: u64) -> Result<Value, ApiError> {
        self.document_action("outbound", id, "ship").await
    }

    pub async fn outbound_delivered(&self, id: u64) -> Result<Value, ApiError> {
        self.document_action("outbound", id, "delivered").await
    }

    pub async fn outbound_cancel(&self, id: u64) -> Result<Value, ApiError> {
        self.document_action("outbound", id, "cancel").await
    }

    async fn document_action(&self, kind: &str, id: u64, action: &str) -> Result<Value, ApiError> {
        self.client
            .post::<Value, Value>(&format!("mobile/wms/{kind}/{id}/{action}"), None)
            .await
    }
}
