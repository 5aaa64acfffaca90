use serde::{Deserialize, Serialize};

/// `{ "data": ... }` wrapper used by the mobile endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseDto {
    pub id: u64,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Query for `products/lookup`. Unset fields are left off the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLookupParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ProductLookupParams {
    pub fn barcode(code: impl Into<String>) -> Self {
        Self {
            barcode: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn in_warehouse(mut self, warehouse_id: u64) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }
}

/// A product variant as returned by lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantLike {
    pub id: u64,
    pub variant_name: String,
    #[serde(default)]
    pub variant_sku: Option<String>,
    #[serde(default)]
    pub variant_barcode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MeUser {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of `GET /mobile/me` under `data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MeData {
    #[serde(default)]
    pub user: Option<MeUser>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Signed-in user as the client keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: u64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl From<MeData> for UserInfo {
    fn from(data: MeData) -> Self {
        let user = data.user.unwrap_or_default();
        Self {
            uid: user.id,
            name: user.name,
            email: user.email,
            roles: data.roles,
            permissions: data.permissions,
        }
    }
}
