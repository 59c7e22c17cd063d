//! Reference resources: customers, products, their groups, UOM groups and sales employees.

use super::entity::{ColumnDef, EntityDef, FilterDef, MatchMode, UniqueDef};
use crate::error::{AppError, FieldErrors};
use crate::service::validation::{trim, trim_opt};
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A flat entity served by the generic CRUD handlers.
#[async_trait]
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn entity() -> &'static EntityDef;

    fn id(&self) -> Option<i64>;

    /// Trim and blank-to-null before validation.
    fn normalize(&mut self) {}

    /// Cross-field rules beyond the per-column ones.
    fn check(&self, _errors: &mut FieldErrors) {}

    /// Rules that need other stored entities.
    async fn check_references(&self, _store: &dyn Store) -> Result<(), AppError> {
        Ok(())
    }
}

const GSTIN_PATTERN: &str = r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$";

pub static CUSTOMER: EntityDef = EntityDef {
    label: "Customer",
    table: "customers",
    path: "/api/Customer",
    columns: &[
        ColumnDef::id(),
        ColumnDef::text("code").required().max(50),
        ColumnDef::text("name").required().max(200),
        ColumnDef::text("group").max(100),
        ColumnDef::numeric("balance"),
        ColumnDef::text("route").max(100),
        ColumnDef::text("employee").max(100),
        ColumnDef::text("remarks").max(500),
        ColumnDef::text("contact_number").max(25),
        ColumnDef::text("mail_id").max(100).email(),
        ColumnDef::text("shipping_type").max(50),
        ColumnDef::text("address1").max(255),
        ColumnDef::text("address2").max(255),
        ColumnDef::text("street").max(100),
        ColumnDef::text("post_box").max(20),
        ColumnDef::text("city").max(100),
        ColumnDef::text("state").max(100),
        ColumnDef::text("country").max(100),
        ColumnDef::text("gstin").max(15).pattern(GSTIN_PATTERN, "gstin is not a valid GSTIN"),
    ],
    unique: Some(UniqueDef { column: "code", field: "code", label: "code" }),
    filters: &[
        FilterDef { param: "group", columns: &["group"], mode: MatchMode::Exact },
        FilterDef { param: "searchTerm", columns: &["name", "code"], mode: MatchMode::Contains },
    ],
    order_by: "name",
    referenced_by_sales_orders: true,
};

pub static CUSTOMER_GROUP: EntityDef = EntityDef {
    label: "Customer group",
    table: "customer_groups",
    path: "/api/CustomerGroups",
    columns: &[ColumnDef::id(), ColumnDef::text("name").required().max(100)],
    unique: Some(UniqueDef { column: "name", field: "name", label: "name" }),
    filters: &[FilterDef { param: "searchTerm", columns: &["name"], mode: MatchMode::Contains }],
    order_by: "name",
    referenced_by_sales_orders: false,
};

pub static PRODUCT: EntityDef = EntityDef {
    label: "Product",
    table: "products",
    path: "/api/Products",
    columns: &[
        ColumnDef::id(),
        ColumnDef::text("sku").required().max(50),
        ColumnDef::text("name").required().max(250),
        ColumnDef::text("group").required().max(100),
        ColumnDef::text("uom").required().max(50),
        ColumnDef::text("hsn").max(20),
        ColumnDef::numeric("price_min"),
        ColumnDef::numeric("price_max"),
        ColumnDef::text("image_file_name").max(255),
    ],
    unique: Some(UniqueDef { column: "sku", field: "sku", label: "SKU" }),
    filters: &[
        FilterDef { param: "group", columns: &["group"], mode: MatchMode::Exact },
        FilterDef { param: "searchTerm", columns: &["name", "sku"], mode: MatchMode::Contains },
    ],
    order_by: "name",
    referenced_by_sales_orders: false,
};

pub static PRODUCT_GROUP: EntityDef = EntityDef {
    label: "Product group",
    table: "product_groups",
    path: "/api/ProductGroups",
    columns: &[ColumnDef::id(), ColumnDef::text("name").required().max(100)],
    unique: Some(UniqueDef { column: "name", field: "name", label: "name" }),
    filters: &[FilterDef { param: "searchTerm", columns: &["name"], mode: MatchMode::Contains }],
    order_by: "name",
    referenced_by_sales_orders: false,
};

pub static UOM_GROUP: EntityDef = EntityDef {
    label: "UOM Group",
    table: "uom_groups",
    path: "/api/UOMGroups",
    columns: &[
        ColumnDef::id(),
        ColumnDef::text("name").required().max(100),
        ColumnDef::text("description").max(255),
        ColumnDef::created_at("created_date"),
    ],
    unique: Some(UniqueDef { column: "name", field: "name", label: "name" }),
    filters: &[FilterDef { param: "searchTerm", columns: &["name"], mode: MatchMode::Contains }],
    order_by: "name",
    referenced_by_sales_orders: false,
};

pub static SALES_EMPLOYEE: EntityDef = EntityDef {
    label: "Sales employee",
    table: "sales_employees",
    path: "/api/SalesEmployee",
    columns: &[ColumnDef::id(), ColumnDef::text("name").required().max(150)],
    unique: Some(UniqueDef { column: "name", field: "name", label: "name" }),
    filters: &[FilterDef { param: "searchTerm", columns: &["name"], mode: MatchMode::Contains }],
    order_by: "name",
    referenced_by_sales_orders: false,
};

/// Every reference entity, in dependency order for DDL.
pub static REFERENCE_ENTITIES: &[&EntityDef] =
    &[&CUSTOMER_GROUP, &CUSTOMER, &PRODUCT_GROUP, &PRODUCT, &UOM_GROUP, &SALES_EMPLOYEE];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub group: Option<String>,
    pub balance: Decimal,
    pub route: Option<String>,
    pub employee: Option<String>,
    pub remarks: Option<String>,
    pub contact_number: Option<String>,
    pub mail_id: Option<String>,
    pub shipping_type: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub street: Option<String>,
    pub post_box: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub gstin: Option<String>,
}

#[async_trait]
impl Resource for Customer {
    fn entity() -> &'static EntityDef {
        &CUSTOMER
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn normalize(&mut self) {
        trim(&mut self.code);
        trim(&mut self.name);
        for field in [
            &mut self.group,
            &mut self.route,
            &mut self.employee,
            &mut self.remarks,
            &mut self.contact_number,
            &mut self.mail_id,
            &mut self.shipping_type,
            &mut self.address1,
            &mut self.address2,
            &mut self.street,
            &mut self.post_box,
            &mut self.city,
            &mut self.state,
            &mut self.country,
            &mut self.gstin,
        ] {
            trim_opt(field);
        }
        if let Some(gstin) = self.gstin.as_mut() {
            *gstin = gstin.to_uppercase();
        }
    }

    async fn check_references(&self, store: &dyn Store) -> Result<(), AppError> {
        if let Some(group) = self.group.as_deref() {
            if store.find_by_ci(&CUSTOMER_GROUP, "name", group, None).await?.is_none() {
                return Err(AppError::validation(
                    "group",
                    format!("Customer group '{}' is not valid or does not exist.", group),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerGroup {
    pub id: Option<i64>,
    pub name: String,
}

impl Resource for CustomerGroup {
    fn entity() -> &'static EntityDef {
        &CUSTOMER_GROUP
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub id: Option<i64>,
    pub sku: String,
    pub name: String,
    pub group: String,
    pub uom: String,
    pub hsn: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub image_file_name: Option<String>,
}

#[async_trait]
impl Resource for Product {
    fn entity() -> &'static EntityDef {
        &PRODUCT
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn normalize(&mut self) {
        trim(&mut self.sku);
        trim(&mut self.name);
        trim(&mut self.group);
        trim(&mut self.uom);
        trim_opt(&mut self.hsn);
        trim_opt(&mut self.image_file_name);
    }

    fn check(&self, errors: &mut FieldErrors) {
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                errors.add("priceMax", "priceMax must not be less than priceMin");
            }
        }
    }

    async fn check_references(&self, store: &dyn Store) -> Result<(), AppError> {
        if !self.group.is_empty()
            && store.find_by_ci(&PRODUCT_GROUP, "name", &self.group, None).await?.is_none()
        {
            return Err(AppError::validation(
                "group",
                format!("Product group '{}' is not valid or does not exist.", self.group),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductGroup {
    pub id: Option<i64>,
    pub name: String,
}

impl Resource for ProductGroup {
    fn entity() -> &'static EntityDef {
        &PRODUCT_GROUP
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UomGroup {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
}

impl Resource for UomGroup {
    fn entity() -> &'static EntityDef {
        &UOM_GROUP
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        trim_opt(&mut self.description);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesEmployee {
    pub id: Option<i64>,
    pub name: String,
}

impl Resource for SalesEmployee {
    fn entity() -> &'static EntityDef {
        &SALES_EMPLOYEE
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
    }
}
