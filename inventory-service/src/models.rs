use diesel::prelude::*;
use shared::{Product, ProductDetail, ProductWarehouse, Shop, ShopWarehouse, Warehouse};

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::warehouses)]
pub struct WarehouseRow {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::shops)]
pub struct ShopRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::shop_warehouses)]
pub struct NewShopWarehouse<'a> {
    pub shop_id: &'a str,
    pub warehouse_id: &'a str,
    pub enabled: bool,
}

impl<'a> From<&'a ShopWarehouse> for NewShopWarehouse<'a> {
    fn from(binding: &'a ShopWarehouse) -> Self {
        Self {
            shop_id: &binding.shop_id,
            warehouse_id: &binding.warehouse_id,
            enabled: binding.enabled,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::product_warehouses)]
pub struct ProductWarehouseRow {
    pub product_id: String,
    pub warehouse_id: String,
    pub total_stock: i32,
}

#[derive(Debug, Clone, Queryable)]
pub struct ProductDetailRow {
    pub product_id: String,
    pub name: String,
    pub price: i64,
    pub total_stock: i32,
    pub warehouse_id: String,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            enabled: row.enabled,
        }
    }
}

impl From<Warehouse> for WarehouseRow {
    fn from(warehouse: Warehouse) -> Self {
        Self {
            id: warehouse.id,
            name: warehouse.name,
            enabled: warehouse.enabled,
        }
    }
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

impl From<Shop> for ShopRow {
    fn from(shop: Shop) -> Self {
        Self {
            id: shop.id,
            name: shop.name,
        }
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
        }
    }
}

impl From<Product> for ProductRow {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
        }
    }
}

impl From<ProductWarehouseRow> for ProductWarehouse {
    fn from(row: ProductWarehouseRow) -> Self {
        Self {
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            total_stock: row.total_stock,
        }
    }
}

impl From<ProductWarehouse> for ProductWarehouseRow {
    fn from(pw: ProductWarehouse) -> Self {
        Self {
            product_id: pw.product_id,
            warehouse_id: pw.warehouse_id,
            total_stock: pw.total_stock,
        }
    }
}

impl From<ProductDetailRow> for ProductDetail {
    fn from(row: ProductDetailRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            total_stock: row.total_stock,
            warehouse_id: row.warehouse_id,
        }
    }
}
