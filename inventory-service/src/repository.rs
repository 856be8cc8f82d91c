use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{
    db_error, BindShopWarehousesRequest, CommerceError, OperationContext, Product, ProductDetail,
    ProductDetailsQuery, ProductWarehouse, Result, Shop, UpdateStockRequest, Warehouse,
};

use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Debug, Clone, Default)]
pub struct WarehouseQuery {
    pub ids: Vec<String>,
    pub name: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ShopQuery {
    pub ids: Vec<String>,
    pub name: Option<String>,
}

/// Durable store for the catalogue and the stock ledger.
///
/// `adjust_stock` is the single ledger mutation shared by product creation,
/// transfer and post-settlement reconciliation: it adds `delta` to the row,
/// creating it with `delta` when absent. A result below zero is refused
/// (`CHECK (total_stock >= 0)` on the table), so callers check the current
/// value before applying a negative delta.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()>;
    /// Returns false when no warehouse has that id.
    async fn set_warehouse_status(&self, id: &str, enabled: bool) -> Result<bool>;
    async fn find_warehouses(&self, query: &WarehouseQuery) -> Result<Vec<Warehouse>>;

    async fn insert_shop(&self, shop: &Shop) -> Result<()>;
    async fn find_shops(&self, query: &ShopQuery) -> Result<Vec<Shop>>;
    async fn upsert_shop_warehouses(&self, request: &BindShopWarehousesRequest) -> Result<()>;

    /// Inserts the product and its first ledger row in one transaction.
    async fn create_product(&self, product: &Product, initial: &ProductWarehouse) -> Result<()>;
    async fn find_product_by_name(&self, name: &str) -> Result<Product>;
    /// Products sold by a shop through its enabled warehouse bindings, ordered
    /// by product id then warehouse id.
    async fn product_details_by_shop(&self, query: &ProductDetailsQuery) -> Result<Vec<ProductDetail>>;

    async fn find_stock(&self, product_id: &str, warehouse_id: &str) -> Result<Option<ProductWarehouse>>;
    async fn adjust_stock(&self, product_id: &str, warehouse_id: &str, delta: i32) -> Result<()>;
    /// Absolute set. Returns false when the ledger row does not exist.
    async fn set_stock(&self, request: &UpdateStockRequest) -> Result<bool>;
    /// Moves `quantity` from source to destination in one transaction.
    async fn transfer_stock(
        &self,
        product_id: &str,
        source_warehouse_id: &str,
        destination_warehouse_id: &str,
        quantity: i32,
    ) -> Result<()>;
}

pub struct PgInventoryRepository {
    pool: DbPool,
}

impl PgInventoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.during("acquire database connection")
    }
}

async fn add_stock(
    conn: &mut AsyncPgConnection,
    row: ProductWarehouseRow,
    operation: &'static str,
) -> Result<()> {
    diesel::insert_into(product_warehouses::table)
        .values(&row)
        .on_conflict((product_warehouses::product_id, product_warehouses::warehouse_id))
        .do_update()
        .set(
            product_warehouses::total_stock
                .eq(product_warehouses::total_stock + excluded(product_warehouses::total_stock)),
        )
        .execute(conn)
        .await
        .map_err(db_error(operation))?;
    Ok(())
}

#[async_trait]
impl InventoryRepository for PgInventoryRepository {
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::insert_into(warehouses::table)
            .values(WarehouseRow::from(warehouse.clone()))
            .execute(&mut conn)
            .await
            .map_err(db_error("insert warehouse"))?;
        Ok(())
    }

    async fn set_warehouse_status(&self, id: &str, enabled: bool) -> Result<bool> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(warehouses::table.find(id))
            .set(warehouses::enabled.eq(enabled))
            .execute(&mut conn)
            .await
            .map_err(db_error("update warehouse status"))?;
        Ok(updated > 0)
    }

    async fn find_warehouses(&self, query: &WarehouseQuery) -> Result<Vec<Warehouse>> {
        let mut conn = self.conn().await?;
        let mut statement = warehouses::table.into_boxed();
        if !query.ids.is_empty() {
            statement = statement.filter(warehouses::id.eq_any(query.ids.clone()));
        }
        if let Some(name) = &query.name {
            statement = statement.filter(warehouses::name.eq(name.clone()));
        }
        if let Some(enabled) = query.enabled {
            statement = statement.filter(warehouses::enabled.eq(enabled));
        }

        let rows = statement
            .order(warehouses::id.asc())
            .load::<WarehouseRow>(&mut conn)
            .await
            .map_err(db_error("find warehouses"))?;
        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    async fn insert_shop(&self, shop: &Shop) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::insert_into(shops::table)
            .values(ShopRow::from(shop.clone()))
            .execute(&mut conn)
            .await
            .map_err(db_error("insert shop"))?;
        Ok(())
    }

    async fn find_shops(&self, query: &ShopQuery) -> Result<Vec<Shop>> {
        let mut conn = self.conn().await?;
        let mut statement = shops::table.into_boxed();
        if !query.ids.is_empty() {
            statement = statement.filter(shops::id.eq_any(query.ids.clone()));
        }
        if let Some(name) = &query.name {
            statement = statement.filter(shops::name.eq(name.clone()));
        }

        let rows = statement
            .order(shops::id.asc())
            .load::<ShopRow>(&mut conn)
            .await
            .map_err(db_error("find shops"))?;
        Ok(rows.into_iter().map(Shop::from).collect())
    }

    async fn upsert_shop_warehouses(&self, request: &BindShopWarehousesRequest) -> Result<()> {
        let mut conn = self.conn().await?;
        let bindings = request.bindings();
        let bindings: Vec<NewShopWarehouse<'_>> = bindings.iter().map(NewShopWarehouse::from).collect();

        diesel::insert_into(shop_warehouses::table)
            .values(&bindings)
            .on_conflict((shop_warehouses::shop_id, shop_warehouses::warehouse_id))
            .do_update()
            .set(shop_warehouses::enabled.eq(excluded(shop_warehouses::enabled)))
            .execute(&mut conn)
            .await
            .map_err(db_error("upsert shop warehouses"))?;
        Ok(())
    }

    async fn create_product(&self, product: &Product, initial: &ProductWarehouse) -> Result<()> {
        let mut conn = self.conn().await?;
        let product = ProductRow::from(product.clone());
        let stock = ProductWarehouseRow::from(initial.clone());

        conn.transaction::<_, CommerceError, _>(|conn| {
            Box::pin(async move {
                diesel::insert_into(products::table)
                    .values(&product)
                    .execute(conn)
                    .await
                    .map_err(db_error("insert product"))?;

                add_stock(conn, stock, "insert product warehouse").await
            })
        })
        .await
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Product> {
        let mut conn = self.conn().await?;
        let row = products::table
            .filter(products::name.eq(name))
            .first::<ProductRow>(&mut conn)
            .await
            .optional()
            .map_err(db_error("find product by name"))?;

        row.map(Product::from)
            .ok_or_else(|| CommerceError::not_found(format!("product with name '{}'", name)))
    }

    async fn product_details_by_shop(&self, query: &ProductDetailsQuery) -> Result<Vec<ProductDetail>> {
        let mut conn = self.conn().await?;
        let mut statement = products::table
            .inner_join(product_warehouses::table.on(product_warehouses::product_id.eq(products::id)))
            .inner_join(
                shop_warehouses::table
                    .on(shop_warehouses::warehouse_id.eq(product_warehouses::warehouse_id)),
            )
            .filter(shop_warehouses::shop_id.eq(query.shop_id.clone()))
            .filter(shop_warehouses::enabled.eq(true))
            .select((
                products::id,
                products::name,
                products::price,
                product_warehouses::total_stock,
                product_warehouses::warehouse_id,
            ))
            .order((products::id.asc(), product_warehouses::warehouse_id.asc()))
            .into_boxed();

        if !query.product_ids.is_empty() {
            statement = statement.filter(products::id.eq_any(query.product_ids.clone()));
        }
        if let Some(page) = query.page {
            let page = page.normalized();
            statement = statement.limit(page.page_size).offset(page.offset());
        }

        let rows = statement
            .load::<ProductDetailRow>(&mut conn)
            .await
            .map_err(db_error("get product details by shop"))?;
        Ok(rows.into_iter().map(ProductDetail::from).collect())
    }

    async fn find_stock(&self, product_id: &str, warehouse_id: &str) -> Result<Option<ProductWarehouse>> {
        let mut conn = self.conn().await?;
        let row = product_warehouses::table
            .find((product_id, warehouse_id))
            .first::<ProductWarehouseRow>(&mut conn)
            .await
            .optional()
            .map_err(db_error("find product warehouse"))?;
        Ok(row.map(ProductWarehouse::from))
    }

    async fn adjust_stock(&self, product_id: &str, warehouse_id: &str, delta: i32) -> Result<()> {
        let mut conn = self.conn().await?;
        let row = ProductWarehouseRow {
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            total_stock: delta,
        };
        add_stock(&mut conn, row, "adjust product warehouse stock").await
    }

    async fn set_stock(&self, request: &UpdateStockRequest) -> Result<bool> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            product_warehouses::table.find((request.product_id.as_str(), request.warehouse_id.as_str())),
        )
        .set(product_warehouses::total_stock.eq(request.total_stock))
        .execute(&mut conn)
        .await
        .map_err(db_error("update product stock"))?;
        Ok(updated > 0)
    }

    async fn transfer_stock(
        &self,
        product_id: &str,
        source_warehouse_id: &str,
        destination_warehouse_id: &str,
        quantity: i32,
    ) -> Result<()> {
        let mut conn = self.conn().await?;
        let outgoing = ProductWarehouseRow {
            product_id: product_id.to_string(),
            warehouse_id: source_warehouse_id.to_string(),
            total_stock: -quantity,
        };
        let incoming = ProductWarehouseRow {
            product_id: product_id.to_string(),
            warehouse_id: destination_warehouse_id.to_string(),
            total_stock: quantity,
        };

        conn.transaction::<_, CommerceError, _>(|conn| {
            Box::pin(async move {
                add_stock(conn, outgoing, "transfer out of source warehouse").await?;
                add_stock(conn, incoming, "transfer into destination warehouse").await
            })
        })
        .await
    }
}
