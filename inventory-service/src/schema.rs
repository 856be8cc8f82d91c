diesel::table! {
    warehouses (id) {
        id -> Varchar,
        name -> Varchar,
        enabled -> Bool,
    }
}

diesel::table! {
    shops (id) {
        id -> Varchar,
        name -> Varchar,
    }
}

diesel::table! {
    shop_warehouses (shop_id, warehouse_id) {
        shop_id -> Varchar,
        warehouse_id -> Varchar,
        enabled -> Bool,
    }
}

diesel::table! {
    products (id) {
        id -> Varchar,
        name -> Varchar,
        price -> Int8,
    }
}

diesel::table! {
    product_warehouses (product_id, warehouse_id) {
        product_id -> Varchar,
        warehouse_id -> Varchar,
        total_stock -> Int4,
    }
}

diesel::joinable!(product_warehouses -> products (product_id));
diesel::joinable!(product_warehouses -> warehouses (warehouse_id));
diesel::joinable!(shop_warehouses -> shops (shop_id));
diesel::joinable!(shop_warehouses -> warehouses (warehouse_id));

diesel::allow_tables_to_appear_in_same_query!(
    warehouses,
    shops,
    shop_warehouses,
    products,
    product_warehouses,
);
