diesel::table! {
    orders (id) {
        id -> Uuid,
        user_id -> Varchar,
        shop_id -> Varchar,
        amount -> Int8,
        status -> Varchar,
        created_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    order_items (order_id, product_id) {
        order_id -> Uuid,
        product_id -> Varchar,
        shop_id -> Varchar,
        warehouse_id -> Varchar,
        quantity -> Int4,
        unit_price -> Int8,
    }
}

diesel::table! {
    payments (id) {
        id -> Uuid,
        order_id -> Uuid,
        user_id -> Varchar,
        amount -> Int8,
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(payments -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    orders,
    order_items,
    payments,
);
