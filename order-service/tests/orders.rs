mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Fixture, INITIAL_STOCK, PRICE};
use inventory_service::InventoryRepository;
use order_service::{OrderRepository, ReconcileJob, Reconciler, ReservationStore};
use shared::{
    BindShopWarehousesRequest, CommerceError, CreateWarehouseRequest, OrderItemRequest,
    OrderStatus, Page, PayOrderRequest, PaymentStatus, PlaceOrderRequest, TransferProductRequest,
    UpdateStockRequest, UpdateWarehouseStatusRequest,
};
use tokio::sync::Barrier;
use uuid::Uuid;

fn pay(order_id: Uuid, amount: i64, user_id: &str) -> PayOrderRequest {
    PayOrderRequest {
        order_id,
        amount,
        user_id: user_id.to_string(),
    }
}

#[tokio::test]
async fn order_then_payment_moves_stock_off_the_ledger() {
    let fx = Fixture::new().await;

    let order_id = fx.orders.place_order(&fx.order_request("u-1", 3)).await.unwrap();

    assert_eq!(fx.reservation("u-1").await, Some(3));
    assert_eq!(fx.available().await, 7);
    assert_eq!(fx.ledger().await, INITIAL_STOCK);

    let order = fx
        .order_repo
        .find_active_order(order_id, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(order.amount, 3 * PRICE);
    assert_eq!(order.status, OrderStatus::Pending);

    let payment_id = fx.settlement.pay_order(&pay(order_id, 150, "u-1")).await.unwrap();

    let order = fx
        .order_repo
        .find_active_order(order_id, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Succeeded);
    let payments = fx.order_repo.payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].id, payment_id);
    assert_eq!(payments[0].amount, 150);
    assert_eq!(payments[0].status, PaymentStatus::Paid);

    fx.wait_for_reconciliation("u-1", 7).await;
    assert_eq!(fx.available().await, 7);
}

#[tokio::test]
async fn insufficient_stock_leaves_nothing_behind() {
    let fx = Fixture::new().await;

    let err = fx
        .orders
        .place_order(&fx.order_request("u-1", INITIAL_STOCK + 1))
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::BadRequest(_)));
    assert_eq!(fx.reservation("u-1").await, None);
    assert!(fx.order_repo.orders().unwrap().is_empty());
    assert_eq!(fx.available().await, INITIAL_STOCK);
}

#[tokio::test]
async fn reservations_of_other_users_reduce_what_is_left() {
    let fx = Fixture::new().await;

    fx.orders.place_order(&fx.order_request("u-1", 6)).await.unwrap();
    let err = fx
        .orders
        .place_order(&fx.order_request("u-2", 6))
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::BadRequest(_)));
    assert_eq!(fx.reservation("u-2").await, None);
    assert_eq!(fx.available().await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_orders_each_end_with_a_hold_or_a_rejection() {
    let fx = Fixture::new().await;
    let barrier = Arc::new(Barrier::new(2));

    let tasks: Vec<_> = ["u-1", "u-2"]
        .into_iter()
        .map(|user| {
            let orders = fx.orders.clone();
            let barrier = barrier.clone();
            let request = fx.order_request(user, 6);
            tokio::spawn(async move {
                barrier.wait().await;
                orders.place_order(&request).await
            })
        })
        .collect();

    let mut placed = 0;
    for (task, user) in tasks.into_iter().zip(["u-1", "u-2"]) {
        match task.await.unwrap() {
            Ok(_) => {
                placed += 1;
                assert_eq!(fx.reservation(user).await, Some(6));
            }
            Err(err) => {
                assert!(matches!(err, CommerceError::BadRequest(_)));
                assert_eq!(fx.reservation(user).await, None);
            }
        }
    }

    // the availability check is not atomic with the hold, so both may pass
    assert!(placed >= 1);
    assert_eq!(fx.order_repo.orders().unwrap().len(), placed);
    assert_eq!(fx.ledger().await, INITIAL_STOCK);
}

#[tokio::test]
async fn amount_must_match_order_total() {
    let fx = Fixture::new().await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 2)).await.unwrap();

    let err = fx
        .settlement
        .pay_order(&pay(order_id, 99, "u-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::BadRequest(_)));
    assert!(fx.order_repo.payments_for_order(order_id).await.unwrap().is_empty());

    fx.settlement.pay_order(&pay(order_id, 100, "u-1")).await.unwrap();
}

#[tokio::test]
async fn an_order_can_only_be_paid_once() {
    let fx = Fixture::new().await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 3)).await.unwrap();

    fx.settlement.pay_order(&pay(order_id, 150, "u-1")).await.unwrap();
    fx.wait_for_reconciliation("u-1", 7).await;

    let err = fx
        .settlement
        .pay_order(&pay(order_id, 150, "u-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::BadRequest(_)));
    assert_eq!(fx.order_repo.payments_for_order(order_id).await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.ledger().await, 7);
}

#[tokio::test]
async fn expired_order_is_not_found_and_its_hold_is_gone() {
    let fx = Fixture::with_ttl(Duration::from_millis(30)).await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 3)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = fx
        .settlement
        .pay_order(&pay(order_id, 150, "u-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)));
    assert_eq!(fx.reservation("u-1").await, None);
    assert_eq!(fx.available().await, INITIAL_STOCK);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let fx = Fixture::new().await;
    let err = fx
        .settlement
        .pay_order(&pay(Uuid::new_v4(), 150, "u-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)));
}

#[tokio::test]
async fn order_items_keep_the_price_at_placement() {
    let fx = Fixture::new().await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 4)).await.unwrap();

    let items = fx.order_repo.order_items(order_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].unit_price, PRICE);
    assert_eq!(items[0].warehouse_id, fx.warehouse_id);
    assert_eq!(items[0].shop_id, fx.shop_id);

    let order = fx
        .order_repo
        .find_active_order(order_id, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(order.amount, items.iter().map(|i| i.subtotal().unwrap()).sum::<i64>());
}

#[tokio::test]
async fn falls_back_to_a_warehouse_that_can_cover_the_quantity() {
    let fx = Fixture::new().await;
    let second = fx
        .inventory_handler
        .create_warehouse(&CreateWarehouseRequest { name: "Bandung".to_string() })
        .await
        .unwrap();
    fx.inventory_handler
        .update_warehouse_status(&UpdateWarehouseStatusRequest {
            id: second.clone(),
            enabled: true,
        })
        .await
        .unwrap();
    fx.inventory_handler
        .bind_shop_to_warehouses(&BindShopWarehousesRequest {
            shop_id: fx.shop_id.clone(),
            warehouse_ids: vec![second.clone()],
            enabled: true,
        })
        .await
        .unwrap();
    fx.inventory.adjust_stock(&fx.product_id, &second, 50).await.unwrap();

    let order_id = fx.orders.place_order(&fx.order_request("u-1", 20)).await.unwrap();

    let items = fx.order_repo.order_items(order_id).await.unwrap();
    assert_eq!(items[0].warehouse_id, second);
    assert_eq!(fx.available().await, INITIAL_STOCK);
}

#[tokio::test]
async fn products_behind_a_disabled_binding_cannot_be_ordered() {
    let fx = Fixture::new().await;
    fx.inventory_handler
        .bind_shop_to_warehouses(&BindShopWarehousesRequest {
            shop_id: fx.shop_id.clone(),
            warehouse_ids: vec![fx.warehouse_id.clone()],
            enabled: false,
        })
        .await
        .unwrap();

    let err = fx
        .orders
        .place_order(&fx.order_request("u-1", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::BadRequest(_)));
}

#[tokio::test]
async fn invalid_order_requests_are_rejected() {
    let fx = Fixture::new().await;

    let empty = PlaceOrderRequest {
        items: Vec::new(),
        ..fx.order_request("u-1", 1)
    };
    let zero = fx.order_request("u-1", 0);
    let repeated = PlaceOrderRequest {
        items: vec![
            OrderItemRequest {
                product_id: fx.product_id.clone(),
                quantity: 1,
            },
            OrderItemRequest {
                product_id: fx.product_id.clone(),
                quantity: 2,
            },
        ],
        ..fx.order_request("u-1", 1)
    };

    for request in [empty, zero, repeated] {
        let err = fx.orders.place_order(&request).await.unwrap_err();
        assert!(matches!(err, CommerceError::BadRequest(_)));
    }
    assert_eq!(fx.reservation("u-1").await, None);
}

#[tokio::test]
async fn available_never_exceeds_the_ledger() {
    let fx = Fixture::new().await;
    fx.orders.place_order(&fx.order_request("u-1", 2)).await.unwrap();
    fx.orders.place_order(&fx.order_request("u-2", 5)).await.unwrap();

    let products = fx
        .availability
        .shop_products(&fx.shop_id, Default::default())
        .await
        .unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].total_stock, 3);
    assert!(products[0].total_stock <= fx.ledger().await);
}

#[tokio::test]
async fn stock_correction_below_reservations_blocks_new_orders() {
    let fx = Fixture::new().await;
    fx.orders.place_order(&fx.order_request("u-1", 6)).await.unwrap();
    fx.inventory_handler
        .update_product_stock(&UpdateStockRequest {
            product_id: fx.product_id.clone(),
            warehouse_id: fx.warehouse_id.clone(),
            total_stock: 4,
        })
        .await
        .unwrap();

    assert_eq!(fx.available().await, -2);
    let err = fx
        .orders
        .place_order(&fx.order_request("u-2", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::BadRequest(_)));
}

#[tokio::test]
async fn reconcile_decrements_even_when_the_hold_already_expired() {
    let fx = Fixture::new().await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 3)).await.unwrap();
    fx.reservations
        .release(&fx.reservation_key("u-1"))
        .await
        .unwrap();

    let reconciler = Reconciler::new(
        fx.order_repo.clone(),
        fx.inventory.clone(),
        fx.reservations.clone(),
    );
    let outcome = reconciler
        .reconcile(&ReconcileJob {
            order_id,
            user_id: "u-1".to_string(),
        })
        .await;

    assert_eq!(outcome.released, 1);
    assert_eq!(outcome.decremented, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(fx.ledger().await, 7);
}

async fn correct_stock(fx: &Fixture, total_stock: i32) {
    fx.inventory_handler
        .update_product_stock(&UpdateStockRequest {
            product_id: fx.product_id.clone(),
            warehouse_id: fx.warehouse_id.clone(),
            total_stock,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn reconcile_skips_a_decrement_the_ledger_cannot_cover() {
    let fx = Fixture::new().await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 6)).await.unwrap();
    correct_stock(&fx, 4).await;

    let reconciler = Reconciler::new(
        fx.order_repo.clone(),
        fx.inventory.clone(),
        fx.reservations.clone(),
    );
    let outcome = reconciler
        .reconcile(&ReconcileJob {
            order_id,
            user_id: "u-1".to_string(),
        })
        .await;

    assert_eq!(outcome.released, 1);
    assert_eq!(outcome.decremented, 0);
    assert_eq!(outcome.failed, 1);
    assert_eq!(fx.reservation("u-1").await, None);
    assert_eq!(fx.ledger().await, 4);
}

#[tokio::test]
async fn paying_after_a_stock_correction_never_drives_the_ledger_negative() {
    let fx = Fixture::new().await;
    let order_id = fx.orders.place_order(&fx.order_request("u-1", 6)).await.unwrap();
    correct_stock(&fx, 4).await;

    fx.settlement.pay_order(&pay(order_id, 6 * PRICE, "u-1")).await.unwrap();
    fx.wait_for_reconciliation("u-1", 4).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fx.ledger().await, 4);
}

#[tokio::test]
async fn order_amount_overflow_is_rejected_without_a_hold() {
    let fx = Fixture::new().await;
    let pricey = fx.add_product("Emas", i64::MAX / 2, 10).await;

    let err = fx
        .orders
        .place_order(&PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: pricey.clone(),
                quantity: 3,
            }],
            ..fx.order_request("u-1", 1)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::BadRequest(_)));
    assert_eq!(fx.hold(&pricey, &fx.warehouse_id, "u-1").await, None);
    assert!(fx.order_repo.orders().unwrap().is_empty());
}

#[tokio::test]
async fn listing_a_page_far_past_the_end_falls_back_to_the_first() {
    let fx = Fixture::new().await;

    let products = fx
        .availability
        .shop_products(
            &fx.shop_id,
            Page {
                page: i64::MAX,
                page_size: 10,
            },
        )
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_id, fx.product_id);
}

#[tokio::test]
async fn multi_item_order_amount_sums_every_line() {
    let fx = Fixture::new().await;
    let teh = fx.add_product("Teh", 70, 5).await;

    let order_id = fx
        .orders
        .place_order(&PlaceOrderRequest {
            items: vec![
                OrderItemRequest {
                    product_id: fx.product_id.clone(),
                    quantity: 2,
                },
                OrderItemRequest {
                    product_id: teh.clone(),
                    quantity: 3,
                },
            ],
            ..fx.order_request("u-1", 1)
        })
        .await
        .unwrap();

    let order = fx
        .order_repo
        .find_active_order(order_id, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(order.amount, 2 * PRICE + 3 * 70);
    assert_eq!(fx.order_repo.order_items(order_id).await.unwrap().len(), 2);
    assert_eq!(fx.reservation("u-1").await, Some(2));
    assert_eq!(fx.hold(&teh, &fx.warehouse_id, "u-1").await, Some(3));

    fx.settlement
        .pay_order(&pay(order_id, 2 * PRICE + 3 * 70, "u-1"))
        .await
        .unwrap();
    fx.wait_for_reconciliation("u-1", INITIAL_STOCK - 2).await;
    let settled = async {
        while fx.stock_of(&teh, &fx.warehouse_id).await != 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), settled).await.unwrap();
    assert_eq!(fx.hold(&teh, &fx.warehouse_id, "u-1").await, None);
}

#[tokio::test]
async fn short_later_item_keeps_earlier_holds_and_writes_no_order() {
    let fx = Fixture::new().await;
    let teh = fx.add_product("Teh", 70, 5).await;

    let err = fx
        .orders
        .place_order(&PlaceOrderRequest {
            items: vec![
                OrderItemRequest {
                    product_id: fx.product_id.clone(),
                    quantity: 2,
                },
                OrderItemRequest {
                    product_id: teh.clone(),
                    quantity: 6,
                },
            ],
            ..fx.order_request("u-1", 1)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CommerceError::BadRequest(_)));
    assert_eq!(fx.reservation("u-1").await, Some(2));
    assert_eq!(fx.hold(&teh, &fx.warehouse_id, "u-1").await, None);
    assert!(fx.order_repo.orders().unwrap().is_empty());
}

#[tokio::test]
async fn transfer_then_order_then_payment_settles_the_ledger() {
    let fx = Fixture::new().await;
    let gula = fx.add_product("Gula", 1000, 100).await;
    let overflow_site = fx
        .inventory_handler
        .create_warehouse(&CreateWarehouseRequest { name: "Bekasi".to_string() })
        .await
        .unwrap();

    fx.inventory_handler
        .transfer_product(&TransferProductRequest {
            product_id: gula.clone(),
            source_warehouse_id: fx.warehouse_id.clone(),
            destination_warehouse_id: overflow_site.clone(),
            quantity: 35,
        })
        .await
        .unwrap();
    assert_eq!(fx.stock_of(&gula, &fx.warehouse_id).await, 65);
    assert_eq!(fx.stock_of(&gula, &overflow_site).await, 35);

    let order_id = fx
        .orders
        .place_order(&PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: gula.clone(),
                quantity: 3,
            }],
            ..fx.order_request("u-1", 1)
        })
        .await
        .unwrap();
    assert_eq!(fx.availability.available(&gula, &fx.warehouse_id).await.unwrap(), 62);

    fx.settlement.pay_order(&pay(order_id, 3000, "u-1")).await.unwrap();

    let settled = async {
        while fx.hold(&gula, &fx.warehouse_id, "u-1").await.is_some()
            || fx.stock_of(&gula, &fx.warehouse_id).await != 62
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), settled).await.unwrap();
    assert_eq!(fx.availability.available(&gula, &fx.warehouse_id).await.unwrap(), 62);
    assert_eq!(fx.stock_of(&gula, &overflow_site).await, 35);
}
