//! REST routes for every resource and order kind.

use crate::handlers::orders::{self, OrderDocument, PurchaseOrders, SalesOrders};
use crate::handlers::resources;
use crate::model::{Customer, CustomerGroup, Product, ProductGroup, Resource, SalesEmployee, UomGroup};
use crate::state::AppState;
use axum::{routing::get, Router};

/// `<path>` for list/create and `<path>/:id` for read/update/delete.
fn resource_routes<R: Resource>() -> Router<AppState> {
    let path = R::entity().path;
    Router::new()
        .route(path, get(resources::list::<R>).post(resources::create::<R>))
        .route(
            &format!("{}/:id", path),
            get(resources::read::<R>)
                .put(resources::update::<R>)
                .delete(resources::delete::<R>),
        )
}

/// Order CRUD plus `<base>/attachment/:id` downloads.
fn order_routes<D: OrderDocument>() -> Router<AppState> {
    let base = D::KIND.route_base();
    Router::new()
        .route(base, get(orders::list::<D>).post(orders::create::<D>))
        .route(
            &format!("{}/:id", base),
            get(orders::read::<D>).put(orders::update::<D>).delete(orders::delete::<D>),
        )
        .route(&format!("{}/attachment/:id", base), get(orders::download::<D>))
}

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .merge(resource_routes::<Customer>())
        .merge(resource_routes::<CustomerGroup>())
        .merge(resource_routes::<Product>())
        .merge(resource_routes::<ProductGroup>())
        .merge(resource_routes::<UomGroup>())
        .merge(resource_routes::<SalesEmployee>())
        .merge(order_routes::<SalesOrders>())
        .merge(order_routes::<PurchaseOrders>())
        .with_state(state)
}
