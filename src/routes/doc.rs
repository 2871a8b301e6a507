use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        coupons::{
            CouponList, CreateCouponRequest, PublicCouponList, RedeemCouponRequest,
            UpdateCouponRequest, ValidateCouponRequest,
        },
        orders::{
            OrderLineRequest, OrderList, OrderWithItems, PlaceOrderRequest, ShippingAddress,
            UpdateOrderRequest,
        },
        products::ProductList,
    },
    models::{Coupon, Order, OrderItem, Product, PublicCoupon},
    pricing::{CouponCheck, DeliveryPolicy, DiscountType, OrderStatus, PaymentStatus, PricingError},
    response::{ApiResponse, Meta},
    routes::{admin, coupons, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        coupons::list_active_coupons,
        coupons::validate_coupon,
        coupons::redeem_coupon,
        orders::list_orders,
        orders::place_order,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order,
        admin::list_coupons,
        admin::create_coupon,
        admin::get_coupon,
        admin::update_coupon,
        admin::delete_coupon
    ),
    components(
        schemas(
            Product,
            Coupon,
            PublicCoupon,
            Order,
            OrderItem,
            DiscountType,
            OrderStatus,
            PaymentStatus,
            PricingError,
            CouponCheck,
            DeliveryPolicy,
            ProductList,
            CouponList,
            PublicCouponList,
            OrderList,
            OrderWithItems,
            OrderLineRequest,
            PlaceOrderRequest,
            ShippingAddress,
            UpdateOrderRequest,
            ValidateCouponRequest,
            RedeemCouponRequest,
            CreateCouponRequest,
            UpdateCouponRequest,
            params::SortOrder,
            params::ProductSortBy,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Coupon>,
            ApiResponse<CouponList>,
            ApiResponse<PublicCouponList>,
            ApiResponse<CouponCheck>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Coupons", description = "Coupon validation and redemption"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Admin", description = "Coupon management and order fulfilment"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_checkout_and_coupon_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/orders",
            "/api/coupons/validate",
            "/api/coupons/redeem",
            "/api/admin/coupons/{id}",
            "/api/admin/orders/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
