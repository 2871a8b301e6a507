pub mod coupon_redemptions;
pub mod coupons;
pub mod custom_designs;
pub mod order_items;
pub mod orders;
pub mod products;

pub use coupon_redemptions::Entity as CouponRedemptions;
pub use coupons::Entity as Coupons;
pub use custom_designs::Entity as CustomDesigns;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
