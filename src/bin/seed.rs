use chrono::{Duration, Utc};
use storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

// Custom designs belong to a shopper; tokens for this id can place orders with it.
const DEMO_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    seed_products(&pool).await?;
    seed_custom_design(&pool, DEMO_USER_ID).await?;
    seed_coupons(&pool).await?;

    println!("Seed completed. Demo user ID: {DEMO_USER_ID}");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Classic Crew Tee", "Heavyweight cotton crew neck", "t-shirts", 59900_i64, 120),
        ("Oversized Drop Tee", "Relaxed fit with dropped shoulders", "t-shirts", 79900, 80),
        ("Zip Hoodie", "Brushed fleece full-zip hoodie", "hoodies", 149900, 40),
        ("Canvas Tote", "Printable heavy canvas tote", "accessories", 29900, 200),
    ];

    for (name, desc, category, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, category, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(category)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_custom_design(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM custom_designs WHERE user_id = $1 AND name = $2")
            .bind(user_id)
            .bind("Ferris Print Tee")
            .fetch_optional(pool)
            .await?;

    if existing.is_none() {
        sqlx::query(
            r#"
            INSERT INTO custom_designs (id, user_id, name, price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind("Ferris Print Tee")
        .bind(89900_i64)
        .execute(pool)
        .await?;
    }

    println!("Seeded custom design for {user_id}");
    Ok(())
}

async fn seed_coupons(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let expiry = now + Duration::days(90);

    // (code, description, type, value, cap, min order, usage limit)
    let coupons = vec![
        ("SAVE20", "20% off your order", "PERCENTAGE", 20_i64, Some(50000_i64), 0_i64, None::<i32>),
        ("FLAT100", "100 off any order", "FLAT", 100, None, 0, Some(500)),
    ];

    for (code, description, discount_type, value, cap, min_order, usage_limit) in coupons {
        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, description, discount_type, discount_value, max_discount_amount,
                min_order_value, start_date, expiry_date, usage_limit, per_user_limit, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1, TRUE)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(description)
        .bind(discount_type)
        .bind(value)
        .bind(cap)
        .bind(min_order)
        .bind(now)
        .bind(expiry)
        .bind(usage_limit)
        .execute(pool)
        .await?;
    }

    println!("Seeded coupons");
    Ok(())
}
