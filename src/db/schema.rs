/// Schema for the inventory store.
///
/// Timestamps are stored as `YYYY-MM-DDTHH:MM:SSZ` so they compare correctly
/// as text; calendar dates as `YYYY-MM-DD`.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vendors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    contact_email TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sku TEXT NOT NULL UNIQUE,
    category_id INTEGER REFERENCES categories(id),
    vendor_id INTEGER REFERENCES vendors(id),
    price REAL NOT NULL DEFAULT 0,
    quantity INTEGER NOT NULL DEFAULT 0,
    expiry_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);
CREATE INDEX IF NOT EXISTS idx_products_vendor ON products(vendor_id);
CREATE INDEX IF NOT EXISTS idx_products_quantity ON products(quantity);

CREATE TABLE IF NOT EXISTS inventory_movements (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    movement_type TEXT NOT NULL
        CHECK (movement_type IN ('IN', 'OUT', 'SALE', 'ADJUSTMENT', 'RETURN')),
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movements_product_time
    ON inventory_movements(product_id, created_at);
CREATE INDEX IF NOT EXISTS idx_movements_time ON inventory_movements(created_at);

CREATE TABLE IF NOT EXISTS purchase_orders (
    id INTEGER PRIMARY KEY,
    order_number TEXT NOT NULL UNIQUE,
    vendor_id INTEGER NOT NULL REFERENCES vendors(id),
    status TEXT NOT NULL
        CHECK (status IN ('PENDING', 'APPROVED', 'ORDERED', 'DELIVERED', 'CANCELLED')),
    total_amount REAL NOT NULL DEFAULT 0,
    ordered_at TEXT NOT NULL,
    expected_date TEXT,
    delivered_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_orders_vendor ON purchase_orders(vendor_id);

CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_user_time ON activity_logs(user_id, created_at);

CREATE TABLE IF NOT EXISTS ai_insights (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'MEDIUM',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS product_forecasts (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    forecast_date TEXT NOT NULL,
    predicted_demand REAL NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_forecasts_date ON product_forecasts(forecast_date);
"#;
