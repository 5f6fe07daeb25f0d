//! Snapshot demo
//!
//! Walks an order through a small pricing pipeline instrumented by hand. The discount
//! step fails, and the report printed to stdout shows the frames and variables that were
//! live when it did. A slow step then produces a timeout report.
//!
//! Run with `RUST_LOG=debug` to see the tracer's own diagnostics, and with
//! `SNAPERR_FORMAT=json` to get machine-readable reports.

use snaperr::prelude::*;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Order {
    id: u32,
    lines: Vec<(String, u32)>,
}

#[derive(Debug)]
struct PricingError(String);

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PricingError {}

type Traced<T> = std::result::Result<T, ErrorRef>;

fn apply_discount(tracer: &dyn Tracer, subtotal: u32, percent: u32) -> Traced<u32> {
    traced(
        tracer,
        Some(watch("Pricing")),
        "apply_discount",
        &[("subtotal", watch(subtotal)), ("percent", watch(percent))],
        |scope| {
            let discount = subtotal * percent / 100;
            scope.track("discount", watch(discount)).ok();
            subtotal
                .checked_sub(discount * 2)
                .ok_or_else(|| Arc::new(PricingError("discount exceeds subtotal".into())) as ErrorRef)
        },
    )
}

fn price_order(tracer: &dyn Tracer, order: &Order) -> Traced<u32> {
    let audit = Arc::new(Mutex::new(Vec::<String>::new()));

    traced(
        tracer,
        Some(watch("Pricing")),
        "price_order",
        &[("order", watch(order.clone()))],
        |scope| {
            scope.track("audit", watch_shared(Arc::clone(&audit))).ok();

            let mut subtotal = 0;
            for (item, cents) in &order.lines {
                subtotal += cents;
                scope.track("subtotal", watch(subtotal)).ok();
                if let Ok(mut audit) = audit.lock() {
                    audit.push(format!("added {}", item));
                }
            }

            apply_discount(tracer, subtotal, 60)
        },
    )
}

fn slow_step(tracer: &dyn Tracer) -> snaperr::Result<()> {
    let guard = ScopeGuard::enter(
        tracer,
        Some(watch("Warehouse")),
        "reserve_stock",
        &[("sku", watch("A-113"))],
    )?
    .with_timeout_threshold(10);

    guard.track("attempt", watch(1))?;
    thread::sleep(Duration::from_millis(25));
    Ok(())
}

fn main() -> snaperr::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SnaperrConfig::default();
    let tracer = SnaperrProvider::new(config).build();

    let order = Order {
        id: 7,
        lines: vec![("keyboard".into(), 4_900), ("cable".into(), 900)],
    };

    match price_order(&tracer, &order) {
        Ok(total) => println!("order {} costs {}", order.id, total),
        Err(e) => println!("pricing failed: {}", e),
    }

    slow_step(&tracer)?;

    let disabled = NullTracer::new();
    match price_order(&disabled, &order) {
        Ok(total) => println!("order {} costs {}", order.id, total),
        Err(e) => println!("pricing failed again, without a report: {}", e),
    }

    Ok(())
}
