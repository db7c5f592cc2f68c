use lazy_static::lazy_static;
use prometheus::{
    Counter, GaugeVec, Histogram, IntCounterVec, register_counter, register_gauge_vec,
    register_histogram, register_int_counter_vec,
};

lazy_static! {
    pub static ref CYCLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bot_cycles_total",
        "Completed cycles by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref POSTS_PUBLISHED: Counter =
        register_counter!("bot_posts_published_total", "Posts published to the destination").unwrap();
    pub static ref VALIDATION_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "bot_validation_rejections_total",
        "Generated posts rejected, by failing check",
        &["check"]
    )
    .unwrap();
    pub static ref GENERATION_LATENCY: Histogram = register_histogram!(
        "bot_generation_latency_seconds",
        "Model generation latency in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();
    pub static ref CYCLE_DURATION: Histogram = register_histogram!(
        "bot_cycle_duration_seconds",
        "Wall time of one cycle, excluding the inter-cycle sleep",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();
    pub static ref RATE_WINDOW_USAGE: GaugeVec = register_gauge_vec!(
        "bot_rate_window_usage",
        "Publishes counted in the current window, by horizon",
        &["horizon"]
    )
    .unwrap();
}
