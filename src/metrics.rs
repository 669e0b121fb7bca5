use std::sync::LazyLock;

use prometheus::*;

static METRIC_COMPARE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "mirage_compare_count",
        "count of the comparison requests",
        &["tracks", "enrichment", "image"]
    )
    .unwrap()
});

static METRIC_TRACK_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "mirage_track_duration",
        "duration of the per-track pipeline in seconds",
        &["track"]
    )
    .unwrap()
});

static METRIC_TOP_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "mirage_top_score",
        "similarity score of the best match per track",
        &["track"],
        (-10..=10).map(|x| x as f64 / 10.).collect()
    )
    .unwrap()
});

static METRIC_FALLBACK_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "mirage_fallback_count",
        "count of the local fallbacks taken after a capability failure",
        &["capability"]
    )
    .unwrap()
});

/// 增加对比请求计数
pub fn inc_compare_count(tracks: usize, enrichment: bool, image: bool) {
    let tracks = tracks.to_string();
    METRIC_COMPARE_COUNT
        .with_label_values(&[tracks.as_str(), bool_label(enrichment), bool_label(image)])
        .inc();
}

pub fn observe_track_duration(track: &str, duration: f32) {
    METRIC_TRACK_DURATION.with_label_values(&[track]).observe(duration as f64);
}

pub fn observe_top_score(track: &str, score: f32) {
    METRIC_TOP_SCORE.with_label_values(&[track]).observe(score as f64);
}

pub fn inc_fallback(capability: &str) {
    METRIC_FALLBACK_COUNT.with_label_values(&[capability]).inc();
}

fn bool_label(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
