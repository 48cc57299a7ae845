use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "relay.request.duration",
    metric_type: MetricType::Histogram,
    description: "Inbound request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "relay.requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const SUBMISSIONS: MetricDef = MetricDef {
    name: "relay.submissions",
    metric_type: MetricType::Counter,
    description: "Form submissions that reached the relay. Tagged with outcome.",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "relay.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Helpdesk call duration in seconds. Tagged with call, status.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    SUBMISSIONS,
    UPSTREAM_DURATION,
];
