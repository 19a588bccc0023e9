use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide API counters, exposed at `/metrics`.
#[derive(Default)]
pub struct ApiMetrics {
    pub requests_total: AtomicU64,
    pub requests_rate_limited: AtomicU64,
    pub logins_succeeded: AtomicU64,
    pub logins_failed: AtomicU64,
    pub registrations: AtomicU64,
    pub token_refreshes: AtomicU64,
}

impl ApiMetrics {
    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.requests_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_login(&self, success: bool) {
        if success {
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logins_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refresh(&self) {
        self.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Serialize to Prometheus text exposition format.
    pub fn to_prometheus_text(&self, active_sessions: usize) -> String {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let limited = self.requests_rate_limited.load(Ordering::Relaxed);
        let login_ok = self.logins_succeeded.load(Ordering::Relaxed);
        let login_failed = self.logins_failed.load(Ordering::Relaxed);
        let registrations = self.registrations.load(Ordering::Relaxed);
        let refreshes = self.token_refreshes.load(Ordering::Relaxed);

        format!(
            "# HELP ld_nexus_requests_total HTTP requests received\n\
             # TYPE ld_nexus_requests_total counter\n\
             ld_nexus_requests_total {requests}\n\
             # HELP ld_nexus_requests_rate_limited_total Requests rejected by the rate limiter\n\
             # TYPE ld_nexus_requests_rate_limited_total counter\n\
             ld_nexus_requests_rate_limited_total {limited}\n\
             # HELP ld_nexus_logins_total Login attempts by outcome\n\
             # TYPE ld_nexus_logins_total counter\n\
             ld_nexus_logins_total{{outcome=\"success\"}} {login_ok}\n\
             ld_nexus_logins_total{{outcome=\"failure\"}} {login_failed}\n\
             # HELP ld_nexus_registrations_total Accounts registered\n\
             # TYPE ld_nexus_registrations_total counter\n\
             ld_nexus_registrations_total {registrations}\n\
             # HELP ld_nexus_token_refreshes_total Refresh token rotations\n\
             # TYPE ld_nexus_token_refreshes_total counter\n\
             ld_nexus_token_refreshes_total {refreshes}\n\
             # HELP ld_nexus_active_sessions Refresh tokens currently valid\n\
             # TYPE ld_nexus_active_sessions gauge\n\
             ld_nexus_active_sessions {active_sessions}\n"
        )
    }
}
