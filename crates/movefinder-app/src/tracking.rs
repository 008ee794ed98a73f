// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::{Duration, OffsetDateTime};
use url::Url;

use crate::ids::SessionId;
use crate::model::TrackingInfo;

pub const TRACKING_KEY: &str = "movefinder.tracking";

/// Stored tracking older than this belongs to an earlier visit.
pub const SESSION_TTL: Duration = Duration::hours(12);

impl TrackingInfo {
    /// Returns `existing` untouched while its session is live; otherwise
    /// starts a new session.
    pub fn capture(
        existing: Option<TrackingInfo>,
        now: OffsetDateTime,
        referrer: Option<&str>,
        landing_url: Option<&str>,
    ) -> Self {
        if let Some(existing) = existing {
            if existing.is_live_at(now) {
                return existing;
            }
            tracing::debug!(
                session_id = existing.session_id.as_str(),
                "stored tracking session expired"
            );
        }

        let mut info = Self {
            session_id: SessionId::generate(),
            first_page_seen_at: now,
            referrer: referrer
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned),
            landing_page: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
        };

        let Some(raw) = landing_url.map(str::trim).filter(|value| !value.is_empty()) else {
            return info;
        };
        match Url::parse(raw) {
            Ok(url) => {
                for (key, value) in url.query_pairs() {
                    let slot = match &*key {
                        "utm_source" => &mut info.utm_source,
                        "utm_medium" => &mut info.utm_medium,
                        "utm_campaign" => &mut info.utm_campaign,
                        _ => continue,
                    };
                    if slot.is_none() && !value.is_empty() {
                        *slot = Some(value.into_owned());
                    }
                }
                info.landing_page = Some(format!(
                    "{}{}",
                    url.origin().ascii_serialization(),
                    url.path()
                ));
            }
            Err(error) => {
                tracing::debug!(
                    %error,
                    landing_url = raw,
                    "landing url is not parseable; campaign params skipped"
                );
            }
        }
        info
    }

    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now - self.first_page_seen_at < SESSION_TTL
    }
}
