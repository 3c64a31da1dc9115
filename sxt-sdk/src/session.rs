use chrono::{DateTime, Utc};

use sxt_api::BearerTokenSet;

/// Seconds of remaining validity below which a token is rotated
pub const LOW_WATER_MARK: i64 = 120;

/// What to do with the current session before handing out a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// The access token still has more than the low-water mark left
    Reuse,
    /// The access token is nearly spent but the refresh token is not
    Refresh,
    /// Both tokens are nearly spent, or there is no session
    Reauthenticate,
}

/// A bearer token set together with the moment it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub tokens: BearerTokenSet,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(tokens: BearerTokenSet) -> Self {
        Self::with_issued_at(tokens, Utc::now())
    }

    pub fn with_issued_at(tokens: BearerTokenSet, issued_at: DateTime<Utc>) -> Self {
        Self { tokens, issued_at }
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.tokens.refresh_token
    }

    fn elapsed(&self, now: DateTime<Utc>) -> i64 {
        (now - self.issued_at).num_seconds()
    }

    /// Seconds the access token has left at `now`. Negative once expired.
    pub fn access_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.tokens.access_token_expires - self.elapsed(now)
    }

    /// Seconds the refresh token has left at `now`. Negative once expired.
    pub fn refresh_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.tokens.refresh_token_expires - self.elapsed(now)
    }

    pub fn rotation_at(&self, now: DateTime<Utc>) -> Rotation {
        if self.access_remaining(now) > LOW_WATER_MARK {
            Rotation::Reuse
        } else if self.refresh_remaining(now) > LOW_WATER_MARK {
            Rotation::Refresh
        } else {
            Rotation::Reauthenticate
        }
    }
}

/// Rotation decision for an optional session
pub fn rotation_for(session: Option<&Session>, now: DateTime<Utc>) -> Rotation {
    session.map_or(Rotation::Reauthenticate, |s| s.rotation_at(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(access: i64, refresh: i64, elapsed: i64, now: DateTime<Utc>) -> Session {
        Session::with_issued_at(
            BearerTokenSet {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                access_token_expires: access,
                refresh_token_expires: refresh,
            },
            now - Duration::seconds(elapsed),
        )
    }

    #[test]
    fn test_threshold_boundaries() {
        let now = Utc::now();

        // 121 s of access left
        assert_eq!(session(1800, 7200, 1679, now).rotation_at(now), Rotation::Reuse);
        // 119 s of access left, refresh healthy
        assert_eq!(session(1800, 7200, 1681, now).rotation_at(now), Rotation::Refresh);
        // exactly at the mark counts as spent
        assert_eq!(session(1800, 7200, 1680, now).rotation_at(now), Rotation::Refresh);
        // both at 119 s
        assert_eq!(session(119, 119, 0, now).rotation_at(now), Rotation::Reauthenticate);
    }

    #[test]
    fn test_remaining_goes_negative() {
        let now = Utc::now();
        let s = session(60, 600, 100, now);
        assert_eq!(s.access_remaining(now), -40);
        assert_eq!(s.refresh_remaining(now), 500);
        assert_eq!(s.rotation_at(now), Rotation::Refresh);
    }

    #[test]
    fn test_no_session_reauthenticates() {
        assert_eq!(rotation_for(None, Utc::now()), Rotation::Reauthenticate);
    }
}
