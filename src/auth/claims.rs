use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Bearer token payload. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn issue(user_id: Uuid, now: OffsetDateTime, ttl: Duration, iss: &str, aud: &str) -> Self {
        Self {
            sub: user_id,
            iat: now.unix_timestamp().max(0) as usize,
            exp: (now + ttl).unix_timestamp().max(0) as usize,
            iss: iss.to_string(),
            aud: aud.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn expiry_is_issue_time_plus_ttl() {
        let now = datetime!(2030-01-01 0:00 UTC);
        let c = Claims::issue(Uuid::nil(), now, Duration::days(7), "eventbook", "eventbook-users");
        assert_eq!(c.iat, now.unix_timestamp() as usize);
        assert_eq!(c.exp - c.iat, 7 * 24 * 60 * 60);
        assert_eq!((c.iss.as_str(), c.aud.as_str()), ("eventbook", "eventbook-users"));
    }
}
