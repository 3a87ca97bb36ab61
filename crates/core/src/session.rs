// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-agent conversational state handle backed by a provider.

use crate::clock::format_ts;
use crate::error::CoreError;
use crate::id::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "SUSPENDED")]
    Suspended,
    #[serde(rename = "TERMINATED")]
    Terminated,
}

impl SessionState {
    /// `CREATED -> ACTIVE`, `ACTIVE <-> SUSPENDED`,
    /// `{ACTIVE, SUSPENDED, CREATED} -> TERMINATED`. Anything else is a fault.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, Active)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Created, Terminated)
                | (Active, Terminated)
                | (Suspended, Terminated)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Created => "CREATED",
            SessionState::Active => "ACTIVE",
            SessionState::Suspended => "SUSPENDED",
            SessionState::Terminated => "TERMINATED",
        }
    }
}

/// `provider_state` is opaque bytes produced by `ProviderSession::suspend`;
/// it is a performance optimization (fast restore), never the source of
/// truth — the event log is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub provider_name: String,
    pub model: String,
    #[serde(with = "ts_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_millis_opt")]
    pub suspended_at: Option<DateTime<Utc>>,
    #[serde(with = "provider_state_b64")]
    pub provider_state: Vec<u8>,
}

impl Session {
    pub fn new(id: SessionId, provider_name: String, model: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            state: SessionState::Created,
            provider_name,
            model,
            created_at: now,
            suspended_at: None,
            provider_state: Vec::new(),
        }
    }

    /// Validate and apply a state transition in place. Does not persist;
    /// the caller is responsible for the atomic rewrite.
    pub fn transition_to(&mut self, next: SessionState, now: DateTime<Utc>) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::SessionState {
                session_id: self.id.clone(),
                from: self.state.as_str().into(),
                to: next.as_str().into(),
            });
        }
        if next == SessionState::Suspended {
            self.suspended_at = Some(now);
        }
        self.state = next;
        Ok(())
    }

    /// `created_at` formatted per the on-disk contract.
    pub fn created_at_str(&self) -> String {
        format_ts(self.created_at)
    }
}

/// Serializes `DateTime<Utc>` through [`format_ts`] so on-disk timestamps
/// are always millisecond precision, matching spec §6's RFC 3339 contract
/// instead of chrono's default nanosecond-precision serde.
mod ts_millis {
    use super::format_ts;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_ts(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)).map_err(serde::de::Error::custom)
    }
}

mod ts_millis_opt {
    use super::format_ts;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&format_ts(*ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

mod provider_state_b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct SessionBuilder {
    id: SessionId,
    state: SessionState,
    provider_name: String,
    model: String,
    created_at: DateTime<Utc>,
    suspended_at: Option<DateTime<Utc>>,
    provider_state: Vec<u8>,
}

#[cfg(any(test, feature = "test-support"))]
impl Session {
    pub fn builder(id: impl Into<SessionId>) -> SessionBuilder {
        SessionBuilder {
            id: id.into(),
            state: SessionState::Created,
            provider_name: "mock".into(),
            model: "mock-model".into(),
            created_at: Utc::now(),
            suspended_at: None,
            provider_state: Vec::new(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl SessionBuilder {
    pub fn state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn provider_state(mut self, state: Vec<u8>) -> Self {
        self.provider_state = state;
        self
    }

    pub fn build(self) -> Session {
        Session {
            id: self.id,
            state: self.state,
            provider_name: self.provider_name,
            model: self.model,
            created_at: self.created_at,
            suspended_at: self.suspended_at,
            provider_state: self.provider_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_to_active_is_legal() {
        assert!(SessionState::Created.can_transition_to(SessionState::Active));
    }

    #[test]
    fn active_and_suspended_are_mutually_reachable() {
        assert!(SessionState::Active.can_transition_to(SessionState::Suspended));
        assert!(SessionState::Suspended.can_transition_to(SessionState::Active));
    }

    #[test]
    fn terminated_is_a_sink() {
        assert!(!SessionState::Terminated.can_transition_to(SessionState::Active));
        assert!(!SessionState::Terminated.can_transition_to(SessionState::Suspended));
    }

    #[test]
    fn created_cannot_go_directly_to_suspended() {
        assert!(!SessionState::Created.can_transition_to(SessionState::Suspended));
    }

    #[test]
    fn transition_to_updates_suspended_at() {
        let mut session = Session::builder("s1").state(SessionState::Active).build();
        let now = Utc::now();
        session.transition_to(SessionState::Suspended, now).unwrap();
        assert_eq!(session.suspended_at, Some(now));
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut session = Session::builder("s1").state(SessionState::Terminated).build();
        let err = session.transition_to(SessionState::Active, Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn provider_state_round_trips_through_json() {
        let session = Session::builder("s1").provider_state(vec![1, 2, 3, 255]).build();
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.provider_state, vec![1, 2, 3, 255]);
    }
}
