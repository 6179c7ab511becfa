//! Interactive setup flow for the air-quality integration.
//!
//! An explicit finite-state machine: each step consumes one immutable state
//! record plus the user's input and returns the next state. Validation
//! errors are localized to the input field that caused them so the driver
//! can re-prompt for just that field; an unclassifiable error aborts the
//! whole flow instead of allowing retry-in-place.

use crate::config::AirQualityEntry;
use crate::poll::FetchError;

use super::client::AirQualityClient;
use super::client::Station;

pub const ERR_TOKEN_INVALID: &str = "api_token_invalid";
pub const ERR_OVER_QUOTA: &str = "api_over_quota";
pub const ERR_NO_STATIONS: &str = "no_matching_stations_found";
pub const ERR_UNKNOWN_STATION: &str = "unknown_station";

/// Which input field a validation error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowField {
    ApiToken,
    Keyword,
    Station,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// Re-promptable: the named field caused the failure.
    #[error("invalid {field:?}: {code}")]
    Field { field: FlowField, code: &'static str },

    /// Not re-promptable: the flow ends here.
    #[error("setup flow aborted: {0}")]
    Aborted(String),
}

/// Input for the first step.
#[derive(Debug, Clone)]
pub struct CredentialsInput {
    pub token: String,
    pub keyword: String,
    pub update_interval: u64,
}

/// State carried into the station-selection step: exactly the fields the
/// next step needs, nothing mutated in place.
#[derive(Debug, Clone)]
pub struct PickStationState {
    pub token: String,
    pub update_interval: u64,
    pub candidates: Vec<Station>,
}

/// A finished flow: everything needed to write a config entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySpec {
    pub title: String,
    pub station_id: i64,
    pub token: String,
    pub update_interval: u64,
}

/// The flow's states, in step order.
#[derive(Debug, Clone)]
pub enum FlowState {
    PickStation(PickStationState),
    Complete(EntrySpec),
}

/// Step 1: validate the credential by searching, and collect candidates.
pub async fn submit_credentials(
    client: &dyn AirQualityClient,
    input: &CredentialsInput,
) -> Result<FlowState, FlowError> {
    match client.search(&input.keyword).await {
        Ok(stations) if stations.is_empty() => Err(FlowError::Field {
            field: FlowField::Keyword,
            code: ERR_NO_STATIONS,
        }),
        Ok(stations) => Ok(FlowState::PickStation(PickStationState {
            token: input.token.clone(),
            update_interval: input.update_interval,
            candidates: stations,
        })),
        Err(FetchError::Auth(_)) => Err(FlowError::Field {
            field: FlowField::ApiToken,
            code: ERR_TOKEN_INVALID,
        }),
        Err(FetchError::Quota(_)) => Err(FlowError::Field {
            field: FlowField::ApiToken,
            code: ERR_OVER_QUOTA,
        }),
        Err(FetchError::NotFound(_)) => Err(FlowError::Field {
            field: FlowField::Keyword,
            code: ERR_NO_STATIONS,
        }),
        Err(FetchError::Unknown(message)) => Err(FlowError::Aborted(message)),
    }
}

/// Step 2: pick one of the candidate stations by uid.
pub fn pick_station(state: PickStationState, uid: i64) -> Result<FlowState, FlowError> {
    let station = state
        .candidates
        .iter()
        .find(|s| s.uid == uid)
        .ok_or(FlowError::Field {
            field: FlowField::Station,
            code: ERR_UNKNOWN_STATION,
        })?;

    Ok(FlowState::Complete(EntrySpec {
        title: station.name.clone(),
        station_id: station.uid,
        token: state.token,
        update_interval: state.update_interval,
    }))
}

/// Options update for an existing entry.
#[derive(Debug, Clone)]
pub struct OptionsUpdate {
    pub token: String,
    pub update_interval: u64,
}

impl OptionsUpdate {
    /// Build an update from optional replacements; an absent value keeps
    /// the entry's current one.
    pub fn merged(
        entry: &AirQualityEntry,
        token: Option<String>,
        update_interval: Option<u64>,
    ) -> Self {
        Self {
            token: token.unwrap_or_else(|| entry.token.clone()),
            update_interval: update_interval.unwrap_or(entry.update_interval),
        }
    }

    /// Apply the update to an existing entry.
    ///
    /// The token is deliberately not re-validated against the vendor here,
    /// matching the create/update asymmetry of the flow: a rejected token
    /// surfaces as poll failures on the next cycle rather than blocking the
    /// update.
    pub fn apply(self, entry: &mut AirQualityEntry) {
        entry.token = self.token;
        entry.update_interval = self.update_interval;
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::mock::MockAirQualityClient;
    use super::*;

    fn input() -> CredentialsInput {
        CredentialsInput {
            token: "secret".to_string(),
            keyword: "beijing".to_string(),
            update_interval: 600,
        }
    }

    fn stations() -> Vec<Station> {
        vec![
            Station {
                uid: 1451,
                name: "Beijing (北京)".to_string(),
            },
            Station {
                uid: 99,
                name: "Beijing US Embassy".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_happy_path_yields_complete_entry() {
        let client = MockAirQualityClient::new();
        client.set_search(Ok(stations()));

        let state = match submit_credentials(&client, &input()).await.unwrap() {
            FlowState::PickStation(state) => state,
            other => panic!("expected PickStation, got {:?}", other),
        };
        assert_eq!(state.candidates.len(), 2);

        let spec = match pick_station(state, 1451).unwrap() {
            FlowState::Complete(spec) => spec,
            other => panic!("expected Complete, got {:?}", other),
        };
        assert_eq!(
            spec,
            EntrySpec {
                title: "Beijing (北京)".to_string(),
                station_id: 1451,
                token: "secret".to_string(),
                update_interval: 600,
            }
        );
    }

    #[tokio::test]
    async fn test_bad_token_localizes_to_token_field() {
        let client = MockAirQualityClient::new();
        client.set_search(Err(FetchError::Auth("Invalid key".to_string())));

        let err = submit_credentials(&client, &input()).await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Field {
                field: FlowField::ApiToken,
                code: ERR_TOKEN_INVALID,
            }
        );
    }

    #[tokio::test]
    async fn test_quota_localizes_to_token_field() {
        let client = MockAirQualityClient::new();
        client.set_search(Err(FetchError::Quota("Over quota".to_string())));

        let err = submit_credentials(&client, &input()).await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Field {
                field: FlowField::ApiToken,
                code: ERR_OVER_QUOTA,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_search_localizes_to_keyword_field() {
        let client = MockAirQualityClient::new();
        client.set_search(Ok(vec![]));

        let err = submit_credentials(&client, &input()).await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Field {
                field: FlowField::Keyword,
                code: ERR_NO_STATIONS,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_error_aborts_the_flow() {
        let client = MockAirQualityClient::new();
        client.set_search(Err(FetchError::Unknown("tls handshake failed".to_string())));

        let err = submit_credentials(&client, &input()).await.unwrap_err();
        assert!(matches!(err, FlowError::Aborted(_)));
    }

    #[test]
    fn test_picking_an_unlisted_station_is_a_field_error() {
        let state = PickStationState {
            token: "secret".to_string(),
            update_interval: 600,
            candidates: stations(),
        };

        let err = pick_station(state, 424242).unwrap_err();
        assert_eq!(
            err,
            FlowError::Field {
                field: FlowField::Station,
                code: ERR_UNKNOWN_STATION,
            }
        );
    }

    #[test]
    fn test_options_update_applies_without_revalidation() {
        let mut entry = AirQualityEntry {
            token: "old".to_string(),
            station_id: 1451,
            name: None,
            update_interval: 900,
            enabled: true,
        };

        OptionsUpdate {
            token: "new".to_string(),
            update_interval: 300,
        }
        .apply(&mut entry);

        assert_eq!(entry.token, "new");
        assert_eq!(entry.update_interval, 300);
        // Untouched fields survive.
        assert_eq!(entry.station_id, 1451);
    }

    #[test]
    fn test_merged_update_keeps_absent_values() {
        let mut entry = AirQualityEntry {
            token: "old".to_string(),
            station_id: 1451,
            name: None,
            update_interval: 900,
            enabled: true,
        };

        // Only the interval changes; the token is kept.
        OptionsUpdate::merged(&entry, None, Some(300)).apply(&mut entry);
        assert_eq!(entry.token, "old");
        assert_eq!(entry.update_interval, 300);

        // Only the token changes; the interval is kept.
        OptionsUpdate::merged(&entry, Some("new".to_string()), None).apply(&mut entry);
        assert_eq!(entry.token, "new");
        assert_eq!(entry.update_interval, 300);
    }
}
