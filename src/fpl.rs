//! Client for the public fantasy-football data API
//!
//! Only the fields the chat tools read are modelled; everything else in the
//! upstream payloads is ignored.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum FplError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Upstream returned {status} for {path}")]
    Status { status: StatusCode, path: String },
}

/// Thin typed wrapper over the REST endpoints; cheap to clone
#[derive(Debug, Clone)]
pub struct FplClient {
    client: Client,
    base_url: String,
}

impl FplClient {
    pub fn new(base_url: &str) -> Result<Self, FplError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("fpl_chat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FplError> {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(%url, "FPL request");

        let response = self.client.get(&url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(FplError::NotFound(path.to_string())),
            status => Err(FplError::Status {
                status,
                path: path.to_string(),
            }),
        }
    }

    /// Season-wide static data: gameweeks, teams, players, positions
    pub async fn bootstrap(&self) -> Result<Bootstrap, FplError> {
        self.get_json("bootstrap-static/").await
    }

    pub async fn element_summary(&self, player_id: u32) -> Result<ElementSummary, FplError> {
        self.get_json(&format!("element-summary/{player_id}/")).await
    }

    pub async fn entry(&self, manager_id: u64) -> Result<Entry, FplError> {
        self.get_json(&format!("entry/{manager_id}/")).await
    }

    pub async fn entry_picks(&self, manager_id: u64, gameweek: u32) -> Result<Picks, FplError> {
        self.get_json(&format!("entry/{manager_id}/event/{gameweek}/picks/"))
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bootstrap {
    pub events: Vec<Gameweek>,
    pub teams: Vec<Team>,
    pub elements: Vec<Player>,
    pub element_types: Vec<Position>,
}

impl Bootstrap {
    pub fn current_gameweek(&self) -> Option<&Gameweek> {
        self.events.iter().find(|gw| gw.is_current)
    }

    pub fn next_gameweek(&self) -> Option<&Gameweek> {
        self.events.iter().find(|gw| gw.is_next)
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.elements.iter().find(|p| p.id == id)
    }

    pub fn team(&self, id: u32) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn position(&self, id: u32) -> Option<&Position> {
        self.element_types.iter().find(|p| p.id == id)
    }

    pub fn team_short_name(&self, id: u32) -> String {
        self.team(id)
            .map_or_else(|| format!("team {id}"), |t| t.short_name.clone())
    }

    pub fn position_name(&self, id: u32) -> String {
        self.position(id)
            .map_or_else(|| "UNK".to_string(), |p| p.singular_name_short.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gameweek {
    pub id: u32,
    pub name: String,
    pub deadline_time: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_next: bool,
    pub average_entry_score: Option<i64>,
    pub highest_score: Option<i64>,
    pub most_captained: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub strength: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Player {
    pub id: u32,
    pub web_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub second_name: String,
    pub team: u32,
    pub element_type: u32,
    /// Price in tenths of a million
    pub now_cost: u32,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub points_per_game: String,
    #[serde(default)]
    pub selected_by_percent: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub news: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub goals_scored: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub clean_sheets: u32,
}

impl Player {
    pub fn price(&self) -> f64 {
        f64::from(self.now_cost) / 10.0
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.second_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub id: u32,
    /// GKP, DEF, MID, FWD
    pub singular_name_short: String,
    #[serde(default)]
    pub plural_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSummary {
    #[serde(default)]
    pub fixtures: Vec<Fixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub event: Option<u32>,
    pub team_h: u32,
    pub team_a: u32,
    pub is_home: bool,
    pub difficulty: u32,
    pub kickoff_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub player_first_name: String,
    #[serde(default)]
    pub player_last_name: String,
    pub summary_overall_points: Option<i64>,
    pub summary_overall_rank: Option<u64>,
    pub summary_event_points: Option<i64>,
    pub current_event: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Picks {
    pub picks: Vec<Pick>,
    pub entry_history: EntryHistory,
    pub active_chip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pick {
    pub element: u32,
    pub position: u32,
    pub multiplier: u32,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice_captain: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryHistory {
    pub event: u32,
    pub points: i64,
    pub total_points: i64,
    pub rank: Option<u64>,
    /// Tenths of a million, like player prices
    pub bank: u32,
    pub value: u32,
    #[serde(default)]
    pub event_transfers: u32,
    #[serde(default)]
    pub event_transfers_cost: u32,
}
