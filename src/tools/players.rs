//! Player lookup tools

use super::{parse_input, Tool, ToolContext, ToolError};
use crate::fpl::{Bootstrap, Fixture, Player};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_UPCOMING_FIXTURES: usize = 5;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 25;

/// Compact player view shared by both tools
fn player_summary(bootstrap: &Bootstrap, player: &Player) -> Value {
    json!({
        "id": player.id,
        "name": player.web_name,
        "team": bootstrap.team_short_name(player.team),
        "position": bootstrap.position_name(player.element_type),
        "price": player.price(),
        "total_points": player.total_points,
        "form": player.form,
        "selected_by_percent": player.selected_by_percent,
        "status": player.status,
    })
}

fn player_details(bootstrap: &Bootstrap, player: &Player, fixtures: &[Fixture]) -> Value {
    let upcoming: Vec<Value> = fixtures
        .iter()
        .take(MAX_UPCOMING_FIXTURES)
        .map(|f| {
            let opponent = if f.is_home { f.team_a } else { f.team_h };
            json!({
                "gameweek": f.event,
                "opponent": bootstrap.team_short_name(opponent),
                "venue": if f.is_home { "H" } else { "A" },
                "difficulty": f.difficulty,
                "kickoff_time": f.kickoff_time,
            })
        })
        .collect();

    let mut details = player_summary(bootstrap, player);
    if let Value::Object(map) = &mut details {
        map.insert("full_name".into(), json!(player.full_name()));
        map.insert(
            "team_name".into(),
            json!(bootstrap.team(player.team).map(|t| t.name.as_str())),
        );
        map.insert("points_per_game".into(), json!(player.points_per_game));
        map.insert("minutes".into(), json!(player.minutes));
        map.insert("goals_scored".into(), json!(player.goals_scored));
        map.insert("assists".into(), json!(player.assists));
        map.insert("clean_sheets".into(), json!(player.clean_sheets));
        if !player.news.is_empty() {
            map.insert("news".into(), json!(player.news));
        }
        map.insert("upcoming_fixtures".into(), Value::Array(upcoming));
    }
    details
}

/// Full profile plus the next few fixtures for one player
pub struct PlayerDetailsTool;

#[derive(Debug, Deserialize)]
struct PlayerDetailsInput {
    player_id: u32,
}

#[async_trait]
impl Tool for PlayerDetailsTool {
    fn name(&self) -> &'static str {
        "get_player_details"
    }

    fn description(&self) -> String {
        "Get detailed information about one Fantasy Premier League player: team, position, price (in millions), points, form, ownership, injury news and upcoming fixtures with difficulty ratings. Use search_players first if you only know the name.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["player_id"],
            "properties": {
                "player_id": {
                    "type": "integer",
                    "description": "FPL element id of the player"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let input: PlayerDetailsInput = parse_input(input)?;
        let bootstrap = ctx.bootstrap().await?;
        let player = bootstrap
            .player(input.player_id)
            .ok_or_else(|| ToolError::NotFound(format!("No player with id {}", input.player_id)))?;

        let summary = ctx.fpl().element_summary(input.player_id).await?;
        Ok(player_details(&bootstrap, player, &summary.fixtures))
    }
}

/// Filtered, points-ranked player search
pub struct SearchPlayersTool;

#[derive(Debug, Default, Deserialize)]
struct SearchInput {
    query: Option<String>,
    position: Option<String>,
    team: Option<String>,
    max_price: Option<f64>,
    limit: Option<usize>,
}

fn matches_position(bootstrap: &Bootstrap, player: &Player, wanted: &str) -> bool {
    let Some(position) = bootstrap.position(player.element_type) else {
        return false;
    };
    let wanted = wanted.trim().to_lowercase();
    let short = position.singular_name_short.to_lowercase();
    let plural = position.plural_name.to_lowercase();
    // Accept "MID", "mid", "midfielder", "Midfielders", "gk"
    short == wanted || short.starts_with(&wanted) || plural.starts_with(&wanted)
}

fn matches_team(bootstrap: &Bootstrap, player: &Player, wanted: &str) -> bool {
    let wanted = wanted.trim().to_lowercase();
    bootstrap.team(player.team).is_some_and(|team| {
        team.short_name.to_lowercase() == wanted || team.name.to_lowercase().contains(&wanted)
    })
}

fn search(bootstrap: &Bootstrap, input: &SearchInput) -> Value {
    let query = input
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let mut found: Vec<&Player> = bootstrap
        .elements
        .iter()
        .filter(|p| {
            query.as_ref().map_or(true, |q| {
                p.web_name.to_lowercase().contains(q) || p.full_name().to_lowercase().contains(q)
            })
        })
        .filter(|p| {
            input
                .position
                .as_deref()
                .map_or(true, |pos| matches_position(bootstrap, p, pos))
        })
        .filter(|p| {
            input
                .team
                .as_deref()
                .map_or(true, |team| matches_team(bootstrap, p, team))
        })
        .filter(|p| input.max_price.map_or(true, |max| p.price() <= max))
        .collect();

    found.sort_by(|a, b| b.total_points.cmp(&a.total_points).then(a.id.cmp(&b.id)));

    let limit = input
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let total_matches = found.len();
    let players: Vec<Value> = found
        .into_iter()
        .take(limit)
        .map(|p| player_summary(bootstrap, p))
        .collect();

    json!({
        "total_matches": total_matches,
        "players": players,
    })
}

#[async_trait]
impl Tool for SearchPlayersTool {
    fn name(&self) -> &'static str {
        "search_players"
    }

    fn description(&self) -> String {
        "Search Fantasy Premier League players by name, position, team and maximum price. Results are sorted by total points, highest first. Returns player ids for use with get_player_details.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Part of the player's name"
                },
                "position": {
                    "type": "string",
                    "description": "GKP, DEF, MID or FWD"
                },
                "team": {
                    "type": "string",
                    "description": "Team name or short name, e.g. Arsenal or ARS"
                },
                "max_price": {
                    "type": "number",
                    "description": "Maximum price in millions, e.g. 7.5"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default 10, max 25)"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let input: SearchInput = parse_input(input)?;
        let bootstrap = ctx.bootstrap().await?;
        Ok(search(&bootstrap, &input))
    }
}
