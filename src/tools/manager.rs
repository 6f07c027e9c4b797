//! The requesting manager's squad for a gameweek

use super::{parse_input, Tool, ToolContext, ToolError};
use crate::fpl::{Bootstrap, Entry, Picks};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Squad slots 1-11 start, 12-15 are the bench
const STARTING_SLOTS: u32 = 11;

pub struct ManagerTeamTool;

#[derive(Debug, Deserialize)]
struct ManagerTeamInput {
    gameweek: Option<u32>,
}

fn tenths(value: u32) -> f64 {
    f64::from(value) / 10.0
}

fn manager_team(bootstrap: &Bootstrap, entry: &Entry, picks: &Picks) -> Value {
    let squad: Vec<Value> = picks
        .picks
        .iter()
        .map(|pick| {
            let player = bootstrap.player(pick.element);
            json!({
                "slot": pick.position,
                "player_id": pick.element,
                "name": player.map(|p| p.web_name.as_str()),
                "team": player.map(|p| bootstrap.team_short_name(p.team)),
                "position": player.map(|p| bootstrap.position_name(p.element_type)),
                "price": player.map(crate::fpl::Player::price),
                "total_points": player.map(|p| p.total_points),
                "starting": pick.position <= STARTING_SLOTS,
                "is_captain": pick.is_captain,
                "is_vice_captain": pick.is_vice_captain,
                "multiplier": pick.multiplier,
            })
        })
        .collect();

    let history = &picks.entry_history;
    json!({
        "manager": {
            "id": entry.id,
            "team_name": entry.name,
            "manager_name": format!("{} {}", entry.player_first_name, entry.player_last_name).trim(),
            "overall_points": entry.summary_overall_points,
            "overall_rank": entry.summary_overall_rank,
        },
        "gameweek": {
            "id": history.event,
            "points": history.points,
            "total_points": history.total_points,
            "rank": history.rank,
            "bank": tenths(history.bank),
            "team_value": tenths(history.value),
            "transfers": history.event_transfers,
            "transfer_cost": history.event_transfers_cost,
            "active_chip": picks.active_chip,
        },
        "picks": squad,
    })
}

#[async_trait]
impl Tool for ManagerTeamTool {
    fn name(&self) -> &'static str {
        "get_manager_team"
    }

    fn description(&self) -> String {
        "Get the user's own FPL team: manager summary, the 15 picks with captaincy and bench order, bank and team value for a gameweek. Only available when the user has linked their manager ID.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "gameweek": {
                    "type": "integer",
                    "description": "Gameweek number; defaults to the current gameweek"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let input: ManagerTeamInput = parse_input(input)?;
        let manager_id = ctx.require_manager()?;
        let bootstrap = ctx.bootstrap().await?;
        let entry = ctx.fpl().entry(manager_id).await?;

        let gameweek = input
            .gameweek
            .or_else(|| bootstrap.current_gameweek().map(|gw| gw.id))
            .or(entry.current_event)
            .ok_or_else(|| ToolError::NotFound("The season has not started yet".to_string()))?;

        let picks = ctx.fpl().entry_picks(manager_id, gameweek).await?;
        Ok(manager_team(&bootstrap, &entry, &picks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fpl::fixtures;

    fn entry() -> Entry {
        serde_json::from_value(json!({
            "id": 1234,
            "name": "Klopp's Kids",
            "player_first_name": "Sam",
            "player_last_name": "Jones",
            "summary_overall_points": 480,
            "summary_overall_rank": 120_000,
            "summary_event_points": 62,
            "current_event": 8
        }))
        .unwrap()
    }

    fn picks() -> Picks {
        serde_json::from_value(json!({
            "active_chip": "3xc",
            "entry_history": {"event": 8, "points": 62, "total_points": 480, "rank": 95_000, "bank": 5, "value": 1012, "event_transfers": 1, "event_transfers_cost": 4},
            "picks": [
                {"element": 351, "position": 1, "multiplier": 3, "is_captain": true, "is_vice_captain": false},
                {"element": 328, "position": 2, "multiplier": 1, "is_captain": false, "is_vice_captain": true},
                {"element": 1, "position": 12, "multiplier": 0, "is_captain": false, "is_vice_captain": false},
                {"element": 777, "position": 13, "multiplier": 0, "is_captain": false, "is_vice_captain": false}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_manager_team_shape() {
        let team = manager_team(&fixtures::bootstrap(), &entry(), &picks());
        assert_eq!(team["manager"]["team_name"], "Klopp's Kids");
        assert_eq!(team["manager"]["manager_name"], "Sam Jones");
        assert_eq!(team["gameweek"]["bank"], 0.5);
        assert_eq!(team["gameweek"]["active_chip"], "3xc");

        let squad = team["picks"].as_array().unwrap();
        assert_eq!(squad[0]["name"], "Haaland");
        assert_eq!(squad[0]["is_captain"], true);
        assert_eq!(squad[0]["starting"], true);
        assert_eq!(squad[2]["starting"], false);
        // Unknown element ids still appear, without player data
        assert_eq!(squad[3]["player_id"], 777);
        assert!(squad[3]["name"].is_null());
    }

    #[tokio::test]
    async fn test_requires_manager_context() {
        let ctx = ToolContext::with_bootstrap(None, fixtures::bootstrap());
        let err = ManagerTeamTool.run(json!({}), ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::NoManagerContext));
    }

    #[tokio::test]
    async fn test_rejects_bad_gameweek() {
        let ctx = ToolContext::with_bootstrap(Some(1234), fixtures::bootstrap());
        let err = ManagerTeamTool
            .run(json!({"gameweek": "last"}), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
