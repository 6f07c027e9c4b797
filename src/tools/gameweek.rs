//! Current and upcoming gameweek summary

use super::{Tool, ToolContext, ToolError};
use crate::fpl::{Bootstrap, Gameweek};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct GameweekInfoTool;

fn gameweek_summary(bootstrap: &Bootstrap, gw: &Gameweek) -> Value {
    let most_captained = gw
        .most_captained
        .and_then(|id| bootstrap.player(id))
        .map(|p| p.web_name.as_str());

    json!({
        "id": gw.id,
        "name": gw.name,
        "deadline_time": gw.deadline_time,
        "finished": gw.finished,
        "average_score": gw.average_entry_score,
        "highest_score": gw.highest_score,
        "most_captained": most_captained,
    })
}

fn gameweek_info(bootstrap: &Bootstrap) -> Value {
    json!({
        "current": bootstrap.current_gameweek().map(|gw| gameweek_summary(bootstrap, gw)),
        "next": bootstrap.next_gameweek().map(|gw| gameweek_summary(bootstrap, gw)),
        "total_gameweeks": bootstrap.events.len(),
    })
}

#[async_trait]
impl Tool for GameweekInfoTool {
    fn name(&self) -> &'static str {
        "get_gameweek_info"
    }

    fn description(&self) -> String {
        "Get the current and next Fantasy Premier League gameweek: deadlines, average and highest scores and the most captained player.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn run(&self, _input: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let bootstrap = ctx.bootstrap().await?;
        Ok(gameweek_info(&bootstrap))
    }
}
