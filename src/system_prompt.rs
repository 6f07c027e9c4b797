//! System prompt construction
//!
//! The prompt is fixed apart from today's date and whether the user linked
//! their FPL manager ID.

use chrono::{NaiveDate, Utc};
use std::fmt::Write;

/// Base system prompt establishing the assistant's role
const BASE_PROMPT: &str = r"You are an expert Fantasy Premier League (FPL) assistant. You help managers with transfers, captaincy, chips, fixtures and squad planning.

Use the tools to look up live data instead of relying on memory: player prices, form, injuries and fixtures change every week. Use search_players to find player ids, then get_player_details for fixtures and news. Use get_gameweek_info for deadlines.

Prices are in millions (e.g. 7.5 means £7.5m). Be concise, give a clear recommendation, and mention the key numbers behind it. If a tool fails, say so briefly and work with what you have.";

/// Added when the request carries a manager ID
const MANAGER_CONTEXT: &str = r"

The user has linked their FPL team. Call get_manager_team to see their squad, bank and team value before giving transfer or captaincy advice.";

/// Added when there is no manager ID
const NO_MANAGER_CONTEXT: &str = r"

The user has not linked an FPL team, so get_manager_team is unavailable. If they ask about their own squad, ask them to list their players or to add their manager ID.";

pub fn build_system_prompt(has_manager_context: bool) -> String {
    build_system_prompt_on(has_manager_context, Utc::now().date_naive())
}

fn build_system_prompt_on(has_manager_context: bool, today: NaiveDate) -> String {
    let mut prompt = String::from(BASE_PROMPT);
    prompt.push_str(if has_manager_context {
        MANAGER_CONTEXT
    } else {
        NO_MANAGER_CONTEXT
    });
    let _ = write!(prompt, "\n\nToday's date is {}.", today.format("%Y-%m-%d"));
    prompt
}
