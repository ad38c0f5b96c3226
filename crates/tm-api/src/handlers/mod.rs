pub mod briefs;
pub mod health;
pub mod matches;
