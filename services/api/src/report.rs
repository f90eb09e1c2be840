use crate::infra::build_service;
use clap::Args;
use mep_score::config::AppConfig;
use mep_score::data::MepId;
use mep_score::error::AppError;
use mep_score::scoring::{ScoreBreakdown, ScoreCategory};
use mep_score::service::TermScores;
use mep_score::terms::TermId;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct RankingArgs {
    /// Parliamentary term number (8, 9 or 10)
    #[arg(long)]
    pub(crate) term: u32,
    /// Only print the best N members
    #[arg(long)]
    pub(crate) top: Option<usize>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
    /// Override the configured dataset directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Parliamentary term number (8, 9 or 10)
    #[arg(long)]
    pub(crate) term: u32,
    /// Member identifier as published by the parliament
    #[arg(long = "mep")]
    pub(crate) mep: String,
    /// Emit JSON instead of a breakdown
    #[arg(long)]
    pub(crate) json: bool,
    /// Override the configured dataset directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

fn load_config(data_dir: Option<PathBuf>) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load()?;
    if let Some(data_dir) = data_dir {
        config.data.data_dir = data_dir;
    }
    Ok(config)
}

pub(crate) async fn run_ranking(args: RankingArgs) -> Result<(), AppError> {
    let config = load_config(args.data_dir)?;
    let service = build_service(&config)?;
    let mut ranking = service.get_term_scores(TermId(args.term)).await?;
    if let Some(top) = args.top {
        ranking.scores.truncate(top);
    }

    if args.json {
        println!("{}", to_json(&ranking)?);
    } else {
        print!("{}", render_ranking(&ranking));
    }
    Ok(())
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = load_config(args.data_dir)?;
    let service = build_service(&config)?;
    let breakdown = service
        .get_score(&MepId(args.mep), TermId(args.term))
        .await?;

    if args.json {
        println!("{}", to_json(&breakdown)?);
    } else {
        print!("{}", render_score(&breakdown));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(std::io::Error::from)
        .map_err(AppError::from)
}

pub(crate) fn render_ranking(ranking: &TermScores) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Term {} ranking ({} members scored)",
        ranking.term, ranking.members
    );

    for notice in &ranking.notices {
        let _ = writeln!(
            out,
            "note: {} statistics are degenerate ({:?})",
            notice.activity, notice.reason
        );
    }

    let _ = writeln!(out, "\n{:>5}  {:<12} {:>8} {:>8}  name", "rank", "mep", "base", "final");
    for entry in &ranking.scores {
        let breakdown = &entry.breakdown;
        let _ = writeln!(
            out,
            "{:>5}  {:<12} {:>8.2} {:>8.2}  {}",
            entry.rank,
            breakdown.mep_id,
            breakdown.base_score,
            breakdown.final_score,
            breakdown.member.name.as_deref().unwrap_or("-"),
        );
    }
    out
}

pub(crate) fn render_score(breakdown: &ScoreBreakdown) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MEP {} (term {})", breakdown.mep_id, breakdown.term);
    if let Some(name) = &breakdown.member.name {
        let _ = writeln!(out, "Name: {name}");
    }

    let _ = writeln!(out, "\nActivities");
    for score in &breakdown.activities {
        let _ = writeln!(
            out,
            "- {}: {} item(s) -> {:.2} points",
            score.activity, score.count, score.points
        );
    }

    let _ = writeln!(out, "\nCategories");
    for category in ScoreCategory::ALL {
        let _ = writeln!(out, "- {}: {:.2}", category, breakdown.categories.get(category));
    }

    let _ = writeln!(out, "\nBase score: {:.2}", breakdown.base_score);
    match breakdown.roles.role {
        Some(role) => {
            let _ = writeln!(
                out,
                "Role multiplier: x{:.2} ({})",
                breakdown.roles.multiplier,
                role.label()
            );
        }
        None => {
            let _ = writeln!(out, "Role multiplier: x1.00 (no leadership role)");
        }
    }

    let attendance = &breakdown.attendance;
    if attendance.exempt {
        let _ = writeln!(out, "Attendance: exempt (presiding officer)");
    } else {
        match attendance.rate {
            Some(rate) => {
                let _ = writeln!(
                    out,
                    "Attendance: {}/{} ({:.0}%), penalty x{:.2}",
                    attendance.attended,
                    attendance.total,
                    rate * 100.0,
                    attendance.penalty
                );
            }
            None => {
                let _ = writeln!(out, "Attendance: no recorded votes");
            }
        }
    }

    let _ = writeln!(out, "Final score: {:.2}", breakdown.final_score);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mep_score::data::{CacheConfig, TermDataResolver};
    use mep_score::scoring::ScoringConfig;
    use mep_score::service::ScoringService;
    use mep_score::terms::TermCalendar;
    use std::sync::Arc;

    fn service(dir: &std::path::Path) -> Arc<ScoringService> {
        Arc::new(ScoringService::new(
            TermCalendar::european_parliament(),
            Arc::new(TermDataResolver::standard(dir)),
            CacheConfig::default(),
            ScoringConfig::default(),
        ))
    }

    fn write_dataset(dir: &std::path::Path) {
        std::fs::write(
            dir.join("mep_activities_term10.json"),
            r#"[
                {"mep_id": 1, "name": "Ana", "activities": {"speeches": 10}, "roles": {"committee_chair": true}},
                {"mep_id": 2, "activities": {"speeches": 2}, "attendance": {"attended": 1, "total": 10}}
            ]"#,
        )
        .expect("write dataset");
    }

    #[tokio::test]
    async fn ranking_table_lists_members_best_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_dataset(dir.path());
        let ranking = service(dir.path())
            .get_term_scores(TermId(10))
            .await
            .expect("term ranks");

        let table = render_ranking(&ranking);
        assert!(table.starts_with("Term 10 ranking (2 members scored)"));
        let rows: Vec<&str> = table
            .lines()
            .filter(|line| line.trim_start().starts_with(char::is_numeric))
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with("Ana"));
        assert!(rows[1].ends_with('-'));
    }

    #[tokio::test]
    async fn score_breakdown_names_role_and_attendance() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_dataset(dir.path());
        let service = service(dir.path());

        let chair = service
            .get_score(&MepId::from("1"), TermId(10))
            .await
            .expect("chair scores");
        let rendered = render_score(&chair);
        assert!(rendered.contains("Name: Ana"));
        assert!(rendered.contains("Committee Chair"));
        assert!(rendered.contains("Attendance: no recorded votes"));

        let absent = service
            .get_score(&MepId::from("2"), TermId(10))
            .await
            .expect("absent member scores");
        let rendered = render_score(&absent);
        assert!(rendered.contains("Attendance: 1/10 (10%)"));
        assert!(rendered.contains("no leadership role"));
    }
}
