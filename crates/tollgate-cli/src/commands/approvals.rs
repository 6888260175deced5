use console::style;
use std::path::Path;
use std::time::Duration;

use tollgate_approval::{ApprovalLedger, ApprovalRecord, Decision, expire_pending};
use tollgate_config::GateConfig;
use tollgate_core::GateError;

use super::{ApprovalAction, open_ledger, truncate_output};

pub(super) fn cmd_approvals(
    config: &GateConfig,
    config_dir: &Path,
    action: ApprovalAction,
) -> tollgate_core::Result<()> {
    let ledger = open_ledger(config, config_dir)?;

    match action {
        ApprovalAction::List {
            pending,
            agent,
            session,
            json,
        } => {
            let records: Vec<ApprovalRecord> = base_list(&ledger, agent.as_deref(), session.as_deref())
                .into_iter()
                .filter(|r| !pending || r.is_pending())
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No approvals.");
            } else {
                println!("{}", style(format!("Approvals ({})", records.len())).bold());
                println!("{}", "-".repeat(80));
                for r in &records {
                    print_summary(r);
                }
            }
        }
        ApprovalAction::Show { id } => {
            let record = ledger.get(ApprovalLedger::parse_id(&id)?)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ApprovalAction::Decide {
            id,
            verdict,
            decided_by,
            note,
        } => {
            let record = ledger.decide(ApprovalLedger::parse_id(&id)?, verdict, &decided_by, note)?;
            println!(
                "{} {} {} by {}",
                style("✓").green(),
                record.approval_id,
                decision_label(record.decision),
                decided_by
            );
        }
        ApprovalAction::Expire { older_than } => {
            let secs = older_than.unwrap_or(config.ledger.timeout_secs);
            if secs == 0 {
                return Err(GateError::Config(
                    "no expiry age: pass --older-than or set ledger.timeout_secs".into(),
                ));
            }
            let expired = expire_pending(&ledger, Duration::from_secs(secs));
            println!("Expired {} pending approval(s) older than {secs}s", expired.len());
            for r in &expired {
                print_summary(r);
            }
        }
    }
    Ok(())
}

fn base_list(ledger: &ApprovalLedger, agent: Option<&str>, session: Option<&str>) -> Vec<ApprovalRecord> {
    match (agent, session) {
        (Some(agent), Some(session)) => ledger
            .list_by_agent(agent)
            .into_iter()
            .filter(|r| r.session_id.as_deref() == Some(session))
            .collect(),
        (Some(agent), None) => ledger.list_by_agent(agent),
        (None, Some(session)) => ledger.list_by_session(session),
        (None, None) => ledger.list(),
    }
}

fn decision_label(decision: Decision) -> console::StyledObject<&'static str> {
    match decision {
        Decision::Pending => style(decision.as_str()).yellow(),
        Decision::Approved => style(decision.as_str()).green(),
        Decision::Denied => style(decision.as_str()).red(),
    }
}

fn print_summary(r: &ApprovalRecord) {
    println!(
        "{}  {}  {}  {}",
        style(r.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        r.approval_id,
        decision_label(r.decision),
        style(&r.tool_name).cyan()
    );
    println!(
        "   agent={} user={}{}",
        r.agent_id,
        r.user_id,
        r.call_id
            .as_ref()
            .map(|c| format!(" call={c}"))
            .unwrap_or_default()
    );
    println!("   {}", style(truncate_output(&r.arguments.to_string(), 100)).dim());
    if let Some(by) = &r.decided_by {
        let note = r.note.as_deref().map(|n| format!(" ({n})")).unwrap_or_default();
        println!("   decided by {by}{note}");
    }
}
