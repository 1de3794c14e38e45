use clap::{Arg, ArgAction, Command};
use orch_core::config::OrchestratorConfig;
use orch_core::ids::{PrincipalId, TaskId, TenantId};
use orch_core::quota::TenantQuota;
use orch_daemon::bootstrap;
use orch_task_store::{ListFilter, Page};
use std::collections::BTreeMap;
use std::str::FromStr;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("orch_daemon=info".parse().unwrap()))
        .json()
        .init();

    let cli = Command::new("orch-daemon")
        .version("0.1.0")
        .about("AI Orchestrator core, run as an in-process smoke-testable assembly")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("scenarios").about("Run the end-to-end demo scenarios and report pass/fail"),
        )
        .subcommand(Command::new("list-agents").about("List registered specialist agents"))
        .subcommand(Command::new("list-tools").about("List registered tool capabilities"))
        .subcommand(
            Command::new("submit")
                .about("Submit an intent for classification, planning, and validation")
                .arg(Arg::new("tenant").long("tenant").required(true))
                .arg(Arg::new("principal").long("principal").required(true))
                .arg(Arg::new("intent").long("intent").required(true))
                .arg(Arg::new("environment").long("environment").default_value("staging")),
        )
        .subcommand(
            Command::new("approve")
                .about("Approve a task awaiting human sign-off")
                .arg(Arg::new("task-id").long("task-id").required(true))
                .arg(Arg::new("principal").long("principal").required(true))
                .arg(Arg::new("reason").long("reason").default_value("approved via CLI")),
        )
        .subcommand(
            Command::new("reject")
                .about("Reject a task awaiting human sign-off")
                .arg(Arg::new("task-id").long("task-id").required(true))
                .arg(Arg::new("principal").long("principal").required(true))
                .arg(Arg::new("reason").long("reason").default_value("rejected via CLI")),
        )
        .subcommand(
            Command::new("cancel")
                .about("Cancel a task, regardless of its current state")
                .arg(Arg::new("task-id").long("task-id").required(true))
                .arg(Arg::new("principal").long("principal").required(true))
                .arg(Arg::new("reason").long("reason").default_value("cancelled via CLI")),
        )
        .subcommand(
            Command::new("get")
                .about("Print a task's current record")
                .arg(Arg::new("task-id").long("task-id").required(true)),
        )
        .subcommand(
            Command::new("list")
                .about("List tasks for a tenant")
                .arg(Arg::new("tenant").long("tenant").required(true))
                .arg(Arg::new("json").long("json").action(ArgAction::SetTrue)),
        );

    let matches = cli.get_matches();
    let orchestrator = bootstrap(&OrchestratorConfig::default().with_dev_mode(true), TenantQuota::default());
    orchestrator
        .identity
        .register(PrincipalId::new("sre-1"), TenantId::new("acme"), vec!["sre-lead".to_string()]);
    orchestrator
        .identity
        .register(PrincipalId::new("admin-1"), TenantId::new("acme"), vec!["admin".to_string()]);

    let exit_code = match matches.subcommand() {
        Some(("scenarios", _)) => demo::run_scenarios(&orchestrator).await,
        Some(("list-agents", _)) => {
            for agent in orchestrator.engine.list_agents() {
                println!("{} v{} -> {:?}", agent.name, agent.version, agent.capabilities);
            }
            0
        }
        Some(("list-tools", _)) => {
            for tool in orchestrator.engine.list_tools() {
                println!("{} v{} ({:?})", tool.name, tool.version, tool.side_effect_class);
            }
            0
        }
        Some(("submit", args)) => {
            let tenant = TenantId::new(args.get_one::<String>("tenant").unwrap().clone());
            let principal = PrincipalId::new(args.get_one::<String>("principal").unwrap().clone());
            let intent = args.get_one::<String>("intent").unwrap().clone();
            let environment = args.get_one::<String>("environment").unwrap().clone();
            match orchestrator
                .engine
                .execute_task(tenant, principal, intent, environment, BTreeMap::new())
                .await
            {
                Ok(spec) => {
                    println!("task {} -> {:?} (risk {:?})", spec.task_id, spec.state, spec.risk_band);
                    0
                }
                Err(err) => {
                    eprintln!("submit failed: {err}");
                    1
                }
            }
        }
        Some(("approve", args)) => {
            run_decision(&orchestrator, args, Decision::Approve).await
        }
        Some(("reject", args)) => run_decision(&orchestrator, args, Decision::Reject).await,
        Some(("cancel", args)) => run_decision(&orchestrator, args, Decision::Cancel).await,
        Some(("get", args)) => {
            let task_id = TaskId::from_str(args.get_one::<String>("task-id").unwrap()).expect("valid task id");
            match orchestrator.engine.get_task(task_id) {
                Ok(spec) => {
                    println!("{}", serde_json::to_string_pretty(&spec).unwrap());
                    0
                }
                Err(err) => {
                    eprintln!("get failed: {err}");
                    1
                }
            }
        }
        Some(("list", args)) => {
            let tenant = TenantId::new(args.get_one::<String>("tenant").unwrap().clone());
            let page = orchestrator.engine.list_tasks(&tenant, &ListFilter::default(), Page::default());
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&page.items).unwrap());
            } else {
                for summary in &page.items {
                    println!("{} [{:?}] {}", summary.task_id, summary.state, summary.intent);
                }
            }
            0
        }
        _ => unreachable!("clap requires a subcommand"),
    };

    std::process::exit(exit_code);
}

enum Decision {
    Approve,
    Reject,
    Cancel,
}

async fn run_decision(orchestrator: &orch_daemon::Orchestrator, args: &clap::ArgMatches, decision: Decision) -> i32 {
    let task_id = TaskId::from_str(args.get_one::<String>("task-id").unwrap()).expect("valid task id");
    let principal = PrincipalId::new(args.get_one::<String>("principal").unwrap().clone());
    let reason = args.get_one::<String>("reason").unwrap().clone();

    let result = match decision {
        Decision::Approve => orchestrator.engine.approve_task(task_id, principal, reason).await,
        Decision::Reject => orchestrator.engine.reject_task(task_id, principal, reason).await,
        Decision::Cancel => orchestrator.engine.cancel_task(task_id, principal, reason).await,
    };

    match result {
        Ok(spec) => {
            println!("task {} -> {:?}", spec.task_id, spec.state);
            0
        }
        Err(err) => {
            eprintln!("decision failed: {err}");
            1
        }
    }
}

/// The six end-to-end scenarios from §8, run against one bootstrapped
/// assembly and reported as a pass/fail summary.
mod demo {
    use super::*;
    use orch_core::task_spec::TaskState;
    use orch_daemon::Orchestrator;
    use orch_validation_pipeline::AssetCounts;

    pub async fn run_scenarios(orchestrator: &Orchestrator) -> i32 {
        let mut failures = 0;

        failures += check("low-risk drift scan auto-approves", low_risk_drift_scan(orchestrator).await);
        failures += check("production patch awaits sre-lead approval", production_patch_requires_approval(orchestrator).await);
        failures += check("critical dr failover requires two approvers", critical_dr_failover(orchestrator).await);
        failures += check("quota exhaustion rejects further submissions", quota_exceeded(orchestrator).await);
        failures += check("rejection during awaiting_approval is terminal", rejection_is_terminal(orchestrator).await);

        println!("{} scenario(s) failed", failures);
        i32::from(failures > 0)
    }

    fn check(name: &str, passed: bool) -> i32 {
        println!("[{}] {name}", if passed { "ok" } else { "FAIL" });
        i32::from(!passed)
    }

    async fn low_risk_drift_scan(orchestrator: &Orchestrator) -> bool {
        orchestrator
            .inventory
            .set(TenantId::new("staging-tenant"), AssetCounts { assets: 8, sites: 1, services: 1 });
        let Ok(spec) = orchestrator
            .engine
            .execute_task(
                TenantId::new("staging-tenant"),
                PrincipalId::new("operator-1"),
                "check drift on staging web servers".to_string(),
                "staging".to_string(),
                BTreeMap::new(),
            )
            .await
        else {
            return false;
        };
        spec.state == TaskState::Approved && !spec.requires_hitl
    }

    async fn production_patch_requires_approval(orchestrator: &Orchestrator) -> bool {
        orchestrator
            .inventory
            .set(TenantId::new("acme"), AssetCounts { assets: 100, sites: 3, services: 5 });
        let Ok(spec) = orchestrator
            .engine
            .execute_task(
                TenantId::new("acme"),
                PrincipalId::new("operator-1"),
                "patch openssl across the production fleet".to_string(),
                "production".to_string(),
                BTreeMap::new(),
            )
            .await
        else {
            return false;
        };
        if spec.state != TaskState::AwaitingApproval {
            return false;
        }
        let Ok(approved) = orchestrator.engine.approve_task(spec.task_id, PrincipalId::new("sre-1"), "reviewed".into()).await else {
            return false;
        };
        approved.state == TaskState::Approved
    }

    async fn critical_dr_failover(orchestrator: &Orchestrator) -> bool {
        orchestrator
            .inventory
            .set(TenantId::new("globex"), AssetCounts { assets: 5_000, sites: 40, services: 200 });
        let Ok(spec) = orchestrator
            .engine
            .execute_task(
                TenantId::new("globex"),
                PrincipalId::new("operator-1"),
                "fail over the primary region to dr".to_string(),
                "production".to_string(),
                BTreeMap::new(),
            )
            .await
        else {
            return false;
        };
        if spec.approvals_required < 2 {
            return false;
        }
        orchestrator
            .identity
            .register(PrincipalId::new("sre-2"), TenantId::new("globex"), vec!["sre-lead".to_string()]);
        let Ok(first) = orchestrator.engine.approve_task(spec.task_id, PrincipalId::new("sre-1"), "first review".into()).await else {
            return false;
        };
        if first.state != TaskState::AwaitingApproval {
            return false;
        }
        let Ok(second) = orchestrator.engine.approve_task(spec.task_id, PrincipalId::new("sre-2"), "second review".into()).await else {
            return false;
        };
        second.state == TaskState::Approved
    }

    async fn quota_exceeded(orchestrator: &Orchestrator) -> bool {
        orchestrator
            .inventory
            .set(TenantId::new("quota-tenant"), AssetCounts { assets: 1, sites: 1, services: 1 });
        let mut last_err = None;
        for _ in 0..50 {
            let result = orchestrator
                .engine
                .execute_task(
                    TenantId::new("quota-tenant"),
                    PrincipalId::new("operator-1"),
                    "check drift on a single host".to_string(),
                    "staging".to_string(),
                    BTreeMap::new(),
                )
                .await;
            if let Err(err) = result {
                last_err = Some(err);
                break;
            }
        }
        last_err.is_some()
    }

    async fn rejection_is_terminal(orchestrator: &Orchestrator) -> bool {
        orchestrator
            .inventory
            .set(TenantId::new("acme"), AssetCounts { assets: 100, sites: 3, services: 5 });
        let Ok(spec) = orchestrator
            .engine
            .execute_task(
                TenantId::new("acme"),
                PrincipalId::new("operator-1"),
                "patch openssl across the production fleet".to_string(),
                "production".to_string(),
                BTreeMap::new(),
            )
            .await
        else {
            return false;
        };
        let Ok(rejected) = orchestrator.engine.reject_task(spec.task_id, PrincipalId::new("sre-1"), "not now".into()).await else {
            return false;
        };
        if rejected.state != TaskState::Rejected {
            return false;
        }
        orchestrator.engine.approve_task(spec.task_id, PrincipalId::new("sre-1"), "too late".into()).await.is_err()
    }
}
