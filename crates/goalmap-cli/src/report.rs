//! Human-readable summaries printed by the CLI.

use goalmap_runtime::{RunReport, UserReport};
use goalmap_store::{Checkpoint, StoreStats};

pub fn print_run_report(report: &RunReport) {
    println!("=== GoalMap Run Report ===");
    println!();
    for user in &report.users {
        print_user(user);
    }
    println!("Classified:         {}", report.classified());
    println!("  objective:        {}", report.objective_matches());
    println!("  fallback:         {}", report.fallbacks());
    println!("  errors:           {}", report.errors());
    println!("Skipped:            {}", report.skipped());
    println!("Tokens:             {}", report.tokens());
    println!("Cost (USD):         {:.6}", report.cost_usd());
    println!();
    if report.all_completed() {
        println!("Status: COMPLETE");
    } else {
        println!("Status: WORK REMAINING (run again to resume)");
    }
}

fn print_user(user: &UserReport) {
    match &user.skipped_reason {
        Some(reason) => println!("{}: skipped ({})", user.user, reason),
        None => println!("{}:", user.user),
    }
    for task in &user.tasks {
        print!(
            "  {:<10} rows {}..{}/{} {:<11} +{} classified, {} skipped",
            task.task_type,
            task.start_row,
            task.end_row,
            task.total_documents,
            task.status.as_str(),
            task.classified,
            task.skipped
        );
        if task.unavailable > 0 {
            print!(", {} unavailable", task.unavailable);
        }
        if task.cap_reached {
            print!(", cap reached");
        }
        if let Some(e) = &task.error {
            print!(", error: {}", e);
        }
        println!();
    }
    println!();
}

pub fn print_status(checkpoints: &[Checkpoint], stats: &StoreStats) {
    println!("=== GoalMap Status ===");
    println!();
    if checkpoints.is_empty() {
        println!("No checkpoints yet.");
    }
    for cp in checkpoints {
        println!(
            "  {:<16} {:<10} {:<11} row {:>5}  matched {:>5}  skipped {:>5}  ${:.6}",
            cp.user,
            cp.task_type,
            cp.status.as_str(),
            cp.current_row,
            cp.matched_count,
            cp.skipped_count,
            cp.cumulative_cost_usd
        );
    }
    println!();
    println!("Checkpoints:        {} ({} completed)", stats.checkpoints, stats.completed_checkpoints);
    println!("Match results:      {}", stats.match_results);
    println!("  objective:        {}", stats.objective_matches);
    println!("  fallback:         {}", stats.fallback_results);
    println!("Total cost (USD):   {:.6}", stats.total_cost_usd);
}
