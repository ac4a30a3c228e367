use crate::audit::ExecutionLogEntry;
use crate::tools::{ToolResult, ToolSummary};
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.len()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_warning(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
}

pub fn print_tool(summary: &ToolSummary) {
    println!(
        "  {} {} {}",
        summary.id.bold(),
        format!("[{}]", summary.category).dimmed(),
        summary.description
    );
}

/// One-line status for a dispatch outcome
pub fn print_tool_result(tool_id: &str, result: &ToolResult) {
    if result.success {
        let detail = result.message().unwrap_or("done");
        print_success(&format!("✔ {}: {}", tool_id, detail));
    } else if result.requires_confirmation() {
        print_warning(&format!("? {} needs confirmation", tool_id));
    } else {
        print_error(&format!(
            "✘ {}: {}",
            tool_id,
            result.error.as_deref().unwrap_or("unknown error")
        ));
    }
}

pub fn print_audit_entry(entry: &ExecutionLogEntry) {
    let params = serde_json::Value::Object(entry.parameters.clone());
    print!("{} ", entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed());
    print_tool_result(&entry.tool_id, &entry.result);
    println!("    {}", params.to_string().dimmed());
}
