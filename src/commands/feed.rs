use clap::Args;

use super::{OutputFormat, local_time, print_json, store};
use crate::error::ExitError;
use crate::store::Activity;

#[derive(Debug, Args)]
pub struct FeedArgs {
    /// Number of activities to show
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl FeedArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let activities = store()?.feed(self.limit)?;
        match self.format {
            OutputFormat::Json => print_json(&activities),
            OutputFormat::Text => {
                print!("{}", render_feed(&activities));
                Ok(())
            }
        }
    }
}

fn render_feed(activities: &[Activity]) -> String {
    if activities.is_empty() {
        return "No recent activity.\n".to_string();
    }
    let mut out = String::from("📜 Activity Feed:\n\n");
    for activity in activities {
        let agent = activity.agent.as_ref().map_or("System", |a| a.name.as_str());
        out.push_str(&format!(
            "[{}] {agent}: {}\n",
            local_time(activity.created_at, false),
            activity.message
        ));
    }
    out
}

/// Print the business context as JSON, for agents to parse.
pub fn run_business() -> anyhow::Result<()> {
    let Some(context) = store()?.business_context()? else {
        return Err(ExitError::new(1, "Business context not configured.".into()).into());
    };
    print_json(&context)
}
