use clap::{Args, Subcommand};

use super::{OutputFormat, local_time, print_json, store};
use crate::store::{Deliverable, TaskStatus, TaskSummary};

#[derive(Debug, Args)]
pub struct TasksArgs {
    /// Session key of the agent whose tasks to list
    pub session_key: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl TasksArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let tasks = store()?.tasks_for_agent(&self.session_key)?;
        match self.format {
            OutputFormat::Json => print_json(&tasks),
            OutputFormat::Text => {
                print!("{}", render_tasks(&tasks));
                Ok(())
            }
        }
    }
}

fn render_tasks(tasks: &[TaskSummary]) -> String {
    if tasks.is_empty() {
        return "No active tasks.\n".to_string();
    }
    let mut out = format!("📋 {} active task(s):\n\n", tasks.len());
    for task in tasks {
        match &task.priority {
            Some(p) => out.push_str(&format!("[{p}] {}\n", task.title)),
            None => out.push_str(&format!("{}\n", task.title)),
        }
        out.push_str(&format!("   ID: {}\n   Status: {}\n", task.id, task.status));
        if !task.subtasks.is_empty() {
            let done = task.subtasks.iter().filter(|s| s.done).count();
            out.push_str(&format!("   Subtasks: {done}/{}\n", task.subtasks.len()));
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Move a task to a new status
    Status {
        task_id: String,
        #[arg(value_enum)]
        status: TaskStatus,
        /// Session key of the acting agent
        #[arg(long)]
        by: Option<String>,
    },
    /// Assign a task to an agent
    Assign {
        task_id: String,
        assignee: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// Comment on a task
    Comment {
        task_id: String,
        message: String,
        #[arg(long)]
        by: Option<String>,
    },
}

impl TaskCommand {
    pub fn execute(&self) -> anyhow::Result<()> {
        let store = store()?;
        match self {
            Self::Status { task_id, status, by } => {
                store.update_task_status(task_id, *status, by.as_deref())?;
                println!("✅ Task status updated to: {}", status.as_str());
            }
            Self::Assign { task_id, assignee, by } => {
                store.assign_task(task_id, assignee, by.as_deref())?;
                println!("✅ Task assigned to {assignee}");
            }
            Self::Comment { task_id, message, by } => {
                store.add_comment(task_id, message, by.as_deref())?;
                println!("✅ Comment added");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
pub enum SubtaskCommand {
    /// Append a subtask
    Add {
        task_id: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Session key of the assignee
        #[arg(long)]
        assign: Option<String>,
    },
    /// Mark a subtask done
    Check {
        task_id: String,
        index: u32,
        #[arg(long)]
        by: Option<String>,
    },
    /// Mark a subtask not done
    Uncheck {
        task_id: String,
        index: u32,
        #[arg(long)]
        by: Option<String>,
    },
}

impl SubtaskCommand {
    pub fn execute(&self) -> anyhow::Result<()> {
        let store = store()?;
        match self {
            Self::Add { task_id, title, description, assign } => {
                let index =
                    store.add_subtask(task_id, title, description.as_deref(), assign.as_deref())?;
                println!("✅ Added subtask at index {index}: {title}");
            }
            Self::Check { task_id, index, by } => {
                store.update_subtask(task_id, *index, true, by.as_deref())?;
                println!("✅ Subtask {index} marked as done");
            }
            Self::Uncheck { task_id, index, by } => {
                store.update_subtask(task_id, *index, false, by.as_deref())?;
                println!("✅ Subtask {index} marked as not done");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DeliverArgs {
    pub task_id: String,
    /// Path of the deliverable file
    pub path: String,
    pub title: String,
    /// Session key of the delivering agent
    #[arg(long)]
    pub by: String,
}

impl DeliverArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        store()?.register_deliverable(&self.task_id, &self.path, &self.title, &self.by)?;
        println!("✅ Deliverable registered: {}", self.title);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DeliverablesArgs {
    pub task_id: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl DeliverablesArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let docs = store()?.deliverables(&self.task_id)?;
        match self.format {
            OutputFormat::Json => print_json(&docs),
            OutputFormat::Text => {
                print!("{}", render_deliverables(&docs));
                Ok(())
            }
        }
    }
}

fn render_deliverables(docs: &[Deliverable]) -> String {
    if docs.is_empty() {
        return "No deliverables registered.\n".to_string();
    }
    let mut out = format!("📦 {} deliverable(s):\n\n", docs.len());
    for doc in docs {
        let creator = doc.creator.as_ref().map_or("Unknown", |c| c.name.as_str());
        out.push_str(&format!(
            "{}\n   Path: {}\n   By: {creator} at {}\n\n",
            doc.title,
            doc.path,
            local_time(doc.created_at, true)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_render_priority_and_subtasks() {
        let tasks: Vec<TaskSummary> = serde_json::from_value(serde_json::json!([
            {"_id": "t1", "title": "Launch post", "status": "in_progress", "priority": "high",
             "subtasks": [{"title": "outline", "done": true}, {"title": "draft"}]},
            {"_id": "t2", "title": "Logo", "status": "assigned"}
        ]))
        .unwrap();
        let out = render_tasks(&tasks);
        assert!(out.starts_with("📋 2 active task(s):"));
        assert!(out.contains("[high] Launch post\n   ID: t1\n   Status: in_progress\n   Subtasks: 1/2"));
        assert!(out.contains("Logo\n   ID: t2"));
    }

    #[test]
    fn empty_lists_have_friendly_text() {
        assert_eq!(render_tasks(&[]), "No active tasks.\n");
        assert_eq!(render_deliverables(&[]), "No deliverables registered.\n");
    }
}
