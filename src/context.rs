//! Full-context snapshot
//!
//! Loads every category record in one call and derives the summary an
//! assistant session starts from.

use serde::Serialize;
use serde_json::{json, Value};

use crate::storage::{Record, StorageBackend};

pub const COMPANY_RECORD: &str = "company_structure.json";
pub const DECISIONS_RECORD: &str = "technology_decisions.json";
pub const DOMAINS_RECORD: &str = "domain_inventory.json";
pub const TASKS_RECORD: &str = "pending_tasks.json";

/// Identifier and description of a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRef {
    pub id: Option<String>,
    pub description: Option<String>,
}

/// Pending work derived from the tasks record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskSummary {
    /// Tasks whose status is anything but "completed"
    pub total_pending: usize,
    pub high_priority: usize,
    pub high_priority_tasks: Vec<TaskRef>,
}

impl TaskSummary {
    pub fn from_record(tasks: &Record) -> Self {
        let pending: Vec<&Value> = tasks
            .get("tasks")
            .and_then(Value::as_array)
            .map(|all| {
                all.iter()
                    .filter(|t| t.get("status").and_then(Value::as_str) != Some("completed"))
                    .collect()
            })
            .unwrap_or_default();

        let high_priority_tasks: Vec<TaskRef> = pending
            .iter()
            .filter(|t| t.get("priority").and_then(Value::as_str) == Some("High"))
            .map(|t| TaskRef {
                id: string_field(t, "id"),
                description: string_field(t, "description"),
            })
            .collect();

        Self {
            total_pending: pending.len(),
            high_priority: high_priority_tasks.len(),
            high_priority_tasks,
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// The category records, loaded together
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub company: Record,
    pub decisions: Record,
    pub domains: Record,
    pub tasks: Record,
}

impl ContextSnapshot {
    /// Load all four records concurrently; absent ones come back empty
    pub async fn load(storage: &dyn StorageBackend) -> Self {
        let (company, decisions, domains, tasks) = tokio::join!(
            storage.load_record(COMPANY_RECORD),
            storage.load_record(DECISIONS_RECORD),
            storage.load_record(DOMAINS_RECORD),
            storage.load_record(TASKS_RECORD),
        );
        Self {
            company,
            decisions,
            domains,
            tasks,
        }
    }

    pub fn task_summary(&self) -> TaskSummary {
        TaskSummary::from_record(&self.tasks)
    }

    /// Condensed view: company, tech stack, active domains and pending tasks
    pub fn overview(&self) -> Value {
        let holding = self.company.get("holding_company");
        let subsidiaries: Vec<Value> = self
            .company
            .get("subsidiaries")
            .and_then(Value::as_array)
            .map(|subs| subs.iter().filter_map(|s| s.get("name").cloned()).collect())
            .unwrap_or_default();
        let owners: Vec<&String> = holding
            .and_then(|h| h.get("ownership"))
            .and_then(Value::as_object)
            .map(|o| o.keys().collect())
            .unwrap_or_default();

        // The stack lives in the "Technology Stack" decision; a plain-text
        // decision carries no structure
        let stack = self
            .decisions
            .get("decisions")
            .and_then(Value::as_array)
            .and_then(|all| {
                all.iter()
                    .find(|d| d.get("area").and_then(Value::as_str) == Some("Technology Stack"))
            })
            .and_then(|d| d.get("decision"))
            .filter(|d| d.is_object());
        let layer = |name: &str| {
            stack
                .and_then(|s| s.get(name))
                .cloned()
                .unwrap_or_else(|| json!({}))
        };

        let total_domains = self
            .domains
            .get("summary")
            .and_then(|s| s.get("total_domains"))
            .cloned()
            .unwrap_or(Value::Null);
        let active_domains = self
            .domains
            .get("tiers")
            .and_then(|t| t.pointer("/tier1_active_now/domains"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        let holding_name = holding
            .and_then(|h| h.get("name"))
            .cloned()
            .unwrap_or(Value::Null);

        json!({
            "company_overview": {
                "holding_company": holding_name,
                "subsidiaries": subsidiaries,
                "owners": owners,
            },
            "tech_stack": {
                "frontend": layer("frontend"),
                "backend": layer("backend"),
                "database": layer("database"),
            },
            "domains": {
                "total": total_domains,
                "active": active_domains,
            },
            "tasks": self.task_summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBackend;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_task_summary() {
        let tasks = record(json!({"tasks": [
            {"id": "TASK-1", "description": "Renew domain", "status": "pending", "priority": "High"},
            {"id": "TASK-2", "status": "completed", "priority": "High"},
            {"id": "TASK-3", "status": "in_progress", "priority": "Low"},
            {"id": "TASK-4", "priority": "High"},
        ]}));

        let summary = TaskSummary::from_record(&tasks);
        assert_eq!(summary.total_pending, 3);
        assert_eq!(summary.high_priority, 2);
        assert_eq!(
            summary.high_priority_tasks[0],
            TaskRef {
                id: Some("TASK-1".into()),
                description: Some("Renew domain".into()),
            }
        );
        assert_eq!(summary.high_priority_tasks[1].description, None);
    }

    #[test]
    fn test_empty_tasks() {
        assert_eq!(TaskSummary::from_record(&Record::new()), TaskSummary::default());
        let odd = record(json!({"tasks": "none"}));
        assert_eq!(TaskSummary::from_record(&odd).total_pending, 0);
    }

    #[test]
    fn test_overview_extracts_stack_and_company() {
        let snapshot = ContextSnapshot {
            company: record(json!({
                "holding_company": {"name": "Apex", "ownership": {"Ana": 50, "Bo": 50}},
                "subsidiaries": [{"name": "Labs"}, {"name": "Digital"}],
            })),
            decisions: record(json!({"decisions": [
                {"area": "Hosting", "decision": "Vercel"},
                {"area": "Technology Stack", "decision": {"frontend": {"framework": "React"}}},
            ]})),
            domains: record(json!({
                "summary": {"total_domains": 12},
                "tiers": {"tier1_active_now": {"domains": ["apex.com"]}},
            })),
            tasks: Record::new(),
        };

        let overview = snapshot.overview();
        assert_eq!(overview["company_overview"]["holding_company"], "Apex");
        assert_eq!(overview["company_overview"]["subsidiaries"], json!(["Labs", "Digital"]));
        assert_eq!(overview["company_overview"]["owners"], json!(["Ana", "Bo"]));
        assert_eq!(overview["tech_stack"]["frontend"]["framework"], "React");
        assert_eq!(overview["tech_stack"]["database"], json!({}));
        assert_eq!(overview["domains"]["total"], 12);
        assert_eq!(overview["domains"]["active"], json!(["apex.com"]));
        assert_eq!(overview["tasks"]["total_pending"], 0);
    }

    #[tokio::test]
    async fn test_load_from_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("mcp-data"), None);
        let tasks = record(json!({"tasks": [{"id": "TASK-1", "status": "pending", "priority": "High"}]}));
        backend.save_record(TASKS_RECORD, &tasks).await.unwrap();

        let snapshot = ContextSnapshot::load(&backend).await;
        assert!(snapshot.company.is_empty());
        assert_eq!(snapshot.tasks, tasks);
        assert_eq!(snapshot.task_summary().high_priority, 1);
    }
}
