use log::debug;

use crate::{
    errors::PlanError,
    models::plan::{Plan, DEFAULT_PAGE_SIZE},
};

use super::compiler::{compile, compile_count};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub plan: Plan,
    pub sql: String,
    /// `None` when no count query could be built.
    pub count_sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    NeedOtherTables { summary: String },
    Execute(PreparedQuery),
    /// Show to the operator; never run without explicit confirmation.
    Review { summary: String, sql: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCommand {
    Next,
    Previous,
}

impl PageCommand {
    pub fn detect(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("next page") {
            Some(PageCommand::Next)
        } else if text.contains("previous page") || text.contains("prev page") {
            Some(PageCommand::Previous)
        } else {
            None
        }
    }
}

/// Holds the last executed read-only plan so relative page requests can be
/// answered without asking the AI again.
#[derive(Debug, Default)]
pub struct PlanCoordinator {
    current: Option<Plan>,
}

impl PlanCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_plan(&self) -> Option<&Plan> {
        self.current.as_ref()
    }

    pub fn has_active_plan(&self) -> bool {
        self.current.is_some()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Classifies a new plan. It replaces whatever plan was retained before,
    /// and only a read-only plan that compiled is kept.
    pub fn accept(&mut self, plan: Plan) -> Result<Dispatch, PlanError> {
        self.current = None;

        if plan.need_other_tables {
            return Ok(Dispatch::NeedOtherTables {
                summary: plan.summary(),
            });
        }

        let sql = compile(&plan)?;
        debug!("Compiled {} plan:\n{}", plan.action, sql);

        if !plan.is_read_only() {
            return Ok(Dispatch::Review {
                summary: plan.summary(),
                sql,
            });
        }

        let prepared = PreparedQuery {
            count_sql: compile_count(&plan),
            sql,
            plan: plan.clone(),
        };
        self.current = Some(plan);
        Ok(Dispatch::Execute(prepared))
    }

    /// Moves the retained plan one page and recompiles it. Every other field
    /// is carried over unchanged.
    pub fn turn_page(&mut self, command: PageCommand) -> Result<PreparedQuery, PlanError> {
        let plan = self.current.as_mut().ok_or(PlanError::NoActivePlan)?;

        plan.page = match command {
            PageCommand::Next => plan.page.saturating_add(1),
            PageCommand::Previous => plan.page.saturating_sub(1).max(1),
        };

        Ok(PreparedQuery {
            sql: compile(plan)?,
            count_sql: compile_count(plan),
            plan: plan.clone(),
        })
    }

    pub fn data_view_state(&self, table: &str) -> String {
        let Some(plan) = &self.current else {
            return format!(
                "Current table: {}, Page: 1, Limit: {}",
                table, DEFAULT_PAGE_SIZE
            );
        };

        let mut state = format!(
            "Current table: {}, Page: {}, Limit: {}",
            table, plan.page, plan.limit
        );
        if let Some(sort) = plan.sort.as_ref().filter(|s| !s.column.is_empty()) {
            state.push_str(&format!(", Sort: {} {}", sort.column, sort.order));
        }
        state
    }
}
