use std::{future::Future, sync::Arc};

use crossterm::style::Stylize;
use log::{debug, info};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    ai::{request_plan, TextGenerator},
    db::{schema::SchemaResolver, DbClient},
    errors::SessionError,
    models::{plan::Plan, results::QueryResult},
    plan::{
        executor::{run_confirmed, run_prepared},
        format_schema_context, parse_plan, Dispatch, PageCommand, PlanCoordinator, PreparedQuery,
    },
    DbManager,
};

use super::{export::export_csv, render::render_table};

const HELP: &str = "\
Commands:
  \\dt              list tables
  \\dv              list views
  \\di              list indexes
  \\t <table>       switch to a table and show its first page
  \\d               describe the current table and its related tables
  \\sql             show the last generated SQL
  \\explain         show the database plan for the last query
  \\explain analyze run the last query and show its measured plan
  \\confirm         run the pending UPDATE/DELETE/INSERT
  \\cancel          discard the pending statement
  \\export <file>   write the last page to a CSV file
  \\q               quit
Anything else is sent to the AI as a question. \"next page\" and
\"previous page\" move through the last result.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListTables,
    ListViews,
    ListIndexes,
    UseTable(String),
    Describe,
    ShowSql,
    Explain { analyze: bool },
    Confirm,
    Cancel,
    Export(String),
    Help,
    Quit,
    Unknown(String),
    Ask(String),
}

impl Command {
    /// `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if !line.starts_with('\\') {
            return Some(Command::Ask(line.to_string()));
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match (name, arg) {
            ("\\dt", _) => Command::ListTables,
            ("\\dv", _) => Command::ListViews,
            ("\\di", _) => Command::ListIndexes,
            ("\\t", table) if !table.is_empty() => Command::UseTable(table.to_string()),
            ("\\d", _) => Command::Describe,
            ("\\sql", _) => Command::ShowSql,
            ("\\explain", "") => Command::Explain { analyze: false },
            ("\\explain", mode) if mode.eq_ignore_ascii_case("analyze") => {
                Command::Explain { analyze: true }
            }
            ("\\confirm", _) => Command::Confirm,
            ("\\cancel", _) => Command::Cancel,
            ("\\export", path) if !path.is_empty() => Command::Export(path.to_string()),
            ("\\?" | "\\h" | "\\help", _) => Command::Help,
            ("\\q" | "\\quit", _) => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Line-oriented front end: reads commands and questions from stdin and
/// runs one unit of work at a time.
pub struct Session {
    db_manager: Arc<DbManager>,
    generator: Arc<dyn TextGenerator + Send + Sync>,
    coordinator: PlanCoordinator,
    current_table: Option<String>,
    /// Mutation SQL waiting for `\confirm`.
    pending_sql: Option<String>,
    last_sql: Option<String>,
    /// Last read-only query that ran, the target of `\explain`.
    last_select: Option<String>,
    last_page: Option<QueryResult>,
}

impl Session {
    pub fn new(db_manager: Arc<DbManager>, generator: Arc<dyn TextGenerator + Send + Sync>) -> Self {
        Self {
            db_manager,
            generator,
            coordinator: PlanCoordinator::new(),
            current_table: None,
            pending_sql: None,
            last_sql: None,
            last_select: None,
            last_page: None,
        }
    }

    pub async fn run(&mut self, initial_table: Option<String>) -> Result<(), SessionError> {
        println!(
            "querypilot, AI backend: {}. Type \\? for help.",
            self.generator.name()
        );

        if let Some(table) = initial_table {
            self.report(Command::UseTable(table)).await;
        }

        let mut lines = BufReader::new(io::stdin()).lines();
        let mut stdout = io::stdout();

        loop {
            let prompt = format!("{}> ", self.current_table.as_deref().unwrap_or("querypilot"));
            stdout.write_all(prompt.as_bytes()).await?;
            stdout.flush().await?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                println!();
                break;
            };

            let Some(command) = Command::parse(&line) else {
                continue;
            };
            if self.report(command).await == Flow::Quit {
                break;
            }
        }

        info!("Session closed");
        Ok(())
    }

    async fn report(&mut self, command: Command) -> Flow {
        match self.handle(command).await {
            Ok(flow) => flow,
            Err(e) => {
                eprintln!("{}", format!("Error: {}", e).red());
                Flow::Continue
            }
        }
    }

    async fn handle(&mut self, command: Command) -> Result<Flow, SessionError> {
        match command {
            Command::ListTables => self.list_tables().await?,
            Command::ListViews => self.list_views().await?,
            Command::ListIndexes => self.list_indexes().await?,
            Command::UseTable(table) => self.use_table(table).await?,
            Command::Describe => self.describe().await?,
            Command::ShowSql => match &self.last_sql {
                Some(sql) => println!("{}", sql),
                None => println!("No SQL generated yet."),
            },
            Command::Explain { analyze } => self.explain(analyze).await?,
            Command::Confirm => self.confirm().await?,
            Command::Cancel => {
                if self.pending_sql.take().is_some() {
                    println!("Pending statement discarded.");
                } else {
                    println!("Nothing to cancel.");
                }
            }
            Command::Export(path) => {
                let page = self.last_page.as_ref().ok_or(SessionError::NoResult)?;
                export_csv(page, &path)?;
                println!("Wrote {} rows to {}", page.row_count, path);
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(Flow::Quit),
            Command::Unknown(text) => {
                println!("Unknown command {}. Type \\? for help.", text);
            }
            Command::Ask(question) => self.ask(question).await?,
        }
        Ok(Flow::Continue)
    }

    async fn client(&self) -> Result<Arc<dyn DbClient + Send + Sync>, SessionError> {
        self.db_manager
            .client()
            .await
            .ok_or(SessionError::NoConnection)
    }

    fn table(&self) -> Result<String, SessionError> {
        self.current_table
            .clone()
            .ok_or(SessionError::NoTableSelected)
    }

    async fn list_tables(&mut self) -> Result<(), SessionError> {
        let client = self.client().await?;
        let tables = run_cancellable(async move {
            Ok::<_, SessionError>(client.list_tables().await?)
        })
        .await?;

        if tables.is_empty() {
            println!("No tables found.");
        }
        for table in tables {
            println!("  {}", table);
        }
        Ok(())
    }

    async fn list_views(&mut self) -> Result<(), SessionError> {
        let client = self.client().await?;
        let views = run_cancellable(async move {
            Ok::<_, SessionError>(client.list_views().await?)
        })
        .await?;

        if views.is_empty() {
            println!("No views found.");
        }
        for view in views {
            println!("  {}", view);
        }
        Ok(())
    }

    async fn list_indexes(&mut self) -> Result<(), SessionError> {
        let client = self.client().await?;
        let indexes = run_cancellable(async move {
            Ok::<_, SessionError>(client.list_indexes().await?)
        })
        .await?;

        if indexes.is_empty() {
            println!("No indexes found.");
        }
        for index in indexes {
            println!("  {} {}", index.name, format!("on {}", index.table_name).dark_grey());
        }
        Ok(())
    }

    async fn explain(&mut self, analyze: bool) -> Result<(), SessionError> {
        let sql = self.last_select.clone().ok_or(SessionError::NothingToExplain)?;
        let client = self.client().await?;

        let plan = run_cancellable(async move {
            client
                .explain(&sql, analyze)
                .await
                .map_err(|source| SessionError::Execution { sql, source })
        })
        .await?;

        print!("{}", render_table(&plan));
        Ok(())
    }

    async fn use_table(&mut self, table: String) -> Result<(), SessionError> {
        let client = self.client().await?;
        let probe = table.clone();
        let exists = run_cancellable(async move {
            Ok::<_, SessionError>(client.table_exists(&probe).await?)
        })
        .await?;
        if !exists {
            return Err(SessionError::UnknownTable(table));
        }

        self.current_table = Some(table.clone());
        self.pending_sql = None;
        self.coordinator.reset();

        let mut plan = Plan {
            tables: vec![table],
            ..Plan::default()
        };
        plan.apply_defaults();
        self.dispatch(plan).await
    }

    async fn describe(&mut self) -> Result<(), SessionError> {
        let client = self.client().await?;
        let table = self.table()?;
        let context = run_cancellable(schema_context(client, table)).await?;
        print!("{}", context);
        Ok(())
    }

    async fn ask(&mut self, question: String) -> Result<(), SessionError> {
        let table = self.table()?;
        // A new request always supersedes an unconfirmed statement.
        self.pending_sql = None;

        if let Some(command) = PageCommand::detect(&question) {
            if self.coordinator.has_active_plan() {
                let prepared = self.coordinator.turn_page(command)?;
                return self.execute(prepared).await;
            }
        }

        let client = self.client().await?;
        let generator = Arc::clone(&self.generator);
        let view_state = self.coordinator.data_view_state(&table);
        // Paging must never resume a result from before this request.
        self.coordinator.reset();

        let response = run_cancellable(async move {
            let context = schema_context(client, table).await?;
            let response =
                request_plan(generator.as_ref(), &context, &view_state, &question).await?;
            Ok::<_, SessionError>(response)
        })
        .await?;

        let plan = parse_plan(&response)?;
        debug!("Parsed plan: {}", plan.summary());
        self.dispatch(plan).await
    }

    async fn dispatch(&mut self, plan: Plan) -> Result<(), SessionError> {
        match self.coordinator.accept(plan)? {
            Dispatch::NeedOtherTables { summary } => {
                println!("{}", summary.yellow());
            }
            Dispatch::Execute(prepared) => {
                println!("{}", prepared.plan.summary().dark_grey());
                self.execute(prepared).await?;
            }
            Dispatch::Review { summary, sql } => {
                println!("{}", summary.yellow());
                println!("{}", sql);
                println!(
                    "{}",
                    "This statement changes data. Type \\confirm to run it or \\cancel to discard it."
                        .yellow()
                );
                self.last_sql = Some(sql.clone());
                self.pending_sql = Some(sql);
            }
        }
        Ok(())
    }

    async fn execute(&mut self, prepared: PreparedQuery) -> Result<(), SessionError> {
        let client = self.client().await?;
        self.last_sql = Some(prepared.sql.clone());
        self.last_select = Some(prepared.sql.clone());

        let page =
            run_cancellable(async move { run_prepared(client.as_ref(), &prepared).await }).await?;

        print!("{}", render_table(&page.result));
        println!("{}", page.pagination.status().cyan());
        if page.pagination.is_past_end() {
            println!("{}", "Past the last page, try \"previous page\".".yellow());
        }

        self.last_page = Some(page.result);
        Ok(())
    }

    async fn confirm(&mut self) -> Result<(), SessionError> {
        let sql = self.pending_sql.take().ok_or(SessionError::NothingPending)?;
        let client = self.client().await?;

        let affected =
            run_cancellable(async move { run_confirmed(client.as_ref(), &sql).await }).await?;
        println!("{}", format!("{} rows affected.", affected).green());
        Ok(())
    }
}

async fn schema_context(
    client: Arc<dyn DbClient + Send + Sync>,
    table: String,
) -> Result<String, SessionError> {
    let resolver = SchemaResolver::new(client.as_ref());
    let schema = resolver.fetch_schema(&table).await?;
    let related = resolver.fetch_related_schemas(&schema).await;
    Ok(format_schema_context(&schema, &related))
}

/// Runs `work` as a background task that Ctrl-C aborts.
async fn run_cancellable<T, F>(work: F) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, SessionError>> + Send + 'static,
{
    let mut task = tokio::spawn(work);

    tokio::select! {
        joined = &mut task => joined?,
        _ = tokio::signal::ctrl_c() => {
            task.abort();
            Err(SessionError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mockall::predicate;

    use super::*;
    use crate::{
        db::mock::MockDbClientMock,
        errors::{DbError, PlanError, ProviderError},
        models::schema::IndexInfo,
    };

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate_text(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn count_result() -> QueryResult {
        QueryResult::new(vec!["count".to_string()], vec![vec!["45".to_string()]])
    }

    async fn session_with(mock_db: MockDbClientMock, response: &'static str) -> Session {
        let manager = DbManager::new();
        manager.set_client(Arc::new(mock_db)).await;
        Session::new(Arc::new(manager), Arc::new(FixedGenerator(response)))
    }

    fn company_mock() -> MockDbClientMock {
        let mut mock_db = MockDbClientMock::new();
        mock_db
            .expect_table_exists()
            .with(predicate::eq("company"))
            .returning(|_| Ok(true));
        mock_db.expect_query().returning(|_| Ok(count_result()));
        mock_db
            .expect_describe_columns()
            .returning(|_| Ok(Vec::new()));
        mock_db
            .expect_describe_foreign_keys()
            .returning(|_| Ok(Vec::new()));
        mock_db
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("\\dt"), Some(Command::ListTables));
        assert_eq!(
            Command::parse("\\t  company "),
            Some(Command::UseTable("company".to_string()))
        );
        assert_eq!(
            Command::parse("\\t"),
            Some(Command::Unknown("\\t".to_string()))
        );
        assert_eq!(
            Command::parse("\\export out.csv"),
            Some(Command::Export("out.csv".to_string()))
        );
        assert_eq!(Command::parse("\\dv"), Some(Command::ListViews));
        assert_eq!(Command::parse("\\di"), Some(Command::ListIndexes));
        assert_eq!(
            Command::parse("\\explain"),
            Some(Command::Explain { analyze: false })
        );
        assert_eq!(
            Command::parse("\\explain ANALYZE"),
            Some(Command::Explain { analyze: true })
        );
        assert_eq!(
            Command::parse("\\explain verbose"),
            Some(Command::Unknown("\\explain verbose".to_string()))
        );
        assert_eq!(Command::parse("\\q"), Some(Command::Quit));
        assert_eq!(
            Command::parse("companies in China"),
            Some(Command::Ask("companies in China".to_string()))
        );
    }

    #[tokio::test]
    async fn test_use_table_then_next_page() {
        let mut session = session_with(company_mock(), "").await;

        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();
        assert_eq!(
            session.last_sql.as_deref(),
            Some("SELECT *\nFROM company\nLIMIT 20")
        );

        session
            .handle(Command::Ask("next page".to_string()))
            .await
            .unwrap();
        assert_eq!(
            session.last_sql.as_deref(),
            Some("SELECT *\nFROM company\nLIMIT 20 OFFSET 20")
        );
        assert_eq!(session.coordinator.current_plan().map(|p| p.page), Some(2));
    }

    #[tokio::test]
    async fn test_question_without_table() {
        let mut session = session_with(MockDbClientMock::new(), "").await;
        let result = session.handle(Command::Ask("anything".to_string())).await;
        assert!(matches!(result, Err(SessionError::NoTableSelected)));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let mut mock_db = MockDbClientMock::new();
        mock_db.expect_table_exists().returning(|_| Ok(false));
        let mut session = session_with(mock_db, "").await;

        let result = session.handle(Command::UseTable("nope".to_string())).await;
        assert!(matches!(result, Err(SessionError::UnknownTable(t)) if t == "nope"));
        assert_eq!(session.current_table, None);
    }

    #[tokio::test]
    async fn test_question_runs_generated_plan() {
        let response = r#"```json
{"tables":["company"],"filters":["company.name LIKE 'A%'"],"limit":5}
```"#;
        let mut session = session_with(company_mock(), response).await;
        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();

        session
            .handle(Command::Ask("companies starting with A".to_string()))
            .await
            .unwrap();

        assert_eq!(
            session.last_sql.as_deref(),
            Some("SELECT *\nFROM company\nWHERE company.name LIKE 'A%'\nLIMIT 5")
        );
        assert!(session.last_page.is_some());
    }

    #[tokio::test]
    async fn test_mutation_waits_for_confirmation() {
        let response = r#"{"tables":["company"],"action":"delete","filters":["company.id = 9"]}"#;
        let mut mock_db = company_mock();
        mock_db
            .expect_execute()
            .with(predicate::eq("DELETE FROM company\nWHERE company.id = 9"))
            .times(1)
            .returning(|_| Ok(1));
        let mut session = session_with(mock_db, response).await;
        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();

        session
            .handle(Command::Ask("delete company 9".to_string()))
            .await
            .unwrap();
        assert_eq!(
            session.pending_sql.as_deref(),
            Some("DELETE FROM company\nWHERE company.id = 9")
        );
        assert!(!session.coordinator.has_active_plan());

        session.handle(Command::Confirm).await.unwrap();
        assert_eq!(session.pending_sql, None);
        assert!(matches!(
            session.handle(Command::Confirm).await,
            Err(SessionError::NothingPending)
        ));
    }

    #[tokio::test]
    async fn test_cancel_discards_pending() {
        let response = r#"{"tables":["company"],"action":"update","update_set":{"name":"'X'"}}"#;
        let mut session = session_with(company_mock(), response).await;
        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();
        session
            .handle(Command::Ask("rename everything".to_string()))
            .await
            .unwrap();
        assert!(session.pending_sql.is_some());

        session.handle(Command::Cancel).await.unwrap();
        assert_eq!(session.pending_sql, None);
    }

    #[tokio::test]
    async fn test_export_last_page() {
        let mut session = session_with(company_mock(), "").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.csv");
        let path_text = path.to_string_lossy().to_string();

        assert!(matches!(
            session.handle(Command::Export(path_text.clone())).await,
            Err(SessionError::NoResult)
        ));

        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();
        session.handle(Command::Export(path_text)).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "count\n45\n");
    }

    #[tokio::test]
    async fn test_failed_request_drops_retained_plan() {
        let mut session = session_with(company_mock(), "Sorry, I cannot answer that.").await;
        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();
        assert!(session.coordinator.has_active_plan());

        let result = session
            .handle(Command::Ask("companies founded last year".to_string()))
            .await;
        assert!(matches!(result, Err(SessionError::Plan(PlanError::NoJson))));
        assert!(!session.coordinator.has_active_plan());

        // Without a retained plan "next page" goes back to the AI.
        let result = session.handle(Command::Ask("next page".to_string())).await;
        assert!(matches!(result, Err(SessionError::Plan(PlanError::NoJson))));
        assert_eq!(
            session.last_sql.as_deref(),
            Some("SELECT *\nFROM company\nLIMIT 20")
        );
    }

    #[tokio::test]
    async fn test_explain_last_select() {
        let response = r#"{"tables":["company"],"action":"delete"}"#;
        let mut mock_db = company_mock();
        mock_db
            .expect_explain()
            .with(
                predicate::eq("SELECT *\nFROM company\nLIMIT 20"),
                predicate::eq(true),
            )
            .times(1)
            .returning(|_, _| {
                Ok(QueryResult::new(
                    vec!["QUERY PLAN".to_string()],
                    vec![vec!["Seq Scan on company".to_string()]],
                ))
            });
        let mut session = session_with(mock_db, response).await;

        assert!(matches!(
            session.handle(Command::Explain { analyze: false }).await,
            Err(SessionError::NothingToExplain)
        ));

        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();
        // A reviewed mutation never becomes the explain target.
        session
            .handle(Command::Ask("delete everything".to_string()))
            .await
            .unwrap();
        assert_eq!(session.last_sql.as_deref(), Some("DELETE FROM company"));

        session
            .handle(Command::Explain { analyze: true })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_explain_failure_shows_sql() {
        let mut mock_db = company_mock();
        mock_db
            .expect_explain()
            .returning(|_, _| Err(DbError::Unsupported("EXPLAIN ANALYZE")));
        let mut session = session_with(mock_db, "").await;
        session
            .handle(Command::UseTable("company".to_string()))
            .await
            .unwrap();

        match session.handle(Command::Explain { analyze: true }).await {
            Err(SessionError::Execution { sql, source }) => {
                assert_eq!(sql, "SELECT *\nFROM company\nLIMIT 20");
                assert!(matches!(source, DbError::Unsupported(_)));
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_views_and_indexes() {
        let mut mock_db = MockDbClientMock::new();
        mock_db
            .expect_list_views()
            .times(1)
            .returning(|| Ok(vec!["active_companies".to_string()]));
        mock_db.expect_list_indexes().times(1).returning(|| {
            Ok(vec![IndexInfo {
                name: "company_name_idx".to_string(),
                table_name: "company".to_string(),
            }])
        });
        let mut session = session_with(mock_db, "").await;

        session.handle(Command::ListViews).await.unwrap();
        session.handle(Command::ListIndexes).await.unwrap();
    }
}
