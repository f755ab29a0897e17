use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use taskboard::{
    BoardDb, Confirm, RemoteDb, Session, StatusChange, TaskBoard, TrackerStore,
    config::{
        Cli, Commands, ProjectCommand, ScenarioCommand, ServeArgs, TaskCommand, UserCommand,
    },
    core::db::{
        NewProject, NewUser, ProjectUpdate, ScenarioUpdate, SelectionKind, Task, TaskUpdate, User,
        next_id,
    },
    server::{self, AppState},
};

/// Asks on stdin unless `--yes` was given.
struct Prompt {
    assume_yes: bool,
}

impl Confirm for Prompt {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Serve(args) = &cli.command {
        if cli.remote.is_some() {
            anyhow::bail!("`serve` works on a board file, not on a remote server");
        }
        let db = BoardDb::open(cli.board_file(), cli.token_keys()).await?;
        return serve(db, args).await;
    }

    match &cli.remote {
        Some(url) => {
            let db = RemoteDb::new(url.as_str());
            if !db.restore_bearer().await.unwrap_or(false) {
                info!("No saved login on {}", db.base_url());
            }
            run(&cli, TaskBoard::new(db)).await
        }
        None => {
            let db = BoardDb::open(cli.board_file(), cli.token_keys()).await?;
            let result = run(&cli, TaskBoard::new(db.clone())).await;
            db.save().await?;
            result
        }
    }
}

async fn serve(db: BoardDb, args: &ServeArgs) -> anyhow::Result<()> {
    let listener = server::bind(args.port).await?;
    let autosave = args
        .autosave_period()
        .map(|period| server::spawn_autosave(db.clone(), period));

    let state = AppState::new(db.clone(), args.require_auth);
    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await?;

    if let Some(handle) = autosave {
        handle.abort();
    }
    db.save().await
}

async fn run<S: TrackerStore>(cli: &Cli, board: TaskBoard<S>) -> anyhow::Result<()> {
    let prompt = Prompt {
        assume_yes: cli.yes,
    };
    let mut session = board.session().await?;

    match &cli.command {
        Commands::Serve(_) => anyhow::bail!("`serve` cannot run against an open session"),
        Commands::Login { username, password } => {
            let tokens = board.login(&mut session, username, password).await?;
            let user = board.user(tokens.user_id).await?;
            println!("Logged in as {} ({})", user.display_name(), user.role);
        }
        Commands::Whoami => whoami(&board, &session).await?,
        Commands::Seed => match board.seed_default_users().await? {
            0 => println!("Board already has users"),
            n => println!("Created {} users", n),
        },
        Commands::User(command) => user_command(&board, command).await?,
        Commands::Project(command) => {
            project_command(&board, &mut session, &prompt, command).await?
        }
        Commands::Scenario(command) => {
            scenario_command(&board, &mut session, &prompt, command).await?
        }
        Commands::Task(command) => {
            task_command(&board, &mut session, &prompt, command).await?
        }
    }

    print_notifications(&board, &session);
    Ok(())
}

async fn whoami<S: TrackerStore>(board: &TaskBoard<S>, session: &Session) -> anyhow::Result<()> {
    match session.require_user() {
        Ok(_) => {
            let user = board.current_user(session).await?;
            println!("{} ({}, {})", user.display_name(), user.username, user.role);
        }
        Err(e) => println!("{}", e),
    }
    if session.project_id != 0 {
        let project = board.project(session.project_id).await?;
        println!("Project:  {} ({})", project.name, project.id);
    }
    if session.scenario_id != 0 {
        let scenario = board.scenario(session.scenario_id).await?;
        println!("Scenario: {} ({})", scenario.name, scenario.id);
    }
    if session.task_id != 0 {
        let task = board.task(session.task_id).await?;
        println!("Task:     {} ({})", task.name, task.id);
    }
    Ok(())
}

async fn user_command<S: TrackerStore>(
    board: &TaskBoard<S>,
    command: &UserCommand,
) -> anyhow::Result<()> {
    match command {
        UserCommand::List => print_users(&board.users().await?),
        UserCommand::Assignable => print_users(&board.assignable_users().await?),
        UserCommand::Add {
            username,
            name,
            surname,
            role,
            password,
        } => {
            let user = board
                .create_user(&NewUser {
                    id: next_id(),
                    username: username.clone(),
                    name: name.clone(),
                    surname: surname.clone(),
                    role: *role,
                    password: password.clone(),
                })
                .await?;
            println!("Created user {} ({})", user.username, user.id);
        }
    }
    Ok(())
}

async fn project_command<S: TrackerStore>(
    board: &TaskBoard<S>,
    session: &mut Session,
    prompt: &Prompt,
    command: &ProjectCommand,
) -> anyhow::Result<()> {
    match command {
        ProjectCommand::List => {
            for project in board.projects().await? {
                let marker = selected_marker(session, SelectionKind::Project, project.id);
                println!("{}{:>15}  {}", marker, project.id, project.name);
            }
        }
        ProjectCommand::Add { name, description } => {
            let project = board
                .create_project(&NewProject::new(name.as_str(), description.as_str()))
                .await?;
            println!("Created project {} ({})", project.name, project.id);
        }
        ProjectCommand::Update {
            id,
            name,
            description,
        } => {
            let update = ProjectUpdate {
                name: name.clone(),
                description: description.clone(),
            };
            let project = board.update_project(*id, &update).await?;
            println!("Updated project {} ({})", project.name, project.id);
        }
        ProjectCommand::Rm { id } => {
            let project = board.project(*id).await?;
            let question = format!(
                "Delete project \"{}\" with all its scenarios and tasks?",
                project.name
            );
            if prompt.confirm(&question) {
                let removed = board.delete_project(*id).await?;
                println!(
                    "Deleted project {} ({} scenarios, {} tasks)",
                    project.name, removed.scenarios, removed.tasks
                );
            }
        }
        ProjectCommand::Select { id } => {
            let project = board.select_project(session, *id).await?;
            println!("Selected project {} ({})", project.name, project.id);
        }
    }
    Ok(())
}

async fn scenario_command<S: TrackerStore>(
    board: &TaskBoard<S>,
    session: &mut Session,
    prompt: &Prompt,
    command: &ScenarioCommand,
) -> anyhow::Result<()> {
    match command {
        ScenarioCommand::List { project } => {
            let project_id = match project {
                Some(id) => *id,
                None => session.require(SelectionKind::Project)?,
            };
            for scenario in board.scenarios(project_id).await? {
                let marker = selected_marker(session, SelectionKind::Scenario, scenario.id);
                println!(
                    "{}{:>15}  [{}] {} ({})",
                    marker, scenario.id, scenario.status, scenario.name, scenario.priority
                );
            }
        }
        ScenarioCommand::Add {
            name,
            description,
            priority,
        } => {
            let scenario = board
                .create_scenario(session, name, description, *priority)
                .await?;
            println!("Created scenario {} ({})", scenario.name, scenario.id);
        }
        ScenarioCommand::Update {
            id,
            name,
            description,
            priority,
        } => {
            let update = ScenarioUpdate {
                name: name.clone(),
                description: description.clone(),
                priority: *priority,
                ..ScenarioUpdate::default()
            };
            let scenario = board.update_scenario(*id, &update).await?;
            println!("Updated scenario {} ({})", scenario.name, scenario.id);
        }
        ScenarioCommand::Rm { id } => {
            let scenario = board.scenario(*id).await?;
            let question = format!("Delete scenario \"{}\" with all its tasks?", scenario.name);
            if prompt.confirm(&question) {
                let removed = board.delete_scenario(*id).await?;
                println!("Deleted scenario {} ({} tasks)", scenario.name, removed.tasks);
            }
        }
        ScenarioCommand::Select { id } => {
            let scenario = board.select_scenario(session, *id).await?;
            println!("Selected scenario {} ({})", scenario.name, scenario.id);
        }
    }
    Ok(())
}

async fn task_command<S: TrackerStore>(
    board: &TaskBoard<S>,
    session: &mut Session,
    prompt: &Prompt,
    command: &TaskCommand,
) -> anyhow::Result<()> {
    let scenario_or_selected = |scenario: &Option<i64>| match scenario {
        Some(id) => Ok(*id),
        None => session.require(SelectionKind::Scenario),
    };
    let task_or_selected = |task: &Option<i64>| match task {
        Some(id) => Ok(*id),
        None => session.require(SelectionKind::Task),
    };

    match command {
        TaskCommand::List { scenario, status } => {
            let scenario_id = scenario_or_selected(scenario)?;
            for task in board.tasks_with_status(scenario_id, *status).await? {
                let marker = selected_marker(session, SelectionKind::Task, task.id);
                println!("{}{}", marker, task_line(&task));
            }
        }
        TaskCommand::Kanban { scenario } => {
            let scenario_id = scenario_or_selected(scenario)?;
            let kanban = board.kanban(scenario_id).await?;
            for (status, tasks) in kanban.columns() {
                println!("== {} ({}) ==", status, tasks.len());
                for task in tasks {
                    println!("  {}", task_line(task));
                }
            }
        }
        TaskCommand::Show { id } => {
            let task = board.task(task_or_selected(id)?).await?;
            let owner = match task.owner_id {
                Some(owner_id) => board.user(owner_id).await.ok(),
                None => None,
            };
            print_task(&task, owner.as_ref());
        }
        TaskCommand::Add {
            name,
            description,
            priority,
            estimate,
            owner,
        } => {
            let task = board
                .create_task(session, name, description, *priority, *estimate, *owner)
                .await?;
            println!("Created task {} ({})", task.name, task.id);
        }
        TaskCommand::Update {
            id,
            name,
            description,
            priority,
            estimate,
        } => {
            let update = TaskUpdate {
                name: name.clone(),
                description: description.clone(),
                priority: *priority,
                estimated_time: *estimate,
                ..TaskUpdate::default()
            };
            let task = board.update_task(*id, &update).await?;
            println!("Updated task {} ({})", task.name, task.id);
        }
        TaskCommand::Rm { id } => {
            let task = board.task(*id).await?;
            if prompt.confirm(&format!("Delete task \"{}\"?", task.name)) {
                board.delete_task(*id).await?;
                println!("Deleted task {}", task.name);
            }
        }
        TaskCommand::Select { id } => {
            let task = board.select_task(session, *id).await?;
            println!("Selected task {} ({})", task.name, task.id);
        }
        TaskCommand::Status { status, task } => {
            let task_id = task_or_selected(task)?;
            match board.change_task_status(task_id, *status, prompt).await? {
                StatusChange::Accepted(task) => {
                    println!("Task {} is now {}", task.name, task.status)
                }
                StatusChange::Unchanged(task) => {
                    println!("Task {} is already {}", task.name, task.status)
                }
                StatusChange::Rejected { reason, .. } => println!("{}", reason),
            }
        }
        TaskCommand::Assign { owner, task } => {
            let task_id = task_or_selected(task)?;
            let task = board.assign_task_owner(task_id, *owner).await?;
            let user = board.user(*owner).await?;
            println!(
                "Task {} assigned to {} ({})",
                task.name,
                user.display_name(),
                task.status
            );
        }
    }
    Ok(())
}

fn selected_marker(session: &Session, kind: SelectionKind, id: i64) -> &'static str {
    if session.get(kind) == id { "* " } else { "  " }
}

fn task_line(task: &Task) -> String {
    let owner = task
        .owner_id
        .map_or_else(|| "unassigned".to_string(), |id| format!("owner {}", id));
    format!(
        "{:>15}  [{}] {} ({}, {}h, {})",
        task.id, task.status, task.name, task.priority, task.estimated_time, owner
    )
}

fn print_task(task: &Task, owner: Option<&User>) {
    println!("{} ({})", task.name, task.id);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!("  Status:    {}", task.status);
    println!("  Priority:  {}", task.priority);
    println!("  Estimate:  {}h", task.estimated_time);
    match owner {
        Some(user) => println!("  Owner:     {} ({})", user.display_name(), user.role),
        None => println!("  Owner:     unassigned"),
    }
    println!("  Created:   {}", task.creation_date);
    if let Some(start) = task.start_date {
        println!("  Started:   {}", start);
    }
    if let Some(end) = task.end_date {
        println!("  Finished:  {}", end);
    }
}

fn print_users(users: &[User]) {
    for user in users {
        println!(
            "{:>15}  {:<12} {} ({})",
            user.id,
            user.username,
            user.display_name(),
            user.role
        );
    }
}

/// Show what the command sent to the logged in user, or everything when
/// nobody is logged in.
fn print_notifications<S: TrackerStore>(board: &TaskBoard<S>, session: &Session) {
    let notifications = match session.user_id {
        0 => board.notifications().snapshot(),
        user_id => board.notifications().for_recipient(user_id),
    };
    for notification in notifications {
        println!(
            "[{}] {}: {}",
            notification.priority, notification.title, notification.message
        );
    }
    board.notifications().mark_all_as_read();
}
